use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::index::FinishedFile;
use crate::registry::{InitGrant, NewUpload};

// request to start a chunked upload; every field optional so that
// incomplete bodies are rejected by validation, not by the extractor
#[derive(Deserialize, Debug, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct InitRequest {
    #[serde(deserialize_with = "lenient_string")]
    pub filename: String,
    #[serde(deserialize_with = "lenient_int")]
    pub size: i64,
    #[serde(deserialize_with = "lenient_string")]
    pub mime: String,
    #[serde(alias = "client_msg_id", alias = "clientMsgId", deserialize_with = "lenient_token")]
    pub correlation_token: Option<String>,
}

impl From<InitRequest> for NewUpload {
    fn from(req: InitRequest) -> Self {
        NewUpload {
            filename: req.filename,
            size: req.size,
            mime: req.mime,
            correlation_token: req.correlation_token,
        }
    }
}

// transmission parameters for the client
#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct InitResponse {
    pub ok: bool,
    pub upload_id: String,
    pub chunk_size: u64,
    pub max_concurrency: u32,
    pub max_file_size: u64,
}

impl From<InitGrant> for InitResponse {
    fn from(grant: InitGrant) -> Self {
        InitResponse {
            ok: true,
            upload_id: grant.upload_id,
            chunk_size: grant.chunk_size,
            max_concurrency: grant.max_concurrency,
            max_file_size: grant.max_file_size,
        }
    }
}

// response for a stored chunk
#[derive(Serialize, Debug)]
pub struct ChunkResponse {
    pub ok: bool,
    pub index: u32,
    pub bytes: u64,
}

// request to reassemble an upload
#[derive(Deserialize, Debug, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct CompleteRequest {
    #[serde(alias = "upload_id", deserialize_with = "lenient_string")]
    pub upload_id: String,
    #[serde(alias = "total_chunks", deserialize_with = "lenient_int")]
    pub total_chunks: i64,
}

// response for a finished upload
#[derive(Serialize, Debug)]
pub struct CompleteResponse {
    pub ok: bool,
    pub file: FinishedFile,
}

// query string of the media endpoint
#[derive(Deserialize, Debug, Default)]
pub struct MediaQuery {
    pub download: Option<String>,
}

impl MediaQuery {
    pub fn as_attachment(&self) -> bool {
        self.download.as_deref() == Some("1")
    }
}

// json clients are loose about types: one odd field must not blank the
// whole body, so each field falls back on its own

// null or a non-string value reads as empty
fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        _ => String::new(),
    })
}

fn lenient_token<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

// numbers, numeric strings and floats (truncated); anything else reads as 0
fn lenient_int<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => number_to_i64(&n),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().filter(|f| f.is_finite()).map(|f| f as i64))
                .unwrap_or(0)
        }
        _ => 0,
    })
}

fn number_to_i64(n: &serde_json::Number) -> i64 {
    if let Some(i) = n.as_i64() {
        i
    } else if let Some(u) = n.as_u64() {
        i64::try_from(u).unwrap_or(i64::MAX)
    } else {
        n.as_f64().filter(|f| f.is_finite()).map(|f| f as i64).unwrap_or(0)
    }
}
