#![allow(dead_code)]

use axum::body::Body;
use axum::http::{Request, Response};
use bytes::Bytes;
use chunk_relay::config::{Config, UploadConfig};
use chunk_relay::state::AppState;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

pub const BOUNDARY: &str = "----chunkrelaytestboundary";

pub fn limits(root: &Path) -> UploadConfig {
    UploadConfig {
        upload_dir: root.join("files"),
        chunk_dir: root.join("chunks"),
        max_file_size_mb: 10,
        default_chunk_size_mb: 2,
        min_chunk_size_mb: 1,
        max_chunk_size_mb: 4,
        max_concurrency: 3,
    }
}

pub async fn test_state(root: &Path) -> Arc<AppState> {
    let state = AppState::new(limits(root));
    state.layout.reset().await.unwrap();
    Arc::new(state)
}

pub fn test_config(root: &Path) -> Config {
    Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        worker_threads: 1,
        cors_origins: vec!["*".to_string()],
        static_dir: root.join("static"),
        upload_config_path: root.join("missing.toml"),
        session_ttl: Duration::from_secs(3600),
        sweep_interval: Duration::from_secs(600),
    }
}

/// a one-frame body stream for the chunk receiver
pub fn body(data: &[u8]) -> futures::stream::Iter<std::vec::IntoIter<Result<Bytes, std::io::Error>>> {
    frames(&[data])
}

pub fn frames(parts: &[&[u8]]) -> futures::stream::Iter<std::vec::IntoIter<Result<Bytes, std::io::Error>>> {
    let items: Vec<Result<Bytes, std::io::Error>> =
        parts.iter().map(|p| Ok(Bytes::copy_from_slice(p))).collect();
    futures::stream::iter(items)
}

pub enum Part<'a> {
    Text(&'a str, &'a str),
    File(&'a str, &'a [u8]),
}

pub fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut out = Vec::new();
    for part in parts {
        out.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        match part {
            Part::Text(name, value) => {
                out.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name).as_bytes(),
                );
                out.extend_from_slice(value.as_bytes());
            }
            Part::File(name, data) => {
                out.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"; filename=\"blob\"\r\n\
                         Content-Type: application/octet-stream\r\n\r\n",
                        name
                    )
                    .as_bytes(),
                );
                out.extend_from_slice(data);
            }
        }
        out.extend_from_slice(b"\r\n");
    }
    out.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    out
}

pub fn json_request(uri: &str, value: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(value.to_string()))
        .unwrap()
}

pub fn chunk_request(uri: &str, upload_id: &str, index: u32, total: u32, data: &[u8]) -> Request<Body> {
    let index = index.to_string();
    let total = total.to_string();
    multipart_request(
        uri,
        &[
            Part::Text("uploadId", upload_id),
            Part::Text("index", &index),
            Part::Text("totalChunks", &total),
            Part::File("chunk", data),
        ],
    )
}

pub fn multipart_request(uri: &str, parts: &[Part<'_>]) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", format!("multipart/form-data; boundary={}", BOUNDARY))
        .body(Body::from(multipart_body(parts)))
        .unwrap()
}

pub async fn body_bytes(response: Response<Body>) -> Bytes {
    axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}
