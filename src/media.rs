use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Path, Query, Request, State},
    http::{header, HeaderValue, StatusCode},
    response::Response,
};
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use tower::ServiceExt;
use tower_http::services::ServeFile;

use crate::error::{UploadError, UploadResult};
use crate::models::MediaQuery;
use crate::state::AppState;

// serve a finished upload, inline or as a download
pub async fn serve_media(
    State(state): State<Arc<AppState>>,
    Path(file_id): Path<String>,
    Query(query): Query<MediaQuery>,
    req: Request,
) -> UploadResult<Response> {
    let entry = state.files.resolve(&file_id)?;
    let path = state.layout.finished_path(&entry.stored_name);
    if !tokio::fs::try_exists(&path).await? {
        tracing::warn!("Finished file {} missing on disk at {:?}", file_id, path);
        return Err(UploadError::NotFound);
    }

    // ServeFile handles range and conditional requests
    let response = match ServeFile::new(&path).oneshot(req).await {
        Ok(response) => response,
        Err(never) => match never {},
    };
    let mut response = response.map(Body::new);

    if response.status() == StatusCode::OK || response.status() == StatusCode::PARTIAL_CONTENT {
        let headers = response.headers_mut();
        if let Ok(mime) = HeaderValue::from_str(&entry.mime) {
            if !entry.mime.is_empty() {
                headers.insert(header::CONTENT_TYPE, mime);
            }
        }
        if let Ok(disposition) = content_disposition(&entry.original_name, query.as_attachment()) {
            headers.insert(header::CONTENT_DISPOSITION, disposition);
        }
    }

    tracing::debug!("Serving {} ({:?})", file_id, response.status());
    Ok(response)
}

/// `inline` or `attachment`, with an ascii fallback and an RFC 5987 utf-8 name
pub fn content_disposition(
    original_name: &str,
    attachment: bool,
) -> Result<HeaderValue, header::InvalidHeaderValue> {
    let kind = if attachment { "attachment" } else { "inline" };
    let ascii: String = original_name
        .chars()
        .filter(|c| c.is_ascii_graphic() || *c == ' ')
        .filter(|c| !matches!(c, '"' | '\\'))
        .collect();
    let ascii = if ascii.trim().is_empty() { "download".to_string() } else { ascii };
    let encoded = utf8_percent_encode(original_name, NON_ALPHANUMERIC);

    HeaderValue::from_str(&format!(
        "{}; filename=\"{}\"; filename*=UTF-8''{}",
        kind, ascii, encoded
    ))
}
