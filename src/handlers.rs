use axum::{
    body::Bytes,
    extract::{Multipart, State},
    http::HeaderMap,
    response::Json,
};
use serde::de::DeserializeOwned;
use std::sync::Arc;

use crate::assembler;
use crate::chunks::{self, parse_position};
use crate::error::{UploadError, UploadResult};
use crate::events::ANONYMOUS;
use crate::models::{ChunkResponse, CompleteRequest, CompleteResponse, InitRequest, InitResponse};
use crate::state::AppState;

/// header carrying the caller's chat session key
pub const SESSION_HEADER: &str = "x-session-id";

// a body that is not valid json counts as an empty object
fn parse_body<T: DeserializeOwned + Default>(body: &[u8]) -> T {
    serde_json::from_slice(body).unwrap_or_else(|e| {
        tracing::debug!("Unparseable request body, treating as empty: {}", e);
        T::default()
    })
}

// initialize a chunked upload
pub async fn init_upload(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> UploadResult<Json<InitResponse>> {
    let payload: InitRequest = parse_body(&body);
    tracing::debug!("Initializing chunked upload for file: {}", payload.filename);

    let grant = state
        .sessions
        .init(&state.layout, &state.limits, payload.into())
        .await?;

    Ok(Json(grant.into()))
}

fn text_field_error(e: axum::extract::multipart::MultipartError) -> UploadError {
    tracing::warn!("Failed to read multipart field: {}", e);
    UploadError::IncompleteRequest(format!("failed to read multipart field: {}", e))
}

// upload a single chunk
pub async fn upload_chunk(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> UploadResult<Json<ChunkResponse>> {
    let mut upload_id: Option<String> = None;
    let mut index: Option<String> = None;
    let mut total_chunks: Option<String> = None;
    let mut stored: Option<(u32, u64)> = None;

    while let Some(field) = multipart.next_field().await.map_err(text_field_error)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "uploadId" | "upload_id" => {
                upload_id = Some(field.text().await.map_err(text_field_error)?.trim().to_string());
            }
            "index" => index = Some(field.text().await.map_err(text_field_error)?),
            "totalChunks" | "total_chunks" => {
                total_chunks = Some(field.text().await.map_err(text_field_error)?);
            }
            "chunk" => {
                if stored.is_some() {
                    return Err(UploadError::IncompleteRequest(
                        "only one chunk per request".to_string(),
                    ));
                }
                // session first, then presence of fields, then range
                let id = live_upload_id(&state, upload_id.as_deref())?;
                let (Some(index_raw), Some(total_raw)) = (index.as_deref(), total_chunks.as_deref())
                else {
                    tracing::warn!("Chunk for {} arrived without index/totalChunks", id);
                    return Err(UploadError::IncompleteRequest(
                        "index and totalChunks must precede the chunk".to_string(),
                    ));
                };
                let (idx, total) = parse_position(index_raw, total_raw)?;
                tracing::trace!("Received chunk {} for upload {}", idx, id);

                let bytes = chunks::put_chunk(&state, id, idx, total, field).await?;
                stored = Some((idx, bytes));
            }
            other => tracing::trace!("Ignoring multipart field {:?}", other),
        }
    }

    match stored {
        Some((index, bytes)) => Ok(Json(ChunkResponse {
            ok: true,
            index,
            bytes,
        })),
        None => {
            live_upload_id(&state, upload_id.as_deref())?;
            tracing::warn!("No chunk data provided");
            Err(UploadError::IncompleteRequest("no chunk data provided".to_string()))
        }
    }
}

fn live_upload_id<'a>(state: &AppState, upload_id: Option<&'a str>) -> UploadResult<&'a str> {
    match upload_id {
        Some(id) if !id.is_empty() && state.sessions.contains(id) => Ok(id),
        other => {
            tracing::warn!("Upload ID not found: {:?}", other);
            Err(UploadError::SessionNotFound)
        }
    }
}

// complete a chunked upload by assembling all chunks
pub async fn complete_upload(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> UploadResult<Json<CompleteResponse>> {
    let payload: CompleteRequest = parse_body(&body);
    let upload_id = payload.upload_id.trim();
    tracing::debug!("Completing chunked upload: {}", upload_id);

    let user = headers
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|key| state.users.username_for(key))
        .unwrap_or_else(|| ANONYMOUS.to_string());
    let file = assembler::complete(&state, upload_id, payload.total_chunks, &user).await?;

    Ok(Json(CompleteResponse { ok: true, file }))
}

// health check endpoint
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "chunk-relay",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "activeUploads": state.sessions.len(),
        "finishedFiles": state.files.len(),
    }))
}
