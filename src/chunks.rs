//! Receiving a single chunk: bounds checks, then a streamed write into the
//! session's staging directory.

use std::path::Path;

use bytes::Bytes;
use futures::{Stream, StreamExt};
use tokio::fs;
use tokio::io::{AsyncWriteExt, BufWriter};
use uuid::Uuid;

use crate::error::{UploadError, UploadResult};
use crate::state::AppState;
use crate::storage::chunk_file_name;

/// buffer size for every streamed read and write
pub const IO_BUFFER: usize = 1024 * 1024;

/// parse the textual `index` and `totalChunks` fields of a chunk request
pub fn parse_position(index: &str, total_chunks: &str) -> UploadResult<(u32, u32)> {
    let index: i64 = index
        .trim()
        .parse()
        .map_err(|_| UploadError::InvalidChunkIndex(format!("malformed index {:?}", index)))?;
    let total: i64 = total_chunks.trim().parse().map_err(|_| {
        UploadError::InvalidChunkIndex(format!("malformed totalChunks {:?}", total_chunks))
    })?;
    check_bounds(index, total)?;
    Ok((index as u32, total as u32))
}

fn check_bounds(index: i64, total_chunks: i64) -> UploadResult<()> {
    if index < 0 || total_chunks <= 0 || index >= total_chunks || total_chunks > u32::MAX as i64 {
        return Err(UploadError::InvalidChunkIndex(format!(
            "index {} out of range for {} chunks",
            index, total_chunks
        )));
    }
    Ok(())
}

/// store one chunk, replacing any earlier copy of the same index
///
/// The body is written to a private temp file and renamed into place, so a
/// retransmission racing the original never leaves interleaved bytes. The
/// registry is only touched before and after the I/O.
pub async fn put_chunk<S, E>(
    state: &AppState,
    upload_id: &str,
    index: u32,
    total_chunks: u32,
    body: S,
) -> UploadResult<u64>
where
    S: Stream<Item = Result<Bytes, E>>,
    E: std::fmt::Display,
{
    if !state.sessions.contains(upload_id) {
        tracing::warn!("Chunk for unknown upload: {}", upload_id);
        return Err(UploadError::SessionNotFound);
    }
    check_bounds(index as i64, total_chunks as i64)?;

    let staging = state.layout.staging_dir(upload_id)?;
    let chunk_path = staging.join(chunk_file_name(index));
    let temp_path = staging.join(format!(".{}.{}.tmp", chunk_file_name(index), Uuid::new_v4()));

    let written = match stream_to_file(&temp_path, body).await {
        Ok(0) => {
            let _ = fs::remove_file(&temp_path).await;
            return Err(UploadError::IncompleteRequest("chunk payload is empty".to_string()));
        }
        Ok(n) => n,
        Err(e) => {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e);
        }
    };

    // completed or swept while the body was streaming
    if !state.sessions.contains(upload_id) {
        tracing::warn!("Upload {} ended before chunk {} landed", upload_id, index);
        let _ = fs::remove_file(&temp_path).await;
        return Err(UploadError::SessionNotFound);
    }

    if let Err(e) = fs::rename(&temp_path, &chunk_path).await {
        let _ = fs::remove_file(&temp_path).await;
        if e.kind() == std::io::ErrorKind::NotFound {
            tracing::warn!("Staging directory for {} vanished under chunk {}", upload_id, index);
            return Err(UploadError::SessionNotFound);
        }
        tracing::error!("Failed to move chunk {} into place: {}", index, e);
        return Err(e.into());
    }

    let received = state.sessions.mark_received(upload_id, index)?;
    tracing::debug!(
        "📦 Received chunk {}/{} for upload {} ({} bytes, {} stored)",
        index + 1,
        total_chunks,
        upload_id,
        written,
        received
    );
    Ok(written)
}

async fn stream_to_file<S, E>(path: &Path, body: S) -> UploadResult<u64>
where
    S: Stream<Item = Result<Bytes, E>>,
    E: std::fmt::Display,
{
    let file = fs::File::create(path).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            // staging directory already gone: the session was swept or completed
            UploadError::SessionNotFound
        } else {
            tracing::error!("Failed to create chunk file {:?}: {}", path, e);
            UploadError::Io(e)
        }
    })?;
    let mut writer = BufWriter::with_capacity(IO_BUFFER, file);
    let mut body = std::pin::pin!(body);
    let mut written = 0u64;

    while let Some(frame) = body.next().await {
        let frame = frame.map_err(|e| {
            tracing::warn!("Chunk stream interrupted: {}", e);
            UploadError::IncompleteRequest(format!("failed to read chunk data: {}", e))
        })?;
        writer.write_all(&frame).await?;
        written += frame.len() as u64;
    }

    writer.flush().await?;
    writer.get_ref().sync_all().await?;
    Ok(written)
}
