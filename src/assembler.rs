//! Reassembly: consume the session, check every chunk is present, then
//! concatenate chunks in index order into the finished-file root.

use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use tokio::fs;
use tokio::io::{AsyncWriteExt, BufReader, BufWriter};

use crate::chunks::IO_BUFFER;
use crate::error::{UploadError, UploadResult};
use crate::events::ChatMessage;
use crate::index::{media_url, FinishedFile};
use crate::registry::UploadSession;
use crate::state::AppState;
use crate::utils::sanitize_filename;

/// name of the finished file on disk; the id prefix keeps equal names apart
pub fn stored_name(upload_id: &str, original_name: &str) -> String {
    let safe = sanitize_filename(original_name);
    if safe.is_empty() {
        format!("{}_{}.bin", upload_id, upload_id)
    } else {
        format!("{}_{}", upload_id, safe)
    }
}

/// complete an upload and announce it to `user`'s chat peers
///
/// The session is removed from the registry before anything else is checked,
/// so every attempt after the first sees `SessionNotFound` whatever the first
/// outcome was. On a missing chunk the staging directory is left as it is.
///
/// Reassembly and the completion event run on their own task: once the
/// session is consumed, a dropped request can no longer lose the file.
pub async fn complete(
    state: &Arc<AppState>,
    upload_id: &str,
    total_chunks: i64,
    user: &str,
) -> UploadResult<FinishedFile> {
    if !state.sessions.contains(upload_id) {
        tracing::warn!("Upload ID not found for completion: {}", upload_id);
        return Err(UploadError::SessionNotFound);
    }
    if total_chunks <= 0 || total_chunks > u32::MAX as i64 {
        return Err(UploadError::InvalidRequest(format!(
            "totalChunks must be positive, got {}",
            total_chunks
        )));
    }
    let total_chunks = total_chunks as u32;

    let task_state = Arc::clone(state);
    let upload_id = upload_id.to_string();
    let user = user.to_string();
    let task = tokio::spawn(async move {
        let file = reassemble(&task_state, &upload_id, total_chunks).await?;
        let reached = task_state
            .events
            .publish(ChatMessage::for_upload(file.clone(), user));
        tracing::debug!("Completion event for {} delivered to {} subscribers", file.file_id, reached);
        Ok::<_, UploadError>(file)
    });

    task.await.map_err(|e| {
        tracing::error!("Reassembly task failed: {}", e);
        UploadError::Io(std::io::Error::new(std::io::ErrorKind::Other, e))
    })?
}

async fn reassemble(state: &AppState, upload_id: &str, total_chunks: u32) -> UploadResult<FinishedFile> {
    let session = state.sessions.take(upload_id).ok_or(UploadError::SessionNotFound)?;

    if !state.layout.staging_exists(upload_id).await? {
        tracing::error!("Staging directory missing for upload {}", upload_id);
        return Err(UploadError::StagingDirectoryMissing);
    }

    verify_chunks(state, &session, total_chunks).await?;

    let stored_name = stored_name(upload_id, &session.filename);
    let final_path = state.layout.finished_path(&stored_name);
    let partial_path = state.layout.finished_path(&format!("{}.partial", stored_name));
    tracing::debug!("Assembling {} chunks into: {:?}", total_chunks, final_path);

    let written = match concatenate(state, upload_id, total_chunks, &partial_path).await {
        Ok(n) => n,
        Err(e) => {
            tracing::error!("Failed to assemble upload {}: {}", upload_id, e);
            let _ = fs::remove_file(&partial_path).await;
            return Err(e);
        }
    };
    if let Err(e) = fs::rename(&partial_path, &final_path).await {
        let _ = fs::remove_file(&partial_path).await;
        return Err(e.into());
    }

    // clean up chunks directory
    if let Err(e) = state.layout.remove_staging(upload_id).await {
        tracing::warn!("Failed to remove staging directory for {}: {}", upload_id, e);
    }

    if written != session.size {
        tracing::warn!(
            "Upload {} assembled {} bytes but declared {}",
            upload_id,
            written,
            session.size
        );
    }

    let file = FinishedFile {
        file_id: upload_id.to_string(),
        original_name: session.filename,
        stored_name,
        size: session.size,
        mime: session.mime,
        uploaded_at: Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string(),
        correlation_token: session.correlation_token,
        url: media_url(upload_id),
    };
    state.files.register(file.clone());

    tracing::info!("✅ Completed upload: {} ({} bytes)", file.original_name, written);
    Ok(file)
}

async fn verify_chunks(state: &AppState, session: &UploadSession, total_chunks: u32) -> UploadResult<()> {
    if let Some(missing) = session.first_missing(total_chunks) {
        tracing::warn!(
            "Incomplete upload {}: chunk {} of {} never arrived",
            session.upload_id,
            missing,
            total_chunks
        );
        return Err(UploadError::IncompleteUpload { missing });
    }

    // the registry says so; make sure the disk agrees
    for index in 0..total_chunks {
        let path = state.layout.chunk_path(&session.upload_id, index)?;
        if !fs::try_exists(&path).await? {
            tracing::warn!("Chunk file {:?} missing on disk", path);
            return Err(UploadError::IncompleteUpload { missing: index });
        }
    }
    Ok(())
}

async fn concatenate(state: &AppState, upload_id: &str, total_chunks: u32, dest: &Path) -> UploadResult<u64> {
    let mut output = BufWriter::with_capacity(IO_BUFFER, fs::File::create(dest).await?);
    let mut written = 0u64;

    for index in 0..total_chunks {
        let chunk_path = state.layout.chunk_path(upload_id, index)?;
        tracing::trace!("Reading chunk: {:?}", chunk_path);
        let mut reader = BufReader::with_capacity(IO_BUFFER, fs::File::open(&chunk_path).await?);
        written += tokio::io::copy_buf(&mut reader, &mut output).await?;
    }

    output.flush().await?;
    output.get_ref().sync_all().await?;
    Ok(written)
}
