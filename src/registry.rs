//! In-memory registry of upload sessions that have been initialised but not
//! yet consumed by a completion attempt.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use uuid::Uuid;

use crate::config::UploadConfig;
use crate::error::{UploadError, UploadResult};
use crate::storage::StorageLayout;

/// one chunked upload in progress
#[derive(Debug, Clone)]
pub struct UploadSession {
    pub upload_id: String,
    pub filename: String,
    /// declared by the client at init, not measured
    pub size: u64,
    pub mime: String,
    pub correlation_token: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    /// indices whose chunk file has been fully written
    pub received: BTreeSet<u32>,
}

impl UploadSession {
    /// first index in `[0, total)` not yet received
    pub fn first_missing(&self, total_chunks: u32) -> Option<u32> {
        if self.received.range(..total_chunks).count() == total_chunks as usize {
            return None;
        }
        (0..total_chunks).find(|i| !self.received.contains(i))
    }
}

/// what a client declares when starting an upload
#[derive(Debug, Clone, Default)]
pub struct NewUpload {
    pub filename: String,
    pub size: i64,
    pub mime: String,
    pub correlation_token: Option<String>,
}

/// transmission parameters handed back from init
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitGrant {
    pub upload_id: String,
    pub chunk_size: u64,
    pub max_concurrency: u32,
    pub max_file_size: u64,
}

#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: DashMap<String, UploadSession>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// validate a new upload, allocate its id and staging directory
    pub async fn init(
        &self,
        layout: &StorageLayout,
        limits: &UploadConfig,
        request: NewUpload,
    ) -> UploadResult<InitGrant> {
        let filename = request.filename.trim().to_string();
        if filename.is_empty() || request.size <= 0 {
            tracing::warn!("Rejected upload init: filename={:?} size={}", filename, request.size);
            return Err(UploadError::InvalidRequest(
                "filename and a positive size are required".to_string(),
            ));
        }

        let size = request.size as u64;
        let limit = limits.max_file_size_bytes();
        if size > limit {
            tracing::warn!("Rejected upload init for {}: {} > {} bytes", filename, size, limit);
            return Err(UploadError::FileTooLarge { limit });
        }

        let upload_id = Uuid::new_v4().to_string();
        // directory first, so a visible session always has somewhere to write
        layout.create_staging(&upload_id).await?;

        let now = Utc::now();
        let session = UploadSession {
            upload_id: upload_id.clone(),
            filename,
            size,
            mime: request.mime.trim().to_string(),
            correlation_token: request
                .correlation_token
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty()),
            created_at: now,
            last_activity: now,
            received: BTreeSet::new(),
        };
        tracing::info!("📤 Initialized upload: {} ({} bytes, ID: {})", session.filename, size, upload_id);
        self.sessions.insert(upload_id.clone(), session);

        Ok(InitGrant {
            upload_id,
            chunk_size: limits.default_chunk_size_bytes(),
            max_concurrency: limits.max_concurrency,
            max_file_size: limit,
        })
    }

    pub fn contains(&self, upload_id: &str) -> bool {
        self.sessions.contains_key(upload_id)
    }

    pub fn get(&self, upload_id: &str) -> Option<UploadSession> {
        self.sessions.get(upload_id).map(|s| s.value().clone())
    }

    /// record a fully written chunk; fails if the session was consumed meanwhile
    pub fn mark_received(&self, upload_id: &str, index: u32) -> UploadResult<usize> {
        let mut session = self
            .sessions
            .get_mut(upload_id)
            .ok_or(UploadError::SessionNotFound)?;
        session.received.insert(index);
        session.last_activity = Utc::now();
        Ok(session.received.len())
    }

    /// remove a session; at most one caller ever gets `Some`
    pub fn take(&self, upload_id: &str) -> Option<UploadSession> {
        self.sessions.remove(upload_id).map(|(_, session)| session)
    }

    /// remove a session only if it has been idle since before `cutoff`
    pub fn take_if_idle(&self, upload_id: &str, cutoff: DateTime<Utc>) -> Option<UploadSession> {
        self.sessions
            .remove_if(upload_id, |_, s| s.last_activity < cutoff)
            .map(|(_, session)| session)
    }

    pub fn idle_since(&self, cutoff: DateTime<Utc>) -> Vec<String> {
        self.sessions
            .iter()
            .filter(|entry| entry.last_activity < cutoff)
            .map(|entry| entry.key().clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
