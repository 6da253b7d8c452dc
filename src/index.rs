use dashmap::DashMap;
use serde::Serialize;

use crate::error::{UploadError, UploadResult};

/// a reassembled upload, addressable by its original upload id
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FinishedFile {
    pub file_id: String,
    pub original_name: String,
    /// file name under the finished-file root
    pub stored_name: String,
    pub size: u64,
    pub mime: String,
    pub uploaded_at: String,
    pub correlation_token: Option<String>,
    pub url: String,
}

// finished files, kept until shutdown
#[derive(Debug, Default)]
pub struct FinishedFileIndex {
    files: DashMap<String, FinishedFile>,
}

impl FinishedFileIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, file: FinishedFile) {
        tracing::debug!("Registered finished file {} as {}", file.file_id, file.stored_name);
        self.files.insert(file.file_id.clone(), file);
    }

    pub fn resolve(&self, file_id: &str) -> UploadResult<FinishedFile> {
        self.files
            .get(file_id)
            .map(|f| f.value().clone())
            .ok_or(UploadError::NotFound)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

pub fn media_url(file_id: &str) -> String {
    format!("/media/{}", file_id)
}
