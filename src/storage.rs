//! On-disk layout: a staging root with one directory per in-flight upload,
//! and a root holding finished files.

use std::path::{Path, PathBuf};

use tokio::fs;
use uuid::Uuid;

use crate::config::UploadConfig;
use crate::error::{UploadError, UploadResult};

#[derive(Debug, Clone)]
pub struct StorageLayout {
    staging_root: PathBuf,
    files_root: PathBuf,
}

impl StorageLayout {
    pub fn new(staging_root: impl Into<PathBuf>, files_root: impl Into<PathBuf>) -> Self {
        Self {
            staging_root: staging_root.into(),
            files_root: files_root.into(),
        }
    }

    pub fn from_config(config: &UploadConfig) -> Self {
        Self::new(config.chunk_dir.clone(), config.upload_dir.clone())
    }

    pub fn staging_root(&self) -> &Path {
        &self.staging_root
    }

    pub fn files_root(&self) -> &Path {
        &self.files_root
    }

    /// wipe both roots and recreate them empty
    pub async fn reset(&self) -> UploadResult<()> {
        for root in [&self.staging_root, &self.files_root] {
            match fs::remove_dir_all(root).await {
                Ok(()) => tracing::debug!("Wiped {:?}", root),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => tracing::warn!("Failed to wipe {:?}: {}", root, e),
            }
            fs::create_dir_all(root).await?;
        }
        Ok(())
    }

    /// staging directory for an upload; ids that are not uuids never reach the filesystem
    pub fn staging_dir(&self, upload_id: &str) -> UploadResult<PathBuf> {
        Uuid::parse_str(upload_id).map_err(|_| UploadError::SessionNotFound)?;
        Ok(self.staging_root.join(upload_id))
    }

    /// zero-padded so lexical and numeric order agree
    pub fn chunk_path(&self, upload_id: &str, index: u32) -> UploadResult<PathBuf> {
        Ok(self.staging_dir(upload_id)?.join(chunk_file_name(index)))
    }

    pub fn finished_path(&self, stored_name: &str) -> PathBuf {
        self.files_root.join(stored_name)
    }

    pub async fn create_staging(&self, upload_id: &str) -> UploadResult<PathBuf> {
        let dir = self.staging_dir(upload_id)?;
        fs::create_dir_all(&dir).await?;
        tracing::trace!("Created staging directory: {:?}", dir);
        Ok(dir)
    }

    pub async fn staging_exists(&self, upload_id: &str) -> UploadResult<bool> {
        let dir = self.staging_dir(upload_id)?;
        Ok(fs::try_exists(&dir).await?)
    }

    pub async fn remove_staging(&self, upload_id: &str) -> UploadResult<()> {
        let dir = self.staging_dir(upload_id)?;
        match fs::remove_dir_all(&dir).await {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }
}

pub fn chunk_file_name(index: u32) -> String {
    format!("chunk_{:06}.part", index)
}
