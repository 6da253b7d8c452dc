use std::sync::Arc;

use crate::config::UploadConfig;
use crate::events::{EventBus, SessionDirectory, UsernameLookup};
use crate::index::FinishedFileIndex;
use crate::registry::SessionRegistry;
use crate::storage::StorageLayout;

/// shared application state
pub struct AppState {
    pub limits: UploadConfig,
    pub layout: StorageLayout,
    /// uploads in progress, keyed by upload id
    pub sessions: SessionRegistry,
    /// completed uploads, keyed by file id
    pub files: FinishedFileIndex,
    pub events: EventBus,
    pub users: Arc<dyn UsernameLookup>,
}

impl AppState {
    /// create state with empty registries over the configured roots
    pub fn new(limits: UploadConfig) -> Self {
        Self {
            layout: StorageLayout::from_config(&limits),
            limits,
            sessions: SessionRegistry::new(),
            files: FinishedFileIndex::new(),
            events: EventBus::default(),
            users: Arc::new(SessionDirectory::new()),
        }
    }

    pub fn with_users(mut self, users: Arc<dyn UsernameLookup>) -> Self {
        self.users = users;
        self
    }
}
