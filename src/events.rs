//! Completion notifications for the chat layer, and the username directory it
//! owns. Neither the broadcast transport nor registration lives here; this is
//! only the seam the upload core talks through.

use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::broadcast;

use crate::index::FinishedFile;

pub const ANONYMOUS: &str = "Anonymous";
pub const MAX_USERNAME_CHARS: usize = 24;

/// a chat message announcing a finished upload
#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub msg_id: String,
    pub user: String,
    pub text: String,
    pub ts: String,
    pub kind: String,
    pub file: FinishedFile,
    pub client_msg_id: Option<String>,
}

impl ChatMessage {
    pub fn for_upload(file: FinishedFile, user: String) -> Self {
        let now = chrono::Local::now();
        Self {
            msg_id: format!("{}-{}", now.timestamp_millis(), file.file_id),
            user,
            text: file.original_name.clone(),
            ts: now.format("%H:%M:%S").to_string(),
            kind: "file".to_string(),
            client_msg_id: file.correlation_token.clone(),
            file,
        }
    }
}

#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<ChatMessage>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChatMessage> {
        self.sender.subscribe()
    }

    /// returns the number of subscribers reached; zero is fine
    pub fn publish(&self, message: ChatMessage) -> usize {
        match self.sender.send(message) {
            Ok(n) => n,
            Err(_) => {
                tracing::debug!("No subscribers for completion event");
                0
            }
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

/// maps a client session key to the name it registered under
pub trait UsernameLookup: Send + Sync {
    fn username_for(&self, session_key: &str) -> Option<String>;
}

#[derive(Debug, Default)]
pub struct SessionDirectory {
    names: DashMap<String, String>,
}

impl SessionDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, session_key: &str, username: &str) -> Result<(), String> {
        let username = username.trim();
        if username.is_empty() {
            return Err("username must not be empty".to_string());
        }
        if username.chars().count() > MAX_USERNAME_CHARS {
            return Err(format!("username must be at most {} characters", MAX_USERNAME_CHARS));
        }
        self.names.insert(session_key.to_string(), username.to_string());
        Ok(())
    }

    pub fn unregister(&self, session_key: &str) {
        self.names.remove(session_key);
    }
}

impl UsernameLookup for SessionDirectory {
    fn username_for(&self, session_key: &str) -> Option<String> {
        self.names.get(session_key).map(|n| n.value().clone())
    }
}
