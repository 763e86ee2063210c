use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Role of a chat turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageRole {
    User,
    Assistant,
    System,
}

/// A single turn in the session's conversation with the chat model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }
}

/// Per-session context: a key/value store for form data, flags and cached
/// artifacts, plus the ordered chat history.
///
/// Cloning is cheap; clones share the same underlying state. The context is
/// owned by exactly one user session and is never shared across sessions.
#[derive(Clone, Debug)]
pub struct Context {
    data: Arc<DashMap<String, Value>>,
    chat_history: Arc<RwLock<Vec<ChatMessage>>>,
}

impl Context {
    pub fn new() -> Self {
        Self {
            data: Arc::new(DashMap::new()),
            chat_history: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub async fn set(&self, key: impl Into<String>, value: impl serde::Serialize) {
        let value = serde_json::to_value(value).expect("Failed to serialize value");
        self.data.insert(key.into(), value);
    }

    pub async fn get<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.data
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    pub async fn remove(&self, key: &str) -> Option<Value> {
        self.data.remove(key).map(|(_, v)| v)
    }

    pub async fn clear(&self) {
        self.data.clear();
        self.chat_history.write().await.clear();
    }

    pub async fn add_user_message(&self, content: impl Into<String>) {
        self.chat_history.write().await.push(ChatMessage::user(content));
    }

    pub async fn add_assistant_message(&self, content: impl Into<String>) {
        self.chat_history
            .write()
            .await
            .push(ChatMessage::assistant(content));
    }

    /// Full chat history in insertion order.
    pub async fn get_all_messages(&self) -> Vec<ChatMessage> {
        self.chat_history.read().await.clone()
    }

    pub async fn get_last_messages(&self, n: usize) -> Vec<ChatMessage> {
        let history = self.chat_history.read().await;
        let start = history.len().saturating_sub(n);
        history[start..].to_vec()
    }

    pub async fn message_count(&self) -> usize {
        self.chat_history.read().await.len()
    }

    /// Drops the conversation while keeping the key/value data intact.
    pub async fn clear_chat_history(&self) {
        self.chat_history.write().await.clear();
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}
