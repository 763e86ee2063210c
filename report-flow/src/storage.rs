use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::{
    Context,
    capability::{BlobStore, RecordStore},
    error::{FlowError, Result},
};

/// A user-scoped session. Created on login, deleted on logout; the context
/// carries everything the orchestrator needs between events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub user_id: String,
    #[serde(skip)]
    pub context: Context,
}

impl Session {
    pub fn new(id: String, user_id: impl Into<String>) -> Self {
        Self {
            id,
            user_id: user_id.into(),
            context: Context::new(),
        }
    }
}

/// Trait for storing and retrieving sessions
#[async_trait]
pub trait SessionStorage: Send + Sync {
    async fn save(&self, session: Session) -> Result<()>;
    async fn get(&self, id: &str) -> Result<Option<Session>>;
    async fn delete(&self, id: &str) -> Result<()>;
}

/// In-memory implementation of SessionStorage
pub struct InMemorySessionStorage {
    sessions: Arc<DashMap<String, Session>>,
}

impl InMemorySessionStorage {
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
        }
    }
}

impl Default for InMemorySessionStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionStorage for InMemorySessionStorage {
    async fn save(&self, session: Session) -> Result<()> {
        self.sessions.insert(session.id.clone(), session);
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Session>> {
        Ok(self.sessions.get(id).map(|entry| entry.clone()))
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.sessions.remove(id);
        Ok(())
    }
}

/// In-memory implementation of BlobStore, for local runs and tests.
pub struct InMemoryBlobStore {
    blobs: Arc<DashMap<String, Vec<u8>>>,
}

impl InMemoryBlobStore {
    pub fn new() -> Self {
        Self {
            blobs: Arc::new(DashMap::new()),
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.blobs.contains_key(key)
    }
}

impl Default for InMemoryBlobStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BlobStore for InMemoryBlobStore {
    async fn put(&self, key: &str, bytes: &[u8]) -> Result<()> {
        self.blobs.insert(key.to_string(), bytes.to_vec());
        Ok(())
    }

    async fn get_url(&self, key: &str) -> Result<String> {
        if !self.blobs.contains_key(key) {
            return Err(FlowError::UploadFailure(format!(
                "no blob stored under key {key}"
            )));
        }
        Ok(format!("memory://{key}"))
    }
}

/// In-memory implementation of RecordStore, for local runs and tests.
pub struct InMemoryRecordStore {
    records: Arc<DashMap<String, Vec<Value>>>,
    next_id: AtomicU64,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self {
            records: Arc::new(DashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Records appended under a path, in insertion order.
    pub fn records(&self, path: &str) -> Vec<Value> {
        self.records
            .get(path)
            .map(|entry| entry.clone())
            .unwrap_or_default()
    }
}

impl Default for InMemoryRecordStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn append(&self, path: &str, record: Value) -> Result<String> {
        self.records
            .entry(path.to_string())
            .or_default()
            .push(record);
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        Ok(format!("rec-{id}"))
    }
}
