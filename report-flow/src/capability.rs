use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use crate::{context::ChatMessage, error::Result};

/// An authenticated identity returned by a successful login.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthSession {
    pub user_id: String,
    pub email: String,
    pub id_token: String,
}

/// A newly created account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub user_id: String,
    pub email: String,
}

/// Identity provider seam. Consumed as an opaque capability; failures are
/// surfaced to the caller and never mutate session state.
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn login(&self, email: &str, password: &str) -> Result<AuthSession>;
    async fn signup(&self, email: &str, password: &str) -> Result<Account>;
}

/// Durable object storage for rendered report documents.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn put(&self, key: &str, bytes: &[u8]) -> Result<()>;

    /// Externally fetchable address for a previously stored key.
    async fn get_url(&self, key: &str) -> Result<String>;
}

/// Append-only document database for report records.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Appends a record under `path` and returns the generated entry id.
    async fn append(&self, path: &str, record: Value) -> Result<String>;
}

/// Vision-language model seam: one image in, one diagnostic string out.
/// Output length is bounded by the model's generation cap.
#[async_trait]
pub trait Captioner: Send + Sync {
    async fn caption(&self, image_bytes: &[u8]) -> Result<String>;
}

/// Conversational model seam. The full prior history is passed explicitly on
/// every call so the orchestrator's continuity guarantees are observable.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn reply(&self, history: &[ChatMessage], message: &str) -> Result<String>;
}

/// Options honored while converting markup to a paginated document.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct PdfOptions {
    pub allow_local_file_access: bool,
    pub allow_scripts: bool,
}

/// Document templating and PDF conversion seam.
#[async_trait]
pub trait ReportRenderer: Send + Sync {
    /// Renders the named template against a slot map, producing markup.
    async fn render(&self, template_id: &str, slots: &HashMap<String, String>) -> Result<Vec<u8>>;

    /// Converts markup into fixed-format paginated document bytes.
    async fn to_pdf(&self, markup: &[u8], options: PdfOptions) -> Result<Vec<u8>>;
}
