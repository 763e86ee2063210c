//! Firebase REST providers for the identity, blob-storage and record-store
//! seams: identitytoolkit for email/password accounts, the storage bucket
//! API for report documents, and the realtime database for report records.

use anyhow::anyhow;
use async_trait::async_trait;
use report_flow::{
    Account, AuthSession, Authenticator, BlobStore, FlowError, RecordStore, Result,
};
use reqwest::Client;
use serde_json::{Value, json};
use tracing::info;

const IDENTITY_TOOLKIT_URL: &str = "https://identitytoolkit.googleapis.com/v1";
const STORAGE_URL: &str = "https://firebasestorage.googleapis.com/v0/b";

fn error_message(body: &Value) -> String {
    body["error"]["message"]
        .as_str()
        .unwrap_or("unknown error")
        .to_string()
}

pub struct FirebaseAuthenticator {
    api_key: String,
    client: Client,
}

impl FirebaseAuthenticator {
    pub fn from_env() -> anyhow::Result<Self> {
        let api_key =
            std::env::var("FIREBASE_API_KEY").map_err(|_| anyhow!("FIREBASE_API_KEY not set"))?;
        Ok(Self {
            api_key,
            client: Client::new(),
        })
    }

    async fn post_account_request(&self, endpoint: &str, payload: Value) -> Result<Value> {
        let url = format!(
            "{IDENTITY_TOOLKIT_URL}/accounts:{endpoint}?key={}",
            self.api_key
        );
        let response = self
            .client
            .post(&url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| FlowError::AuthFailure(e.to_string()))?;

        let status = response.status();
        let body: Value = response
            .json()
            .await
            .map_err(|e| FlowError::AuthFailure(e.to_string()))?;

        if !status.is_success() {
            return Err(FlowError::AuthFailure(error_message(&body)));
        }
        Ok(body)
    }
}

#[async_trait]
impl Authenticator for FirebaseAuthenticator {
    async fn login(&self, email: &str, password: &str) -> Result<AuthSession> {
        let body = self
            .post_account_request(
                "signInWithPassword",
                json!({
                    "email": email,
                    "password": password,
                    "returnSecureToken": true
                }),
            )
            .await?;

        let user_id = body["localId"]
            .as_str()
            .ok_or_else(|| FlowError::AuthFailure("missing localId in response".to_string()))?
            .to_string();
        let id_token = body["idToken"]
            .as_str()
            .ok_or_else(|| FlowError::AuthFailure("missing idToken in response".to_string()))?
            .to_string();

        info!("User {} logged in", user_id);
        Ok(AuthSession {
            user_id,
            email: email.to_string(),
            id_token,
        })
    }

    async fn signup(&self, email: &str, password: &str) -> Result<Account> {
        let body = self
            .post_account_request(
                "signUp",
                json!({
                    "email": email,
                    "password": password,
                    "returnSecureToken": true
                }),
            )
            .await?;

        let user_id = body["localId"]
            .as_str()
            .ok_or_else(|| FlowError::AuthFailure("missing localId in response".to_string()))?
            .to_string();

        info!("Account created for {}", user_id);
        Ok(Account {
            user_id,
            email: email.to_string(),
        })
    }
}

pub struct FirebaseBlobStore {
    bucket: String,
    client: Client,
}

impl FirebaseBlobStore {
    pub fn from_env() -> anyhow::Result<Self> {
        let bucket = std::env::var("FIREBASE_STORAGE_BUCKET")
            .map_err(|_| anyhow!("FIREBASE_STORAGE_BUCKET not set"))?;
        Ok(Self {
            bucket,
            client: Client::new(),
        })
    }
}

#[async_trait]
impl BlobStore for FirebaseBlobStore {
    async fn put(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let url = format!(
            "{STORAGE_URL}/{}/o?uploadType=media&name={}",
            self.bucket,
            urlencoding::encode(key)
        );
        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/pdf")
            .body(bytes.to_vec())
            .send()
            .await
            .map_err(|e| FlowError::UploadFailure(e.to_string()))?;

        if !response.status().is_success() {
            return Err(FlowError::UploadFailure(format!(
                "storage upload of {key} failed: {}",
                response.status()
            )));
        }

        info!("Uploaded {} ({} bytes)", key, bytes.len());
        Ok(())
    }

    async fn get_url(&self, key: &str) -> Result<String> {
        Ok(format!(
            "{STORAGE_URL}/{}/o/{}?alt=media",
            self.bucket,
            urlencoding::encode(key)
        ))
    }
}

pub struct FirebaseRecordStore {
    database_url: String,
    client: Client,
}

impl FirebaseRecordStore {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url =
            std::env::var("FIREBASE_DB_URL").map_err(|_| anyhow!("FIREBASE_DB_URL not set"))?;
        Ok(Self {
            database_url: database_url.trim_end_matches('/').to_string(),
            client: Client::new(),
        })
    }
}

#[async_trait]
impl RecordStore for FirebaseRecordStore {
    async fn append(&self, path: &str, record: Value) -> Result<String> {
        let url = format!("{}/{path}.json", self.database_url);
        let response = self
            .client
            .post(&url)
            .json(&record)
            .send()
            .await
            .map_err(|e| FlowError::RecordWriteFailure(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FlowError::RecordWriteFailure(format!(
                "append under {path} failed: {status}"
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| FlowError::RecordWriteFailure(e.to_string()))?;
        let id = body["name"]
            .as_str()
            .ok_or_else(|| {
                FlowError::RecordWriteFailure("missing generated id in response".to_string())
            })?
            .to_string();

        Ok(id)
    }
}
