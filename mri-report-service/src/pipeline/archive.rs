use report_flow::{BlobStore, FlowError, RecordStore, Result};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{error, info};

const DEFAULT_UPLOAD_TIMEOUT: Duration = Duration::from_secs(120);

/// Uploads a rendered report to blob storage and appends a `{name, pdf_url}`
/// record under the user's namespace.
pub struct ReportArchiver {
    blob_store: Arc<dyn BlobStore>,
    record_store: Arc<dyn RecordStore>,
    upload_timeout: Duration,
}

impl ReportArchiver {
    pub fn new(blob_store: Arc<dyn BlobStore>, record_store: Arc<dyn RecordStore>) -> Self {
        Self {
            blob_store,
            record_store,
            upload_timeout: DEFAULT_UPLOAD_TIMEOUT,
        }
    }

    pub fn with_upload_timeout(mut self, upload_timeout: Duration) -> Self {
        self.upload_timeout = upload_timeout;
        self
    }

    /// The record is appended only once the upload has completed: a record
    /// must never reference a blob that was not written. A failed upload
    /// aborts with no record; a failed record write after a successful
    /// upload is reported and swallowed, leaving the blob in place.
    pub async fn archive(
        &self,
        filename: &str,
        pdf_bytes: &[u8],
        patient_name: &str,
        user_id: &str,
    ) -> Result<String> {
        match timeout(self.upload_timeout, self.blob_store.put(filename, pdf_bytes)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(e),
            Err(_) => {
                return Err(FlowError::UploadFailure(format!(
                    "upload of {filename} timed out after {:?}",
                    self.upload_timeout
                )));
            }
        }

        let pdf_url = self.blob_store.get_url(filename).await?;
        info!("Uploaded report {} for user {}", filename, user_id);

        let path = format!("reports/{user_id}");
        let record = json!({
            "name": patient_name,
            "pdf_url": pdf_url,
        });
        if let Err(e) = self.record_store.append(&path, record).await {
            // Orphaned blob: degraded but non-blocking.
            error!("Failed to append report record under {}: {}", path, e);
        }

        Ok(pdf_url)
    }
}
