use report_flow::{FlowError, Result};
use tracing::info;

/// Reconstructs plain text from a rendered PDF by concatenating page-level
/// text in page order. Empty pages contribute empty strings.
///
/// A corrupt or non-parseable document is fatal to this step only; the
/// already-archived report is unaffected.
pub async fn extract_text(pdf_bytes: Vec<u8>) -> Result<String> {
    let text = tokio::task::spawn_blocking(move || {
        let pages = pdf_extract::extract_text_from_mem_by_pages(&pdf_bytes)
            .map_err(|e| FlowError::ExtractionFailure(e.to_string()))?;
        Ok::<_, FlowError>(pages.concat())
    })
    .await
    .map_err(|e| FlowError::ExtractionFailure(e.to_string()))??;

    info!("Extracted {} characters of report text", text.len());
    Ok(text)
}
