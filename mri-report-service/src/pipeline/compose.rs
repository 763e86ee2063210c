use chrono::Local;
use report_flow::{PdfOptions, ReportRenderer, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

use crate::models::{FALLBACK_DIAGNOSIS, PatientForm};

/// Named template the composer renders against.
pub const REPORT_TEMPLATE_ID: &str = "report_template.html";

/// A rendered report document, not yet archived.
#[derive(Debug, Clone)]
pub struct ComposedReport {
    pub filename: String,
    pub pdf_bytes: Vec<u8>,
}

/// Merges patient form data and the diagnostic caption into a rendered PDF
/// plus a derived filename.
pub struct ReportComposer {
    renderer: Arc<dyn ReportRenderer>,
}

impl ReportComposer {
    pub fn new(renderer: Arc<dyn ReportRenderer>) -> Self {
        Self { renderer }
    }

    /// Template-not-found and conversion failures are fatal here and surface
    /// to the caller; nothing is persisted on failure.
    pub async fn compose(
        &self,
        form: &PatientForm,
        diagnosis: &str,
        last_filename: Option<&str>,
    ) -> Result<ComposedReport> {
        let slots = build_slots(form, diagnosis);
        let markup = self.renderer.render(REPORT_TEMPLATE_ID, &slots).await?;

        // The template may reference local assets, so file access and script
        // evaluation stay enabled during conversion.
        let options = PdfOptions {
            allow_local_file_access: true,
            allow_scripts: true,
        };
        let pdf_bytes = self.renderer.to_pdf(&markup, options).await?;

        let timestamp = Local::now().format("%Y-%m-%d_%H-%M-%S").to_string();
        let filename = unique_filename(&form.stem, &timestamp, last_filename);
        info!("Composed report {} ({} bytes)", filename, pdf_bytes.len());

        Ok(ComposedReport {
            filename,
            pdf_bytes,
        })
    }
}

fn build_slots(form: &PatientForm, diagnosis: &str) -> HashMap<String, String> {
    let diagnosis = if diagnosis.trim().is_empty() {
        FALLBACK_DIAGNOSIS
    } else {
        diagnosis
    };

    let mut slots = HashMap::new();
    slots.insert("patient_name".to_string(), form.name.clone());
    slots.insert("age".to_string(), form.age.clone());
    slots.insert("blood_group".to_string(), form.blood_group.clone());
    slots.insert("patient_phone".to_string(), form.phone.clone());
    slots.insert("patient_height".to_string(), form.height.clone());
    slots.insert("patient_weight".to_string(), form.weight.clone());
    slots.insert("radio_name".to_string(), form.radiologist.clone());
    slots.insert("doc_name".to_string(), form.doctor.clone());
    slots.insert("patient_gender".to_string(), form.gender.to_string());
    slots.insert("diagnosis".to_string(), diagnosis.to_string());
    slots
}

/// `{stem}_{timestamp}.pdf`, with a sequence suffix when the previous report
/// was generated within the same second. Generations at least one second
/// apart never collide because the timestamp has second resolution.
fn unique_filename(stem: &str, timestamp: &str, last_filename: Option<&str>) -> String {
    let base = format!("{stem}_{timestamp}");
    match previous_sequence(&base, last_filename) {
        Some(previous) => format!("{base}-{}.pdf", previous + 1),
        None => format!("{base}.pdf"),
    }
}

fn previous_sequence(base: &str, last_filename: Option<&str>) -> Option<u32> {
    let rest = last_filename?.strip_suffix(".pdf")?.strip_prefix(base)?;
    if rest.is_empty() {
        Some(1)
    } else {
        rest.strip_prefix('-')?.parse().ok()
    }
}
