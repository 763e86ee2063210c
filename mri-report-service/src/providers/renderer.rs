use async_trait::async_trait;
use report_flow::{FlowError, PdfOptions, ReportRenderer, Result};
use std::collections::HashMap;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::info;

/// Renders named HTML templates with Tera and converts the markup to PDF by
/// driving `wkhtmltopdf` over stdin/stdout.
pub struct HtmlReportRenderer {
    tera: tera::Tera,
    converter_bin: String,
}

impl HtmlReportRenderer {
    /// Loads every template matching `template_glob` (e.g. `templates/*.html`).
    pub fn new(template_glob: &str) -> Result<Self> {
        let tera = tera::Tera::new(template_glob)
            .map_err(|e| FlowError::TemplateFailure(e.to_string()))?;
        let converter_bin =
            std::env::var("WKHTMLTOPDF_BIN").unwrap_or_else(|_| "wkhtmltopdf".to_string());
        Ok(Self {
            tera,
            converter_bin,
        })
    }
}

#[async_trait]
impl ReportRenderer for HtmlReportRenderer {
    async fn render(&self, template_id: &str, slots: &HashMap<String, String>) -> Result<Vec<u8>> {
        let mut context = tera::Context::new();
        for (slot, value) in slots {
            context.insert(slot, value);
        }

        let html = self.tera.render(template_id, &context).map_err(|e| match &e.kind {
            tera::ErrorKind::TemplateNotFound(name) => {
                FlowError::TemplateFailure(format!("template {name} not found"))
            }
            _ => FlowError::RenderFailure(e.to_string()),
        })?;

        Ok(html.into_bytes())
    }

    async fn to_pdf(&self, markup: &[u8], options: PdfOptions) -> Result<Vec<u8>> {
        let mut cmd = Command::new(&self.converter_bin);
        cmd.arg("--quiet");
        if options.allow_local_file_access {
            cmd.arg("--enable-local-file-access");
        }
        if options.allow_scripts {
            cmd.arg("--enable-javascript");
        }
        cmd.arg("-")
            .arg("-")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = cmd.spawn().map_err(|e| {
            FlowError::RenderFailure(format!("failed to spawn {}: {e}", self.converter_bin))
        })?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| FlowError::RenderFailure("converter stdin unavailable".to_string()))?;
        stdin
            .write_all(markup)
            .await
            .map_err(|e| FlowError::RenderFailure(format!("failed to feed converter: {e}")))?;
        drop(stdin);

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| FlowError::RenderFailure(e.to_string()))?;

        if !output.status.success() {
            return Err(FlowError::RenderFailure(format!(
                "converter exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr)
            )));
        }

        info!("Converted markup to PDF ({} bytes)", output.stdout.len());
        Ok(output.stdout)
    }
}
