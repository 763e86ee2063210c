use image::ImageFormat;
use report_flow::Captioner;
use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{info, warn};

use crate::models::FALLBACK_DIAGNOSIS;

const DEFAULT_CAPTION_TIMEOUT: Duration = Duration::from_secs(60);

/// Wraps the vision-language model: one image in, one diagnostic string out.
///
/// Every failure along the way (missing image, undecodable bytes, model
/// error, timeout) degrades to the fallback sentinel. Report generation
/// never blocks because captioning failed.
pub struct CaptionService {
    captioner: Arc<dyn Captioner>,
    call_timeout: Duration,
}

impl CaptionService {
    pub fn new(captioner: Arc<dyn Captioner>) -> Self {
        Self {
            captioner,
            call_timeout: DEFAULT_CAPTION_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, call_timeout: Duration) -> Self {
        self.call_timeout = call_timeout;
        self
    }

    pub async fn caption(&self, image_bytes: Option<&[u8]>) -> String {
        let Some(bytes) = image_bytes else {
            return FALLBACK_DIAGNOSIS.to_string();
        };

        let normalized = match normalize_to_rgb(bytes) {
            Ok(normalized) => normalized,
            Err(e) => {
                warn!("Failed to decode uploaded image: {}", e);
                return FALLBACK_DIAGNOSIS.to_string();
            }
        };

        match timeout(self.call_timeout, self.captioner.caption(&normalized)).await {
            Ok(Ok(caption)) if !caption.trim().is_empty() => {
                info!("Caption generated ({} characters)", caption.len());
                caption
            }
            Ok(Ok(_)) => {
                warn!("Captioner returned empty output");
                FALLBACK_DIAGNOSIS.to_string()
            }
            Ok(Err(e)) => {
                warn!("Captioning failed: {}", e);
                FALLBACK_DIAGNOSIS.to_string()
            }
            Err(_) => {
                warn!("Captioning timed out after {:?}", self.call_timeout);
                FALLBACK_DIAGNOSIS.to_string()
            }
        }
    }
}

/// Model input must be three-channel color regardless of the upload's source
/// color mode.
fn normalize_to_rgb(bytes: &[u8]) -> anyhow::Result<Vec<u8>> {
    let decoded = image::load_from_memory(bytes)?;
    let rgb = image::DynamicImage::ImageRgb8(decoded.to_rgb8());

    let mut buffer = Vec::new();
    rgb.write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)?;
    Ok(buffer)
}
