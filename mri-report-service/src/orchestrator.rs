use base64::{Engine as _, engine::general_purpose::STANDARD};
use dashmap::DashMap;
use report_flow::{ChatMessage, ChatModel, FlowError, Result, Session, SessionStorage};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{info, warn};

use crate::models::{PatientForm, ReportArtifact, session_keys};
use crate::pipeline::{CaptionService, ReportArchiver, ReportComposer, extract_text};

/// Fixed instruction appended to the extracted report text to form the
/// one-time seeding prompt.
const SEEDING_INSTRUCTION: &str =
    "\nYou should act as doctor and give full medical report on the findings with full details";

const DEFAULT_CHAT_TIMEOUT: Duration = Duration::from_secs(120);

/// Summary of a freshly generated report returned to the caller.
#[derive(Debug, Clone)]
pub struct GeneratedReport {
    pub filename: String,
    pub pdf_url: String,
}

/// The state machine governing first-pass automatic analysis versus
/// free-form chat turns.
///
/// States are derived from the session context: no report cached yet, a
/// report cached but not analyzed, or analyzed. Automatic analysis fires at
/// most once per fresh report, and never for a report whose extraction
/// failed. Pipeline steps run strictly sequentially; each depends on the
/// previous step's output.
pub struct AnalysisOrchestrator {
    sessions: Arc<dyn SessionStorage>,
    caption_service: CaptionService,
    composer: ReportComposer,
    archiver: ReportArchiver,
    chat_model: Arc<dyn ChatModel>,
    chat_timeout: Duration,
    // One automatic-analysis attempt per session at a time.
    seeding_guards: DashMap<String, Arc<Mutex<()>>>,
}

impl AnalysisOrchestrator {
    pub fn new(
        sessions: Arc<dyn SessionStorage>,
        caption_service: CaptionService,
        composer: ReportComposer,
        archiver: ReportArchiver,
        chat_model: Arc<dyn ChatModel>,
    ) -> Self {
        Self {
            sessions,
            caption_service,
            composer,
            archiver,
            chat_model,
            chat_timeout: DEFAULT_CHAT_TIMEOUT,
            seeding_guards: DashMap::new(),
        }
    }

    pub fn with_chat_timeout(mut self, chat_timeout: Duration) -> Self {
        self.chat_timeout = chat_timeout;
        self
    }

    /// Runs caption, composition, archiving and extraction for a submitted
    /// form. On success the session holds the new artifact with a cleared
    /// conversation and the analyzed flag down. On extraction failure the
    /// archived blob and record remain, but the session keeps its previous
    /// report state so the analysis protocol is not reset against text that
    /// was never recovered.
    pub async fn on_report_submitted(
        &self,
        session_id: &str,
        form: PatientForm,
    ) -> Result<GeneratedReport> {
        let session = self.load_session(session_id).await?;
        info!(
            "Generating report for user {} (stem {})",
            session.user_id, form.stem
        );

        // The form survives re-renders; each submission replaces it wholesale.
        session.context.set(session_keys::PATIENT_FORM, &form).await;
        self.sessions.save(session.clone()).await?;

        let image_bytes = decode_image(form.image_base64.as_deref());
        let caption = self.caption_service.caption(image_bytes.as_deref()).await;

        let last_filename = session
            .context
            .get::<ReportArtifact>(session_keys::REPORT)
            .await
            .map(|artifact| artifact.filename);
        let composed = self
            .composer
            .compose(&form, &caption, last_filename.as_deref())
            .await?;

        let pdf_url = self
            .archiver
            .archive(
                &composed.filename,
                &composed.pdf_bytes,
                &form.name,
                &session.user_id,
            )
            .await?;

        let extracted_text = extract_text(composed.pdf_bytes.clone()).await?;

        let artifact = ReportArtifact {
            filename: composed.filename,
            pdf_base64: STANDARD.encode(&composed.pdf_bytes),
            extracted_text,
            pdf_url: pdf_url.clone(),
        };
        let filename = artifact.filename.clone();

        // A fresh report supersedes the previous conversation entirely.
        session.context.set(session_keys::REPORT, &artifact).await;
        session.context.set(session_keys::ANALYZED, false).await;
        session.context.clear_chat_history().await;
        self.sessions.save(session).await?;

        info!("Report {} archived at {}", filename, pdf_url);
        Ok(GeneratedReport { filename, pdf_url })
    }

    /// Seeds the conversational model with the current report's extracted
    /// text, at most once per fresh report. Returns the analysis reply when
    /// the transition fires, `None` when there is nothing to do (no report
    /// yet, or already analyzed).
    pub async fn on_chat_surface_entered(&self, session_id: &str) -> Result<Option<String>> {
        let guard = self.seeding_guard(session_id);
        let _held = guard.lock().await;

        let session = self.load_session(session_id).await?;

        let Some(report) = session
            .context
            .get::<ReportArtifact>(session_keys::REPORT)
            .await
        else {
            // Nothing to seed; only the manual query loop is available.
            return Ok(None);
        };

        let analyzed = session
            .context
            .get::<bool>(session_keys::ANALYZED)
            .await
            .unwrap_or(false);
        if analyzed {
            return Ok(None);
        }

        let prompt = format!("{}{}", report.extracted_text, SEEDING_INSTRUCTION);
        let history = session.context.get_all_messages().await;
        let reply = self.send_chat(&history, &prompt).await?;

        // Only a delivered reply advances the flag; a failed seeding call
        // leaves the session untouched so the next visit retries.
        session.context.add_user_message(prompt).await;
        session.context.add_assistant_message(reply.clone()).await;
        session.context.set(session_keys::ANALYZED, true).await;
        self.sessions.save(session).await?;

        info!("Report {} analyzed", report.filename);
        Ok(Some(reply))
    }

    /// Free-form chat turn. The model receives the full accumulated history
    /// as context; a successful reply appends exactly two turns. Available
    /// in every state, including before any report exists.
    pub async fn on_user_query(&self, session_id: &str, query: &str) -> Result<String> {
        let session = self.load_session(session_id).await?;

        let history = session.context.get_all_messages().await;
        let reply = self.send_chat(&history, query).await?;

        session.context.add_user_message(query).await;
        session.context.add_assistant_message(reply.clone()).await;
        self.sessions.save(session).await?;

        Ok(reply)
    }

    async fn send_chat(&self, history: &[ChatMessage], message: &str) -> Result<String> {
        match timeout(self.chat_timeout, self.chat_model.reply(history, message)).await {
            Ok(reply) => reply,
            Err(_) => Err(FlowError::ChatCallFailure(format!(
                "chat call timed out after {:?}",
                self.chat_timeout
            ))),
        }
    }

    async fn load_session(&self, session_id: &str) -> Result<Session> {
        self.sessions
            .get(session_id)
            .await?
            .ok_or_else(|| FlowError::SessionNotFound(session_id.to_string()))
    }

    fn seeding_guard(&self, session_id: &str) -> Arc<Mutex<()>> {
        self.seeding_guards
            .entry(session_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

fn decode_image(image_base64: Option<&str>) -> Option<Vec<u8>> {
    let encoded = image_base64?;
    match STANDARD.decode(encoded) {
        Ok(bytes) => Some(bytes),
        Err(e) => {
            // Treated like a missing image: captioning degrades, the report
            // still generates.
            warn!("Uploaded image is not valid base64: {}", e);
            None
        }
    }
}
