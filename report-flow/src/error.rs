use thiserror::Error;

/// Unified error type for the report pipeline and analysis session protocol.
///
/// Each variant corresponds to one failure class with its own propagation
/// policy: captioning degrades to a fallback, record writes are reported but
/// non-blocking, everything else is fatal to its own step only.
#[derive(Error, Debug)]
pub enum FlowError {
    #[error("Caption failure: {0}")]
    CaptionFailure(String),

    #[error("Template failure: {0}")]
    TemplateFailure(String),

    #[error("Render failure: {0}")]
    RenderFailure(String),

    #[error("Upload failure: {0}")]
    UploadFailure(String),

    #[error("Record write failure: {0}")]
    RecordWriteFailure(String),

    #[error("Extraction failure: {0}")]
    ExtractionFailure(String),

    #[error("Chat call failure: {0}")]
    ChatCallFailure(String),

    #[error("Auth failure: {0}")]
    AuthFailure(String),

    #[error("Context error: {0}")]
    ContextError(String),

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, FlowError>;
