pub mod models;
pub mod orchestrator;
pub mod pipeline;
pub mod providers;
pub mod service;

pub use models::*;
pub use orchestrator::{AnalysisOrchestrator, GeneratedReport};
pub use service::{AppState, create_app};
