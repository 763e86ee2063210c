pub mod firebase;
pub mod openrouter;
pub mod renderer;

pub use firebase::{FirebaseAuthenticator, FirebaseBlobStore, FirebaseRecordStore};
pub use openrouter::{OpenRouterCaptioner, OpenRouterChatModel};
pub use renderer::HtmlReportRenderer;
