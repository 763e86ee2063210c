pub mod capability;
pub mod context;
pub mod error;
pub mod storage;

// Re-export commonly used types
pub use capability::{
    Account, AuthSession, Authenticator, BlobStore, Captioner, ChatModel, PdfOptions, RecordStore,
    ReportRenderer,
};
pub use context::{ChatMessage, Context, MessageRole};
pub use error::{FlowError, Result};
pub use storage::{
    InMemoryBlobStore, InMemoryRecordStore, InMemorySessionStorage, Session, SessionStorage,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_context_data_roundtrip() {
        let context = Context::new();
        context.set("patient_name", "Jane Doe").await;

        let name: String = context.get("patient_name").await.unwrap();
        assert_eq!(name, "Jane Doe");

        context.remove("patient_name").await;
        assert!(context.get::<String>("patient_name").await.is_none());
    }

    #[tokio::test]
    async fn test_chat_history_ordering() {
        let context = Context::new();
        context.add_user_message("first question").await;
        context.add_assistant_message("first answer").await;
        context.add_user_message("second question").await;

        let messages = context.get_all_messages().await;
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0].role, MessageRole::User);
        assert_eq!(messages[1].role, MessageRole::Assistant);
        assert_eq!(messages[2].content, "second question");

        let last = context.get_last_messages(2).await;
        assert_eq!(last.len(), 2);
        assert_eq!(last[0].content, "first answer");
    }

    #[tokio::test]
    async fn test_clear_chat_history_keeps_data() {
        let context = Context::new();
        context.set("analyzed", true).await;
        context.add_user_message("hello").await;

        context.clear_chat_history().await;

        assert_eq!(context.message_count().await, 0);
        assert_eq!(context.get::<bool>("analyzed").await, Some(true));
    }

    #[tokio::test]
    async fn test_session_storage() {
        let storage = InMemorySessionStorage::new();

        let session = Session::new("session1".to_string(), "user-42");
        session.context.set("analyzed", false).await;

        storage.save(session.clone()).await.unwrap();
        let retrieved = storage.get("session1").await.unwrap().unwrap();
        assert_eq!(retrieved.user_id, "user-42");
        assert_eq!(retrieved.context.get::<bool>("analyzed").await, Some(false));

        storage.delete("session1").await.unwrap();
        assert!(storage.get("session1").await.unwrap().is_none());
    }
}
