use anyhow::Result;
use async_trait::async_trait;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationInfo {
    pub id: String,
    pub name: String,
}

/// Outbound side of the chat workspace used by the recording handlers.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn post_message(&self, channel_id: &str, text: &str) -> Result<()>;

    async fn conversation_info(&self, channel_id: &str) -> Result<ConversationInfo>;

    /// Creates a public channel and returns its id.
    async fn create_conversation(&self, name: &str) -> Result<String>;

    async fn download_file(&self, url: &str) -> Result<Vec<u8>>;
}
