use thiserror::Error;

#[derive(Error, Debug)]
pub enum EvidenceError {
    #[error("Chat not found: {0}")]
    ChatNotFound(String),

    #[error("Message {message_id} not found in chat {chat_id}")]
    MessageNotFound { chat_id: String, message_id: String },

    #[error("Document not found: {0}")]
    DocumentNotFound(String),

    #[error("Chat {0} already has a response in flight")]
    ChatBusy(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Handbook error: {0}")]
    Handbook(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl EvidenceError {
    pub fn message_not_found(chat_id: impl Into<String>, message_id: impl Into<String>) -> Self {
        Self::MessageNotFound {
            chat_id: chat_id.into(),
            message_id: message_id.into(),
        }
    }

    /// True for failures of a remote collaborator, which callers recover
    /// from with a safe default instead of surfacing.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::InvalidResponse(_))
    }
}

pub type Result<T> = std::result::Result<T, EvidenceError>;
