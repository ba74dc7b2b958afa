use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{
    error::Result,
    model::{Citation, Document, Message},
};

/// Answer produced by the chat backend for one query.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatReply {
    pub content: String,
    #[serde(default, rename = "sources")]
    pub citations: Vec<Citation>,
}

/// Generates an answer with citations for a query and its prior history.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn send_chat(&self, query: &str, history: &[Message]) -> Result<ChatReply>;
}

/// Finds verbatim phrases in a document that support an answer.
///
/// `Ok` with an empty list means the document was analyzed and nothing was
/// found; `Err` leaves the document unanalyzed.
#[async_trait]
pub trait HighlightFetcher: Send + Sync {
    async fn fetch_highlights(&self, answer: &str, document_content: &str) -> Result<Vec<String>>;
}

/// Supplies the documents citations refer to.
#[async_trait]
pub trait DocumentSource: Send + Sync {
    async fn fetch_documents(&self) -> Result<Vec<Document>>;
}
