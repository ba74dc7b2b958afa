//! Citation tracking and on-demand evidence highlighting for
//! retrieval-augmented chat.
//!
//! An assistant answer carries citations into handbook documents. When the
//! user opens a cited document it is shown clean; on request, an external
//! service is asked which phrases of the document support the answer, and the
//! result is stored on the message so the document renders highlighted from
//! then on.

pub mod backend;
pub mod coordinator;
pub mod error;
pub mod handbook;
#[cfg(feature = "http")]
pub mod http;
pub mod library;
pub mod matcher;
pub mod model;
pub mod navigation;
pub mod resolver;
pub mod session;
pub mod store;

// Re-export commonly used types
pub use backend::{ChatBackend, ChatReply, DocumentSource, HighlightFetcher};
pub use coordinator::{AnalysisCoordinator, AnalysisTaskKey, TriggerOutcome};
pub use error::{EvidenceError, Result};
pub use handbook::MarkdownHandbook;
#[cfg(feature = "http")]
pub use http::HttpBackend;
pub use library::DocumentLibrary;
pub use matcher::{Span, match_phrases, render_marked};
pub use model::{Chat, Citation, Document, Message, Role};
pub use navigation::{SourceView, distinct_documents, index_of};
pub use resolver::resolve;
pub use session::{CONNECTION_APOLOGY, ChatSession, RenderedSource};
pub use store::ConversationStore;
