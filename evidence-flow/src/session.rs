//! `ChatSession` ties the store, the loaded documents and the collaborators
//! together into the flows a UI shell drives: sending a query, opening a cited
//! source, rendering it, and asking for evidence highlights.

use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::{
    backend::{ChatBackend, DocumentSource, HighlightFetcher},
    coordinator::{AnalysisCoordinator, TriggerOutcome},
    error::{EvidenceError, Result},
    library::DocumentLibrary,
    matcher::{Span, match_phrases},
    model::{Document, Message},
    navigation::SourceView,
    resolver::resolve,
    store::ConversationStore,
};

pub const CONNECTION_APOLOGY: &str =
    "I'm having trouble connecting right now. Please try again in a moment.";

/// A cited document as the viewer should display it.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderedSource {
    pub document: Document,
    pub view: SourceView,
    /// 1-based position among the message's cited documents.
    pub position: Option<usize>,
    pub total: usize,
    pub has_prev: bool,
    pub has_next: bool,
    pub analyzing: bool,
    pub analyzed: bool,
    pub spans: Vec<Span>,
}

#[derive(Clone)]
pub struct ChatSession {
    store: ConversationStore,
    documents: DocumentLibrary,
    backend: Arc<dyn ChatBackend>,
    coordinator: AnalysisCoordinator,
}

impl ChatSession {
    pub fn new(
        documents: DocumentLibrary,
        backend: Arc<dyn ChatBackend>,
        fetcher: Arc<dyn HighlightFetcher>,
    ) -> Self {
        let store = ConversationStore::new();
        let coordinator = AnalysisCoordinator::new(store.clone(), documents.clone(), fetcher);
        Self {
            store,
            documents,
            backend,
            coordinator,
        }
    }

    /// Load the documents once and build a session around them.
    pub async fn start(
        backend: Arc<dyn ChatBackend>,
        fetcher: Arc<dyn HighlightFetcher>,
        source: &dyn DocumentSource,
    ) -> Self {
        let documents = DocumentLibrary::load(source).await;
        Self::new(documents, backend, fetcher)
    }

    pub fn store(&self) -> &ConversationStore {
        &self.store
    }

    pub fn documents(&self) -> &DocumentLibrary {
        &self.documents
    }

    pub fn coordinator(&self) -> &AnalysisCoordinator {
        &self.coordinator
    }

    /// Send `query` in `chat_id` and wait for the answer.
    ///
    /// A backend failure does not surface: the answer becomes a connectivity
    /// apology without citations and the chat stops loading. The exchange runs
    /// on its own task, so dropping the returned future still lets the answer
    /// land and the chat leave its loading state.
    pub async fn send(&self, chat_id: &str, query: &str) -> Result<Message> {
        if query.trim().is_empty() {
            return Err(EvidenceError::InvalidInput("query cannot be empty".to_string()));
        }

        let history = self.store.begin_send(chat_id, Message::user(query))?;

        let store = self.store.clone();
        let backend = self.backend.clone();
        let owner = chat_id.to_string();
        let query = query.to_string();

        let handle = tokio::spawn(async move {
            let assistant = answer(backend.as_ref(), &owner, &query, &history).await;
            store.finish_send(&owner, assistant.clone())?;
            Ok::<_, EvidenceError>(assistant)
        });

        match handle.await {
            Ok(result) => result,
            Err(e) => {
                error!("Chat exchange for chat {} did not complete: {}", chat_id, e);
                let assistant = Message::assistant(CONNECTION_APOLOGY, Vec::new());
                self.store.finish_send(chat_id, assistant.clone())?;
                Ok(assistant)
            }
        }
    }

    pub fn open_source(&self, chat_id: &str, message_id: &str, document_id: &str) -> Result<SourceView> {
        let message = self.store.message(chat_id, message_id)?;
        Ok(SourceView::open(&message, document_id))
    }

    /// Segment a cited document for display from one message's point of view.
    pub fn render(&self, chat_id: &str, message_id: &str, document_id: &str) -> Result<RenderedSource> {
        let message = self.store.message(chat_id, message_id)?;
        let document = self
            .documents
            .get(document_id)
            .cloned()
            .ok_or_else(|| EvidenceError::DocumentNotFound(document_id.to_string()))?;

        let view = SourceView::open(&message, document_id);
        let total = view.documents().len();
        let spans = match_phrases(&document.content, resolve(&message, document_id));

        Ok(RenderedSource {
            position: view.position().map(|(current, _)| current),
            total,
            has_prev: view.has_prev(),
            has_next: view.has_next(),
            analyzing: self.coordinator.is_analyzing(message_id, document_id),
            analyzed: message.is_analyzed(document_id),
            spans,
            view,
            document,
        })
    }

    /// Ask for evidence highlights of `document_id` supporting the answer in
    /// `message_id`. The result is written into `chat_id`.
    pub fn request_highlights(
        &self,
        chat_id: &str,
        message_id: &str,
        document_id: &str,
    ) -> Result<TriggerOutcome> {
        let message = self.store.message(chat_id, message_id)?;
        Ok(self
            .coordinator
            .trigger_in_chat(chat_id, message_id, document_id, &message.content))
    }
}

async fn answer(
    backend: &dyn ChatBackend,
    chat_id: &str,
    query: &str,
    history: &[Message],
) -> Message {
    match backend.send_chat(query, history).await {
        Ok(reply) => {
            info!(
                "Chat {} answered with {} citations",
                chat_id,
                reply.citations.len()
            );
            Message::assistant(reply.content, reply.citations)
        }
        Err(e) => {
            warn!("Chat backend failed for chat {}: {}", chat_id, e);
            Message::assistant(CONNECTION_APOLOGY, Vec::new())
        }
    }
}
