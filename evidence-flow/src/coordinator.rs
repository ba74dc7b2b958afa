//! Background evidence-highlighting requests.
//!
//! One request may be in flight per (message, document) pair. A request
//! captures the chat it belongs to when it starts and writes its result into
//! that chat, whichever chat is active by the time it completes.

use dashmap::DashSet;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::{backend::HighlightFetcher, library::DocumentLibrary, store::ConversationStore};

/// Identity of one possible in-flight analysis.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisTaskKey {
    pub message_id: String,
    pub document_id: String,
}

impl AnalysisTaskKey {
    pub fn new(message_id: impl Into<String>, document_id: impl Into<String>) -> Self {
        Self {
            message_id: message_id.into(),
            document_id: document_id.into(),
        }
    }
}

/// What a trigger call did.
#[derive(Debug)]
pub enum TriggerOutcome {
    /// A fetch was started; the handle resolves once the result is stored
    /// and the key released.
    Started(JoinHandle<()>),
    /// The same key is already being analyzed. Nothing was started.
    AlreadyInFlight,
    /// No loaded document has this id. Nothing was started.
    UnknownDocument,
    /// There is no active chat to attribute the request to.
    NoActiveChat,
}

impl TriggerOutcome {
    pub fn is_started(&self) -> bool {
        matches!(self, Self::Started(_))
    }
}

/// Removes its key from the in-flight set when dropped, including when the
/// task panics or is aborted.
struct InFlightGuard {
    in_flight: Arc<DashSet<AnalysisTaskKey>>,
    key: AnalysisTaskKey,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.in_flight.remove(&self.key);
    }
}

#[derive(Clone)]
pub struct AnalysisCoordinator {
    store: ConversationStore,
    documents: DocumentLibrary,
    fetcher: Arc<dyn HighlightFetcher>,
    in_flight: Arc<DashSet<AnalysisTaskKey>>,
}

impl AnalysisCoordinator {
    pub fn new(
        store: ConversationStore,
        documents: DocumentLibrary,
        fetcher: Arc<dyn HighlightFetcher>,
    ) -> Self {
        Self {
            store,
            documents,
            fetcher,
            in_flight: Arc::new(DashSet::new()),
        }
    }

    /// Analyze `document_id` for `message_id`, attributing the result to the
    /// chat active right now.
    pub fn trigger(&self, message_id: &str, document_id: &str, answer_text: &str) -> TriggerOutcome {
        match self.store.active_chat_id() {
            Some(chat_id) => self.trigger_in_chat(&chat_id, message_id, document_id, answer_text),
            None => {
                debug!("Ignoring highlight request for {}: no active chat", message_id);
                TriggerOutcome::NoActiveChat
            }
        }
    }

    /// Analyze `document_id` for `message_id`, writing the result into
    /// `chat_id`. Must be called from within a Tokio runtime.
    pub fn trigger_in_chat(
        &self,
        chat_id: &str,
        message_id: &str,
        document_id: &str,
        answer_text: &str,
    ) -> TriggerOutcome {
        let Some(document) = self.documents.get(document_id) else {
            debug!("Ignoring highlight request for unknown document {}", document_id);
            return TriggerOutcome::UnknownDocument;
        };

        let key = AnalysisTaskKey::new(message_id, document_id);
        if !self.in_flight.insert(key.clone()) {
            debug!(
                "Highlight analysis already running for message {} / document {}",
                message_id, document_id
            );
            return TriggerOutcome::AlreadyInFlight;
        }

        let guard = InFlightGuard {
            in_flight: self.in_flight.clone(),
            key: key.clone(),
        };

        info!(
            "Starting highlight analysis for message {} / document {} in chat {}",
            message_id, document_id, chat_id
        );

        let coordinator = self.clone();
        let chat_id = chat_id.to_string();
        let answer_text = answer_text.to_string();
        let content = document.content.clone();

        let handle = tokio::spawn(async move {
            let _guard = guard;
            coordinator.analyze(&chat_id, &key, &answer_text, &content).await;
        });

        TriggerOutcome::Started(handle)
    }

    async fn analyze(&self, chat_id: &str, key: &AnalysisTaskKey, answer_text: &str, content: &str) {
        match self.fetcher.fetch_highlights(answer_text, content).await {
            Ok(phrases) => {
                info!(
                    "Highlight analysis for message {} / document {} found {} phrases",
                    key.message_id,
                    key.document_id,
                    phrases.len()
                );
                if let Err(e) = self.store.record_highlights(
                    chat_id,
                    &key.message_id,
                    &key.document_id,
                    phrases,
                ) {
                    warn!(
                        "Dropping highlight result for message {} / document {}: {}",
                        key.message_id, key.document_id, e
                    );
                }
            }
            Err(e) => {
                warn!(
                    "Highlight analysis failed for message {} / document {}: {}",
                    key.message_id, key.document_id, e
                );
            }
        }
    }

    pub fn is_analyzing(&self, message_id: &str, document_id: &str) -> bool {
        self.in_flight
            .contains(&AnalysisTaskKey::new(message_id, document_id))
    }

    /// Keys currently in flight.
    pub fn in_flight(&self) -> Vec<AnalysisTaskKey> {
        self.in_flight.iter().map(|key| key.clone()).collect()
    }

    pub fn documents(&self) -> &DocumentLibrary {
        &self.documents
    }
}
