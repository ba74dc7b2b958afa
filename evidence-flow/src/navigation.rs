//! Navigation over the documents cited by one assistant message.

use serde::{Deserialize, Serialize};

use crate::model::{Citation, Message};

/// Cited document ids in first-occurrence order, without duplicates.
pub fn distinct_documents(citations: &[Citation]) -> Vec<String> {
    let mut documents: Vec<String> = Vec::new();
    for citation in citations {
        if !documents.contains(&citation.document_id) {
            documents.push(citation.document_id.clone());
        }
    }
    documents
}

/// Position of `document_id` within `documents`.
pub fn index_of(documents: &[String], document_id: &str) -> Option<usize> {
    documents.iter().position(|id| id == document_id)
}

/// The source currently open in the viewer, with the citations of the
/// message that opened it. Rebuilt every time a citation is opened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceView {
    pub citations: Vec<Citation>,
    pub current_document_id: String,
    pub context_message_id: String,
}

impl SourceView {
    pub fn open(message: &Message, document_id: impl Into<String>) -> Self {
        Self {
            citations: message.citations.clone(),
            current_document_id: document_id.into(),
            context_message_id: message.id.clone(),
        }
    }

    pub fn documents(&self) -> Vec<String> {
        distinct_documents(&self.citations)
    }

    /// 1-based position and total, e.g. `(2, 3)` for "2 of 3".
    pub fn position(&self) -> Option<(usize, usize)> {
        let documents = self.documents();
        index_of(&documents, &self.current_document_id).map(|index| (index + 1, documents.len()))
    }

    pub fn has_prev(&self) -> bool {
        matches!(self.position(), Some((current, _)) if current > 1)
    }

    pub fn has_next(&self) -> bool {
        matches!(self.position(), Some((current, total)) if current < total)
    }

    pub fn next(&self) -> Option<Self> {
        self.step(1)
    }

    pub fn prev(&self) -> Option<Self> {
        self.step(-1)
    }

    fn step(&self, delta: isize) -> Option<Self> {
        let documents = self.documents();
        let index = index_of(&documents, &self.current_document_id)?;
        let target = index.checked_add_signed(delta)?;
        let document_id = documents.get(target)?;

        Some(Self {
            current_document_id: document_id.clone(),
            ..self.clone()
        })
    }

    pub fn snippets_for_current(&self) -> Vec<&str> {
        self.citations
            .iter()
            .filter(|citation| citation.document_id == self.current_document_id)
            .map(|citation| citation.snippet.as_str())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn citations() -> Vec<Citation> {
        vec![
            Citation::new("vacation", "25 days"),
            Citation::new("remote", "two days a week"),
            Citation::new("vacation", "carried over"),
            Citation::new("expenses", "within 30 days"),
        ]
    }

    #[test]
    fn test_distinct_documents_keeps_first_occurrence_order() {
        assert_eq!(
            distinct_documents(&citations()),
            vec!["vacation", "remote", "expenses"]
        );
        assert!(distinct_documents(&[]).is_empty());
    }

    #[test]
    fn test_index_of() {
        let documents = distinct_documents(&citations());
        assert_eq!(index_of(&documents, "remote"), Some(1));
        assert_eq!(index_of(&documents, "missing"), None);
    }

    #[test]
    fn test_source_view_walks_documents() {
        let message = Message::assistant("answer", citations());
        let view = SourceView::open(&message, "vacation");

        assert_eq!(view.position(), Some((1, 3)));
        assert!(!view.has_prev());
        assert!(view.has_next());
        assert!(view.prev().is_none());
        assert_eq!(view.snippets_for_current(), vec!["25 days", "carried over"]);

        let last = view.next().and_then(|view| view.next()).unwrap();
        assert_eq!(last.current_document_id, "expenses");
        assert_eq!(last.position(), Some((3, 3)));
        assert!(!last.has_next());
        assert!(last.next().is_none());
        assert_eq!(last.context_message_id, message.id);
    }

    #[test]
    fn test_source_view_on_uncited_document() {
        let message = Message::assistant("answer", citations());
        let view = SourceView::open(&message, "not-cited");

        assert_eq!(view.position(), None);
        assert!(!view.has_next());
        assert!(!view.has_prev());
        assert!(view.next().is_none());
    }
}
