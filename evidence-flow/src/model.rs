use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

pub const DEFAULT_CHAT_TITLE: &str = "New Chat";

/// A handbook document. Owned by the document source, read-only here.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Document {
    pub id: String,
    pub title: String,
    pub category: String,
    pub content: String,
}

/// A verbatim snippet of one document, attached to one assistant answer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Citation {
    #[serde(rename = "docId")]
    pub document_id: String,
    pub snippet: String,
}

impl Citation {
    pub fn new(document_id: impl Into<String>, snippet: impl Into<String>) -> Self {
        Self {
            document_id: document_id.into(),
            snippet: snippet.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// A single chat message.
///
/// `highlights_by_document` distinguishes a missing key ("not analyzed yet")
/// from a key mapped to an empty list ("analyzed, nothing found").
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub id: String,
    pub role: Role,
    pub content: String,
    #[serde(default, rename = "sources")]
    pub citations: Vec<Citation>,
    #[serde(default, rename = "highlights")]
    pub highlights_by_document: HashMap<String, Vec<String>>,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content.into(), Vec::new())
    }

    pub fn assistant(content: impl Into<String>, citations: Vec<Citation>) -> Self {
        Self::new(Role::Assistant, content.into(), citations)
    }

    fn new(role: Role, content: String, citations: Vec<Citation>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content,
            citations,
            highlights_by_document: HashMap::new(),
            timestamp: Utc::now(),
        }
    }

    pub fn is_analyzed(&self, document_id: &str) -> bool {
        self.highlights_by_document.contains_key(document_id)
    }

    pub fn highlights_for(&self, document_id: &str) -> Option<&[String]> {
        self.highlights_by_document
            .get(document_id)
            .map(Vec::as_slice)
    }

    /// Citation snippets of this message that point at `document_id`.
    pub fn snippets_for<'a>(&'a self, document_id: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.citations
            .iter()
            .filter(move |citation| citation.document_id == document_id)
            .map(|citation| citation.snippet.as_str())
    }

    /// Copy of this message with the analysis result for one document set.
    /// Duplicate phrases are dropped, keeping the first occurrence.
    pub fn with_highlights(&self, document_id: &str, phrases: Vec<String>) -> Self {
        let mut deduped: Vec<String> = Vec::with_capacity(phrases.len());
        for phrase in phrases {
            if !deduped.contains(&phrase) {
                deduped.push(phrase);
            }
        }

        let mut next = self.clone();
        next.highlights_by_document
            .insert(document_id.to_string(), deduped);
        next
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Chat {
    pub id: String,
    pub title: String,
    pub messages: Vec<Message>,
    pub updated_at: DateTime<Utc>,
    pub is_loading: bool,
    pub has_unread_response: bool,
}

impl Chat {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            title: DEFAULT_CHAT_TITLE.to_string(),
            messages: Vec::new(),
            updated_at: Utc::now(),
            is_loading: false,
            has_unread_response: false,
        }
    }

    pub fn message(&self, message_id: &str) -> Option<&Message> {
        self.messages.iter().find(|message| message.id == message_id)
    }
}

impl Default for Chat {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_citation_wire_format() {
        let citation = Citation::new("benefits-vacation", "25 days of annual leave");
        let value = serde_json::to_value(&citation).unwrap();
        assert_eq!(value["docId"], "benefits-vacation");
        assert_eq!(value["snippet"], "25 days of annual leave");
    }

    #[test]
    fn test_message_wire_format() {
        let message = Message::assistant("answer", vec![Citation::new("doc", "snippet")])
            .with_highlights("doc", vec!["phrase".to_string()]);
        let value = serde_json::to_value(&message).unwrap();

        assert_eq!(value["role"], "assistant");
        assert_eq!(value["sources"][0]["docId"], "doc");
        assert_eq!(value["highlights"]["doc"][0], "phrase");
    }

    #[test]
    fn test_message_without_sources_deserializes() {
        let message: Message = serde_json::from_value(serde_json::json!({
            "id": "m1",
            "role": "user",
            "content": "How many vacation days?",
            "timestamp": "2025-01-01T00:00:00Z"
        }))
        .unwrap();

        assert_eq!(message.role, Role::User);
        assert!(message.citations.is_empty());
        assert!(message.highlights_by_document.is_empty());
    }

    #[test]
    fn test_empty_highlights_still_count_as_analyzed() {
        let message = Message::assistant("answer", vec![]);
        assert!(!message.is_analyzed("doc"));

        let analyzed = message.with_highlights("doc", vec![]);
        assert!(analyzed.is_analyzed("doc"));
        assert_eq!(analyzed.highlights_for("doc"), Some(&[][..]));
        assert!(!message.is_analyzed("doc"));
    }

    #[test]
    fn test_with_highlights_dedups_case_sensitively() {
        let message = Message::assistant("answer", vec![]).with_highlights(
            "doc",
            vec![
                "per year".to_string(),
                "Per year".to_string(),
                "per year".to_string(),
            ],
        );

        assert_eq!(
            message.highlights_for("doc").unwrap(),
            &["per year".to_string(), "Per year".to_string()]
        );
    }

    #[test]
    fn test_snippets_for_filters_by_document() {
        let message = Message::assistant(
            "answer",
            vec![
                Citation::new("a", "first"),
                Citation::new("b", "second"),
                Citation::new("a", "third"),
            ],
        );

        let snippets: Vec<&str> = message.snippets_for("a").collect();
        assert_eq!(snippets, vec!["first", "third"]);
    }
}
