//! REST client for the RAG backend (`/api/chat`, `/api/highlights`,
//! `/api/handbook`).

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use crate::{
    backend::{ChatBackend, ChatReply, DocumentSource, HighlightFetcher},
    error::{EvidenceError, Result},
    model::{Document, Message},
};

#[derive(Serialize)]
struct ChatRequest<'a> {
    query: &'a str,
    history: &'a [Message],
}

#[derive(Serialize)]
struct HighlightsRequest<'a> {
    answer: &'a str,
    document_content: &'a str,
}

/// Talks to the backend over HTTP. Implements every collaborator trait.
#[derive(Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| EvidenceError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        debug!("POST {}", path);
        let response = self
            .client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .map_err(|e| EvidenceError::Transport(e.to_string()))?;
        Self::decode(path, response).await
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        debug!("GET {}", path);
        let response = self
            .client
            .get(self.url(path))
            .send()
            .await
            .map_err(|e| EvidenceError::Transport(e.to_string()))?;
        Self::decode(path, response).await
    }

    async fn decode<T: DeserializeOwned>(path: &str, response: reqwest::Response) -> Result<T> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EvidenceError::Transport(format!(
                "{} returned {}: {}",
                path, status, body
            )));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| EvidenceError::InvalidResponse(format!("{}: {}", path, e)))
    }
}

#[async_trait]
impl ChatBackend for HttpBackend {
    async fn send_chat(&self, query: &str, history: &[Message]) -> Result<ChatReply> {
        self.post_json("/api/chat", &ChatRequest { query, history })
            .await
    }
}

#[async_trait]
impl HighlightFetcher for HttpBackend {
    async fn fetch_highlights(&self, answer: &str, document_content: &str) -> Result<Vec<String>> {
        let payload: Value = self
            .post_json(
                "/api/highlights",
                &HighlightsRequest {
                    answer,
                    document_content,
                },
            )
            .await?;
        parse_highlight_payload(payload)
    }
}

#[async_trait]
impl DocumentSource for HttpBackend {
    async fn fetch_documents(&self) -> Result<Vec<Document>> {
        self.get_json("/api/handbook").await
    }
}

/// Extract the phrase list from a highlights response.
///
/// Accepts a bare array, an object with `highlights` or `phrases`, or else
/// the first array-valued field of an object. Non-string items are skipped.
pub fn parse_highlight_payload(payload: Value) -> Result<Vec<String>> {
    let items = match payload {
        Value::Array(items) => items,
        Value::Object(mut fields) => {
            let array = ["highlights", "phrases"]
                .iter()
                .find_map(|key| match fields.remove(*key) {
                    Some(Value::Array(items)) => Some(items),
                    _ => None,
                })
                .or_else(|| {
                    fields.into_iter().find_map(|(_, value)| match value {
                        Value::Array(items) => Some(items),
                        _ => None,
                    })
                });

            array.ok_or_else(|| {
                EvidenceError::InvalidResponse("no phrase array in highlights response".to_string())
            })?
        }
        other => {
            return Err(EvidenceError::InvalidResponse(format!(
                "unexpected highlights response: {}",
                other
            )));
        }
    };

    Ok(items
        .into_iter()
        .filter_map(|item| match item {
            Value::String(phrase) => Some(phrase),
            _ => None,
        })
        .collect())
}
