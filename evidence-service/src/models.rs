use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct SendMessageRequest {
    pub query: String,
}

/// One cited document of a message, as listed in the source picker.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceEntry {
    pub document_id: String,
    pub title: Option<String>,
    pub category: Option<String>,
    pub analyzed: bool,
    pub analyzing: bool,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourcesResponse {
    pub message_id: String,
    pub sources: Vec<SourceEntry>,
}
