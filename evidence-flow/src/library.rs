use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

use crate::{backend::DocumentSource, model::Document};

/// Documents loaded once at session start. Immutable afterwards.
#[derive(Debug, Clone, Default)]
pub struct DocumentLibrary {
    documents: Arc<Vec<Document>>,
    index: Arc<HashMap<String, usize>>,
}

impl DocumentLibrary {
    pub fn new(documents: Vec<Document>) -> Self {
        let index = documents
            .iter()
            .enumerate()
            .map(|(position, document)| (document.id.clone(), position))
            .collect();

        Self {
            documents: Arc::new(documents),
            index: Arc::new(index),
        }
    }

    /// Fetch documents from `source`. A failing source yields an empty
    /// library; the session keeps working without sources.
    pub async fn load(source: &dyn DocumentSource) -> Self {
        match source.fetch_documents().await {
            Ok(documents) => {
                info!("Loaded {} handbook documents", documents.len());
                Self::new(documents)
            }
            Err(e) => {
                warn!("Failed to load handbook documents, continuing without sources: {}", e);
                Self::default()
            }
        }
    }

    pub fn get(&self, document_id: &str) -> Option<&Document> {
        self.index
            .get(document_id)
            .and_then(|position| self.documents.get(*position))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Document> {
        self.documents.iter()
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}
