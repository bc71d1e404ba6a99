//! Knowledge-base retrieval seam.
//!
//! Storage and ranking of knowledge-base sections live outside this crate; the
//! pipeline only decides how much to fetch and hands over the topic.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::rag::RetrievalSettings;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrievalParams {
    /// Text to retrieve for, after follow-up resolution
    pub topic: String,
    pub max_sections: usize,
    pub max_tokens: usize,
}

impl RetrievalParams {
    pub fn from_settings(topic: impl Into<String>, settings: &RetrievalSettings) -> Self {
        Self {
            topic: topic.into(),
            max_sections: settings.rag_sections,
            max_tokens: settings.rag_max_tokens,
        }
    }
}

/// Returns concatenated knowledge-base context text for a topic.
#[async_trait]
pub trait RetrievalClient: Send + Sync {
    async fn retrieve(&self, params: &RetrievalParams) -> Result<String>;
}
