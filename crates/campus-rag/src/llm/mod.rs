//! LLM Module - chat-completion providers used to generate replies

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub mod ollama;

pub use ollama::OllamaClient;

/// Language model that answers a chat transcript.
#[async_trait]
pub trait LanguageModelClient: Send + Sync {
    async fn chat(&self, messages: &[ChatMessage], options: &GenerationOptions) -> Result<String>;

    fn info(&self) -> ProviderInfo;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: ChatRole::System, content: content.into() }
    }
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: ChatRole::User, content: content.into() }
    }
    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: ChatRole::Assistant, content: content.into() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

/// Per-request generation knobs, taken from the resolved retrieval settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationOptions {
    pub max_tokens: usize,
    pub temperature: f32,
    pub num_ctx: usize,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            max_tokens: 800,
            temperature: 0.3,
            num_ctx: 4096,
        }
    }
}

/// Provider information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderInfo {
    pub name: String,
    pub model: String,
    pub is_local: bool,
}
