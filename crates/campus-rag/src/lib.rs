pub mod chat;
pub mod config;
pub mod error;
pub mod llm;
pub mod rag;
pub mod search;
pub mod types;

// Re-export primary types for convenience
pub use chat::{ChatEngine, ConversationContextStore, RequestMetadata, ResponseCache};
pub use config::{CacheConfig, ConversationConfig, LlmConfig, PipelineConfig};
pub use error::PipelineError;
pub use llm::{ChatMessage, ChatRole, GenerationOptions, LanguageModelClient, OllamaClient};
pub use rag::{
    get_optimal_settings, Complexity, ConversationalIntent, DataSource, IntentClassificationResult,
    IntentClassifier, QueryAnalysisResult, QueryAnalyzer, RetrievalSettings,
};
pub use search::{RetrievalClient, RetrievalParams};
pub use types::{CacheClearResponse, ChatRequest, ChatResponse, IntentSummary};

// Re-export common types
pub use anyhow::{Error, Result};
