//! Query understanding - intent classification, retrieval sizing, follow-up rewriting

pub mod intent_classifier;
pub mod query_analyzer;
pub mod query_rewriter;
pub mod rules;
pub mod settings;

// Re-export commonly used types
pub use intent_classifier::{
    ConversationalIntent, DataSource, IntentClassificationResult, IntentClassifier,
};
pub use query_analyzer::{Complexity, IntentMatch, QueryAnalysisResult, QueryAnalyzer, TopicMatch};
pub use query_rewriter::{QueryRewriter, RewrittenQuery};
pub use settings::{
    get_optimal_settings, resolve_settings, BaseSettings, RetrievalSettings, SettingsCaps,
    SettingsOverrides, SettingsPolicy,
};
