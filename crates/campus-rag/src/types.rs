use serde::{Deserialize, Serialize};

use crate::rag::{
    Complexity, ConversationalIntent, DataSource, IntentClassificationResult, RetrievalSettings,
    SettingsOverrides,
};

/// Incoming chat message with optional generation overrides.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub prompt: String,
    #[serde(default)]
    pub max_tokens: Option<usize>,
    #[serde(default)]
    pub temperature: Option<f32>,
}

impl ChatRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Self::default()
        }
    }

    pub fn overrides(&self) -> SettingsOverrides {
        SettingsOverrides {
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            ..SettingsOverrides::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntentSummary {
    pub conversational: ConversationalIntent,
    pub confidence: u8,
    pub data_source: DataSource,
    pub category: String,
}

impl From<&IntentClassificationResult> for IntentSummary {
    fn from(result: &IntentClassificationResult) -> Self {
        Self {
            conversational: result.conversational_intent,
            confidence: result.conversational_confidence,
            data_source: result.source,
            category: result.category.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    pub reply: String,
    pub complexity: Complexity,
    pub cached: bool,
    pub intent: IntentSummary,
    pub session_id: String,
    pub settings: RetrievalSettings,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheClearResponse {
    pub success: bool,
    pub cleared: usize,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_wire_format() {
        let request: ChatRequest =
            serde_json::from_str(r#"{ "prompt": "Hi", "maxTokens": 200 }"#).unwrap();
        assert_eq!(request.max_tokens, Some(200));
        assert_eq!(request.temperature, None);
        assert_eq!(request.overrides().max_tokens, Some(200));
        assert_eq!(request.overrides().rag_sections, None);
    }

    #[test]
    fn test_intent_summary_wire_format() {
        let summary = IntentSummary {
            conversational: ConversationalIntent::InformationQuery,
            confidence: 40,
            data_source: DataSource::KnowledgeBase,
            category: "leadership".to_string(),
        };
        let value = serde_json::to_value(&summary).unwrap();
        assert_eq!(value["conversational"], "information_query");
        assert_eq!(value["dataSource"], "knowledge_base");
    }
}
