//! Intent Classifier
//!
//! Classifies an incoming message by conversational register (greeting,
//! farewell, information query, ...) and by where its answer should come from:
//! the curated knowledge base or the model's general knowledge.

use serde::{Deserialize, Serialize};

use super::rules::{mentions_institution, CONVERSATIONAL_RULES, TOPIC_RULES};

/// Confidence given to the `information_query` fallback.
const DEFAULT_CONFIDENCE: u8 = 40;

// ============================================================================
// Core Types
// ============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ConversationalIntent {
    Greeting,
    Farewell,
    Gratitude,
    EmotionExpression,
    TaskRequest,
    InformationQuery,
    ClarificationRequest,
    FollowUp,
    SmallTalk,
}

impl ConversationalIntent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Greeting => "greeting",
            Self::Farewell => "farewell",
            Self::Gratitude => "gratitude",
            Self::EmotionExpression => "emotion_expression",
            Self::TaskRequest => "task_request",
            Self::InformationQuery => "information_query",
            Self::ClarificationRequest => "clarification_request",
            Self::FollowUp => "follow_up",
            Self::SmallTalk => "small_talk",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    KnowledgeBase,
    GeneralKnowledge,
}

impl DataSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::KnowledgeBase => "knowledge_base",
            Self::GeneralKnowledge => "general_knowledge",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct IntentClassificationResult {
    pub conversational_intent: ConversationalIntent,
    /// 0 - 100
    pub conversational_confidence: u8,
    pub source: DataSource,
    pub category: String,
}

// ============================================================================
// Intent Classifier
// ============================================================================

#[derive(Debug, Default, Clone, Copy)]
pub struct IntentClassifier;

impl IntentClassifier {
    pub fn new() -> Self {
        Self
    }

    pub fn classify_intent(&self, query: &str) -> IntentClassificationResult {
        let normalized = query.trim().to_lowercase();
        let word_count = normalized.split_whitespace().count();

        let (conversational_intent, conversational_confidence) =
            self.detect_register(&normalized, word_count);
        let (source, category) = self.detect_source(&normalized);

        IntentClassificationResult {
            conversational_intent,
            conversational_confidence,
            source,
            category,
        }
    }

    /// Highest-scoring register wins; on equal scores the earlier rule keeps it.
    fn detect_register(&self, normalized: &str, word_count: usize) -> (ConversationalIntent, u8) {
        if normalized.is_empty() {
            return (ConversationalIntent::InformationQuery, 0);
        }

        let mut best: Option<(ConversationalIntent, u8)> = None;
        for rule in CONVERSATIONAL_RULES.iter() {
            if let Some(score) = rule.score(normalized, word_count) {
                if best.map_or(true, |(_, b)| score > b) {
                    best = Some((rule.intent, score));
                }
            }
        }

        best.unwrap_or((ConversationalIntent::InformationQuery, DEFAULT_CONFIDENCE))
    }

    fn detect_source(&self, normalized: &str) -> (DataSource, String) {
        if let Some(rule) = TOPIC_RULES
            .iter()
            .find(|rule| rule.keywords.iter().any(|k| k.is_match(normalized)))
        {
            return (DataSource::KnowledgeBase, rule.category.to_string());
        }

        if mentions_institution(normalized) {
            return (DataSource::KnowledgeBase, "institution".to_string());
        }

        (DataSource::GeneralKnowledge, "general".to_string())
    }

    /// Instruction preamble for answering from general knowledge.
    pub fn get_system_prompt(&self, classification: &IntentClassificationResult) -> String {
        let register = match classification.conversational_intent {
            ConversationalIntent::Greeting => {
                "The user is greeting you. Reply with a short, warm greeting and offer help with questions about the university."
            }
            ConversationalIntent::Farewell => {
                "The user is saying goodbye. Reply briefly and politely. Do not ask new questions."
            }
            ConversationalIntent::Gratitude => {
                "The user is thanking you. Acknowledge it in one or two sentences."
            }
            ConversationalIntent::EmotionExpression => {
                "The user is sharing how they feel. Respond with empathy first, keep it brief, and suggest campus support services only if it fits."
            }
            ConversationalIntent::TaskRequest => {
                "The user is asking you to perform a task. Do the task directly and keep the output focused on what was asked."
            }
            ConversationalIntent::ClarificationRequest => {
                "The user did not understand a previous answer. Restate it more simply, with a short example if helpful."
            }
            ConversationalIntent::FollowUp => {
                "The user is continuing the previous topic. Use the conversation so far to interpret the question."
            }
            ConversationalIntent::SmallTalk => {
                "The user is making small talk. Keep the reply friendly and short; you are a campus information assistant."
            }
            ConversationalIntent::InformationQuery => {
                "The user is asking a general question. Answer accurately and concisely."
            }
        };

        let source = match classification.source {
            DataSource::GeneralKnowledge => {
                "Answer from general knowledge. Do not invent facts about Davao Oriental State University (DOrSU); if the user needs institution-specific details, say that you can look them up when asked directly."
            }
            DataSource::KnowledgeBase => {
                "Questions about Davao Oriental State University (DOrSU) must be answered only from the provided knowledge base context."
            }
        };

        format!(
            "You are the DOrSU campus assistant. Reply in the same language the user writes in (English, Filipino or Cebuano).\n\n{}\n\n{}",
            register, source
        )
    }
}

// ============================================================================
// Tests
// ============================================================================
