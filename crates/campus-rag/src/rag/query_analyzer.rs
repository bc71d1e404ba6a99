//! Query Analyzer
//!
//! Scores how broad a question is and turns that score (the retrieval
//! multiplier) into concrete retrieval and generation settings. Broad
//! questions ("list all programs") get more sections and a larger token
//! budget; focused ones stay on the base settings.

use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

use super::intent_classifier::IntentClassificationResult;
use super::rules::{
    EARLY_PLURAL_OFFSET, EARLY_PLURAL_WEIGHT, PHRASING_RULES, PLURAL_KEYWORDS, PLURAL_WEIGHT,
    TOPIC_RULES,
};
use super::settings::{clamp_multiplier, RetrievalSettings, SettingsPolicy, MIN_MULTIPLIER};

// ============================================================================
// Core Types
// ============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum Complexity {
    Standard,
    ModerateRetrieval,
    HighRetrieval,
    MaximumRetrieval,
}

impl Complexity {
    pub fn from_multiplier(multiplier: f64) -> Self {
        if multiplier >= 3.0 {
            Self::MaximumRetrieval
        } else if multiplier >= 2.0 {
            Self::HighRetrieval
        } else if multiplier >= 1.5 {
            Self::ModerateRetrieval
        } else {
            Self::Standard
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::ModerateRetrieval => "moderate-retrieval",
            Self::HighRetrieval => "high-retrieval",
            Self::MaximumRetrieval => "maximum-retrieval",
        }
    }
}

impl std::fmt::Display for Complexity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum IntentMatch {
    Listing,
    Counting,
    Multiple,
    Comprehensive,
    FollowUp,
    MultiPart,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TopicMatch {
    pub category: String,
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QueryAnalysisResult {
    pub complexity: Complexity,
    /// 0 - 100
    pub confidence: u8,
    pub detected_topics: Vec<TopicMatch>,
    pub detected_intents: Vec<IntentMatch>,
    pub found_plurals: Vec<String>,
    pub rag_multiplier: f64,
    pub settings: RetrievalSettings,
    pub is_multi_part: bool,
    pub is_follow_up: bool,
    pub intent_classification: IntentClassificationResult,
}

impl QueryAnalysisResult {
    pub fn topic_categories(&self) -> Vec<String> {
        self.detected_topics.iter().map(|t| t.category.clone()).collect()
    }
}

// ============================================================================
// Query Analyzer - Main Entry Point
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct QueryAnalyzer {
    policy: SettingsPolicy,
}

impl QueryAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_settings_policy(policy: SettingsPolicy) -> Self {
        Self { policy }
    }

    pub fn settings_policy(&self) -> &SettingsPolicy {
        &self.policy
    }

    pub fn analyze_complexity(
        &self,
        query: &str,
        intent_classification: &IntentClassificationResult,
    ) -> QueryAnalysisResult {
        let normalized = query.trim().to_lowercase();
        let mut multiplier = MIN_MULTIPLIER;

        // Step 1: topic categories
        let mut detected_topics = Vec::new();
        for rule in TOPIC_RULES.iter() {
            let keywords = rule.matched_keywords(&normalized);
            if !keywords.is_empty() {
                multiplier += rule.weight;
                detected_topics.push(TopicMatch {
                    category: rule.category.to_string(),
                    keywords,
                });
            }
        }

        // Step 2: phrasing intents
        let mut detected_intents = Vec::new();
        let mut is_follow_up = false;
        let mut is_multi_part = false;
        for rule in PHRASING_RULES.iter() {
            if rule.is_match(&normalized) {
                multiplier += rule.weight;
                detected_intents.push(rule.tag);
                match rule.tag {
                    IntentMatch::FollowUp => is_follow_up = true,
                    IntentMatch::MultiPart => is_multi_part = true,
                    _ => {}
                }
            }
        }

        // Step 3: plural subject nouns
        let mut found_plurals = Vec::new();
        let mut early_plural = false;
        for keyword in PLURAL_KEYWORDS.iter() {
            if let Some(position) = keyword.find(&normalized) {
                multiplier += PLURAL_WEIGHT;
                found_plurals.push(keyword.text.to_string());
                early_plural |= position < EARLY_PLURAL_OFFSET;
            }
        }
        if early_plural {
            multiplier += EARLY_PLURAL_WEIGHT;
        }

        // Step 4: clamp and derive
        let rag_multiplier = clamp_multiplier(multiplier);
        let complexity = Complexity::from_multiplier(rag_multiplier);
        let confidence = (rag_multiplier * 25.0).round().clamp(0.0, 100.0) as u8;
        let settings = self.policy.optimal_settings(rag_multiplier);

        QueryAnalysisResult {
            complexity,
            confidence,
            detected_topics,
            detected_intents,
            found_plurals,
            rag_multiplier,
            settings,
            is_multi_part,
            is_follow_up,
            intent_classification: intent_classification.clone(),
        }
    }

    /// Human-readable summary for logs.
    pub fn format_analysis(&self, result: &QueryAnalysisResult) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "Complexity: {} (confidence {}%, multiplier {:.2})",
            result.complexity, result.confidence, result.rag_multiplier
        );
        let _ = writeln!(
            out,
            "Intent: {} ({}%), source: {}, category: {}",
            result.intent_classification.conversational_intent.as_str(),
            result.intent_classification.conversational_confidence,
            result.intent_classification.source.as_str(),
            result.intent_classification.category
        );

        if result.detected_topics.is_empty() {
            let _ = writeln!(out, "Topics: none");
        } else {
            let topics = result
                .detected_topics
                .iter()
                .map(|t| format!("{} [{}]", t.category, t.keywords.join(", ")))
                .collect::<Vec<_>>()
                .join("; ");
            let _ = writeln!(out, "Topics: {}", topics);
        }

        if !result.detected_intents.is_empty() {
            let _ = writeln!(out, "Phrasing: {:?}", result.detected_intents);
        }
        if !result.found_plurals.is_empty() {
            let _ = writeln!(out, "Plurals: {}", result.found_plurals.join(", "));
        }
        if result.is_follow_up || result.is_multi_part {
            let _ = writeln!(
                out,
                "Follow-up: {}, multi-part: {}",
                result.is_follow_up, result.is_multi_part
            );
        }

        let s = &result.settings;
        let _ = write!(
            out,
            "Settings: {} (max_tokens={}, num_ctx={}, rag_sections={}, rag_max_tokens={}, temperature={})",
            s.description, s.max_tokens, s.num_ctx, s.rag_sections, s.rag_max_tokens, s.temperature
        );
        out
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rag::intent_classifier::IntentClassifier;
    use crate::rag::settings::{HARD_MAX_TOKENS, HARD_NUM_CTX, HARD_RAG_MAX_TOKENS, HARD_RAG_SECTIONS};

    fn analyze(query: &str) -> QueryAnalysisResult {
        let classification = IntentClassifier::new().classify_intent(query);
        QueryAnalyzer::new().analyze_complexity(query, &classification)
    }

    #[test]
    fn test_list_all_programs_is_maximum_retrieval() {
        let result = analyze("List ALL programs offered by DOrSU");
        assert!(result.detected_intents.contains(&IntentMatch::Listing));
        assert_eq!(result.found_plurals, vec!["programs"]);
        assert!(result.rag_multiplier >= 3.0);
        assert_eq!(result.complexity, Complexity::MaximumRetrieval);
        assert_eq!(result.settings.rag_sections, 40);
        assert_eq!(result.confidence, 100);
    }

    #[test]
    fn test_greeting_is_standard() {
        let result = analyze("Hi");
        assert_eq!(result.rag_multiplier, 1.0);
        assert_eq!(result.complexity, Complexity::Standard);
        assert_eq!(result.confidence, 25);
        assert!(result.detected_topics.is_empty());
        assert!(result.detected_intents.is_empty());
    }

    #[test]
    fn test_empty_and_odd_input() {
        for query in ["", "   ", "???", "ñ 漢字 🙂"] {
            let result = analyze(query);
            assert!(result.rag_multiplier >= 1.0);
            assert_eq!(result.intent_classification, IntentClassifier::new().classify_intent(query));
        }
        assert_eq!(analyze("").complexity, Complexity::Standard);
    }

    #[test]
    fn test_single_topic_question() {
        let result = analyze("Who is the president?");
        assert_eq!(result.detected_topics.len(), 1);
        assert_eq!(result.detected_topics[0].category, "leadership");
        assert_eq!(result.detected_topics[0].keywords, vec!["president"]);
        assert_eq!(result.rag_multiplier, 1.5);
        assert_eq!(result.complexity, Complexity::ModerateRetrieval);
    }

    #[test]
    fn test_words_containing_keywords_are_not_topics() {
        for query in [
            "I feel sad today",
            "How do I learn programming in Python?",
            "Can you give me feedback on my essay?",
            "Explain the original meaning of karma",
            "Why is isolation hard?",
            "I am mastering chess",
            "Is the deanery open?",
        ] {
            let result = analyze(query);
            assert!(result.detected_topics.is_empty(), "{query}: {:?}", result.detected_topics);
            assert!(result.found_plurals.is_empty(), "{query}");
            assert_eq!(result.rag_multiplier, 1.0, "{query}");
            assert_eq!(result.complexity, Complexity::Standard, "{query}");
        }
    }

    #[test]
    fn test_plural_requires_whole_word() {
        let result = analyze("programsx and deanships");
        assert!(result.found_plurals.is_empty());
        assert!(result.detected_topics.is_empty());
    }

    #[test]
    fn test_topics_in_detection_order() {
        let result = analyze("When was the college of engineering founded and who is its dean?");
        let categories = result.topic_categories();
        assert_eq!(categories, vec!["leadership", "academic", "historical"]);
        assert!(result.is_multi_part);
    }

    #[test]
    fn test_counting_and_multilingual_topics() {
        let result = analyze("Pila ka kampus ang DOrSU?");
        assert!(result.detected_intents.contains(&IntentMatch::Counting));
        let categories = result.topic_categories();
        assert!(categories.contains(&"campus".to_string()));
        assert!(categories.contains(&"identity".to_string()));
        assert_eq!(result.complexity, Complexity::MaximumRetrieval);
    }

    #[test]
    fn test_follow_up_flag() {
        let result = analyze("What about him?");
        assert!(result.is_follow_up);
        assert!(result.detected_intents.contains(&IntentMatch::FollowUp));
    }

    #[test]
    fn test_late_plural_gets_no_position_boost() {
        let early = analyze("scholarships for freshmen");
        let late = analyze("tell me something about the scholarships");
        // Both match the enrollment topic and the plural, only one is early.
        assert_eq!(early.rag_multiplier - late.rag_multiplier, 1.0);
    }

    #[test]
    fn test_analysis_is_idempotent() {
        let queries = [
            "List ALL programs offered by DOrSU",
            "How many campuses and colleges does the university have?",
            "what about her",
            "",
        ];
        for query in queries {
            let a = analyze(query);
            let b = analyze(query);
            assert_eq!(a.rag_multiplier, b.rag_multiplier);
            assert_eq!(a.complexity, b.complexity);
            assert_eq!(a.settings, b.settings);
        }
    }

    #[test]
    fn test_multiplier_never_decreases_when_matches_are_added() {
        let additions = [
            "programs", "dean", "history", "how many", "list", "both", "and what",
            "campuses", "accreditation", "tuition", "everything", "him",
        ];
        let mut query = String::from("tell me about dorsu");
        let mut previous = analyze(&query).rag_multiplier;
        for addition in additions {
            query.push(' ');
            query.push_str(addition);
            let current = analyze(&query).rag_multiplier;
            assert!(current >= previous, "multiplier dropped after adding '{addition}'");
            previous = current;
        }
        assert_eq!(previous, 6.0);
    }

    #[test]
    fn test_settings_caps_hold_for_broad_queries() {
        let result = analyze(
            "List all programs, campuses, deans, colleges and scholarships, and how many faculties are there? Also who founded it?",
        );
        assert_eq!(result.rag_multiplier, 6.0);
        assert!(result.settings.max_tokens <= HARD_MAX_TOKENS);
        assert!(result.settings.num_ctx <= HARD_NUM_CTX);
        assert!(result.settings.rag_sections <= HARD_RAG_SECTIONS);
        assert!(result.settings.rag_max_tokens <= HARD_RAG_MAX_TOKENS);
    }

    #[test]
    fn test_case_and_whitespace_insensitive() {
        let a = analyze("   WHAT IS DORSU   ");
        let b = analyze("what is dorsu");
        assert_eq!(a.rag_multiplier, b.rag_multiplier);
        assert_eq!(a.detected_topics, b.detected_topics);
    }

    #[test]
    fn test_format_analysis_mentions_key_fields() {
        let analyzer = QueryAnalyzer::new();
        let classification = IntentClassifier::new().classify_intent("List all programs");
        let result = analyzer.analyze_complexity("List all programs", &classification);
        let text = analyzer.format_analysis(&result);
        assert!(text.contains("maximum-retrieval"));
        assert!(text.contains("programs"));
        assert!(text.contains("rag_sections=40"));
    }

    #[test]
    fn test_complexity_serializes_as_label() {
        let json = serde_json::to_string(&Complexity::HighRetrieval).unwrap();
        assert_eq!(json, "\"high-retrieval\"");
        let json = serde_json::to_string(&IntentMatch::MultiPart).unwrap();
        assert_eq!(json, "\"multiPart\"");
    }
}
