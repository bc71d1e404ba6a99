//! Query Rewriting Module
//!
//! Resolves pronouns in follow-up questions ("What about him?") against the
//! subject of the most recent exchange in the session.
//!
//! This is a heuristic: it only substitutes when the previous turn names
//! exactly one person or thing, and otherwise leaves the question untouched.

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::LazyLock;

use super::rules::INSTITUTION_WORDS;
use crate::chat::conversation_store::ConversationContext;

static PRONOUN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(he|him|his|she|her|hers|they|them|their|it|its|siya|niya|nila|kanya|iya|kaniya)\b")
        .expect("pronoun regex is valid")
});

// Words that can follow an object "her" ("tell her about it", "ask her
// tomorrow"). Any other following word makes "her" possessive.
const NON_NOUN_FOLLOWERS: &[&str] = &[
    "a", "about", "again", "also", "an", "and", "as", "at", "but", "by", "for", "from", "if",
    "in", "into", "is", "now", "of", "on", "or", "out", "please", "so", "that", "the", "then",
    "to", "today", "tomorrow", "too", "up", "was", "when", "with", "yesterday",
];

const HONORIFICS: &[&str] = &[
    "Dr", "Mr", "Mrs", "Ms", "Prof", "Engr", "Atty", "Hon", "Sr", "Jr", "St", "Fr", "Sis",
];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RewrittenQuery {
    pub original_query: String,
    pub rewritten_query: String,
    pub antecedent: Option<String>,
    pub explanation: String,
    pub used_context: bool,
}

impl RewrittenQuery {
    fn unchanged(query: &str, explanation: &str) -> Self {
        Self {
            original_query: query.to_string(),
            rewritten_query: query.to_string(),
            antecedent: None,
            explanation: explanation.to_string(),
            used_context: false,
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct QueryRewriter;

impl QueryRewriter {
    pub fn new() -> Self {
        Self
    }

    /// Rewritten prompt, or the prompt unchanged when nothing can be resolved.
    pub fn resolve_pronouns(&self, prompt: &str, context: Option<&ConversationContext>) -> String {
        self.rewrite_follow_up(prompt, context).rewritten_query
    }

    pub fn rewrite_follow_up(
        &self,
        prompt: &str,
        context: Option<&ConversationContext>,
    ) -> RewrittenQuery {
        let Some(last_turn) = context.and_then(|c| c.last_turn()) else {
            return RewrittenQuery::unchanged(prompt, "No conversation context");
        };

        if !PRONOUN_RE.is_match(prompt) {
            return RewrittenQuery::unchanged(prompt, "No pronoun to resolve");
        }

        let Some(antecedent) = Self::find_antecedent(&last_turn.prompt, &last_turn.reply) else {
            return RewrittenQuery::unchanged(prompt, "No unambiguous antecedent in previous turn");
        };

        let rewritten = PRONOUN_RE
            .replace_all(prompt, |caps: &Captures| {
                let rest = caps.get(0).map_or("", |m| &prompt[m.end()..]);
                Self::substitute(&caps[1], &antecedent, rest)
            })
            .into_owned();

        tracing::debug!(original = %prompt, rewritten = %rewritten, antecedent = %antecedent, "Resolved follow-up pronouns");

        RewrittenQuery {
            original_query: prompt.to_string(),
            rewritten_query: rewritten,
            explanation: format!("Resolved pronoun to '{}'", antecedent),
            antecedent: Some(antecedent),
            used_context: true,
        }
    }

    fn substitute(pronoun: &str, name: &str, rest: &str) -> String {
        match pronoun.to_lowercase().as_str() {
            "his" | "hers" | "their" | "its" => format!("{}'s", name),
            "her" if Self::followed_by_noun(rest) => format!("{}'s", name),
            "siya" => format!("si {}", name),
            "niya" | "nila" | "iya" => format!("ni {}", name),
            "kanya" => format!("kay {}", name),
            "kaniya" => format!("kang {}", name),
            _ => name.to_string(),
        }
    }

    /// Whether the text right after a pronoun starts with a word that reads
    /// as the thing possessed ("her email", "her office hours").
    fn followed_by_noun(rest: &str) -> bool {
        let Some(stripped) = rest.strip_prefix(' ') else {
            return false;
        };
        let word: String = stripped
            .chars()
            .take_while(|c| c.is_alphanumeric() || *c == '-')
            .collect::<String>()
            .to_lowercase();
        !word.is_empty() && !NON_NOUN_FOLLOWERS.contains(&word.as_str())
    }

    /// The single entity named by the previous prompt, or failing that by the
    /// previous reply.
    fn find_antecedent(prompt: &str, reply: &str) -> Option<String> {
        let from_prompt = Self::extract_entities(prompt);
        match from_prompt.len() {
            1 => from_prompt.into_iter().next(),
            0 => {
                let from_reply = Self::extract_entities(reply);
                if from_reply.len() == 1 {
                    from_reply.into_iter().next()
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    /// Capitalized word runs ("Dr. Roy G. Ponce", "BS Agriculture"), minus
    /// sentence starters and names of the institution itself.
    fn extract_entities(text: &str) -> Vec<String> {
        let mut entities = Vec::new();
        let mut seen = HashSet::new();
        let mut current: Vec<String> = Vec::new();

        let mut flush = |current: &mut Vec<String>| {
            if current.is_empty() {
                return;
            }
            let has_name_word = current.iter().any(|w| {
                let core = w.trim_end_matches('.');
                core.chars().count() > 1 && !HONORIFICS.contains(&core)
            });
            let entity = current.join(" ");
            current.clear();
            if has_name_word && !Self::is_institution(&entity) && seen.insert(entity.to_lowercase()) {
                entities.push(entity);
            }
        };

        for raw in text.split_whitespace() {
            let cleaned = raw
                .trim_matches(|c: char| !c.is_alphanumeric() && c != '.')
                .trim_start_matches('.');
            let core = cleaned.trim_end_matches('.');
            let capitalized = core.chars().next().is_some_and(|c| c.is_uppercase());

            if !capitalized || Self::is_common_sentence_starter(core) {
                flush(&mut current);
                continue;
            }

            let abbreviation = cleaned.ends_with('.')
                && (core.chars().count() == 1 || HONORIFICS.contains(&core));
            let ends_sentence = (cleaned.ends_with('.') && !abbreviation)
                || raw.ends_with([',', ';', ':', '?', '!', ')']);

            if core.chars().count() == 1 && !abbreviation {
                flush(&mut current);
                continue;
            }

            current.push(if abbreviation { cleaned.to_string() } else { core.to_string() });
            if ends_sentence {
                flush(&mut current);
            }
        }
        flush(&mut current);

        entities
    }

    fn is_institution(entity: &str) -> bool {
        entity
            .split_whitespace()
            .map(|w| w.trim_end_matches('.').to_lowercase())
            .all(|w| INSTITUTION_WORDS.contains(&w.as_str()))
    }

    /// Words that commonly start sentences but aren't entity names
    fn is_common_sentence_starter(word: &str) -> bool {
        matches!(
            word,
            "The" | "This" | "That" | "These" | "Those" | "What" | "Where" | "When"
            | "How" | "Why" | "Who" | "Whom" | "Whose" | "Which" | "Can" | "Could" | "Would"
            | "Should" | "Will" | "Do" | "Does" | "Did" | "Is" | "Are" | "Was" | "Were"
            | "Have" | "Has" | "Had" | "It" | "If" | "In" | "On" | "At" | "To" | "For"
            | "But" | "And" | "Or" | "Not" | "Yes" | "No" | "Here" | "There" | "Some"
            | "Any" | "All" | "Each" | "Every" | "My" | "Your" | "He" | "She" | "They"
            | "Him" | "Them" | "His" | "Her" | "Its" | "Our" | "Their" | "From" | "With"
            | "About" | "After" | "Before" | "Between" | "During" | "Since" | "Until"
            | "Sure" | "Thanks" | "Thank" | "Please" | "Sorry" | "Let" | "Try" | "Show"
            | "Tell" | "Give" | "List" | "Also" | "However" | "Hi" | "Hello" | "Good"
            | "According" | "Based" | "Currently" | "As" | "Of" | "Si" | "Ang" | "Ano"
            | "Sino" | "Saan" | "Kailan" | "Paano" | "Mga" | "Sa" | "Ug" | "Unsa" | "Kinsa"
            | "Asa" | "Pila" | "Ilan" | "Maayong" | "Magandang" | "Salamat"
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::conversation_store::ConversationTurn;
    use crate::rag::Complexity;
    use chrono::Utc;
    use std::collections::VecDeque;

    fn context_with(prompt: &str, reply: &str) -> ConversationContext {
        let mut recent_turns = VecDeque::new();
        recent_turns.push_back(ConversationTurn {
            prompt: prompt.to_string(),
            reply: reply.to_string(),
            detected_topics: vec!["leadership".to_string()],
            complexity: Complexity::ModerateRetrieval,
            timestamp: Utc::now(),
        });
        ConversationContext {
            recent_turns,
            last_accessed: Utc::now(),
        }
    }

    #[test]
    fn test_no_context_leaves_prompt_unchanged() {
        let rewriter = QueryRewriter::new();
        assert_eq!(rewriter.resolve_pronouns("What about him?", None), "What about him?");

        let empty = ConversationContext {
            recent_turns: VecDeque::new(),
            last_accessed: Utc::now(),
        };
        assert_eq!(rewriter.resolve_pronouns("What about him?", Some(&empty)), "What about him?");
    }

    #[test]
    fn test_named_person_substituted() {
        let rewriter = QueryRewriter::new();
        let context = context_with(
            "Who is the president of DOrSU?",
            "The president of DOrSU is Dr. Roy G. Ponce.",
        );
        let result = rewriter.rewrite_follow_up("What about him?", Some(&context));
        assert!(result.used_context);
        assert_eq!(result.antecedent.as_deref(), Some("Dr. Roy G. Ponce"));
        assert_eq!(result.rewritten_query, "What about Dr. Roy G. Ponce?");
    }

    #[test]
    fn test_entity_in_previous_prompt_wins() {
        let rewriter = QueryRewriter::new();
        let context = context_with(
            "Tell me about Maria Santos",
            "Maria Santos is the Dean of the College of Education, appointed by Roy Ponce.",
        );
        assert_eq!(
            rewriter.resolve_pronouns("What is her email?", Some(&context)),
            "What is Maria Santos's email?"
        );
        assert_eq!(
            rewriter.resolve_pronouns("what are his duties", Some(&context)),
            "what are Maria Santos's duties"
        );
    }

    #[test]
    fn test_her_as_object_or_possessive() {
        let rewriter = QueryRewriter::new();
        let context = context_with("Tell me about Maria Santos", "She heads the College of Education.");
        let resolve = |prompt: &str| rewriter.resolve_pronouns(prompt, Some(&context));

        assert_eq!(resolve("What about her?"), "What about Maria Santos?");
        assert_eq!(resolve("How do I contact her"), "How do I contact Maria Santos");
        assert_eq!(resolve("Can I talk to her about grades?"), "Can I talk to Maria Santos about grades?");
        assert_eq!(resolve("Where is her office?"), "Where is Maria Santos's office?");
        assert_eq!(resolve("Her office hours?"), "Maria Santos's office hours?");
    }

    #[test]
    fn test_ambiguous_antecedent_is_left_alone() {
        let rewriter = QueryRewriter::new();
        let context = context_with(
            "Who are the vice presidents?",
            "The vice presidents are Ana Cruz and Ben Reyes.",
        );
        assert_eq!(rewriter.resolve_pronouns("What about him?", Some(&context)), "What about him?");
    }

    #[test]
    fn test_prompt_without_pronoun_is_unchanged() {
        let rewriter = QueryRewriter::new();
        let context = context_with("Who is the registrar?", "The registrar is Liza Mae Torres.");
        let result = rewriter.rewrite_follow_up("What about the library hours?", Some(&context));
        assert!(!result.used_context);
        assert_eq!(result.rewritten_query, "What about the library hours?");
    }

    #[test]
    fn test_filipino_pronoun() {
        let rewriter = QueryRewriter::new();
        let context = context_with("Sino ang registrar?", "Ang registrar ay si Liza Torres.");
        assert_eq!(
            rewriter.resolve_pronouns("Ano ang email niya?", Some(&context)),
            "Ano ang email ni Liza Torres?"
        );
    }

    #[test]
    fn test_institution_names_are_not_entities() {
        assert!(QueryRewriter::extract_entities("Davao Oriental State University in Mati City").is_empty());
        assert_eq!(
            QueryRewriter::extract_entities("The BS Agriculture program of DOrSU"),
            vec!["BS Agriculture"]
        );
    }
}
