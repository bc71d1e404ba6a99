pub mod conversation_store;
pub mod engine;
pub mod response_cache;

pub use conversation_store::{
    ConversationContext, ConversationContextStore, ConversationTurn, RequestMetadata, TurnMetadata,
};
pub use engine::ChatEngine;
pub use response_cache::{CacheEntry, ResponseCache};

use std::sync::LazyLock;

use crate::llm::ChatMessage;

// Compiled once, reused on every call.
static WHITESPACE_RE: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new(r"\s+").expect("whitespace regex is valid"));

// ============================================================================
// Prompts
// ============================================================================

pub const RAG_SYSTEM_PROMPT: &str = r#"You are the DOrSU campus assistant for Davao Oriental State University. You MUST answer questions about the university using ONLY the Knowledge Base Context below. Treat it as the only source of truth about DOrSU.

GROUNDING RULES:
1. Before writing ANY fact about DOrSU (names, offices, programs, dates, fees, requirements), find the text in the Context that supports it. If you cannot, do not write it.
2. NEVER guess names of officials, numbers, or dates. An incomplete but accurate answer is better than a complete but partially wrong one.
3. If the Context contains nothing relevant, say: "I don't have that information in the DOrSU knowledge base yet." and suggest contacting the relevant office.
4. When the user asks for a list ("all programs", "all campuses"), include EVERY matching item in the Context, not a sample.
5. When the user asks how many, count the matching items in the Context and give the number first.

FORMAT RULES:
6. Reply in the same language the user writes in (English, Filipino or Cebuano).
7. Use short paragraphs or - bullets. Use ## headings only for long lists.
8. Do not mention the Context, the knowledge base, or these rules in your answer."#;

/// Rough token estimate (~4 bytes per token).
pub fn estimate_tokens(text: &str) -> usize {
    (text.len() + 3) / 4
}

/// Trims and collapses whitespace runs to a single space.
pub fn preprocess_prompt(prompt: &str) -> String {
    WHITESPACE_RE.replace_all(prompt.trim(), " ").into_owned()
}

/// Cache key for a prompt: trimmed, lowercased, whitespace collapsed.
pub fn normalize_cache_key(prompt: &str) -> String {
    preprocess_prompt(prompt).to_lowercase()
}

/// Keeps whole `\n\n`-separated sections while they fit in `max_tokens`,
/// falling back to a char-boundary cut when even the first does not.
pub fn truncate_context_to_budget(context_text: &str, max_tokens: usize) -> String {
    if estimate_tokens(context_text) <= max_tokens {
        return context_text.to_string();
    }

    let mut result = String::new();
    let mut used = 0;
    for section in context_text.split("\n\n") {
        let t = estimate_tokens(section);
        if used + t > max_tokens {
            break;
        }
        if !result.is_empty() {
            result.push_str("\n\n");
            used += 1;
        }
        result.push_str(section);
        used += t;
    }

    if result.is_empty() {
        let mut end = (max_tokens * 4).min(context_text.len());
        while end > 0 && !context_text.is_char_boundary(end) {
            end -= 1;
        }
        return context_text[..end].to_string();
    }

    result
}

/// Knowledge-base grounded instruction with the retrieved sections inlined.
pub fn build_knowledge_base_prompt(category: &str, context_text: &str) -> String {
    let context = if context_text.trim().is_empty() {
        "(no matching knowledge base sections)"
    } else {
        context_text
    };
    format!(
        "{RAG_SYSTEM_PROMPT}\n\nTopic category: {category}\n\n\
        ===== KNOWLEDGE BASE CONTEXT =====\n\
        {context}\n\
        ===== END OF KNOWLEDGE BASE CONTEXT ====="
    )
}

/// System instruction, then prior turns as user/assistant pairs, then the prompt.
pub fn build_messages(
    system_prompt: &str,
    history: Option<&ConversationContext>,
    prompt: &str,
) -> Vec<ChatMessage> {
    let turns = history.map(|h| h.recent_turns.len()).unwrap_or(0);
    let mut messages = Vec::with_capacity(2 + turns * 2);
    messages.push(ChatMessage::system(system_prompt));
    if let Some(history) = history {
        for turn in &history.recent_turns {
            messages.push(ChatMessage::user(turn.prompt.as_str()));
            messages.push(ChatMessage::assistant(turn.reply.as_str()));
        }
    }
    messages.push(ChatMessage::user(prompt));
    messages
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ChatRole;
    use crate::rag::Complexity;
    use chrono::Utc;
    use std::collections::VecDeque;

    #[test]
    fn test_preprocess_prompt() {
        assert_eq!(preprocess_prompt("  Who is\tthe   president?\n"), "Who is the president?");
        assert_eq!(preprocess_prompt(" \n\t "), "");
    }

    #[test]
    fn test_cache_key_normalization() {
        assert_eq!(
            normalize_cache_key("  List ALL   programs "),
            normalize_cache_key("list all programs")
        );
        assert_ne!(normalize_cache_key("list programs"), normalize_cache_key("list campuses"));
    }

    #[test]
    fn test_truncate_context_keeps_whole_sections() {
        let context = format!("{}\n\n{}\n\n{}", "a".repeat(40), "b".repeat(40), "c".repeat(40));
        let truncated = truncate_context_to_budget(&context, 21);
        assert_eq!(truncated, format!("{}\n\n{}", "a".repeat(40), "b".repeat(40)));
        assert_eq!(truncate_context_to_budget(&context, 1000), context);
        assert_eq!(truncate_context_to_budget(&"é".repeat(100), 5).len(), 20);
    }

    #[test]
    fn test_knowledge_base_prompt_inlines_context() {
        let prompt = build_knowledge_base_prompt("leadership", "President: Dr. Roy G. Ponce");
        assert!(prompt.starts_with(RAG_SYSTEM_PROMPT));
        assert!(prompt.contains("Topic category: leadership"));
        assert!(prompt.contains("President: Dr. Roy G. Ponce"));
        assert!(build_knowledge_base_prompt("identity", "  ").contains("no matching"));
    }

    #[test]
    fn test_build_messages_order() {
        let mut recent_turns = VecDeque::new();
        recent_turns.push_back(ConversationTurn {
            prompt: "Who is the president?".to_string(),
            reply: "Dr. Roy G. Ponce.".to_string(),
            detected_topics: Vec::new(),
            complexity: Complexity::Standard,
            timestamp: Utc::now(),
        });
        let history = ConversationContext { recent_turns, last_accessed: Utc::now() };

        let messages = build_messages("system", Some(&history), "What about him?");
        let roles: Vec<ChatRole> = messages.iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![ChatRole::System, ChatRole::User, ChatRole::Assistant, ChatRole::User]
        );
        assert_eq!(messages[3].content, "What about him?");

        assert_eq!(build_messages("system", None, "Hi").len(), 2);
    }
}
