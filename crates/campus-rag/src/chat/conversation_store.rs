//! Per-session conversation context.
//!
//! Keeps the last few exchanged turns of each session so follow-up questions
//! can be resolved against what was just discussed. History per session is
//! bounded by `max_turns`; idle sessions are pruned and the number of live
//! sessions is capped.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::collections::VecDeque;
use std::hash::{Hash, Hasher};
use uuid::Uuid;

use crate::config::ConversationConfig;
use crate::rag::Complexity;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationTurn {
    pub prompt: String,
    pub reply: String,
    pub detected_topics: Vec<String>,
    pub complexity: Complexity,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationContext {
    pub recent_turns: VecDeque<ConversationTurn>,
    pub last_accessed: DateTime<Utc>,
}

impl ConversationContext {
    fn new() -> Self {
        Self {
            recent_turns: VecDeque::new(),
            last_accessed: Utc::now(),
        }
    }

    pub fn last_turn(&self) -> Option<&ConversationTurn> {
        self.recent_turns.back()
    }
}

/// What the analyzer knew about a turn when it was stored.
#[derive(Debug, Clone)]
pub struct TurnMetadata {
    pub detected_topics: Vec<String>,
    pub complexity: Complexity,
}

/// Correlation data handed over by the transport layer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestMetadata {
    /// Explicit session id from a cookie or header.
    pub session_id: Option<String>,
    pub auth_token: Option<String>,
    pub client_addr: Option<String>,
    pub user_agent: Option<String>,
}

pub struct ConversationContextStore {
    sessions: DashMap<String, ConversationContext>,
    config: ConversationConfig,
}

impl ConversationContextStore {
    pub fn new(config: ConversationConfig) -> Self {
        Self {
            sessions: DashMap::new(),
            config,
        }
    }

    /// Stable id for the request: explicit id, then a digest of the auth
    /// token, then a digest of client address and user agent. With none of
    /// these a fresh id is minted.
    pub fn get_session_id(&self, metadata: &RequestMetadata) -> String {
        if let Some(id) = non_blank(metadata.session_id.as_deref()) {
            return id.to_string();
        }
        if let Some(token) = non_blank(metadata.auth_token.as_deref()) {
            return format!("tok-{:016x}", digest(&[token]));
        }
        if let Some(addr) = non_blank(metadata.client_addr.as_deref()) {
            let agent = metadata.user_agent.as_deref().unwrap_or_default();
            return format!("cli-{:016x}", digest(&[addr, agent]));
        }
        Uuid::new_v4().to_string()
    }

    /// Snapshot of the session's context, `None` for unknown or expired sessions.
    pub fn get_context(&self, session_id: &str) -> Option<ConversationContext> {
        let now = Utc::now();
        {
            let mut entry = self.sessions.get_mut(session_id)?;
            if !self.is_idle(&entry, now) {
                entry.last_accessed = now;
                return Some(entry.value().clone());
            }
        }
        self.drop_if_idle(session_id, now);
        None
    }

    /// Removes the session only if it is still idle at `now`, so a turn
    /// stored between the check and the removal survives.
    fn drop_if_idle(&self, session_id: &str, now: DateTime<Utc>) -> bool {
        let dropped = self
            .sessions
            .remove_if(session_id, |_, context| self.is_idle(context, now))
            .is_some();
        if dropped {
            tracing::debug!(session_id = %session_id, "Dropped idle conversation context");
        }
        dropped
    }

    pub fn store_conversation(
        &self,
        session_id: &str,
        prompt: &str,
        reply: &str,
        metadata: TurnMetadata,
    ) {
        let now = Utc::now();
        let max_turns = self.config.max_turns.max(1);
        {
            let mut entry = self
                .sessions
                .entry(session_id.to_string())
                .or_insert_with(ConversationContext::new);
            entry.recent_turns.push_back(ConversationTurn {
                prompt: prompt.to_string(),
                reply: reply.to_string(),
                detected_topics: metadata.detected_topics,
                complexity: metadata.complexity,
                timestamp: now,
            });
            while entry.recent_turns.len() > max_turns {
                entry.recent_turns.pop_front();
            }
            entry.last_accessed = now;
        }
        self.prune(now);
    }

    pub fn clear_session(&self, session_id: &str) -> bool {
        self.sessions.remove(session_id).is_some()
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    fn is_idle(&self, context: &ConversationContext, now: DateTime<Utc>) -> bool {
        let timeout = Duration::seconds(self.config.idle_timeout_secs as i64);
        now.signed_duration_since(context.last_accessed) > timeout
    }

    /// Drops idle sessions, then the least recently used ones above `max_sessions`.
    fn prune(&self, now: DateTime<Utc>) {
        let before = self.sessions.len();
        self.sessions.retain(|_, context| !self.is_idle(context, now));

        let max_sessions = self.config.max_sessions.max(1);
        if self.sessions.len() > max_sessions {
            let by_age: Vec<(String, DateTime<Utc>)> = self
                .sessions
                .iter()
                .map(|entry| (entry.key().clone(), entry.value().last_accessed))
                .collect();
            self.evict_least_recent(by_age, max_sessions);
        }

        let removed = before.saturating_sub(self.sessions.len());
        if removed > 0 {
            tracing::debug!(removed, remaining = self.sessions.len(), "Pruned conversation sessions");
        }
    }

    /// Evicts the oldest entries of a snapshot down to `max_sessions`. Other
    /// requests may have removed or touched sessions since the snapshot was
    /// taken; a session touched after it is kept.
    fn evict_least_recent(&self, mut by_age: Vec<(String, DateTime<Utc>)>, max_sessions: usize) {
        by_age.sort_by_key(|(_, accessed)| *accessed);
        let excess = by_age.len().saturating_sub(max_sessions);
        for (key, seen) in by_age.into_iter().take(excess) {
            self.sessions
                .remove_if(&key, |_, context| context.last_accessed <= seen);
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn digest(parts: &[&str]) -> u64 {
    let mut hasher = DefaultHasher::new();
    for part in parts {
        part.hash(&mut hasher);
    }
    hasher.finish()
}
