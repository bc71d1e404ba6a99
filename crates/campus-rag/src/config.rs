use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::rag::settings::{
    SettingsPolicy, HARD_MAX_TOKENS, HARD_NUM_CTX, HARD_RAG_MAX_TOKENS, HARD_RAG_SECTIONS,
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub settings: SettingsPolicy,
    pub cache: CacheConfig,
    pub conversation: ConversationConfig,
    pub llm: LlmConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub capacity: usize,
    /// Entries older than this are treated as misses. `None` keeps them until evicted.
    pub ttl_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversationConfig {
    /// Turns kept per session
    pub max_turns: usize,
    pub idle_timeout_secs: u64,
    pub max_sessions: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub base_url: String,
    pub model: String,
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: 500,
            ttl_secs: None,
        }
    }
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            max_turns: 6,
            idle_timeout_secs: 30 * 60,
            max_sessions: 1000,
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: std::env::var("OLLAMA_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:11434".to_string()),
            model: "llama3.1:8b".to_string(),
            connect_timeout_secs: 10,
            request_timeout_secs: 120,
        }
    }
}

impl PipelineConfig {
    /// Validate config values, returning errors for clearly broken configurations.
    pub fn validate(&self) -> Result<(), String> {
        let caps = &self.settings.caps;
        if caps.max_tokens > HARD_MAX_TOKENS {
            return Err(format!("settings.caps.max_tokens must be <= {}", HARD_MAX_TOKENS));
        }
        if caps.num_ctx > HARD_NUM_CTX {
            return Err(format!("settings.caps.num_ctx must be <= {}", HARD_NUM_CTX));
        }
        if caps.rag_sections > HARD_RAG_SECTIONS {
            return Err(format!("settings.caps.rag_sections must be <= {}", HARD_RAG_SECTIONS));
        }
        if caps.rag_max_tokens > HARD_RAG_MAX_TOKENS {
            return Err(format!(
                "settings.caps.rag_max_tokens must be <= {}",
                HARD_RAG_MAX_TOKENS
            ));
        }
        let base = &self.settings.base;
        if base.max_tokens == 0 || base.num_ctx == 0 || base.rag_sections == 0 {
            return Err("settings.base values must be > 0".into());
        }
        if !(0.0..=2.0).contains(&base.temperature) {
            return Err("settings.base.temperature must be in [0.0, 2.0]".into());
        }
        if self.cache.capacity == 0 {
            return Err("cache.capacity must be > 0".into());
        }
        if self.conversation.max_turns == 0 {
            return Err("conversation.max_turns must be > 0".into());
        }
        if self.conversation.max_sessions == 0 {
            return Err("conversation.max_sessions must be > 0".into());
        }
        if self.llm.base_url.trim().is_empty() {
            return Err("llm.base_url must not be empty".into());
        }
        if self.llm.model.trim().is_empty() {
            return Err("llm.model must not be empty".into());
        }
        Ok(())
    }

    /// Load config from a JSON file, falling back to defaults for missing fields.
    pub fn from_file(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file: {}", e))?;
        let config: Self = serde_json::from_str(&content)
            .map_err(|e| format!("Failed to parse config: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("campus-rag")
            .join("config.json")
    }

    /// Config from `default_path()` when present, defaults otherwise.
    pub fn load_or_default() -> Result<Self, String> {
        let path = Self::default_path();
        if path.exists() {
            Self::from_file(&path)
        } else {
            Ok(Self::default())
        }
    }
}
