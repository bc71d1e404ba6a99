//! Retrieval and generation settings derived from the retrieval multiplier.
//!
//! Every field scales with the multiplier and is clamped to a hard ceiling.
//! The ceilings protect a fixed external token budget, so configuration can
//! lower them but never raise them.

use serde::{Deserialize, Serialize};

pub const HARD_MAX_TOKENS: usize = 1500;
pub const HARD_NUM_CTX: usize = 16384;
pub const HARD_RAG_SECTIONS: usize = 40;
pub const HARD_RAG_MAX_TOKENS: usize = 4000;

pub const MIN_MULTIPLIER: f64 = 1.0;
pub const MAX_MULTIPLIER: f64 = 6.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrievalSettings {
    pub max_tokens: usize,
    pub num_ctx: usize,
    pub rag_sections: usize,
    pub rag_max_tokens: usize,
    pub temperature: f32,
    pub description: String,
}

/// Starting point that the multiplier scales up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BaseSettings {
    pub max_tokens: usize,
    pub num_ctx: usize,
    pub rag_sections: usize,
    pub rag_max_tokens: usize,
    pub temperature: f32,
}

impl Default for BaseSettings {
    fn default() -> Self {
        Self {
            max_tokens: 800,
            num_ctx: 4096,
            rag_sections: 15,
            rag_max_tokens: 2000,
            temperature: 0.3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettingsCaps {
    pub max_tokens: usize,
    pub num_ctx: usize,
    pub rag_sections: usize,
    pub rag_max_tokens: usize,
}

impl Default for SettingsCaps {
    fn default() -> Self {
        Self {
            max_tokens: HARD_MAX_TOKENS,
            num_ctx: HARD_NUM_CTX,
            rag_sections: HARD_RAG_SECTIONS,
            rag_max_tokens: HARD_RAG_MAX_TOKENS,
        }
    }
}

impl SettingsCaps {
    /// The configured caps, never above the hard ceilings.
    pub fn effective(&self) -> Self {
        Self {
            max_tokens: self.max_tokens.min(HARD_MAX_TOKENS),
            num_ctx: self.num_ctx.min(HARD_NUM_CTX),
            rag_sections: self.rag_sections.min(HARD_RAG_SECTIONS),
            rag_max_tokens: self.rag_max_tokens.min(HARD_RAG_MAX_TOKENS),
        }
    }

    fn apply(&self, settings: &mut RetrievalSettings) {
        let caps = self.effective();
        settings.max_tokens = settings.max_tokens.min(caps.max_tokens);
        settings.num_ctx = settings.num_ctx.min(caps.num_ctx);
        settings.rag_sections = settings.rag_sections.min(caps.rag_sections);
        settings.rag_max_tokens = settings.rag_max_tokens.min(caps.rag_max_tokens);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettingsPolicy {
    pub base: BaseSettings,
    pub caps: SettingsCaps,
}

impl SettingsPolicy {
    pub fn optimal_settings(&self, multiplier: f64) -> RetrievalSettings {
        let m = clamp_multiplier(multiplier);
        let base = &self.base;
        let mut settings = RetrievalSettings {
            max_tokens: scale(base.max_tokens, m),
            num_ctx: scale(base.num_ctx, m.sqrt()),
            rag_sections: scale(base.rag_sections, m),
            rag_max_tokens: scale(base.rag_max_tokens, m),
            temperature: base.temperature,
            description: describe(m).to_string(),
        };
        self.caps.apply(&mut settings);
        settings
    }

    /// Settings used when no analysis is available.
    pub fn defaults(&self) -> RetrievalSettings {
        self.optimal_settings(MIN_MULTIPLIER)
    }
}

/// Settings for `multiplier` under the default base and hard caps.
pub fn get_optimal_settings(multiplier: f64) -> RetrievalSettings {
    SettingsPolicy::default().optimal_settings(multiplier)
}

/// NaN and out-of-range values land inside [1.0, 6.0].
pub fn clamp_multiplier(multiplier: f64) -> f64 {
    if multiplier.is_nan() {
        return MIN_MULTIPLIER;
    }
    multiplier.clamp(MIN_MULTIPLIER, MAX_MULTIPLIER)
}

fn scale(base: usize, factor: f64) -> usize {
    (base as f64 * factor).round() as usize
}

fn describe(multiplier: f64) -> &'static str {
    if multiplier >= 3.0 {
        "Maximum retrieval: broad listing or comprehensive question"
    } else if multiplier >= 2.0 {
        "High retrieval: multi-topic or enumerating question"
    } else if multiplier >= 1.5 {
        "Moderate retrieval: question touches more than one detail"
    } else {
        "Standard retrieval: focused single-fact question"
    }
}

// ============================================================================
// Override resolution
// ============================================================================

/// Values supplied explicitly by the caller.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SettingsOverrides {
    pub max_tokens: Option<usize>,
    pub temperature: Option<f32>,
    pub num_ctx: Option<usize>,
    pub rag_sections: Option<usize>,
    pub rag_max_tokens: Option<usize>,
}

/// Resolves each field as override, then heuristic, then default, and
/// re-applies the caps to the result.
pub fn resolve_settings(
    overrides: &SettingsOverrides,
    heuristic: Option<&RetrievalSettings>,
    defaults: &RetrievalSettings,
    caps: &SettingsCaps,
) -> RetrievalSettings {
    let fallback = heuristic.unwrap_or(defaults);

    let mut resolved = RetrievalSettings {
        max_tokens: overrides.max_tokens.unwrap_or(fallback.max_tokens),
        num_ctx: overrides.num_ctx.unwrap_or(fallback.num_ctx),
        rag_sections: overrides.rag_sections.unwrap_or(fallback.rag_sections),
        rag_max_tokens: overrides.rag_max_tokens.unwrap_or(fallback.rag_max_tokens),
        temperature: overrides
            .temperature
            .filter(|t| t.is_finite())
            .unwrap_or(fallback.temperature),
        description: fallback.description.clone(),
    };
    caps.apply(&mut resolved);
    resolved
}
