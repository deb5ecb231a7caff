//! Core domain types for reverie.
//!
//! This crate contains pure domain types with no IO, no async, and minimal dependencies.
//! Every value here is created per pipeline invocation and discarded once the caller
//! has consumed it; nothing is shared or mutated concurrently.

// Pedantic lint configuration - these are intentional design choices
#![allow(clippy::missing_errors_doc)] // Result-returning functions are self-explanatory

mod context;
mod contract;
mod journey;
mod report;

pub use context::{ClientContext, ClientLevel, EmergenceType, Level, ParseContextError};
pub use contract::{ArcMetadata, ContractStage, GenerationContract};
pub use journey::{
    DimensionOverrides, Journey, JourneyError, MAX_STAGES, MIN_STAGES, Stage, WEIGHT_TOTAL,
};
pub use report::{
    CheckKind, GrammarIssue, GrammarIssueKind, GrammarReport, NATURAL_THRESHOLD, OverusedPattern,
    PatternAnalysis, QualityCheck, QualityReport, Severity,
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// Provider Types
// ============================================================================

/// Supported generation providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    #[default]
    Claude,
    OpenAI,
    Gemini,
}

#[derive(Debug, Error)]
#[error("unknown provider: {0}")]
pub struct ProviderParseError(pub String);

impl Provider {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Claude => "claude",
            Provider::OpenAI => "openai",
            Provider::Gemini => "gemini",
        }
    }

    #[must_use]
    pub fn display_name(&self) -> &'static str {
        match self {
            Provider::Claude => "Claude",
            Provider::OpenAI => "GPT",
            Provider::Gemini => "Gemini",
        }
    }

    #[must_use]
    pub fn env_var(&self) -> &'static str {
        match self {
            Provider::Claude => "ANTHROPIC_API_KEY",
            Provider::OpenAI => "OPENAI_API_KEY",
            Provider::Gemini => "GEMINI_API_KEY",
        }
    }

    /// Model used when the config does not name one.
    #[must_use]
    pub fn default_model(&self) -> &'static str {
        match self {
            Provider::Claude => "claude-sonnet-4-5-20250929",
            Provider::OpenAI => "gpt-5.2",
            Provider::Gemini => "gemini-3-pro-preview",
        }
    }

    /// Parse provider from string.
    pub fn parse(s: &str) -> Result<Self, ProviderParseError> {
        match s.trim().to_lowercase().as_str() {
            "claude" | "anthropic" => Ok(Provider::Claude),
            "openai" | "gpt" | "chatgpt" => Ok(Provider::OpenAI),
            "gemini" | "google" => Ok(Provider::Gemini),
            _ => Err(ProviderParseError(s.to_string())),
        }
    }
}

impl std::str::FromStr for Provider {
    type Err = ProviderParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Provider-scoped API key.
///
/// `Debug` is manually implemented to redact the key value, preventing accidental
/// credential disclosure in logs or error messages.
#[derive(Clone)]
pub enum ApiKey {
    Claude(String),
    OpenAI(String),
    Gemini(String),
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiKey::Claude(_) => write!(f, "ApiKey::Claude(<redacted>)"),
            ApiKey::OpenAI(_) => write!(f, "ApiKey::OpenAI(<redacted>)"),
            ApiKey::Gemini(_) => write!(f, "ApiKey::Gemini(<redacted>)"),
        }
    }
}

impl ApiKey {
    #[must_use]
    pub fn new(provider: Provider, key: impl Into<String>) -> Self {
        let key = key.into();
        match provider {
            Provider::Claude => ApiKey::Claude(key),
            Provider::OpenAI => ApiKey::OpenAI(key),
            Provider::Gemini => ApiKey::Gemini(key),
        }
    }

    #[must_use]
    pub fn provider(&self) -> Provider {
        match self {
            ApiKey::Claude(_) => Provider::Claude,
            ApiKey::OpenAI(_) => Provider::OpenAI,
            ApiKey::Gemini(_) => Provider::Gemini,
        }
    }

    #[must_use]
    pub fn expose_secret(&self) -> &str {
        match self {
            ApiKey::Claude(key) | ApiKey::OpenAI(key) | ApiKey::Gemini(key) => key,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_parse_aliases() {
        assert_eq!(Provider::parse("claude").unwrap(), Provider::Claude);
        assert_eq!(Provider::parse("Anthropic").unwrap(), Provider::Claude);
        assert_eq!(Provider::parse("gpt").unwrap(), Provider::OpenAI);
        assert_eq!(Provider::parse(" google ").unwrap(), Provider::Gemini);
        assert!(Provider::parse("mistral").is_err());
        assert!(Provider::parse("").is_err());
    }

    #[test]
    fn api_key_debug_redacts_value() {
        let key = ApiKey::new(Provider::OpenAI, "sk-secret");
        let rendered = format!("{key:?}");
        assert!(!rendered.contains("sk-secret"));
        assert!(rendered.contains("redacted"));
        assert_eq!(key.provider(), Provider::OpenAI);
        assert_eq!(key.expose_secret(), "sk-secret");
    }
}
