//! Configuration loading for reverie.
//!
//! Two kinds of configuration live here:
//!
//! - [`ReverieConfig`]: where to send generation requests (`~/.reverie/config.toml`).
//! - [`RuleSet`]: the heuristic rule tables every analyzer is constructed from.
//!
//! ```toml
//! [app]
//! provider = "claude"
//! model = "claude-sonnet-4-5-20250929"
//! rules = "~/.reverie/rules.toml"
//!
//! [api_keys]
//! anthropic = "${ANTHROPIC_API_KEY}"
//!
//! [generation]
//! max_output_tokens = 16000
//! request_timeout_secs = 180
//! max_retries = 2
//! ```

mod rules;

pub use rules::{
    ArcDefinition, DiversityRules, EmergenceRules, MetaphorFamily, MetaphorRules,
    NaturalnessRules, PhraseRule, Principle, QualityThresholds, RuleSet, RuleSetError,
    RuleSetParseError, SuggestionRules,
};

use std::path::{Path, PathBuf};
use std::{env, fs};

use serde::Deserialize;
use thiserror::Error;

use reverie_types::{ApiKey, Provider};

pub const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 16_000;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 180;
pub const DEFAULT_MAX_RETRIES: u32 = 2;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse {path:?}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("invalid rule set in {path:?}: {source}")]
    InvalidRules { path: PathBuf, source: RuleSetError },
    #[error("no API key for {provider:?}: set {env_var} or add it under [api_keys]")]
    MissingApiKey {
        provider: Provider,
        env_var: &'static str,
    },
    #[error("{0}")]
    UnknownProvider(#[from] reverie_types::ProviderParseError),
}

impl ConfigError {
    #[must_use]
    pub fn path(&self) -> Option<&PathBuf> {
        match self {
            ConfigError::Read { path, .. }
            | ConfigError::Parse { path, .. }
            | ConfigError::InvalidRules { path, .. } => Some(path),
            ConfigError::MissingApiKey { .. } | ConfigError::UnknownProvider(_) => None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ReverieConfig {
    pub app: Option<AppConfig>,
    pub api_keys: Option<ApiKeys>,
    pub generation: Option<GenerationConfig>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AppConfig {
    pub provider: Option<String>,
    pub model: Option<String>,
    /// Rule set override; the embedded rules are used when absent.
    pub rules: Option<PathBuf>,
}

#[derive(Default, Deserialize)]
pub struct ApiKeys {
    pub anthropic: Option<String>,
    pub openai: Option<String>,
    pub google: Option<String>,
}

// Manual Debug impl to prevent leaking API keys in logs.
impl std::fmt::Debug for ApiKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fn mask(opt: Option<&String>) -> &'static str {
            if opt.is_some() { "[REDACTED]" } else { "None" }
        }
        f.debug_struct("ApiKeys")
            .field("anthropic", &mask(self.anthropic.as_ref()))
            .field("openai", &mask(self.openai.as_ref()))
            .field("google", &mask(self.google.as_ref()))
            .finish()
    }
}

/// Limits applied to every collaborator call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct GenerationConfig {
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Transport-level retries inside the HTTP client. 0 disables them.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

const fn default_max_output_tokens() -> u32 {
    DEFAULT_MAX_OUTPUT_TOKENS
}

const fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

const fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_output_tokens: DEFAULT_MAX_OUTPUT_TOKENS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

/// Replace `${VAR}` references with environment values; unset variables become empty.
pub fn expand_env_vars(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut i = 0;

    while i < value.len() {
        if value[i..].starts_with("${") {
            let start = i + 2;
            if let Some(end_rel) = value[start..].find('}') {
                let end = start + end_rel;
                let var = &value[start..end];
                if !var.is_empty() {
                    let replacement = env::var(var).unwrap_or_default();
                    out.push_str(&replacement);
                    i = end + 1;
                    continue;
                }
            }
        }

        let Some(ch) = value[i..].chars().next() else {
            break;
        };
        out.push(ch);
        i += ch.len_utf8();
    }

    out
}

impl ReverieConfig {
    /// Load `~/.reverie/config.toml`. A missing file is `Ok(None)`.
    pub fn load() -> Result<Option<Self>, ConfigError> {
        let path = match config_path() {
            Some(path) => path,
            None => return Ok(None),
        };
        if !path.exists() {
            return Ok(None);
        }
        Self::load_from(&path).map(Some)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) => {
                tracing::warn!("Failed to read config at {:?}: {}", path, err);
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source: err,
                });
            }
        };

        match toml::from_str(&content) {
            Ok(config) => Ok(config),
            Err(err) => {
                tracing::warn!("Failed to parse config at {:?}: {}", path, err);
                Err(ConfigError::Parse {
                    path: path.to_path_buf(),
                    source: err,
                })
            }
        }
    }

    #[must_use]
    pub fn path() -> Option<PathBuf> {
        config_path()
    }

    pub fn provider(&self) -> Result<Provider, ConfigError> {
        match self.app.as_ref().and_then(|app| app.provider.as_deref()) {
            Some(raw) => Ok(Provider::parse(raw)?),
            None => Ok(Provider::default()),
        }
    }

    #[must_use]
    pub fn model(&self, provider: Provider) -> String {
        self.app
            .as_ref()
            .and_then(|app| app.model.clone())
            .filter(|model| !model.trim().is_empty())
            .unwrap_or_else(|| provider.default_model().to_string())
    }

    /// Resolve the key for `provider`: config value (with `${VAR}` expansion) first,
    /// then the provider's environment variable.
    pub fn api_key(&self, provider: Provider) -> Result<ApiKey, ConfigError> {
        let configured = self.api_keys.as_ref().and_then(|keys| match provider {
            Provider::Claude => keys.anthropic.as_deref(),
            Provider::OpenAI => keys.openai.as_deref(),
            Provider::Gemini => keys.google.as_deref(),
        });

        configured
            .map(expand_env_vars)
            .filter(|key| !key.trim().is_empty())
            .or_else(|| {
                env::var(provider.env_var())
                    .ok()
                    .filter(|key| !key.trim().is_empty())
            })
            .map(|key| ApiKey::new(provider, key))
            .ok_or(ConfigError::MissingApiKey {
                provider,
                env_var: provider.env_var(),
            })
    }

    #[must_use]
    pub fn generation(&self) -> GenerationConfig {
        self.generation.unwrap_or_default()
    }

    /// The configured rule set, or the embedded one.
    pub fn rules(&self) -> Result<RuleSet, ConfigError> {
        match self.app.as_ref().and_then(|app| app.rules.as_ref()) {
            Some(path) => RuleSet::load(&expand_home(path)),
            None => Ok(RuleSet::builtin().clone()),
        }
    }
}

fn expand_home(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => dirs::home_dir().map_or_else(|| path.to_path_buf(), |home| home.join(rest)),
        Err(_) => path.to_path_buf(),
    }
}

pub fn config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".reverie").join("config.toml"))
}
