use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

use crate::error::ConfigError;

pub const DEFAULT_PROVIDER: Provider = Provider::OpenAi;
pub const DEFAULT_TEMPERATURE: f64 = 0.7;
pub const DEFAULT_MAX_TOKENS: u32 = 4000;
pub const DEFAULT_CACHE_DIR: &str = ".cache";
pub const DEFAULT_CACHE_TTL_SECS: u64 = 3600;
pub const MIN_TEMPERATURE: f64 = 0.0;
pub const MAX_TEMPERATURE: f64 = 2.0;

pub const SECRET_MASK: &str = "********";
pub const NOT_SET: &str = "(not set)";

const OPENAI_MODELS: &[&str] = &[
    "gpt-4",
    "gpt-4-turbo",
    "gpt-4-turbo-preview",
    "gpt-4o",
    "gpt-4o-mini",
    "gpt-3.5-turbo",
    "gpt-3.5-turbo-16k",
];

const ANTHROPIC_MODELS: &[&str] = &[
    "claude-3-opus-20240229",
    "claude-3-sonnet-20240229",
    "claude-3-haiku-20240307",
    "claude-3-5-sonnet-20241022",
    "claude-3-5-haiku-20241022",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    OpenAi,
    Anthropic,
}

impl Provider {
    pub const ALL: [Provider; 2] = [Provider::OpenAi, Provider::Anthropic];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Anthropic => "anthropic",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::OpenAi => "OpenAI",
            Self::Anthropic => "Anthropic",
        }
    }

    pub fn api_key_env(&self) -> &'static str {
        match self {
            Self::OpenAi => "OPENAI_API_KEY",
            Self::Anthropic => "ANTHROPIC_API_KEY",
        }
    }

    /// Literal value the shipped env template uses for this provider's key.
    pub fn api_key_placeholder(&self) -> &'static str {
        match self {
            Self::OpenAi => "your_openai_api_key_here",
            Self::Anthropic => "your_anthropic_api_key_here",
        }
    }

    pub fn models(&self) -> &'static [&'static str] {
        match self {
            Self::OpenAi => OPENAI_MODELS,
            Self::Anthropic => ANTHROPIC_MODELS,
        }
    }

    pub fn default_model(&self) -> ModelId {
        match self {
            Self::OpenAi => ModelId("gpt-4"),
            Self::Anthropic => ModelId("claude-3-sonnet-20240229"),
        }
    }

    /// Looks `name` up in this provider's allow-list.
    pub fn model(&self, name: &str) -> Option<ModelId> {
        let name = name.trim();
        self.models()
            .iter()
            .copied()
            .find(|known| known.eq_ignore_ascii_case(name))
            .map(ModelId)
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "openai" => Some(Self::OpenAi),
            "anthropic" => Some(Self::Anthropic),
            _ => None,
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A model identifier that is known to belong to a provider's allow-list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ModelId(&'static str);

impl ModelId {
    pub fn as_str(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warning,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warning => "WARNING",
            Self::Error => "ERROR",
        }
    }

    /// Directive understood by `tracing_subscriber::EnvFilter`.
    pub fn filter_directive(&self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warning => "warn",
            Self::Error => "error",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "DEBUG" => Some(Self::Debug),
            "INFO" => Some(Self::Info),
            "WARNING" => Some(Self::Warning),
            "ERROR" => Some(Self::Error),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl LogFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pretty => "pretty",
            Self::Json => "json",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pretty" => Some(Self::Pretty),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Default,
    Dark,
    Light,
}

impl Theme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Dark => "dark",
            Self::Light => "light",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "default" => Some(Self::Default),
            "dark" => Some(Self::Dark),
            "light" => Some(Self::Light),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct LoggingSettings {
    pub level: LogLevel,
    pub file: Option<PathBuf>,
    pub format: LogFormat,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UiSettings {
    pub syntax_highlighting: bool,
    pub markdown_rendering: bool,
    pub theme: Theme,
}

impl Default for UiSettings {
    fn default() -> Self {
        Self {
            syntax_highlighting: true,
            markdown_rendering: true,
            theme: Theme::Default,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheSettings {
    pub enabled: bool,
    pub directory: PathBuf,
    pub ttl_seconds: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            directory: PathBuf::from(DEFAULT_CACHE_DIR),
            ttl_seconds: DEFAULT_CACHE_TTL_SECS,
        }
    }
}

/// API key material. `Debug` and `Display` never print the value.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretKey(String);

impl SecretKey {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Raw key, for handing to a provider client.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretKey({SECRET_MASK})")
    }
}

impl fmt::Display for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(SECRET_MASK)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApiKeys {
    entries: BTreeMap<Provider, SecretKey>,
}

impl ApiKeys {
    pub fn get(&self, provider: Provider) -> Option<&SecretKey> {
        self.entries.get(&provider)
    }

    pub fn contains(&self, provider: Provider) -> bool {
        self.entries.contains_key(&provider)
    }

    pub(crate) fn insert(&mut self, provider: Provider, key: SecretKey) {
        self.entries.insert(provider, key);
    }
}

/// Validated settings for one invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct Configuration {
    pub provider: Provider,
    pub model: ModelId,
    pub temperature: f64,
    pub max_tokens: u32,
    pub api_keys: ApiKeys,
    pub openai_org_id: Option<String>,
    pub logging: LoggingSettings,
    pub ui: UiSettings,
    pub cache: CacheSettings,
    pub verbose: bool,
}

impl Configuration {
    /// Key for the selected provider, or `MissingCredential`.
    pub fn require_credential(&self) -> Result<&SecretKey, ConfigError> {
        self.api_keys
            .get(self.provider)
            .ok_or(ConfigError::MissingCredential {
                provider: self.provider,
            })
    }

    /// `--verbose` forces debug output regardless of `LOG_LEVEL`.
    pub fn effective_log_level(&self) -> LogLevel {
        if self.verbose {
            LogLevel::Debug
        } else {
            self.logging.level
        }
    }
}

/// Display form of a [`Configuration`] with every secret masked.
#[derive(Debug, Clone, Serialize)]
pub struct RedactedConfig {
    pub provider: Provider,
    pub model: ModelId,
    pub temperature: f64,
    pub max_tokens: u32,
    pub api_keys: BTreeMap<&'static str, &'static str>,
    pub openai_org_id: Option<String>,
    pub logging: LoggingSettings,
    pub ui: UiSettings,
    pub cache: CacheSettings,
}

pub fn describe(config: &Configuration) -> RedactedConfig {
    let api_keys = Provider::ALL
        .iter()
        .map(|provider| {
            let shown = if config.api_keys.contains(*provider) {
                SECRET_MASK
            } else {
                NOT_SET
            };
            (provider.as_str(), shown)
        })
        .collect();

    RedactedConfig {
        provider: config.provider,
        model: config.model,
        temperature: config.temperature,
        max_tokens: config.max_tokens,
        api_keys,
        openai_org_id: config.openai_org_id.clone(),
        logging: config.logging.clone(),
        ui: config.ui.clone(),
        cache: config.cache.clone(),
    }
}

impl RedactedConfig {
    fn rows(&self) -> Vec<(String, String)> {
        let path_or_unset = |path: Option<&PathBuf>| {
            path.map(|p| p.display().to_string())
                .unwrap_or_else(|| NOT_SET.to_string())
        };

        let mut rows = vec![
            ("provider".to_string(), self.provider.to_string()),
            ("model".to_string(), self.model.to_string()),
            ("temperature".to_string(), self.temperature.to_string()),
            ("max_tokens".to_string(), self.max_tokens.to_string()),
        ];
        rows.extend(
            self.api_keys
                .iter()
                .map(|(provider, shown)| (format!("api_keys.{provider}"), shown.to_string())),
        );
        rows.extend([
            (
                "openai_org_id".to_string(),
                self.openai_org_id
                    .clone()
                    .unwrap_or_else(|| NOT_SET.to_string()),
            ),
            (
                "logging.level".to_string(),
                self.logging.level.as_str().to_string(),
            ),
            (
                "logging.file".to_string(),
                path_or_unset(self.logging.file.as_ref()),
            ),
            (
                "logging.format".to_string(),
                self.logging.format.as_str().to_string(),
            ),
            (
                "ui.syntax_highlighting".to_string(),
                self.ui.syntax_highlighting.to_string(),
            ),
            (
                "ui.markdown_rendering".to_string(),
                self.ui.markdown_rendering.to_string(),
            ),
            ("ui.theme".to_string(), self.ui.theme.as_str().to_string()),
            ("cache.enabled".to_string(), self.cache.enabled.to_string()),
            (
                "cache.directory".to_string(),
                self.cache.directory.display().to_string(),
            ),
            (
                "cache.ttl_seconds".to_string(),
                self.cache.ttl_seconds.to_string(),
            ),
        ]);
        rows
    }
}

impl fmt::Display for RedactedConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rows = self.rows();
        let width = rows.iter().map(|(key, _)| key.len()).max().unwrap_or(0);
        for (key, value) in rows {
            writeln!(f, "{key:<width$}  {value}")?;
        }
        Ok(())
    }
}
