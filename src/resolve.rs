use std::env;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::{
    ApiKeys, CacheSettings, Configuration, DEFAULT_MAX_TOKENS, DEFAULT_PROVIDER,
    DEFAULT_TEMPERATURE, LogFormat, LogLevel, LoggingSettings, MAX_TEMPERATURE, MIN_TEMPERATURE,
    Provider, SecretKey, Theme, UiSettings,
};
use crate::error::{ConfigError, Origin};
use crate::settings::SettingsFile;

const OPENAI_ORG_PLACEHOLDER: &str = "your_openai_org_id_here";

/// Values given on the command line for the current invocation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CliOverrides {
    pub provider: Option<String>,
    pub model: Option<String>,
    pub temperature: Option<String>,
    pub max_tokens: Option<String>,
    pub verbose: bool,
}

/// Merges defaults, the settings file, the environment and command-line
/// overrides into one [`Configuration`].
#[derive(Debug, Clone, Default)]
pub struct ConfigResolver {
    settings_path: Option<PathBuf>,
}

impl ConfigResolver {
    pub fn new(settings_path: impl Into<PathBuf>) -> Self {
        Self {
            settings_path: Some(settings_path.into()),
        }
    }

    pub fn without_settings() -> Self {
        Self::default()
    }

    pub fn resolve(&self, overrides: &CliOverrides) -> Result<Configuration, ConfigError> {
        self.resolve_with(overrides, |key| env::var(key).ok())
    }

    pub fn resolve_with(
        &self,
        overrides: &CliOverrides,
        mut get_var: impl FnMut(&str) -> Option<String>,
    ) -> Result<Configuration, ConfigError> {
        let mut merged = Layer::default();

        if let Some(path) = &self.settings_path
            && let Some(file) = SettingsFile::load(path)?
        {
            debug!(path = %path.display(), "applying settings file");
            merged = merged.overlay(settings_layer(&file, path)?);
        }

        merged = merged.overlay(env_layer(&mut get_var)?);
        merged = merged.overlay(cli_layer(overrides)?);

        let config = merged.finalize()?;
        debug!(
            provider = %config.provider,
            model = %config.model,
            temperature = config.temperature,
            max_tokens = config.max_tokens,
            "resolved configuration"
        );
        Ok(config)
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Sourced<T> {
    value: T,
    origin: Origin,
}

impl<T> Sourced<T> {
    fn new(value: T, origin: Origin) -> Self {
        Self { value, origin }
    }
}

/// One precedence layer. Every field is optional; `None` falls through.
#[derive(Debug, Clone, Default)]
pub(crate) struct Layer {
    provider: Option<Sourced<Provider>>,
    model: Option<Sourced<String>>,
    temperature: Option<f64>,
    max_tokens: Option<u32>,
    openai_key: Option<SecretKey>,
    anthropic_key: Option<SecretKey>,
    openai_org_id: Option<String>,
    log_level: Option<LogLevel>,
    log_file: Option<PathBuf>,
    log_format: Option<LogFormat>,
    syntax_highlighting: Option<bool>,
    markdown_rendering: Option<bool>,
    theme: Option<Theme>,
    cache_enabled: Option<bool>,
    cache_dir: Option<PathBuf>,
    cache_ttl: Option<u64>,
    verbose: bool,
}

impl Layer {
    /// Fields set in `higher` replace the ones in `self`.
    fn overlay(self, higher: Layer) -> Layer {
        Layer {
            provider: higher.provider.or(self.provider),
            model: higher.model.or(self.model),
            temperature: higher.temperature.or(self.temperature),
            max_tokens: higher.max_tokens.or(self.max_tokens),
            openai_key: higher.openai_key.or(self.openai_key),
            anthropic_key: higher.anthropic_key.or(self.anthropic_key),
            openai_org_id: higher.openai_org_id.or(self.openai_org_id),
            log_level: higher.log_level.or(self.log_level),
            log_file: higher.log_file.or(self.log_file),
            log_format: higher.log_format.or(self.log_format),
            syntax_highlighting: higher.syntax_highlighting.or(self.syntax_highlighting),
            markdown_rendering: higher.markdown_rendering.or(self.markdown_rendering),
            theme: higher.theme.or(self.theme),
            cache_enabled: higher.cache_enabled.or(self.cache_enabled),
            cache_dir: higher.cache_dir.or(self.cache_dir),
            cache_ttl: higher.cache_ttl.or(self.cache_ttl),
            verbose: higher.verbose || self.verbose,
        }
    }

    fn finalize(self) -> Result<Configuration, ConfigError> {
        let provider = self
            .provider
            .unwrap_or_else(|| Sourced::new(DEFAULT_PROVIDER, Origin::Default));

        let model = match self.model {
            None => provider.value.default_model(),
            Some(model) => match provider.value.model(&model.value) {
                Some(id) => id,
                // A provider chosen at a higher layer brings its own default model.
                None if model.origin.rank() < provider.origin.rank() => {
                    debug!(
                        model = %model.value,
                        model_origin = %model.origin,
                        provider = %provider.value,
                        provider_origin = %provider.origin,
                        "model does not belong to overriding provider; using provider default"
                    );
                    provider.value.default_model()
                }
                None => {
                    return Err(ConfigError::invalid(
                        "model",
                        model.value,
                        &model.origin,
                        format!(
                            "a {} model (one of: {})",
                            provider.value.display_name(),
                            provider.value.models().join(", ")
                        ),
                    ));
                }
            },
        };

        let mut api_keys = ApiKeys::default();
        if let Some(key) = self.openai_key {
            api_keys.insert(Provider::OpenAi, key);
        }
        if let Some(key) = self.anthropic_key {
            api_keys.insert(Provider::Anthropic, key);
        }

        let logging_defaults = LoggingSettings::default();
        let ui_defaults = UiSettings::default();
        let cache_defaults = CacheSettings::default();

        Ok(Configuration {
            provider: provider.value,
            model,
            temperature: self.temperature.unwrap_or(DEFAULT_TEMPERATURE),
            max_tokens: self.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            api_keys,
            openai_org_id: self.openai_org_id,
            logging: LoggingSettings {
                level: self.log_level.unwrap_or(logging_defaults.level),
                file: self.log_file.or(logging_defaults.file),
                format: self.log_format.unwrap_or(logging_defaults.format),
            },
            ui: UiSettings {
                syntax_highlighting: self
                    .syntax_highlighting
                    .unwrap_or(ui_defaults.syntax_highlighting),
                markdown_rendering: self
                    .markdown_rendering
                    .unwrap_or(ui_defaults.markdown_rendering),
                theme: self.theme.unwrap_or(ui_defaults.theme),
            },
            cache: CacheSettings {
                enabled: self.cache_enabled.unwrap_or(cache_defaults.enabled),
                directory: self.cache_dir.unwrap_or(cache_defaults.directory),
                ttl_seconds: self.cache_ttl.unwrap_or(cache_defaults.ttl_seconds),
            },
            verbose: self.verbose,
        })
    }
}

/// Reads `key`, treating unset, empty and whitespace-only values alike.
fn read_var(get_var: &mut impl FnMut(&str) -> Option<String>, key: &str) -> Option<String> {
    get_var(key)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn read_secret(
    get_var: &mut impl FnMut(&str) -> Option<String>,
    provider: Provider,
) -> Option<SecretKey> {
    read_var(get_var, provider.api_key_env())
        .filter(|value| !is_placeholder(value))
        .map(SecretKey::new)
}

/// Any value the shipped env template uses as a placeholder, whichever
/// variable it ended up in.
fn is_placeholder(value: &str) -> bool {
    Provider::ALL
        .iter()
        .map(Provider::api_key_placeholder)
        .chain([OPENAI_ORG_PLACEHOLDER])
        .any(|placeholder| value.eq_ignore_ascii_case(placeholder))
}

fn env_layer(get_var: &mut impl FnMut(&str) -> Option<String>) -> Result<Layer, ConfigError> {
    let mut layer = Layer {
        openai_key: read_secret(get_var, Provider::OpenAi),
        anthropic_key: read_secret(get_var, Provider::Anthropic),
        openai_org_id: read_var(get_var, "OPENAI_ORG_ID").filter(|value| !is_placeholder(value)),
        log_file: read_var(get_var, "LOG_FILE").map(PathBuf::from),
        cache_dir: read_var(get_var, "CACHE_DIR").map(PathBuf::from),
        ..Layer::default()
    };

    if let Some(raw) = read_var(get_var, "DEFAULT_PROVIDER") {
        let origin = Origin::Env("DEFAULT_PROVIDER");
        layer.provider = Some(Sourced::new(parse_provider(&raw, &origin)?, origin));
    }
    if let Some(raw) = read_var(get_var, "DEFAULT_MODEL") {
        layer.model = Some(Sourced::new(raw, Origin::Env("DEFAULT_MODEL")));
    }
    if let Some(raw) = read_var(get_var, "DEFAULT_TEMPERATURE") {
        layer.temperature = Some(parse_temperature(
            &raw,
            &Origin::Env("DEFAULT_TEMPERATURE"),
        )?);
    }
    if let Some(raw) = read_var(get_var, "DEFAULT_MAX_TOKENS") {
        layer.max_tokens = Some(parse_max_tokens(&raw, &Origin::Env("DEFAULT_MAX_TOKENS"))?);
    }
    if let Some(raw) = read_var(get_var, "LOG_LEVEL") {
        layer.log_level = Some(parse_log_level(&raw, &Origin::Env("LOG_LEVEL"))?);
    }
    if let Some(raw) = read_var(get_var, "LOG_FORMAT") {
        layer.log_format = Some(parse_log_format(&raw, &Origin::Env("LOG_FORMAT"))?);
    }
    if let Some(raw) = read_var(get_var, "ENABLE_SYNTAX_HIGHLIGHTING") {
        layer.syntax_highlighting = Some(parse_bool(
            "ui.syntax_highlighting",
            &raw,
            &Origin::Env("ENABLE_SYNTAX_HIGHLIGHTING"),
        )?);
    }
    if let Some(raw) = read_var(get_var, "ENABLE_MARKDOWN_RENDERING") {
        layer.markdown_rendering = Some(parse_bool(
            "ui.markdown_rendering",
            &raw,
            &Origin::Env("ENABLE_MARKDOWN_RENDERING"),
        )?);
    }
    if let Some(raw) = read_var(get_var, "THEME") {
        layer.theme = Some(parse_theme(&raw, &Origin::Env("THEME"))?);
    }
    if let Some(raw) = read_var(get_var, "ENABLE_CACHE") {
        layer.cache_enabled = Some(parse_bool(
            "cache.enabled",
            &raw,
            &Origin::Env("ENABLE_CACHE"),
        )?);
    }
    if let Some(raw) = read_var(get_var, "CACHE_TTL") {
        layer.cache_ttl = Some(parse_ttl(&raw, &Origin::Env("CACHE_TTL"))?);
    }

    Ok(layer)
}

/// Validates a parsed settings file into a layer.
pub(crate) fn settings_layer(file: &SettingsFile, path: &Path) -> Result<Layer, ConfigError> {
    let origin = Origin::SettingsFile(path.to_path_buf());
    let non_empty = |value: &Option<String>| {
        value
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };
    let non_empty_path = |value: &Option<PathBuf>| {
        value
            .clone()
            .filter(|path| !path.as_os_str().is_empty())
    };

    let mut layer = Layer {
        model: non_empty(&file.model).map(|model| Sourced::new(model, origin.clone())),
        log_file: non_empty_path(&file.logging.file),
        syntax_highlighting: file.ui.syntax_highlighting,
        markdown_rendering: file.ui.markdown_rendering,
        cache_enabled: file.cache.enabled,
        cache_dir: non_empty_path(&file.cache.directory),
        ..Layer::default()
    };

    if let Some(raw) = non_empty(&file.provider) {
        layer.provider = Some(Sourced::new(parse_provider(&raw, &origin)?, origin.clone()));
    }
    if let Some(value) = file.temperature {
        layer.temperature = Some(check_temperature(value, &origin)?);
    }
    if let Some(value) = file.max_tokens {
        layer.max_tokens = Some(check_max_tokens(value, &origin)?);
    }
    if let Some(raw) = non_empty(&file.logging.level) {
        layer.log_level = Some(parse_log_level(&raw, &origin)?);
    }
    if let Some(raw) = non_empty(&file.logging.format) {
        layer.log_format = Some(parse_log_format(&raw, &origin)?);
    }
    if let Some(raw) = non_empty(&file.ui.theme) {
        layer.theme = Some(parse_theme(&raw, &origin)?);
    }
    if let Some(value) = file.cache.ttl_seconds {
        layer.cache_ttl = Some(check_ttl(value, &origin)?);
    }

    Ok(layer)
}

fn cli_layer(overrides: &CliOverrides) -> Result<Layer, ConfigError> {
    let non_empty = |value: &Option<String>| {
        value
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };

    let mut layer = Layer {
        model: non_empty(&overrides.model)
            .map(|model| Sourced::new(model, Origin::Flag("--model"))),
        verbose: overrides.verbose,
        ..Layer::default()
    };

    if let Some(raw) = non_empty(&overrides.provider) {
        let origin = Origin::Flag("--provider");
        layer.provider = Some(Sourced::new(parse_provider(&raw, &origin)?, origin));
    }
    if let Some(raw) = non_empty(&overrides.temperature) {
        layer.temperature = Some(parse_temperature(&raw, &Origin::Flag("--temperature"))?);
    }
    if let Some(raw) = non_empty(&overrides.max_tokens) {
        layer.max_tokens = Some(parse_max_tokens(&raw, &Origin::Flag("--max-tokens"))?);
    }

    Ok(layer)
}

pub(crate) fn parse_provider(raw: &str, origin: &Origin) -> Result<Provider, ConfigError> {
    Provider::parse(raw)
        .ok_or_else(|| ConfigError::invalid("provider", raw, origin, "one of: openai, anthropic"))
}

pub(crate) fn parse_temperature(raw: &str, origin: &Origin) -> Result<f64, ConfigError> {
    let value = raw
        .parse::<f64>()
        .map_err(|_| ConfigError::invalid("temperature", raw, origin, "a number in 0.0..=2.0"))?;
    check_temperature(value, origin)
        .map_err(|_| ConfigError::invalid("temperature", raw, origin, "a number in 0.0..=2.0"))
}

pub(crate) fn check_temperature(value: f64, origin: &Origin) -> Result<f64, ConfigError> {
    if (MIN_TEMPERATURE..=MAX_TEMPERATURE).contains(&value) {
        Ok(value)
    } else {
        Err(ConfigError::invalid(
            "temperature",
            value.to_string(),
            origin,
            "a number in 0.0..=2.0",
        ))
    }
}

pub(crate) fn parse_max_tokens(raw: &str, origin: &Origin) -> Result<u32, ConfigError> {
    let value = raw
        .parse::<i64>()
        .map_err(|_| ConfigError::invalid("max_tokens", raw, origin, "a positive integer"))?;
    check_max_tokens(value, origin)
}

pub(crate) fn check_max_tokens(value: i64, origin: &Origin) -> Result<u32, ConfigError> {
    u32::try_from(value)
        .ok()
        .filter(|tokens| *tokens > 0)
        .ok_or_else(|| {
            ConfigError::invalid("max_tokens", value.to_string(), origin, "a positive integer")
        })
}

pub(crate) fn parse_ttl(raw: &str, origin: &Origin) -> Result<u64, ConfigError> {
    let value = raw.parse::<i64>().map_err(|_| {
        ConfigError::invalid("cache.ttl_seconds", raw, origin, "a non-negative integer")
    })?;
    check_ttl(value, origin)
}

pub(crate) fn check_ttl(value: i64, origin: &Origin) -> Result<u64, ConfigError> {
    u64::try_from(value).map_err(|_| {
        ConfigError::invalid(
            "cache.ttl_seconds",
            value.to_string(),
            origin,
            "a non-negative integer",
        )
    })
}

/// Only the literals `true` and `false` are accepted, in any case.
pub(crate) fn parse_bool(
    field: &'static str,
    raw: &str,
    origin: &Origin,
) -> Result<bool, ConfigError> {
    let trimmed = raw.trim();
    if trimmed.eq_ignore_ascii_case("true") {
        Ok(true)
    } else if trimmed.eq_ignore_ascii_case("false") {
        Ok(false)
    } else {
        Err(ConfigError::invalid(field, raw, origin, "true or false"))
    }
}

pub(crate) fn parse_log_level(raw: &str, origin: &Origin) -> Result<LogLevel, ConfigError> {
    LogLevel::parse(raw).ok_or_else(|| {
        ConfigError::invalid(
            "logging.level",
            raw,
            origin,
            "one of: DEBUG, INFO, WARNING, ERROR",
        )
    })
}

pub(crate) fn parse_log_format(raw: &str, origin: &Origin) -> Result<LogFormat, ConfigError> {
    LogFormat::parse(raw)
        .ok_or_else(|| ConfigError::invalid("logging.format", raw, origin, "one of: pretty, json"))
}

pub(crate) fn parse_theme(raw: &str, origin: &Origin) -> Result<Theme, ConfigError> {
    Theme::parse(raw).ok_or_else(|| {
        ConfigError::invalid("ui.theme", raw, origin, "one of: default, dark, light")
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::fs;
    use std::path::PathBuf;

    use super::{CliOverrides, ConfigResolver, parse_bool, parse_max_tokens, parse_ttl};
    use crate::config::{
        Configuration, DEFAULT_CACHE_DIR, DEFAULT_CACHE_TTL_SECS, DEFAULT_MAX_TOKENS,
        DEFAULT_TEMPERATURE, LogFormat, LogLevel, Provider, Theme, describe,
    };
    use crate::error::{ConfigError, Origin};
    use crate::settings::SettingsFile;

    fn resolve_pairs(
        resolver: &ConfigResolver,
        overrides: &CliOverrides,
        pairs: &[(&str, &str)],
    ) -> Result<Configuration, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
            .collect();
        resolver.resolve_with(overrides, |key| vars.get(key).cloned())
    }

    fn config_from_pairs(pairs: &[(&str, &str)]) -> Result<Configuration, ConfigError> {
        resolve_pairs(
            &ConfigResolver::without_settings(),
            &CliOverrides::default(),
            pairs,
        )
    }

    fn resolver_with_settings(body: &str) -> (tempfile::TempDir, ConfigResolver) {
        let dir = tempfile::tempdir().expect("tempdir should be created");
        let path = dir.path().join("settings.toml");
        fs::write(&path, body).expect("settings should be written");
        let resolver = ConfigResolver::new(path);
        (dir, resolver)
    }

    #[test]
    fn resolve_uses_template_defaults_when_vars_are_missing() {
        let cfg = config_from_pairs(&[("DEFAULT_PROVIDER", "openai"), ("OPENAI_API_KEY", "sk-real")])
            .expect("resolution should succeed");

        assert_eq!(cfg.provider, Provider::OpenAi);
        assert_eq!(cfg.model.as_str(), "gpt-4");
        assert_eq!(cfg.temperature, DEFAULT_TEMPERATURE);
        assert_eq!(cfg.max_tokens, DEFAULT_MAX_TOKENS);
        assert_eq!(
            cfg.require_credential().map(|key| key.expose().to_string()).ok(),
            Some("sk-real".to_string())
        );
        assert!(cfg.cache.enabled);
        assert_eq!(cfg.cache.ttl_seconds, DEFAULT_CACHE_TTL_SECS);
        assert_eq!(cfg.cache.directory, PathBuf::from(DEFAULT_CACHE_DIR));
        assert_eq!(cfg.logging.level, LogLevel::Info);
        assert_eq!(cfg.logging.file, None);
        assert!(cfg.ui.syntax_highlighting);
        assert!(cfg.ui.markdown_rendering);
        assert_eq!(cfg.ui.theme, Theme::Default);
    }

    #[test]
    fn resolve_reads_configured_values() {
        let cfg = config_from_pairs(&[
            ("ANTHROPIC_API_KEY", "sk-ant"),
            ("DEFAULT_PROVIDER", "anthropic"),
            ("DEFAULT_MODEL", "claude-3-haiku-20240307"),
            ("DEFAULT_TEMPERATURE", "1.5"),
            ("DEFAULT_MAX_TOKENS", "2000"),
            ("LOG_LEVEL", "warning"),
            ("LOG_FILE", "logs/aicli.log"),
            ("LOG_FORMAT", "json"),
            ("ENABLE_SYNTAX_HIGHLIGHTING", "FALSE"),
            ("ENABLE_MARKDOWN_RENDERING", "false"),
            ("THEME", "dark"),
            ("ENABLE_CACHE", "false"),
            ("CACHE_DIR", "/tmp/aicli"),
            ("CACHE_TTL", "0"),
            ("OPENAI_ORG_ID", "org-123"),
        ])
        .expect("resolution should succeed");

        assert_eq!(cfg.provider, Provider::Anthropic);
        assert_eq!(cfg.model.as_str(), "claude-3-haiku-20240307");
        assert_eq!(cfg.temperature, 1.5);
        assert_eq!(cfg.max_tokens, 2000);
        assert_eq!(cfg.logging.level, LogLevel::Warning);
        assert_eq!(cfg.logging.file, Some(PathBuf::from("logs/aicli.log")));
        assert_eq!(cfg.logging.format, LogFormat::Json);
        assert!(!cfg.ui.syntax_highlighting);
        assert!(!cfg.ui.markdown_rendering);
        assert_eq!(cfg.ui.theme, Theme::Dark);
        assert!(!cfg.cache.enabled);
        assert_eq!(cfg.cache.directory, PathBuf::from("/tmp/aicli"));
        assert_eq!(cfg.cache.ttl_seconds, 0);
        assert_eq!(cfg.openai_org_id.as_deref(), Some("org-123"));
    }

    #[test]
    fn out_of_range_temperature_is_rejected_not_clamped() {
        let err = config_from_pairs(&[("DEFAULT_TEMPERATURE", "3.0")])
            .expect_err("3.0 is out of range");
        assert_eq!(err.field(), Some("temperature"));
        match err {
            ConfigError::Validation { value, origin, .. } => {
                assert_eq!(value, "3.0");
                assert_eq!(origin, Origin::Env("DEFAULT_TEMPERATURE"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn non_numeric_temperature_reports_raw_value() {
        let err = config_from_pairs(&[("DEFAULT_TEMPERATURE", "warm")]).expect_err("not a number");
        assert!(matches!(
            err,
            ConfigError::Validation { field: "temperature", ref value, .. } if value == "warm"
        ));
    }

    #[test]
    fn invalid_boolean_literal_names_cache_enabled() {
        let err = config_from_pairs(&[("ENABLE_CACHE", "yes")]).expect_err("yes is not a bool");
        match err {
            ConfigError::Validation { field, value, .. } => {
                assert_eq!(field, "cache.enabled");
                assert_eq!(value, "yes");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn empty_values_fall_through_to_defaults() {
        let cfg = config_from_pairs(&[
            ("DEFAULT_TEMPERATURE", ""),
            ("ENABLE_CACHE", "   "),
            ("LOG_FILE", ""),
            ("DEFAULT_PROVIDER", ""),
        ])
        .expect("empty values are unset");
        assert_eq!(cfg.temperature, DEFAULT_TEMPERATURE);
        assert!(cfg.cache.enabled);
        assert_eq!(cfg.logging.file, None);
        assert_eq!(cfg.provider, Provider::OpenAi);
    }

    #[test]
    fn unknown_variables_are_ignored() {
        let cfg = config_from_pairs(&[("SOME_FUTURE_SETTING", "42"), ("THEME", "light")])
            .expect("unknown names are ignored");
        assert_eq!(cfg.ui.theme, Theme::Light);
    }

    #[test]
    fn sub_records_merge_per_field() {
        let cfg = config_from_pairs(&[("CACHE_TTL", "60")]).expect("resolution should succeed");
        assert_eq!(cfg.cache.ttl_seconds, 60);
        assert!(cfg.cache.enabled);
        assert_eq!(cfg.cache.directory, PathBuf::from(DEFAULT_CACHE_DIR));
    }

    #[test]
    fn placeholder_keys_are_treated_as_missing() {
        let cfg = config_from_pairs(&[
            ("OPENAI_API_KEY", "your_openai_api_key_here"),
            ("ANTHROPIC_API_KEY", "your_anthropic_api_key_here"),
            ("OPENAI_ORG_ID", "your_openai_org_id_here"),
        ])
        .expect("placeholders do not fail resolution");

        assert!(!cfg.api_keys.contains(Provider::OpenAi));
        assert!(!cfg.api_keys.contains(Provider::Anthropic));
        assert_eq!(cfg.openai_org_id, None);
        assert!(matches!(
            cfg.require_credential(),
            Err(ConfigError::MissingCredential {
                provider: Provider::OpenAi
            })
        ));
    }

    #[test]
    fn another_providers_placeholder_is_not_a_credential() {
        let cfg = config_from_pairs(&[
            ("DEFAULT_PROVIDER", "anthropic"),
            ("ANTHROPIC_API_KEY", "your_openai_api_key_here"),
            ("OPENAI_API_KEY", "YOUR_ANTHROPIC_API_KEY_HERE"),
        ])
        .expect("placeholders do not fail resolution");

        assert!(!cfg.api_keys.contains(Provider::Anthropic));
        assert!(!cfg.api_keys.contains(Provider::OpenAi));
        assert!(matches!(
            cfg.require_credential(),
            Err(ConfigError::MissingCredential {
                provider: Provider::Anthropic
            })
        ));

        let cfg = config_from_pairs(&[("OPENAI_API_KEY", "your_openai_org_id_here")])
            .expect("placeholders do not fail resolution");
        assert!(!cfg.api_keys.contains(Provider::OpenAi));
    }

    #[test]
    fn empty_environment_defaults_to_openai_without_credentials() {
        let cfg = config_from_pairs(&[]).expect("defaults always resolve");
        assert_eq!(cfg.provider, Provider::OpenAi);
        let err = cfg.require_credential().expect_err("no key configured");
        assert_eq!(err.exit_code(), crate::error::EXIT_MISSING_CREDENTIAL);
    }

    #[test]
    fn cli_overrides_win_over_environment() {
        let overrides = CliOverrides {
            provider: Some("anthropic".to_string()),
            model: Some("claude-3-opus-20240229".to_string()),
            temperature: Some("0.1".to_string()),
            max_tokens: Some("128".to_string()),
            verbose: true,
        };
        let cfg = resolve_pairs(
            &ConfigResolver::without_settings(),
            &overrides,
            &[
                ("DEFAULT_PROVIDER", "openai"),
                ("DEFAULT_MODEL", "gpt-4o"),
                ("DEFAULT_TEMPERATURE", "1.9"),
                ("DEFAULT_MAX_TOKENS", "9000"),
                ("LOG_LEVEL", "ERROR"),
            ],
        )
        .expect("resolution should succeed");

        assert_eq!(cfg.provider, Provider::Anthropic);
        assert_eq!(cfg.model.as_str(), "claude-3-opus-20240229");
        assert_eq!(cfg.temperature, 0.1);
        assert_eq!(cfg.max_tokens, 128);
        assert_eq!(cfg.logging.level, LogLevel::Error);
        assert!(cfg.verbose);
        assert_eq!(cfg.effective_log_level(), LogLevel::Debug);
    }

    #[test]
    fn cli_out_of_range_values_name_the_flag() {
        let overrides = CliOverrides {
            temperature: Some("-0.5".to_string()),
            ..CliOverrides::default()
        };
        let err = resolve_pairs(&ConfigResolver::without_settings(), &overrides, &[])
            .expect_err("negative temperature is invalid");
        assert!(matches!(
            err,
            ConfigError::Validation { field: "temperature", origin: Origin::Flag("--temperature"), .. }
        ));

        let overrides = CliOverrides {
            max_tokens: Some("0".to_string()),
            ..CliOverrides::default()
        };
        let err = resolve_pairs(&ConfigResolver::without_settings(), &overrides, &[])
            .expect_err("zero tokens is invalid");
        assert_eq!(err.field(), Some("max_tokens"));
    }

    #[test]
    fn cli_values_that_are_not_numbers_are_validation_errors() {
        for (overrides, field, flag) in [
            (
                CliOverrides {
                    temperature: Some("abc".to_string()),
                    ..CliOverrides::default()
                },
                "temperature",
                "--temperature",
            ),
            (
                CliOverrides {
                    max_tokens: Some("-5".to_string()),
                    ..CliOverrides::default()
                },
                "max_tokens",
                "--max-tokens",
            ),
            (
                CliOverrides {
                    max_tokens: Some("99999999999".to_string()),
                    ..CliOverrides::default()
                },
                "max_tokens",
                "--max-tokens",
            ),
        ] {
            let err = resolve_pairs(&ConfigResolver::without_settings(), &overrides, &[])
                .expect_err("non-numeric flag value is invalid");
            assert_eq!(err.field(), Some(field));
            assert_eq!(err.exit_code(), crate::error::EXIT_VALIDATION);
            assert!(matches!(err, ConfigError::Validation { origin: Origin::Flag(name), .. } if name == flag));
        }
    }

    #[test]
    fn verbose_does_not_rewrite_configured_log_level() {
        let overrides = CliOverrides {
            verbose: true,
            ..CliOverrides::default()
        };
        let cfg = resolve_pairs(
            &ConfigResolver::without_settings(),
            &overrides,
            &[("LOG_LEVEL", "ERROR")],
        )
        .expect("resolution should succeed");

        assert_eq!(cfg.logging.level, LogLevel::Error);
        assert_eq!(cfg.effective_log_level(), LogLevel::Debug);
        assert_eq!(
            SettingsFile::from_config(&cfg).logging.level.as_deref(),
            Some("ERROR")
        );
    }

    #[test]
    fn provider_override_replaces_foreign_lower_layer_model_with_default() {
        let overrides = CliOverrides {
            provider: Some("anthropic".to_string()),
            ..CliOverrides::default()
        };
        let cfg = resolve_pairs(
            &ConfigResolver::without_settings(),
            &overrides,
            &[("DEFAULT_MODEL", "gpt-4o")],
        )
        .expect("provider default model is used");
        assert_eq!(cfg.model, Provider::Anthropic.default_model());
    }

    #[test]
    fn provider_default_model_follows_selected_provider() {
        let cfg = config_from_pairs(&[("DEFAULT_PROVIDER", "anthropic")])
            .expect("resolution should succeed");
        assert_eq!(cfg.model.as_str(), "claude-3-sonnet-20240229");
    }

    #[test]
    fn model_invalid_for_provider_at_same_layer_is_rejected() {
        let err = config_from_pairs(&[
            ("DEFAULT_PROVIDER", "anthropic"),
            ("DEFAULT_MODEL", "gpt-4"),
        ])
        .expect_err("gpt-4 is not an anthropic model");
        assert_eq!(err.field(), Some("model"));

        let err = config_from_pairs(&[("DEFAULT_PROVIDER", "mistral")])
            .expect_err("unknown provider");
        assert_eq!(err.field(), Some("provider"));
    }

    #[test]
    fn settings_file_sits_between_defaults_and_environment() {
        let (_dir, resolver) = resolver_with_settings(
            r#"
temperature = 0.2
max_tokens = 1000

[cache]
enabled = false
ttl_seconds = 10
"#,
        );

        let cfg = resolve_pairs(
            &resolver,
            &CliOverrides::default(),
            &[("CACHE_TTL", "99"), ("DEFAULT_TEMPERATURE", "0.9")],
        )
        .expect("resolution should succeed");

        assert_eq!(cfg.temperature, 0.9);
        assert_eq!(cfg.max_tokens, 1000);
        assert_eq!(cfg.cache.ttl_seconds, 99);
        assert!(!cfg.cache.enabled);
        assert_eq!(cfg.cache.directory, PathBuf::from(DEFAULT_CACHE_DIR));

        let overrides = CliOverrides {
            temperature: Some("1.1".to_string()),
            ..CliOverrides::default()
        };
        let cfg = resolve_pairs(&resolver, &overrides, &[("DEFAULT_TEMPERATURE", "0.9")])
            .expect("resolution should succeed");
        assert_eq!(cfg.temperature, 1.1);
    }

    #[test]
    fn invalid_settings_values_name_the_file() {
        let (dir, resolver) = resolver_with_settings("[ui]\ntheme = \"neon\"\n");
        let err = resolve_pairs(&resolver, &CliOverrides::default(), &[])
            .expect_err("unknown theme");
        match err {
            ConfigError::Validation { field, origin, .. } => {
                assert_eq!(field, "ui.theme");
                assert_eq!(origin, Origin::SettingsFile(dir.path().join("settings.toml")));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn malformed_settings_file_is_not_ignored() {
        let (_dir, resolver) = resolver_with_settings("temperature = \n");
        let err = resolve_pairs(&resolver, &CliOverrides::default(), &[])
            .expect_err("malformed file must fail");
        assert!(matches!(err, ConfigError::SettingsFileParse { line: 1, .. }));
    }

    #[test]
    fn describe_never_contains_raw_key() {
        let cfg = config_from_pairs(&[
            ("OPENAI_API_KEY", "sk-proj-abcdef123456"),
            ("ANTHROPIC_API_KEY", "sk-ant-zyxw9876"),
        ])
        .expect("resolution should succeed");
        let view = describe(&cfg);
        let text = view.to_string();
        let json = serde_json::to_string(&view).expect("view should serialize");
        for secret in ["sk-proj-abcdef123456", "sk-ant-zyxw9876", "3456", "9876"] {
            assert!(!text.contains(secret), "text leaked {secret}:\n{text}");
            assert!(!json.contains(secret), "json leaked {secret}:\n{json}");
        }
        assert!(!format!("{cfg:?}").contains("sk-proj-abcdef123456"));
    }

    #[test]
    fn parse_bool_accepts_only_true_and_false() {
        let origin = Origin::Env("ENABLE_CACHE");
        assert!(parse_bool("cache.enabled", "TRUE", &origin).expect("valid"));
        assert!(!parse_bool("cache.enabled", " false ", &origin).expect("valid"));
        for raw in ["1", "0", "yes", "no", "on", "off"] {
            assert!(parse_bool("cache.enabled", raw, &origin).is_err(), "{raw} accepted");
        }
    }

    #[test]
    fn parse_integers_enforce_bounds() {
        let origin = Origin::Env("X");
        assert_eq!(parse_max_tokens("1", &origin).ok(), Some(1));
        assert!(parse_max_tokens("0", &origin).is_err());
        assert!(parse_max_tokens("-4", &origin).is_err());
        assert!(parse_max_tokens("4.5", &origin).is_err());
        assert!(parse_max_tokens("99999999999", &origin).is_err());
        assert_eq!(parse_ttl("0", &origin).ok(), Some(0));
        assert!(parse_ttl("-1", &origin).is_err());
    }
}
