//! Persistent user settings stored as TOML.
//!
//! The file only ever holds non-secret fields. API keys are rejected both when
//! parsing (unknown field) and when editing through [`SettingsFile::set`].

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::config::{Configuration, Provider};
use crate::error::{ConfigError, Origin};
use crate::resolve::{
    check_max_tokens, check_temperature, parse_bool, parse_log_format, parse_log_level,
    parse_provider, parse_theme, parse_ttl,
};

pub const SETTINGS_ENV: &str = "AICLI_SETTINGS";
const SETTINGS_DIR_NAME: &str = "aicli";
const SETTINGS_FILE_NAME: &str = "settings.toml";

pub const SETTING_KEYS: &[&str] = &[
    "provider",
    "model",
    "temperature",
    "max_tokens",
    "logging.level",
    "logging.file",
    "logging.format",
    "ui.syntax_highlighting",
    "ui.markdown_rendering",
    "ui.theme",
    "cache.enabled",
    "cache.directory",
    "cache.ttl_seconds",
];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SettingsFile {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<i64>,
    #[serde(default, skip_serializing_if = "LoggingSection::is_empty")]
    pub logging: LoggingSection,
    #[serde(default, skip_serializing_if = "UiSection::is_empty")]
    pub ui: UiSection,
    #[serde(default, skip_serializing_if = "CacheSection::is_empty")]
    pub cache: CacheSection,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

impl LoggingSection {
    fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UiSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub syntax_highlighting: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub markdown_rendering: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub theme: Option<String>,
}

impl UiSection {
    fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CacheSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub directory: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttl_seconds: Option<i64>,
}

impl CacheSection {
    fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

/// Settings location: an explicit path, then `AICLI_SETTINGS`, then the
/// platform config directory.
pub fn locate(explicit: Option<&Path>, env_value: Option<String>) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }
    if let Some(value) = env_value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) {
        return PathBuf::from(value);
    }
    default_path()
}

pub fn default_path() -> PathBuf {
    let config_dir = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
    config_dir.join(SETTINGS_DIR_NAME).join(SETTINGS_FILE_NAME)
}

impl SettingsFile {
    /// Reads the file at `path`. A missing file is `Ok(None)`.
    pub fn load(path: &Path) -> Result<Option<Self>, ConfigError> {
        if !path.exists() {
            return Ok(None);
        }

        let contents = fs::read_to_string(path).map_err(|source| ConfigError::SettingsFileIo {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(path, &contents).map(Some)
    }

    pub fn parse(path: &Path, contents: &str) -> Result<Self, ConfigError> {
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }

        toml::from_str(contents).map_err(|err| {
            let (line, column) = err
                .span()
                .map(|span| line_and_column(contents, span.start))
                .unwrap_or((1, 1));
            ConfigError::SettingsFileParse {
                path: path.to_path_buf(),
                line,
                column,
                message: err.message().trim().to_string(),
            }
        })
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let io_error = |source| ConfigError::SettingsFileIo {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_error)?;
        }
        let body = toml::to_string_pretty(self).map_err(|err| io_error(std::io::Error::other(err)))?;
        fs::write(path, body).map_err(io_error)
    }

    /// Non-secret snapshot of a resolved configuration.
    pub fn from_config(config: &Configuration) -> Self {
        Self {
            provider: Some(config.provider.as_str().to_string()),
            model: Some(config.model.as_str().to_string()),
            temperature: Some(config.temperature),
            max_tokens: Some(i64::from(config.max_tokens)),
            logging: LoggingSection {
                level: Some(config.logging.level.as_str().to_string()),
                file: config.logging.file.clone(),
                format: Some(config.logging.format.as_str().to_string()),
            },
            ui: UiSection {
                syntax_highlighting: Some(config.ui.syntax_highlighting),
                markdown_rendering: Some(config.ui.markdown_rendering),
                theme: Some(config.ui.theme.as_str().to_string()),
            },
            cache: CacheSection {
                enabled: Some(config.cache.enabled),
                directory: Some(config.cache.directory.clone()),
                ttl_seconds: Some(config.cache.ttl_seconds as i64),
            },
        }
    }

    /// Fields set in `other` replace the ones in `self`.
    pub fn overlay(self, other: Self) -> Self {
        Self {
            provider: other.provider.or(self.provider),
            model: other.model.or(self.model),
            temperature: other.temperature.or(self.temperature),
            max_tokens: other.max_tokens.or(self.max_tokens),
            logging: LoggingSection {
                level: other.logging.level.or(self.logging.level),
                file: other.logging.file.or(self.logging.file),
                format: other.logging.format.or(self.logging.format),
            },
            ui: UiSection {
                syntax_highlighting: other.ui.syntax_highlighting.or(self.ui.syntax_highlighting),
                markdown_rendering: other.ui.markdown_rendering.or(self.ui.markdown_rendering),
                theme: other.ui.theme.or(self.ui.theme),
            },
            cache: CacheSection {
                enabled: other.cache.enabled.or(self.cache.enabled),
                directory: other.cache.directory.or(self.cache.directory),
                ttl_seconds: other.cache.ttl_seconds.or(self.cache.ttl_seconds),
            },
        }
    }

    /// Validates `raw` for `key` and stores its canonical form.
    pub fn set(&mut self, key: &str, raw: &str) -> Result<(), ConfigError> {
        let origin = Origin::Argument(key.to_string());
        let key = canonical_key(key)?;
        let raw = raw.trim();

        match key {
            "provider" => {
                self.provider = Some(parse_provider(raw, &origin)?.as_str().to_string());
            }
            "model" => self.model = Some(parse_known_model(raw, &origin)?),
            "temperature" => {
                let value = raw.parse::<f64>().map_err(|_| {
                    ConfigError::invalid("temperature", raw, &origin, "a number in 0.0..=2.0")
                })?;
                self.temperature = Some(check_temperature(value, &origin)?);
            }
            "max_tokens" => {
                let value = raw.parse::<i64>().map_err(|_| {
                    ConfigError::invalid("max_tokens", raw, &origin, "a positive integer")
                })?;
                self.max_tokens = Some(i64::from(check_max_tokens(value, &origin)?));
            }
            "logging.level" => {
                self.logging.level = Some(parse_log_level(raw, &origin)?.as_str().to_string());
            }
            "logging.file" => {
                self.logging.file = Some(raw)
                    .filter(|value| !value.is_empty())
                    .map(PathBuf::from);
            }
            "logging.format" => {
                self.logging.format = Some(parse_log_format(raw, &origin)?.as_str().to_string());
            }
            "ui.syntax_highlighting" => {
                self.ui.syntax_highlighting = Some(parse_bool(key, raw, &origin)?);
            }
            "ui.markdown_rendering" => {
                self.ui.markdown_rendering = Some(parse_bool(key, raw, &origin)?);
            }
            "ui.theme" => self.ui.theme = Some(parse_theme(raw, &origin)?.as_str().to_string()),
            "cache.enabled" => self.cache.enabled = Some(parse_bool(key, raw, &origin)?),
            "cache.directory" => {
                if raw.is_empty() {
                    return Err(ConfigError::invalid(
                        "cache.directory",
                        raw,
                        &origin,
                        "a non-empty path",
                    ));
                }
                self.cache.directory = Some(PathBuf::from(raw));
            }
            "cache.ttl_seconds" => {
                self.cache.ttl_seconds = Some(parse_ttl(raw, &origin)? as i64);
            }
            other => {
                return Err(ConfigError::UnknownSetting {
                    key: other.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Removes `key`. Returns whether a value was present.
    pub fn unset(&mut self, key: &str) -> Result<bool, ConfigError> {
        let key = canonical_key(key)?;
        let was_set = match key {
            "provider" => self.provider.take().is_some(),
            "model" => self.model.take().is_some(),
            "temperature" => self.temperature.take().is_some(),
            "max_tokens" => self.max_tokens.take().is_some(),
            "logging.level" => self.logging.level.take().is_some(),
            "logging.file" => self.logging.file.take().is_some(),
            "logging.format" => self.logging.format.take().is_some(),
            "ui.syntax_highlighting" => self.ui.syntax_highlighting.take().is_some(),
            "ui.markdown_rendering" => self.ui.markdown_rendering.take().is_some(),
            "ui.theme" => self.ui.theme.take().is_some(),
            "cache.enabled" => self.cache.enabled.take().is_some(),
            "cache.directory" => self.cache.directory.take().is_some(),
            "cache.ttl_seconds" => self.cache.ttl_seconds.take().is_some(),
            other => {
                return Err(ConfigError::UnknownSetting {
                    key: other.to_string(),
                });
            }
        };
        Ok(was_set)
    }
}

fn canonical_key(key: &str) -> Result<&'static str, ConfigError> {
    let normalized = key.trim().to_ascii_lowercase();
    if is_secret_key(&normalized) {
        return Err(ConfigError::SecretSetting {
            key: key.to_string(),
        });
    }
    SETTING_KEYS
        .iter()
        .copied()
        .find(|known| *known == normalized)
        .ok_or_else(|| ConfigError::UnknownSetting {
            key: key.to_string(),
        })
}

fn is_secret_key(normalized: &str) -> bool {
    normalized.starts_with("api_keys")
        || normalized.ends_with("api_key")
        || Provider::ALL
            .iter()
            .any(|provider| provider.api_key_env().eq_ignore_ascii_case(normalized))
}

fn parse_known_model(raw: &str, origin: &Origin) -> Result<String, ConfigError> {
    Provider::ALL
        .iter()
        .find_map(|provider| provider.model(raw))
        .map(|model| model.as_str().to_string())
        .ok_or_else(|| {
            let known: Vec<&str> = Provider::ALL
                .iter()
                .flat_map(|provider| provider.models().iter().copied())
                .collect();
            ConfigError::invalid("model", raw, origin, format!("one of: {}", known.join(", ")))
        })
}

fn line_and_column(contents: &str, offset: usize) -> (usize, usize) {
    let offset = offset.min(contents.len());
    let before = &contents[..offset];
    let line = before.matches('\n').count() + 1;
    let column = match before.rfind('\n') {
        Some(newline) => offset - newline,
        None => offset + 1,
    };
    (line, column)
}
