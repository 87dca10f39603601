use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::config::Provider;
use crate::settings::SETTING_KEYS;

pub const EXIT_FAILURE: u8 = 1;
pub const EXIT_SETTINGS_PARSE: u8 = 65;
pub const EXIT_IO: u8 = 74;
pub const EXIT_MISSING_CREDENTIAL: u8 = 77;
pub const EXIT_VALIDATION: u8 = 78;

/// Where a configuration value came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Origin {
    Default,
    SettingsFile(PathBuf),
    Env(&'static str),
    Flag(&'static str),
    Argument(String),
}

impl Origin {
    /// Precedence rank of the layer this origin belongs to. Higher wins.
    pub(crate) fn rank(&self) -> u8 {
        match self {
            Self::Default => 0,
            Self::SettingsFile(_) => 1,
            Self::Env(_) => 2,
            Self::Flag(_) | Self::Argument(_) => 3,
        }
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Default => write!(f, "built-in default"),
            Self::SettingsFile(path) => write!(f, "settings file '{}'", path.display()),
            Self::Env(name) => write!(f, "environment variable {name}"),
            Self::Flag(name) => write!(f, "flag {name}"),
            Self::Argument(name) => write!(f, "argument '{name}'"),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {field} (from {origin}): expected {expected}")]
    Validation {
        field: &'static str,
        value: String,
        origin: Origin,
        expected: String,
    },

    #[error(
        "no usable API key for provider '{provider}': set {} in the environment or in an env-file",
        .provider.api_key_env()
    )]
    MissingCredential { provider: Provider },

    #[error(
        "failed to parse settings file '{}' at line {line}, column {column}: {message}",
        .path.display()
    )]
    SettingsFileParse {
        path: PathBuf,
        line: usize,
        column: usize,
        message: String,
    },

    #[error("failed to access settings file '{}': {source}", .path.display())]
    SettingsFileIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to load env-file '{}': {source}", .path.display())]
    EnvFile {
        path: PathBuf,
        #[source]
        source: dotenvy::Error,
    },

    #[error("cache directory '{}' is not usable: {source}", .path.display())]
    CacheIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unknown setting '{key}' (known settings: {})", SETTING_KEYS.join(", "))]
    UnknownSetting { key: String },

    #[error("'{key}' is a secret; API keys are read from the environment only")]
    SecretSetting { key: String },
}

impl ConfigError {
    pub(crate) fn invalid(
        field: &'static str,
        value: impl Into<String>,
        origin: &Origin,
        expected: impl Into<String>,
    ) -> Self {
        Self::Validation {
            field,
            value: value.into(),
            origin: origin.clone(),
            expected: expected.into(),
        }
    }

    /// Process exit code for this failure.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Validation { .. } | Self::UnknownSetting { .. } | Self::SecretSetting { .. } => {
                EXIT_VALIDATION
            }
            Self::MissingCredential { .. } => EXIT_MISSING_CREDENTIAL,
            Self::SettingsFileParse { .. } => EXIT_SETTINGS_PARSE,
            Self::SettingsFileIo { .. } | Self::EnvFile { .. } | Self::CacheIo { .. } => EXIT_IO,
        }
    }

    /// Name of the configuration field a validation failure is about.
    pub fn field(&self) -> Option<&'static str> {
        match self {
            Self::Validation { field, .. } => Some(field),
            _ => None,
        }
    }
}
