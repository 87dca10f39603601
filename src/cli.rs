use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::request::DetailLevel;
use crate::resolve::CliOverrides;

/// Entry point for the `aicli` command-line interface.
#[derive(Debug, Parser)]
#[command(
    name = "aicli",
    about = "Query LLM providers from the command line",
    version,
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[command(flatten)]
    pub global: GlobalArgs,
}

#[derive(Debug, Clone, Default, Args)]
pub struct GlobalArgs {
    /// AI provider to use (openai or anthropic)
    #[arg(short = 'p', long, global = true)]
    pub provider: Option<String>,

    /// Model to use; must belong to the selected provider
    #[arg(short = 'm', long, global = true)]
    pub model: Option<String>,

    /// Sampling temperature (0.0-2.0)
    #[arg(short = 't', long, global = true, allow_hyphen_values = true)]
    pub temperature: Option<String>,

    /// Maximum tokens for the response
    #[arg(long, global = true, allow_hyphen_values = true)]
    pub max_tokens: Option<String>,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub verbose: bool,

    /// Env-file to load before reading the environment (default: ./.env)
    #[arg(long, global = true, value_name = "PATH")]
    pub env_file: Option<PathBuf>,

    /// Settings file location (default: $AICLI_SETTINGS, then the user config directory)
    #[arg(long, global = true, value_name = "PATH")]
    pub settings: Option<PathBuf>,
}

impl GlobalArgs {
    pub fn overrides(&self) -> CliOverrides {
        CliOverrides {
            provider: self.provider.clone(),
            model: self.model.clone(),
            temperature: self.temperature.clone(),
            max_tokens: self.max_tokens.clone(),
            verbose: self.verbose,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start a chat session
    Chat {
        /// System prompt for the session
        #[arg(short = 's', long)]
        system: Option<String>,
    },

    /// Ask a single question
    Ask {
        /// The question to ask
        question: String,

        /// System prompt to use
        #[arg(short = 's', long)]
        system: Option<String>,
    },

    /// Generate code from a prompt
    Code {
        /// The code generation prompt
        prompt: String,

        /// Programming language to use
        #[arg(short = 'l', long)]
        language: Option<String>,
    },

    /// Explain a piece of code
    Explain {
        /// The code to explain, or @path to read it from a file
        code: String,

        /// Programming language of the code
        #[arg(short = 'l', long)]
        language: Option<String>,

        /// How much detail to go into
        #[arg(short = 'd', long, value_enum, default_value_t = DetailLevel::Normal)]
        detail: DetailLevel,
    },

    /// Manage configuration settings
    Config {
        #[command(subcommand)]
        action: ConfigCommand,
    },
}

impl Command {
    /// Whether the command talks to a provider and therefore needs a key.
    pub fn requires_credential(&self) -> bool {
        match self {
            Self::Chat { .. } | Self::Ask { .. } | Self::Code { .. } | Self::Explain { .. } => true,
            Self::Config { action } => matches!(action, ConfigCommand::Validate),
        }
    }

    /// Settings maintenance that must keep working even when the current
    /// settings do not resolve.
    pub fn is_offline(&self) -> bool {
        matches!(
            self,
            Self::Config {
                action: ConfigCommand::Set { .. }
                    | ConfigCommand::Unset { .. }
                    | ConfigCommand::Path
                    | ConfigCommand::Models
            }
        )
    }
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show the resolved configuration with secrets masked
    Show {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// List the models available for each provider
    Models,

    /// Print the settings file location
    Path,

    /// Store a value in the settings file
    Set { key: String, value: String },

    /// Remove a value from the settings file
    Unset { key: String },

    /// Write the resolved non-secret configuration to a file
    Export { output: PathBuf },

    /// Merge a settings file into the user settings file
    Import { input: PathBuf },

    /// Show cache directory information
    Cache,

    /// Delete cached responses
    ClearCache {
        /// Only delete entries older than the cache TTL
        #[arg(long)]
        expired: bool,
    },

    /// Check credentials and cache directory
    Validate,
}
