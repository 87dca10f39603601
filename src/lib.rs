pub mod cache;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod logging;
pub mod request;
pub mod resolve;
pub mod settings;

use std::env;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use cli::Cli;
use error::{ConfigError, EXIT_FAILURE};
use resolve::ConfigResolver;
use settings::SETTINGS_ENV;

const DEFAULT_ENV_FILE: &str = ".env";

/// Parses the process arguments, runs the command and maps failures to exit
/// codes.
pub fn run() -> ExitCode {
    let cli = Cli::parse();
    let mut stdout = io::stdout().lock();

    match execute(&cli, &mut stdout) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let _ = stdout.flush();
            eprintln!("aicli: {err:#}");
            ExitCode::from(exit_code_for(&err))
        }
    }
}

pub fn execute(cli: &Cli, out: &mut impl Write) -> Result<()> {
    load_env_file(cli.global.env_file.as_deref())?;
    let settings_path =
        settings::locate(cli.global.settings.as_deref(), env::var(SETTINGS_ENV).ok());

    if cli.command.is_offline() {
        return commands::run_offline(&cli.command, &settings_path, out);
    }

    let config = ConfigResolver::new(settings_path.clone()).resolve(&cli.global.overrides())?;
    let _log_guard = logging::init(&config);
    info!(
        provider = %config.provider,
        model = %config.model,
        settings = %settings_path.display(),
        "loaded runtime configuration"
    );

    commands::dispatch(&cli.command, &config, &settings_path, out)
}

/// Loads an env-file into the process environment. Variables that are
/// already set keep their values.
fn load_env_file(explicit: Option<&Path>) -> Result<(), ConfigError> {
    match explicit {
        Some(path) => dotenvy::from_path(path).map_err(|source| ConfigError::EnvFile {
            path: path.to_path_buf(),
            source,
        }),
        None => match dotenvy::dotenv() {
            Ok(_) => Ok(()),
            Err(err) if err.not_found() => Ok(()),
            Err(source) => Err(ConfigError::EnvFile {
                path: PathBuf::from(DEFAULT_ENV_FILE),
                source,
            }),
        },
    }
}

fn exit_code_for(err: &anyhow::Error) -> u8 {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<ConfigError>())
        .map(ConfigError::exit_code)
        .unwrap_or(EXIT_FAILURE)
}
