use std::env;
use std::fs;
use std::io::Write;
use std::path::Path;
use std::time::SystemTime;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, info};

use crate::cache::CacheDir;
use crate::cli::{Command, ConfigCommand};
use crate::config::{Configuration, Provider, describe};
use crate::request::PreparedRequest;
use crate::resolve::settings_layer;
use crate::settings::SettingsFile;

/// Runs commands that only touch the settings file.
pub fn run_offline(command: &Command, settings_path: &Path, out: &mut impl Write) -> Result<()> {
    match command {
        Command::Config { action } => run_settings_action(action, settings_path, out),
        _ => Err(anyhow!("command needs a resolved configuration")),
    }
}

fn run_settings_action(
    action: &ConfigCommand,
    settings_path: &Path,
    out: &mut impl Write,
) -> Result<()> {
    match action {
        ConfigCommand::Path => {
            writeln!(out, "{}", settings_path.display())?;
        }
        ConfigCommand::Models => print_models(out)?,
        ConfigCommand::Set { key, value } => {
            let mut file = SettingsFile::load(settings_path)?.unwrap_or_default();
            file.set(key, value)?;
            file.save(settings_path)?;
            info!(key = %key, path = %settings_path.display(), "updated settings file");
            writeln!(out, "Set {key} in {}", settings_path.display())?;
        }
        ConfigCommand::Unset { key } => {
            let mut file = SettingsFile::load(settings_path)?.unwrap_or_default();
            if file.unset(key)? {
                file.save(settings_path)?;
                writeln!(out, "Removed {key} from {}", settings_path.display())?;
            } else {
                writeln!(out, "{key} is not set in {}", settings_path.display())?;
            }
        }
        other => return Err(anyhow!("'config {other:?}' needs a resolved configuration")),
    }
    Ok(())
}

/// Runs `command` against a resolved configuration.
pub fn dispatch(
    command: &Command,
    config: &Configuration,
    settings_path: &Path,
    out: &mut impl Write,
) -> Result<()> {
    if command.requires_credential() {
        config.require_credential()?;
    }

    match command {
        Command::Chat { system } => {
            emit_request(out, &PreparedRequest::chat(config, system.as_deref()))
        }
        Command::Ask { question, system } => emit_request(
            out,
            &PreparedRequest::ask(config, question, system.as_deref()),
        ),
        Command::Code { prompt, language } => emit_request(
            out,
            &PreparedRequest::code(config, prompt, language.as_deref()),
        ),
        Command::Explain {
            code,
            language,
            detail,
        } => {
            let code = read_code_argument(code)?;
            emit_request(
                out,
                &PreparedRequest::explain(config, &code, language.as_deref(), *detail),
            )
        }
        Command::Config { action } => run_config(action, config, settings_path, out),
    }
}

fn emit_request(out: &mut impl Write, request: &PreparedRequest) -> Result<()> {
    info!(
        provider = %request.provider,
        model = %request.model,
        message_count = request.messages.len(),
        "prepared provider request"
    );
    let body =
        serde_json::to_string_pretty(request).context("Failed to serialize prepared request")?;
    writeln!(out, "{body}")?;
    Ok(())
}

/// `@path` reads the code from a file; anything else is the code itself.
fn read_code_argument(arg: &str) -> Result<String> {
    match arg.strip_prefix('@') {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("Failed to read code from '{path}'")),
        None => Ok(arg.to_string()),
    }
}

fn run_config(
    action: &ConfigCommand,
    config: &Configuration,
    settings_path: &Path,
    out: &mut impl Write,
) -> Result<()> {
    match action {
        ConfigCommand::Show { json } => {
            let view = describe(config);
            if *json {
                let body = serde_json::to_string_pretty(&view)
                    .context("Failed to serialize configuration")?;
                writeln!(out, "{body}")?;
            } else {
                write!(out, "{view}")?;
            }
        }
        ConfigCommand::Export { output } => {
            SettingsFile::from_config(config).save(output)?;
            writeln!(out, "Configuration exported to {}", output.display())?;
        }
        ConfigCommand::Import { input } => {
            let imported = SettingsFile::load(input)?
                .ok_or_else(|| anyhow!("Settings file '{}' does not exist", input.display()))?;
            settings_layer(&imported, input)?;

            let existing = SettingsFile::load(settings_path)?.unwrap_or_default();
            existing.overlay(imported).save(settings_path)?;
            info!(
                from = %input.display(),
                to = %settings_path.display(),
                "imported settings"
            );
            writeln!(
                out,
                "Configuration imported from {} into {}",
                input.display(),
                settings_path.display()
            )?;
            writeln!(out, "API keys are never imported; set them in the environment")?;
        }
        ConfigCommand::Cache => {
            let info = cache_dir(config)?.info()?;
            writeln!(out, "directory   {}", info.directory.display())?;
            writeln!(out, "enabled     {}", info.enabled)?;
            writeln!(out, "exists      {}", info.exists)?;
            writeln!(out, "entries     {}", info.entries)?;
            writeln!(out, "total size  {:.2} KB", info.total_bytes as f64 / 1024.0)?;
            writeln!(out, "ttl         {} seconds", info.ttl_seconds)?;
            if let (Some(oldest), Some(newest)) = (info.oldest, info.newest) {
                writeln!(out, "oldest      {}", oldest.to_rfc3339())?;
                writeln!(out, "newest      {}", newest.to_rfc3339())?;
            }
        }
        ConfigCommand::ClearCache { expired } => {
            let cache = cache_dir(config)?;
            let removed = if *expired {
                cache.purge_expired(SystemTime::now())?
            } else {
                cache.clear()?
            };
            writeln!(
                out,
                "Removed {removed} cache entries from {}",
                cache.path().display()
            )?;
        }
        ConfigCommand::Validate => {
            writeln!(
                out,
                "Credentials found for provider '{}'",
                config.provider
            )?;
            if config.cache.enabled {
                let cache = cache_dir(config)?;
                cache.ensure_writable()?;
                writeln!(out, "Cache directory {} is writable", cache.path().display())?;
            } else {
                debug!("cache disabled; skipping writability check");
            }
            writeln!(out, "Configuration is valid")?;
        }
        ConfigCommand::Set { .. }
        | ConfigCommand::Unset { .. }
        | ConfigCommand::Path
        | ConfigCommand::Models => run_settings_action(action, settings_path, out)?,
    }
    Ok(())
}

fn cache_dir(config: &Configuration) -> Result<CacheDir<'_>> {
    let cwd = env::current_dir().context("Failed to determine working directory")?;
    Ok(CacheDir::new(&config.cache, &cwd))
}

fn print_models(out: &mut impl Write) -> Result<()> {
    for provider in Provider::ALL {
        writeln!(out, "{} ({}):", provider.display_name(), provider)?;
        let default = provider.default_model();
        for model in provider.models() {
            if *model == default.as_str() {
                writeln!(out, "  {model} (default)")?;
            } else {
                writeln!(out, "  {model}")?;
            }
        }
    }
    Ok(())
}
