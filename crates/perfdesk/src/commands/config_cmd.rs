//! Config subcommand handlers. None of these need a server connection.

use dialoguer::{Input, Password, Select};

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts, OutputFormat};
use crate::config::{self, Config, Profile};
use crate::error::CliError;
use crate::output;

use super::util;

const MASK: &str = "****";

// ── Helpers ─────────────────────────────────────────────────────────

/// Copy of the config with plaintext tokens masked.
fn redacted(cfg: &Config) -> Config {
    let mut out = cfg.clone();
    for profile in out.profiles.values_mut() {
        if profile.token.is_some() {
            profile.token = Some(MASK.into());
        }
    }
    out
}

fn render_config(cfg: &Config, format: OutputFormat) -> Result<String, CliError> {
    let masked = redacted(cfg);
    match format {
        OutputFormat::Table | OutputFormat::Plain => toml::to_string_pretty(&masked)
            .map_err(|e| CliError::Serialize(e.to_string())),
        other => output::render_single(other, &masked, |_| String::new(), |_| String::new()),
    }
}

fn validate_url(input: &str) -> Result<(), String> {
    url::Url::parse(input)
        .map(|_| ())
        .map_err(|e| format!("not a valid URL: {e}"))
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(args: ConfigArgs, global: &GlobalOpts, cfg: Config) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Show => {
            let format = config::output_format(global, &cfg);
            let out = render_config(&cfg, format)?;
            output::print_output(&out, global.quiet);
            if !global.quiet {
                eprintln!("# {}", config::config_path().display());
            }
            Ok(())
        }

        ConfigCommand::Init => init(global, cfg),

        ConfigCommand::SetToken { profile } => {
            let name = profile.unwrap_or_else(|| config::active_profile_name(global, &cfg));
            let token = Password::new()
                .with_prompt(format!("API token for '{name}'"))
                .interact()
                .map_err(util::prompt_err)?;
            config::store_token(&name, &token)?;
            if !global.quiet {
                eprintln!("Token stored in the system keyring for profile '{name}'");
            }
            Ok(())
        }
    }
}

fn init(global: &GlobalOpts, mut cfg: Config) -> Result<(), CliError> {
    let name: String = Input::new()
        .with_prompt("Profile name")
        .default(config::active_profile_name(global, &cfg))
        .interact_text()
        .map_err(util::prompt_err)?;

    if cfg.profiles.contains_key(&name)
        && !util::confirm(&format!("Profile '{name}' exists. Overwrite?"), global.yes)?
    {
        return Ok(());
    }

    let api_url: String = Input::new()
        .with_prompt("API base URL")
        .validate_with(|input: &String| validate_url(input))
        .interact_text()
        .map_err(util::prompt_err)?;

    let token = Password::new()
        .with_prompt("API token")
        .interact()
        .map_err(util::prompt_err)?;

    let storage = Select::new()
        .with_prompt("Where should the token be stored?")
        .items(&[
            "System keyring (recommended)",
            "Config file (plaintext)",
        ])
        .default(0)
        .interact()
        .map_err(util::prompt_err)?;

    let mut profile = Profile {
        api_url,
        ..Profile::default()
    };
    if storage == 0 {
        config::store_token(&name, &token)?;
    } else {
        profile.token = Some(token);
    }

    if cfg.default_profile.is_none() || cfg.profiles.is_empty() {
        cfg.default_profile = Some(name.clone());
    }
    cfg.profiles.insert(name.clone(), profile);

    let path = config::save_config(&cfg)?;
    if !global.quiet {
        eprintln!("Profile '{name}' saved to {}", path.display());
    }
    Ok(())
}
