//! CLI configuration: thin wrapper around `perfdesk_config` that applies
//! `GlobalOpts` overrides (--api-url, --token, --insecure, --timeout).

use std::time::Duration;

use clap::ValueEnum;
use secrecy::SecretString;

use perfdesk_api::{ClientConfig, TlsMode, TransportConfig};

use crate::cli::{GlobalOpts, OutputFormat};
use crate::error::CliError;

pub use perfdesk_config::{
    Config, Defaults, Profile, config_path, load_config, resolve_token, save_config, store_token,
    transport_for,
};

/// Resolve the active profile name from CLI flags and config.
pub fn active_profile_name(global: &GlobalOpts, config: &Config) -> String {
    global
        .profile
        .clone()
        .or_else(|| config.default_profile.clone())
        .unwrap_or_else(|| "default".into())
}

/// `--output`, else `defaults.output` from the config, else table.
pub fn output_format(global: &GlobalOpts, config: &Config) -> OutputFormat {
    global.output.unwrap_or_else(|| {
        <OutputFormat as ValueEnum>::from_str(&config.defaults.output, true)
            .unwrap_or(OutputFormat::Table)
    })
}

/// Build the client settings for the active profile, with flag overrides.
///
/// With no matching profile the URL and token must come from flags or
/// environment alone.
pub fn client_config(global: &GlobalOpts, config: &Config) -> Result<ClientConfig, CliError> {
    let profile_name = active_profile_name(global, config);

    let Some(profile) = config.profiles.get(&profile_name) else {
        if global.profile.is_some() {
            return Err(CliError::ProfileNotFound {
                name: profile_name,
                available: available_profiles(config),
            });
        }
        return flags_only(global, config, &profile_name);
    };

    let url_str = global.api_url.as_deref().unwrap_or(&profile.api_url);
    let token = match &global.token {
        Some(token) => SecretString::from(token.clone()),
        None => resolve_token(profile, &profile_name)?,
    };

    let transport = with_flag_overrides(global, transport_for(profile, &config.defaults));

    Ok(ClientConfig {
        url: parse_url(url_str)?,
        token,
        transport,
    })
}

fn flags_only(
    global: &GlobalOpts,
    config: &Config,
    profile_name: &str,
) -> Result<ClientConfig, CliError> {
    let url_str = global.api_url.as_deref().ok_or_else(|| CliError::NoConfig {
        path: config_path().display().to_string(),
    })?;
    let token = global
        .token
        .clone()
        .map(SecretString::from)
        .ok_or_else(|| CliError::NoCredentials {
            profile: profile_name.into(),
        })?;

    let transport = with_flag_overrides(global, transport_for(&Profile::default(), &config.defaults));

    Ok(ClientConfig {
        url: parse_url(url_str)?,
        token,
        transport,
    })
}

fn with_flag_overrides(global: &GlobalOpts, mut transport: TransportConfig) -> TransportConfig {
    if global.insecure {
        transport.tls = TlsMode::DangerAcceptInvalid;
    }
    if let Some(secs) = global.timeout {
        transport.timeout = Duration::from_secs(secs);
    }
    transport
}

fn parse_url(raw: &str) -> Result<url::Url, CliError> {
    raw.parse().map_err(|_| CliError::Validation {
        field: "api_url".into(),
        reason: format!("invalid URL: {raw}"),
    })
}

pub fn available_profiles(config: &Config) -> String {
    if config.profiles.is_empty() {
        "(none)".into()
    } else {
        config.profiles.keys().cloned().collect::<Vec<_>>().join(", ")
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use clap::Parser;
    use secrecy::ExposeSecret;

    use super::*;
    use crate::cli::Cli;

    fn global(args: &[&str]) -> GlobalOpts {
        let mut argv = vec!["perfdesk"];
        argv.extend_from_slice(args);
        argv.push("whoami");
        Cli::try_parse_from(argv).unwrap().global
    }

    fn with_profile() -> Config {
        let mut cfg = Config::default();
        cfg.profiles.insert(
            "default".into(),
            Profile {
                api_url: "https://hr.example.com/api".into(),
                token: Some("from-config".into()),
                timeout: Some(12),
                ..Profile::default()
            },
        );
        cfg
    }

    #[test]
    fn flags_override_profile() {
        let g = global(&["--api-url", "https://other.example.com", "--token", "t", "-k"]);
        let client = client_config(&g, &with_profile()).unwrap();
        assert_eq!(client.url.as_str(), "https://other.example.com/");
        assert_eq!(client.token.expose_secret(), "t");
        assert_eq!(client.transport.tls, TlsMode::DangerAcceptInvalid);
        assert_eq!(client.transport.timeout, Duration::from_secs(12));
    }

    #[test]
    fn explicit_unknown_profile_errors() {
        let g = global(&["--profile", "prod"]);
        let err = client_config(&g, &with_profile()).unwrap_err();
        assert!(matches!(err, CliError::ProfileNotFound { ref available, .. } if available == "default"));
    }

    #[test]
    fn no_profile_and_no_url_is_no_config() {
        let g = global(&[]);
        let err = client_config(&g, &Config::default()).unwrap_err();
        assert!(matches!(err, CliError::NoConfig { .. }));
    }

    #[test]
    fn output_falls_back_to_config_default() {
        let mut cfg = Config::default();
        cfg.defaults.output = "yaml".into();
        assert_eq!(output_format(&global(&[]), &cfg), OutputFormat::Yaml);
        assert_eq!(output_format(&global(&["-o", "plain"]), &cfg), OutputFormat::Plain);

        cfg.defaults.output = "bogus".into();
        assert_eq!(output_format(&global(&[]), &cfg), OutputFormat::Table);
    }
}
