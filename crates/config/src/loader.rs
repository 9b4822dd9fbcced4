use std::path::{Path, PathBuf};

use {
    secrecy::{ExposeSecret, Secret},
    tracing::debug,
};

use crate::{
    Context, Error, Result,
    env_subst::substitute_env_with,
    schema::{ChannelConfig, HeraldConfig},
};

/// Standard config file names, checked in order.
const CONFIG_FILENAMES: &[&str] = &["herald.yml", "herald.yaml", "herald.toml", "herald.json"];

/// System-wide config directory searched after the working directory.
const SYSTEM_CONFIG_DIR: &str = "/etc/herald";

/// Environment variable supplying the SMTP user for email channels.
pub const SMTP_AUTH_USER_ENV: &str = "SMTP_AUTH_USER";

/// Environment variable supplying the SMTP password for email channels.
pub const SMTP_AUTH_PASS_ENV: &str = "SMTP_AUTH_PASS";

/// Load config from the given path (any supported format).
///
/// `${VAR}` placeholders are substituted before parsing and empty SMTP
/// credentials are filled from the environment.
pub fn load_config(path: &Path) -> Result<HeraldConfig> {
    load_config_with(path, |name| std::env::var(name).ok())
}

/// [`load_config`] with an explicit environment lookup.
pub fn load_config_with(
    path: &Path,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<HeraldConfig> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let raw = substitute_env_with(&raw, &lookup);
    let mut config = parse_config(&raw, path)?;
    apply_env_credentials(&mut config, &lookup);
    debug!(path = %path.display(), channels = config.channels.len(), "loaded config");
    Ok(config)
}

/// Parse config text, choosing the format from the file extension.
pub fn parse_config(raw: &str, path: &Path) -> Result<HeraldConfig> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("yml");

    match ext {
        "yaml" | "yml" => Ok(serde_yaml::from_str(raw)?),
        "toml" => Ok(toml::from_str(raw)?),
        "json" => Ok(serde_json::from_str(raw)?),
        _ => Err(Error::unsupported_format(ext)),
    }
}

/// Fill empty email credentials from `SMTP_AUTH_USER` / `SMTP_AUTH_PASS`.
pub fn apply_env_credentials(config: &mut HeraldConfig, lookup: impl Fn(&str) -> Option<String>) {
    let user = lookup(SMTP_AUTH_USER_ENV);
    let pass = lookup(SMTP_AUTH_PASS_ENV);

    for channel in &mut config.channels {
        let ChannelConfig::Email(email) = channel else {
            continue;
        };
        if email.smtp_auth_user.is_empty()
            && let Some(user) = &user
        {
            email.smtp_auth_user = user.clone();
        }
        if email.smtp_auth_pass.expose_secret().is_empty()
            && let Some(pass) = &pass
        {
            email.smtp_auth_pass = Secret::new(pass.clone());
        }
    }
}

/// Resolve the config file to load.
///
/// An explicit path wins. Otherwise `./herald.{yml,yaml,toml,json}` and then
/// `/etc/herald/herald.*` are searched.
pub fn find_config_file(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    let dirs = [PathBuf::from("."), PathBuf::from(SYSTEM_CONFIG_DIR)];
    dirs.iter()
        .flat_map(|dir| CONFIG_FILENAMES.iter().map(move |name| dir.join(name)))
        .find(|p| p.exists())
}
