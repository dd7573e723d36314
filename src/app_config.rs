//! Configuration resolution for the CLI: config file, flags, environment.

use std::env;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use newsbinder_core::BinderConfig;

use crate::cli::Args;

/// Environment variable holding the archive username.
pub const USERNAME_ENV: &str = "NEWSBINDER_USERNAME";

/// Environment variable holding the archive password.
pub const PASSWORD_ENV: &str = "NEWSBINDER_PASSWORD";

/// Loaded config metadata.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// Config path that was considered, if any.
    pub path: Option<PathBuf>,
    /// Effective configuration.
    pub config: BinderConfig,
    /// Indicates whether configuration was loaded from disk.
    pub loaded_from_file: bool,
}

/// Resolves default config path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/newsbinder/config.toml`
/// 2. `$HOME/.config/newsbinder/config.toml`
#[must_use]
pub fn resolve_default_config_path() -> Option<PathBuf> {
    if let Some(xdg_config_home) = env_var_non_empty_os("XDG_CONFIG_HOME") {
        return Some(
            PathBuf::from(xdg_config_home)
                .join("newsbinder")
                .join("config.toml"),
        );
    }

    let home = env_var_non_empty_os("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join("newsbinder")
            .join("config.toml"),
    )
}

fn env_var_non_empty_os(name: &str) -> Option<std::ffi::OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}

/// Loads the config named on the command line, or the default file if present.
///
/// An explicitly named file must exist; a missing default file means built-in
/// defaults.
pub fn load_config(explicit: Option<&Path>) -> Result<LoadedConfig> {
    if let Some(path) = explicit {
        if !path.exists() {
            bail!("Config file '{}' does not exist", path.display());
        }
        return Ok(LoadedConfig {
            path: Some(path.to_path_buf()),
            config: load_file(path)?,
            loaded_from_file: true,
        });
    }

    let path = resolve_default_config_path();
    match path.as_deref() {
        Some(default_path) if default_path.exists() => Ok(LoadedConfig {
            config: load_file(default_path)?,
            path,
            loaded_from_file: true,
        }),
        _ => Ok(LoadedConfig {
            path,
            config: BinderConfig::default(),
            loaded_from_file: false,
        }),
    }
}

fn load_file(path: &Path) -> Result<BinderConfig> {
    BinderConfig::load(path)
        .with_context(|| format!("Failed to load config file '{}'", path.display()))
}

/// Applies command line overrides and re-validates.
pub fn apply_cli_overrides(config: &mut BinderConfig, args: &Args) -> Result<()> {
    if let Some(edition) = &args.edition {
        config.editions.desired.clone_from(edition);
    }
    if let Some(edition) = &args.default_edition {
        config.editions.default.clone_from(edition);
    }
    if let Some(dir) = &args.output_dir {
        config.output.directory.clone_from(dir);
    }
    if args.weekday {
        config.output.include_weekday = true;
    }
    config
        .validate()
        .context("Invalid configuration after applying command line options")
}

/// Fills credentials from the environment; set variables win over the file.
pub fn apply_env_credentials(config: &mut BinderConfig) {
    apply_credentials_from(config, |name| env::var(name).ok());
}

fn apply_credentials_from(config: &mut BinderConfig, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(username) = lookup(USERNAME_ENV).filter(|v| !v.is_empty()) {
        config.credentials.username = Some(username);
    }
    if let Some(password) = lookup(PASSWORD_ENV).filter(|v| !v.is_empty()) {
        config.credentials.password = Some(password);
    }
}
