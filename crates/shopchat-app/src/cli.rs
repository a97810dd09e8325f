//! CLI argument definitions for the shopchat binary.
//!
//! Priority resolution: CLI args > env vars > config file > defaults.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use shopchat_core::{ShopchatConfig, ShopchatError};

/// shopchat: a terminal shopping assistant backed by a remote search service.
#[derive(Parser, Debug)]
#[command(name = "shopchat", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// Base URL of the search backend (e.g. http://127.0.0.1:8000).
    #[arg(short = 'u', long = "base-url")]
    pub base_url: Option<String>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level")]
    pub log_level: Option<String>,

    /// Disable ANSI styling.
    #[arg(long = "no-color")]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Interactive chat (default).
    Chat,
    /// Ask a single question and print the reply.
    Ask {
        /// The query; multiple words are joined with spaces.
        #[arg(required = true)]
        query: Vec<String>,
    },
    /// List the product catalog in server order.
    Catalog,
    /// Check that the search backend is reachable.
    Ping,
}

impl CliArgs {
    /// The subcommand to run, defaulting to interactive chat.
    pub fn command(&self) -> Command {
        self.command.clone().unwrap_or(Command::Chat)
    }

    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > SHOPCHAT_CONFIG env var > ~/.shopchat/config.toml.
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Ok(p) = std::env::var("SHOPCHAT_CONFIG") {
            return PathBuf::from(p);
        }
        default_config_path()
    }

    /// Read `path` and apply overrides on top of it.
    ///
    /// A missing or malformed file falls back to defaults; the load error is
    /// handed back so it can be logged once tracing is initialized.
    pub fn load_config(&self, path: &Path) -> (ShopchatConfig, Option<ShopchatError>) {
        let (mut config, error) = match ShopchatConfig::load(path) {
            Ok(config) => (config, None),
            Err(e) => (ShopchatConfig::default(), Some(e)),
        };
        self.apply_overrides(&mut config);
        (config, error)
    }

    /// Apply flag and environment overrides on top of the loaded file.
    pub fn apply_overrides(&self, config: &mut ShopchatConfig) {
        self.apply_overrides_with_env(config, std::env::var("SHOPCHAT_BASE_URL").ok());
    }

    fn apply_overrides_with_env(&self, config: &mut ShopchatConfig, env_base_url: Option<String>) {
        if let Some(url) = self.base_url.clone().or(env_base_url) {
            config.search.base_url = url;
        }
        if let Some(ref level) = self.log_level {
            config.general.log_level = level.clone();
        }
        if self.no_color {
            config.display.color = false;
        }
    }
}

/// Default config file path for the current platform.
fn default_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    if let Ok(home) = std::env::var("USERPROFILE") {
        return PathBuf::from(home).join(".shopchat").join("config.toml");
    }
    #[cfg(not(target_os = "windows"))]
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".shopchat").join("config.toml");
    }
    PathBuf::from("config.toml")
}
