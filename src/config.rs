use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Config file looked up (optionally) in the working directory
pub const CONFIG_FILE: &str = "merchant-portal";

/// Environment prefix, e.g. MERCHANT_PORTAL_BIND_ADDR
pub const ENV_PREFIX: &str = "MERCHANT_PORTAL";

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct PortalConfig {
    /// Address the HTTP server binds to
    pub bind_addr: String,
    /// SQLite database file
    pub database_path: PathBuf,
    /// Default tracing filter when RUST_LOG is unset
    pub log_level: String,
    /// Emit logs as JSON lines
    pub log_json: bool,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:3000".to_string(),
            database_path: PathBuf::from("merchants.db"),
            log_level: "info".to_string(),
            log_json: false,
        }
    }
}

impl PortalConfig {
    /// Defaults, then `merchant-portal.{toml,json,...}` if present, then env
    pub fn load() -> Result<Self> {
        Self::build(Some(CONFIG_FILE), ENV_PREFIX)
    }

    fn build(file_name: Option<&str>, prefix: &str) -> Result<Self> {
        let defaults = PortalConfig::default();

        let mut builder = Config::builder()
            .set_default("bind_addr", defaults.bind_addr)?
            .set_default("database_path", defaults.database_path.to_string_lossy().to_string())?
            .set_default("log_level", defaults.log_level)?
            .set_default("log_json", defaults.log_json)?;

        if let Some(name) = file_name {
            builder = builder.add_source(File::with_name(name).required(false));
        }

        builder
            .add_source(Environment::with_prefix(prefix).try_parsing(true))
            .build()
            .context("Failed to build configuration")?
            .try_deserialize()
            .context("Invalid configuration")
    }
}
