use anyhow::{Context, Result};
use kvdump_core::config::{DEFAULT_ADDRESS, DEFAULT_DIAL_TIMEOUT, DEFAULT_REQUEST_TIMEOUT};
use kvdump_core::{ConnectionConfig, Credentials};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Optional settings file; command-line flags take precedence
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CliConfig {
    /// etcd endpoint
    pub address: Option<String>,
    /// `username:password` token
    pub user: Option<String>,
    pub dial_timeout_secs: Option<u64>,
    pub request_timeout_secs: Option<u64>,
}

impl CliConfig {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: CliConfig = toml::from_str(&content)
            .with_context(|| format!("Invalid config file: {}", path.display()))?;
        Ok(config)
    }

    /// Resolve connection settings from flags, then this file, then defaults
    pub fn connection(&self, address: Option<&str>, user: Option<&str>) -> Result<ConnectionConfig> {
        let address = address
            .or(self.address.as_deref())
            .unwrap_or(DEFAULT_ADDRESS);
        if address.is_empty() {
            anyhow::bail!("address shouldn't be empty");
        }

        let token = user
            .or(self.user.as_deref())
            .unwrap_or_default();
        let credentials = Credentials::parse(token)?;

        let dial_timeout = self
            .dial_timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_DIAL_TIMEOUT);
        let request_timeout = self
            .request_timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT);

        let config = ConnectionConfig::new(address, credentials)
            .with_dial_timeout(dial_timeout)
            .with_request_timeout(request_timeout);
        config.validate()?;
        Ok(config)
    }
}
