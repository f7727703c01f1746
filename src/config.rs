//! File-based configuration for the Isolenta server.
//!
//! The configuration is a TOML document listing the listen address and the
//! registered clients. Each client may carry a resource-owner password, which
//! enables the password grant for it.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

use crate::errors::ConfigError;
use crate::oauth::{Client, TokenLifetimes};

/// Default configuration file name
pub const DEFAULT_CONFIG_FILE: &str = "isolenta.toml";

/// Listen address configuration
#[derive(Clone, Debug)]
pub struct ServeAt(String);

/// Positive duration parsed from strings like `1s`, `10m` or `3d`
#[derive(Clone, Copy, Debug)]
pub struct ConfigDuration(Duration);

/// Raw TOML document
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ConfigFile {
    pub serve_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header_read_timeout: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authorization_code_lifetime: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token_lifetime: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token_lifetime: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cleanup_interval: Option<String>,
    #[serde(default, rename = "user")]
    pub users: Vec<UserEntry>,
}

/// One registered client
#[derive(Clone, Serialize, Deserialize)]
pub struct UserEntry {
    pub id: String,
    #[serde(rename = "unsafe-secret", default)]
    pub secret: String,
    #[serde(default)]
    pub domain: String,
    #[serde(
        rename = "unsafe-password",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub password: Option<String>,
}

impl std::fmt::Debug for UserEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserEntry")
            .field("id", &self.id)
            .field("domain", &self.domain)
            .field("has_password", &self.password.is_some())
            .finish_non_exhaustive()
    }
}

impl UserEntry {
    /// The client record and optional resource-owner password for registration
    pub fn registration(&self) -> (Client, Option<String>) {
        (
            Client::new(self.id.clone(), self.secret.clone(), self.domain.clone()),
            self.password.clone().filter(|p| !p.is_empty()),
        )
    }
}

/// Main application configuration
#[derive(Clone, Debug)]
pub struct Config {
    pub serve_at: ServeAt,
    pub header_read_timeout: ConfigDuration,
    pub token_lifetimes: TokenLifetimes,
    pub cleanup_interval: ConfigDuration,
    pub users: Vec<UserEntry>,
}

impl Config {
    /// Load and validate a configuration file
    pub fn load(path: &str) -> Result<Self> {
        let data = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadFailed(path.to_string(), e))?;
        Self::parse(&data, path)
    }

    /// Parse and validate a TOML document; `source` names it in error messages
    pub fn parse(data: &str, source: &str) -> Result<Self> {
        let file: ConfigFile =
            toml::from_str(data).map_err(|e| ConfigError::ParseFailed(source.to_string(), e))?;
        file.try_into()
    }
}

impl TryFrom<ConfigFile> for Config {
    type Error = anyhow::Error;

    fn try_from(file: ConfigFile) -> Result<Self, Self::Error> {
        let serve_at: ServeAt = optional_env("ISOLENTA_SERVE_AT")
            .unwrap_or(file.serve_at)
            .try_into()?;
        let header_read_timeout: ConfigDuration =
            with_default(file.header_read_timeout, "1s").try_into()?;
        let authorization_code_lifetime: ConfigDuration =
            with_default(file.authorization_code_lifetime, "10m").try_into()?;
        let access_token_lifetime: ConfigDuration =
            with_default(file.access_token_lifetime, "2h").try_into()?;
        let refresh_token_lifetime: ConfigDuration =
            with_default(file.refresh_token_lifetime, "3d").try_into()?;
        let cleanup_interval: ConfigDuration =
            with_default(file.cleanup_interval, "1m").try_into()?;

        let mut seen = HashSet::new();
        for (index, user) in file.users.iter().enumerate() {
            if user.id.is_empty() {
                return Err(ConfigError::ClientIdRequired(index).into());
            }
            if !seen.insert(user.id.as_str()) {
                return Err(ConfigError::DuplicateClientId(user.id.clone()).into());
            }
        }

        Ok(Self {
            serve_at,
            header_read_timeout,
            token_lifetimes: TokenLifetimes {
                authorization_code: authorization_code_lifetime.try_into()?,
                access_token: access_token_lifetime.try_into()?,
                refresh_token: refresh_token_lifetime.try_into()?,
            },
            cleanup_interval,
            users: file.users,
        })
    }
}

/// The configuration printed by `--example-config`
pub fn example_config() -> ConfigFile {
    ConfigFile {
        serve_at: "localhost:9478".to_string(),
        header_read_timeout: None,
        authorization_code_lifetime: None,
        access_token_lifetime: None,
        refresh_token_lifetime: None,
        cleanup_interval: None,
        users: vec![UserEntry {
            id: "1234".to_string(),
            secret: "test-secret".to_string(),
            domain: "localhost:8080".to_string(),
            password: Some("test-password".to_string()),
        }],
    }
}

/// Render the example configuration as a TOML document
pub fn example_config_toml() -> Result<String> {
    let data = toml::to_string(&example_config())?;
    Ok(format!("# > {}\n\n{}\n", DEFAULT_CONFIG_FILE, data))
}

pub(crate) fn optional_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.is_empty())
}

fn with_default(value: Option<String>, default_value: &str) -> String {
    value.unwrap_or_else(|| default_value.to_string())
}

impl TryFrom<String> for ServeAt {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let value = value.trim().to_string();
        if value.is_empty() {
            Err(ConfigError::ServeAtRequired)
        } else {
            Ok(Self(value))
        }
    }
}

impl AsRef<str> for ServeAt {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ConfigDuration {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let duration = duration_str::parse(&value)
            .map_err(|e| ConfigError::DurationParsingFailed(value.clone(), e.to_string()))?;
        if duration.is_zero() {
            return Err(ConfigError::DurationNotPositive(value));
        }
        Ok(Self(duration))
    }
}

impl AsRef<Duration> for ConfigDuration {
    fn as_ref(&self) -> &Duration {
        &self.0
    }
}

impl TryFrom<ConfigDuration> for chrono::Duration {
    type Error = anyhow::Error;

    fn try_from(value: ConfigDuration) -> Result<Self, Self::Error> {
        Ok(chrono::Duration::from_std(value.0)?)
    }
}
