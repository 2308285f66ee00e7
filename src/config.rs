// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application configuration loaded from environment variables.
//!
//! A `.env` file in the working directory is read first if present.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::models::DeviceIdentity;
use crate::services::connect::Credentials;
use crate::services::editor::EditOptions;
use crate::services::ledger::KeyStrategy;
use crate::services::monitor::MonitorConfig;
use crate::services::rewriter::{RewritePolicy, SerialPolicy, SourceFilter};

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // --- Garmin Connect ---
    pub garmin_username: Option<String>,
    /// Password login is not supported. When set, authentication failures
    /// say so instead of only pointing at the token directory.
    pub garmin_password: Option<String>,
    /// Directory holding the stored OAuth2 session
    pub token_dir: PathBuf,
    pub api_base: String,
    pub upload_timeout: Duration,

    // --- Processing ---
    /// Wait after a file appears before reading it
    pub settle_delay: Duration,
    pub target_serial_number: Option<u32>,
    pub serial_policy: SerialPolicy,
    /// Source manufacturers whose identity is rewritten
    pub rewrite_sources: SourceFilter,
    pub ledger_key: KeyStrategy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            garmin_username: None,
            garmin_password: None,
            token_dir: PathBuf::from(".garth"),
            api_base: "https://connectapi.garmin.com".to_string(),
            upload_timeout: Duration::from_secs(60),
            settle_delay: Duration::from_secs(5),
            target_serial_number: None,
            serial_policy: SerialPolicy::default(),
            rewrite_sources: SourceFilter::default(),
            ledger_key: KeyStrategy::default(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present
        Self::from_vars(|name| env::var(name).ok())
    }

    /// Build configuration from an arbitrary variable lookup.
    pub fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let var = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        Ok(Self {
            garmin_username: var("GARMIN_USERNAME"),
            garmin_password: var("GARMIN_PASSWORD"),
            token_dir: var("GARMIN_TOKEN_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.token_dir),
            api_base: var("GARMIN_API_BASE").unwrap_or(defaults.api_base),
            upload_timeout: parse_var(&var, "UPLOAD_TIMEOUT_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.upload_timeout),
            settle_delay: parse_var(&var, "SETTLE_DELAY_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.settle_delay),
            target_serial_number: parse_var(&var, "TARGET_SERIAL_NUMBER")?,
            serial_policy: parse_var(&var, "SERIAL_POLICY")?.unwrap_or(defaults.serial_policy),
            rewrite_sources: parse_var(&var, "REWRITE_SOURCES")?
                .unwrap_or(defaults.rewrite_sources),
            ledger_key: parse_var(&var, "LEDGER_KEY")?.unwrap_or(defaults.ledger_key),
        })
    }

    /// The identity written into edited files.
    pub fn target_identity(&self) -> DeviceIdentity {
        DeviceIdentity::EDGE_830.with_serial(self.target_serial_number)
    }

    pub fn credentials(&self) -> Credentials {
        Credentials {
            username: self.garmin_username.clone(),
            password: self.garmin_password.clone(),
            token_dir: self.token_dir.clone(),
        }
    }

    pub fn edit_options(&self, strip_events: bool) -> EditOptions {
        EditOptions {
            policy: RewritePolicy {
                serial: self.serial_policy,
                sources: self.rewrite_sources.clone(),
            },
            strip_events,
        }
    }

    pub fn monitor_config(&self) -> MonitorConfig {
        MonitorConfig {
            settle_delay: self.settle_delay,
            ..Default::default()
        }
    }
}

fn parse_var<T: std::str::FromStr>(
    var: impl Fn(&str) -> Option<String>,
    name: &'static str,
) -> Result<Option<T>, ConfigError> {
    match var(name) {
        None => Ok(None),
        Some(value) => value
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { name, value }),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {name}: '{value}'")]
    Invalid { name: &'static str, value: String },
}
