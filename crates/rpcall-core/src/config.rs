// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Configuration loading from environment variables.

use std::time::Duration;

use crate::projection::DEFAULT_MAX_DEPTH;

/// Which argument view is logged when a call starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgumentLogging {
    /// Arguments are not logged.
    Off,
    /// Plain view with secure fields replaced by the sentinel.
    Redacted,
    /// Plain view, unredacted. Only for trusted log sinks.
    Full,
}

impl ArgumentLogging {
    fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "off" | "none" => Some(Self::Off),
            "redacted" => Some(Self::Redacted),
            "full" => Some(Self::Full),
            _ => None,
        }
    }
}

/// Method call runtime configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Maximum argument tree depth accepted by projections
    pub max_argument_depth: usize,
    /// Dispatch timeout; `None` disables it
    pub call_timeout: Option<Duration>,
    /// Argument view logged at call start
    pub argument_logging: ArgumentLogging,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_argument_depth: DEFAULT_MAX_DEPTH,
            call_timeout: Some(Duration::from_millis(30_000)),
            argument_logging: ArgumentLogging::Redacted,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Optional (with defaults):
    /// - `RPCALL_MAX_ARGUMENT_DEPTH`: Maximum argument tree depth (default: 64)
    /// - `RPCALL_CALL_TIMEOUT_MS`: Dispatch timeout in milliseconds, 0 disables (default: 30000)
    /// - `RPCALL_ARGUMENT_LOGGING`: `off`, `redacted` or `full` (default: redacted)
    pub fn from_env() -> Result<Self, ConfigError> {
        let max_argument_depth: usize = std::env::var("RPCALL_MAX_ARGUMENT_DEPTH")
            .unwrap_or_else(|_| DEFAULT_MAX_DEPTH.to_string())
            .parse::<usize>()
            .ok()
            .filter(|depth| *depth >= 1)
            .ok_or(ConfigError::Invalid(
                "RPCALL_MAX_ARGUMENT_DEPTH",
                "must be a positive integer",
            ))?;

        let call_timeout_ms: u64 = std::env::var("RPCALL_CALL_TIMEOUT_MS")
            .unwrap_or_else(|_| "30000".to_string())
            .parse()
            .map_err(|_| {
                ConfigError::Invalid("RPCALL_CALL_TIMEOUT_MS", "must be a non-negative integer")
            })?;

        let argument_logging = match std::env::var("RPCALL_ARGUMENT_LOGGING") {
            Ok(value) => ArgumentLogging::parse(&value).ok_or(ConfigError::Invalid(
                "RPCALL_ARGUMENT_LOGGING",
                "must be one of off, redacted, full",
            ))?,
            Err(_) => ArgumentLogging::Redacted,
        };

        Ok(Self {
            max_argument_depth,
            call_timeout: (call_timeout_ms > 0).then(|| Duration::from_millis(call_timeout_ms)),
            argument_logging,
        })
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// An environment variable has an invalid value.
    #[error("invalid value for {0}: {1}")]
    Invalid(&'static str, &'static str),
}
