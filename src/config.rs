// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Configuration for the rate limiter API simulator.
//!
//! Values are layered: built-in defaults, then an optional JSON file, then
//! environment variables, then command-line flags (applied by the binary).

use crate::error::{Result, SimulatorError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Configuration for the simulator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the rate limiter API
    #[serde(default)]
    pub base_url: String,

    /// Header used to identify the configurator session
    #[serde(default = "default_session_header")]
    pub session_header: String,

    /// Per-request timeout in seconds (default: 30)
    #[serde(default = "default_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Print full JSON responses to the console (default: true)
    #[serde(default = "default_true")]
    pub print_responses: bool,

    /// Load test configuration
    #[serde(default)]
    pub load: LoadTestConfig,
}

/// Rotating load test configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadTestConfig {
    /// Session lifecycles started per rotation (default: 5)
    #[serde(default = "default_sessions_per_rotation")]
    pub sessions_per_rotation: usize,

    /// Worker pool size (default: 5)
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// How long a rotation waits for its workers, in seconds (default: 30)
    #[serde(default = "default_rotation_timeout_secs")]
    pub rotation_timeout_secs: u64,

    /// Number of rotations; unset runs until interrupted
    #[serde(default)]
    pub rotations: Option<u32>,

    /// How long the final sweep waits for abandoned workers to wind down,
    /// in seconds (default: 30)
    #[serde(default = "default_drain_timeout_secs")]
    pub drain_timeout_secs: u64,
}

fn default_session_header() -> String {
    "rate-limiter-configurator".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_true() -> bool {
    true
}

fn default_sessions_per_rotation() -> usize {
    5
}

fn default_workers() -> usize {
    5
}

fn default_rotation_timeout_secs() -> u64 {
    30
}

fn default_drain_timeout_secs() -> u64 {
    30
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            session_header: default_session_header(),
            request_timeout_secs: default_timeout_secs(),
            print_responses: default_true(),
            load: LoadTestConfig::default(),
        }
    }
}

impl Default for LoadTestConfig {
    fn default() -> Self {
        Self {
            sessions_per_rotation: default_sessions_per_rotation(),
            workers: default_workers(),
            rotation_timeout_secs: default_rotation_timeout_secs(),
            rotations: None,
            drain_timeout_secs: default_drain_timeout_secs(),
        }
    }
}

impl Config {
    /// Load configuration from an optional JSON file, then apply
    /// environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path)?;
                serde_json::from_str(&raw)?
            }
            None => Config::default(),
        };
        config.apply_env();
        Ok(config)
    }

    /// Override fields from environment variables.
    pub fn apply_env(&mut self) {
        if let Ok(url) = std::env::var("SIMULATOR_URL") {
            self.base_url = url;
        }
        if let Ok(header) = std::env::var("SIMULATOR_SESSION_HEADER") {
            self.session_header = header;
        }
        if let Some(v) = env_parse("SIMULATOR_TIMEOUT_SECS") {
            self.request_timeout_secs = v;
        }
        if let Some(v) = env_parse("LOAD_SESSIONS") {
            self.load.sessions_per_rotation = v;
        }
        if let Some(v) = env_parse("LOAD_WORKERS") {
            self.load.workers = v;
        }
        if let Some(v) = env_parse("LOAD_ROTATION_TIMEOUT_SECS") {
            self.load.rotation_timeout_secs = v;
        }
        if let Some(v) = env_parse("LOAD_ROTATIONS") {
            self.load.rotations = Some(v);
        }
        if let Some(v) = env_parse("LOAD_DRAIN_TIMEOUT_SECS") {
            self.load.drain_timeout_secs = v;
        }
    }

    /// Check that the configuration can drive a simulation.
    pub fn validate(&self) -> Result<()> {
        let parsed = url::Url::parse(&self.base_url).map_err(|e| {
            SimulatorError::InvalidConfig(format!("base URL {:?}: {}", self.base_url, e))
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(SimulatorError::InvalidConfig(format!(
                "base URL must be http or https, got {}",
                parsed.scheme()
            )));
        }
        if self.session_header.trim().is_empty() {
            return Err(SimulatorError::InvalidConfig(
                "session header name is empty".to_string(),
            ));
        }
        if self.request_timeout_secs == 0 {
            return Err(SimulatorError::InvalidConfig(
                "request timeout must be positive".to_string(),
            ));
        }
        self.load.validate()
    }

    /// Base URL without trailing slashes.
    pub fn trimmed_base_url(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    /// Get the request timeout duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl LoadTestConfig {
    fn validate(&self) -> Result<()> {
        if self.sessions_per_rotation == 0 {
            return Err(SimulatorError::InvalidConfig(
                "sessions per rotation must be at least 1".to_string(),
            ));
        }
        if self.workers == 0 {
            return Err(SimulatorError::InvalidConfig(
                "worker pool needs at least 1 worker".to_string(),
            ));
        }
        if self.rotation_timeout_secs == 0 {
            return Err(SimulatorError::InvalidConfig(
                "rotation timeout must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Get the rotation deadline duration
    pub fn rotation_timeout(&self) -> Duration {
        Duration::from_secs(self.rotation_timeout_secs)
    }

    pub fn drain_timeout(&self) -> Duration {
        Duration::from_secs(self.drain_timeout_secs)
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}
