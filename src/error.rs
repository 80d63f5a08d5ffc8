// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Error types for the rate limiter API simulator.

use thiserror::Error;

/// Simulator error types
#[derive(Debug, Error)]
pub enum SimulatorError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Response did not contain a rule id")]
    MissingRuleId,

    #[error("Rule {0} not found")]
    RuleNotFound(String),

    #[error("No active session. Create one first.")]
    NoActiveSession,

    #[error("Session {0} not found")]
    SessionNotFound(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SimulatorError {
    /// Response body of a failed API call, if the server sent one.
    pub fn response_body(&self) -> Option<&str> {
        match self {
            Self::Status { body, .. } if !body.is_empty() => Some(body),
            _ => None,
        }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, SimulatorError>;
