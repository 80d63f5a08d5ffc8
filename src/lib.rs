// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Rate Limiter API Simulator
//!
//! This crate drives a remote rate-limiter configuration API the way a set
//! of independent configurator clients would:
//!
//! - Rule create / read / update / delete
//! - Rule reordering and version revert
//! - Per-session bookkeeping of created rules, for cleanup
//! - A scripted demonstration run
//! - A rotating concurrent load test over a bounded worker pool

pub mod client;
pub mod config;
pub mod error;
pub mod load;
pub mod metrics;
pub mod output;
pub mod rules;
pub mod scenario;
pub mod session;
pub mod simulator;

pub use client::ApiClient;
pub use config::Config;
pub use error::{Result, SimulatorError};
pub use load::LoadTestDriver;
pub use session::{Session, SessionRegistry};
pub use simulator::Simulator;
