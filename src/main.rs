// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Rate Limiter API Simulator
//!
//! Drives a remote rate-limiter configuration API with simulated
//! configurator sessions.
//!
//! ## Usage
//!
//! 1. **Scripted run** (default): two sessions create, update and reorder
//!    rules, then clean up after themselves.
//!
//! 2. **Load test**: `load` runs rotations of concurrent session
//!    lifecycles on a bounded worker pool.
//!
//! ## Configuration
//!
//! Flags override environment variables, which override the optional JSON
//! config file:
//!
//! - `SIMULATOR_URL`: Base URL of the API
//! - `SIMULATOR_SESSION_HEADER`: Session header name (default: rate-limiter-configurator)
//! - `SIMULATOR_TIMEOUT_SECS`: Per-request timeout (default: 30)
//! - `LOAD_SESSIONS`, `LOAD_WORKERS`, `LOAD_ROTATION_TIMEOUT_SECS`, `LOAD_ROTATIONS`

use clap::{Parser, Subcommand};
use std::io::IsTerminal;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use rate_limiter_simulator::{
    output, scenario, ApiClient, Config, LoadTestDriver, Simulator,
};

#[derive(Parser)]
#[command(name = "rate-limiter-simulator", about = "Rate Limiter API Simulator")]
struct Args {
    /// Base URL of the Rate Limiter API
    #[arg(long, global = true)]
    url: Option<String>,

    /// JSON config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,

    /// Do not print full API responses
    #[arg(long, short, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the scripted create / update / reorder / cleanup sequence
    Run,

    /// Run rotating concurrent session lifecycles
    Load {
        /// Sessions started per rotation
        #[arg(long)]
        sessions: Option<usize>,

        /// Worker pool size
        #[arg(long)]
        workers: Option<usize>,

        /// Seconds to wait for a rotation's workers
        #[arg(long)]
        rotation_timeout: Option<u64>,

        /// Number of rotations (default: until interrupted)
        #[arg(long)]
        rotations: Option<u32>,

        /// Seconds to wait for abandoned workers before the final sweep
        #[arg(long)]
        drain_timeout: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(&args.log_level, args.log_json);

    if !std::io::stdout().is_terminal() {
        output::disable_colors();
    }

    let config = build_config(&args)?;
    config.validate()?;
    info!(
        base_url = %config.trimmed_base_url(),
        session_header = %config.session_header,
        "Loaded configuration"
    );

    output::heading("Rate Limiter API Simulator");
    output::plain(format!("Base URL: {}\n", config.base_url));

    let mut simulator = Simulator::new(ApiClient::new(&config)?, config.print_responses);

    match args.command.unwrap_or(Command::Run) {
        Command::Run => {
            tokio::select! {
                summary = scenario::run(&mut simulator) => {
                    info!(?summary, "Scripted run finished");
                }
                _ = tokio::signal::ctrl_c() => {
                    output::notice("\nSimulation interrupted by user");
                }
            }
        }
        Command::Load { .. } => {
            let driver = LoadTestDriver::new(simulator, config.load.clone());
            tokio::select! {
                _ = driver.run_rotations() => {}
                _ = tokio::signal::ctrl_c() => {
                    output::notice("\nSimulation interrupted by user");
                }
            }
            let report = driver.finish().await;
            output::heading(format!("\n{}", report));
        }
    }

    Ok(())
}

fn init_tracing(default_level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

/// Defaults, then config file and environment, then flags.
fn build_config(args: &Args) -> anyhow::Result<Config> {
    let mut config = Config::load(args.config.as_deref())?;

    if let Some(url) = &args.url {
        config.base_url = url.clone();
    }
    if config.base_url.is_empty() {
        anyhow::bail!("provide --url, SIMULATOR_URL or base_url in the config file");
    }
    if args.quiet {
        config.print_responses = false;
    }

    if let Some(Command::Load {
        sessions,
        workers,
        rotation_timeout,
        rotations,
        drain_timeout,
    }) = &args.command
    {
        if let Some(v) = sessions {
            config.load.sessions_per_rotation = *v;
        }
        if let Some(v) = workers {
            config.load.workers = *v;
        }
        if let Some(v) = rotation_timeout {
            config.load.rotation_timeout_secs = *v;
        }
        if let Some(v) = rotations {
            config.load.rotations = Some(*v);
        }
        if let Some(v) = drain_timeout {
            config.load.drain_timeout_secs = *v;
        }
    }

    Ok(config)
}
