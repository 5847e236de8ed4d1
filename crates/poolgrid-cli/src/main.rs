//! poolgrid — dry-run simulator for the supervisor balancer.
//!
//! # Usage
//!
//! ```text
//! poolgrid simulate scenario.toml --cycles 5
//! poolgrid run scenario.toml --interval-ms 1000
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;
mod scenario;

#[derive(Parser)]
#[command(
    name = "poolgrid",
    about = "PoolGrid — queue worker balancing simulator",
    version,
    propagate_version = true,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run back-to-back balance cycles and print each decision.
    Simulate {
        /// Scenario file (TOML)
        scenario: PathBuf,
        /// Number of cycles to run
        #[arg(short, long, default_value = "5")]
        cycles: u32,
        /// Output format: text or json
        #[arg(short, long, default_value = "text")]
        format: String,
    },
    /// Drive the timer loop (with cooldown) until Ctrl-C.
    Run {
        /// Scenario file (TOML)
        scenario: PathBuf,
        /// Timer interval in milliseconds
        #[arg(long, default_value = "1000")]
        interval_ms: u64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,poolgrid=debug")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Simulate {
            scenario,
            cycles,
            format,
        } => commands::simulate::simulate(&scenario, cycles, &format),
        Commands::Run {
            scenario,
            interval_ms,
        } => commands::run::run(&scenario, interval_ms).await,
    }
}
