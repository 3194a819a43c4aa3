//! `stride` command line.
//!
//! Inspects and resets the persisted step count, and drives the engine
//! against the simulated platform.

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "stride")]
#[command(about = "Persisted step counter", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the persisted step count
    Show {
        /// Layered config paths in merge order
        #[arg(long = "config")]
        config_paths: Vec<String>,
    },

    /// Set the persisted step count to zero
    Reset {
        /// Layered config paths in merge order
        #[arg(long = "config")]
        config_paths: Vec<String>,
    },

    /// Activate the engine on a simulated pedometer and walk
    Simulate {
        /// Layered config paths in merge order
        #[arg(long = "config")]
        config_paths: Vec<String>,

        /// Steps to take; repeat for several bursts
        #[arg(long = "walk")]
        walks: Vec<u64>,

        /// Simulate a platform that keeps history, starting with this many
        /// steps in the lookback window
        #[arg(long)]
        history: Option<u64>,

        /// Simulate a user who has blocked motion permission
        #[arg(long, default_value_t = false)]
        blocked: bool,

        /// Fail on config keys nothing reads instead of warning
        #[arg(long, default_value_t = false)]
        strict: bool,
    },

    /// Compute layered config hash + print canonical JSON
    ConfigHash {
        /// Paths in merge order
        #[arg(required = true)]
        paths: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Silent if the file does not exist.
    let _ = dotenvy::from_filename(".env.local");

    init_tracing();

    let cli = Cli::parse();

    match cli.cmd {
        Commands::Show { config_paths } => {
            let ctx = commands::load_context(&config_paths, false)?;
            let count = commands::show(&ctx).await?;
            println!("{}", commands::readout(count));
        }

        Commands::Reset { config_paths } => {
            let ctx = commands::load_context(&config_paths, false)?;
            commands::reset(&ctx).await?;
            println!("reset {}", ctx.store_path.display());
        }

        Commands::Simulate {
            config_paths,
            walks,
            history,
            blocked,
            strict,
        } => {
            let ctx = commands::load_context(&config_paths, strict)?;
            let outcome = commands::simulate(
                &ctx,
                commands::SimulateArgs {
                    walks,
                    history,
                    blocked,
                },
            )
            .await?;
            println!("mode={}", outcome.mode);
            println!("{}", commands::readout(outcome.total));
        }

        Commands::ConfigHash { paths } => {
            let path_refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
            let loaded = stride_config::load_layered_yaml(&path_refs)?;
            println!("config_hash={}", loaded.config_hash);
            println!("{}", loaded.canonical_json);
        }
    }

    Ok(())
}

fn init_tracing() {
    // Logs go to stderr; stdout carries command output only.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();
}
