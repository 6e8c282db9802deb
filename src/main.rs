//! ciel — field runtime experiments
//!
//! Usage:
//!   ciel run <name> [--steps N] [--out PATH]   → run one built-in, print its metrics line
//!   ciel list                                  → one experiment name per line
//!   ciel config [--config PATH]                → effective runtime config as TOML

use anyhow::Context;
use ciel::cli::{self, Cli, Commands, RunOptions};
use clap::Parser;
use std::io::Write;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            // help and version go to stdout; usage errors to stderr
            let _ = err.print();
            std::process::exit(cli::usage_exit_code(&err));
        }
    };
    init_tracing();

    if let Err(err) = execute(cli.command) {
        eprintln!("error: {:#}", err);
        std::process::exit(cli::exit_code_for(&err));
    }
}

fn execute(command: Commands) -> anyhow::Result<()> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    match command {
        Commands::Run {
            name,
            steps,
            out: path,
            config,
            grid,
            seed,
        } => {
            let opts = RunOptions {
                name,
                steps,
                out: path,
                config,
                grid,
                seed,
            };
            cli::run_experiment(&opts, |key| std::env::var(key).ok(), &mut out)
                .with_context(|| format!("experiment {}", opts.name))?;
        }
        Commands::List => cli::list_experiments(&mut out)?,
        Commands::Config { config } => cli::show_config(config.as_deref(), &mut out)?,
    }
    out.flush()?;
    Ok(())
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ciel=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
