// SPDX-License-Identifier: PMPL-1.0-or-later

//! bayzzer: Bayesian-guided directed fuzzing for C programs.
//!
//! Statically derives alarms via a Datalog taint analysis, ranks them
//! with a Bayesian network built from the derivation, and drives a
//! round-based fuzzing campaign against the highest-ranked targets.

mod bayesian;
mod config;
mod diagnostics;
mod errors;
mod frontend;
mod fuzzer;
mod kanren;
mod scheduler;
mod storage;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use std::time::Duration;

macro_rules! qprintln {
    ($quiet:expr, $($arg:tt)+) => {
        if !$quiet {
            println!($($arg)+);
        }
    };
}

#[derive(Parser)]
#[command(name = "bayzzer")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Bayesian-guided directed fuzzing for C programs")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(long, default_value_t = false, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a guided fuzzing campaign against a C source file
    Run {
        /// C source file to analyze and fuzz
        #[arg(long, value_name = "PATH")]
        target: PathBuf,

        /// Total campaign budget in seconds
        #[arg(long, default_value_t = 60)]
        time: u64,

        /// Selection fraction of ranked alarms fuzzed per round
        #[arg(long, default_value_t = 0.25)]
        alpha: f64,

        /// Serialized CampaignStats output path
        #[arg(long, default_value = "results.json")]
        output: PathBuf,

        /// Optional YAML configuration file
        #[arg(long, value_name = "PATH")]
        config: Option<PathBuf>,

        /// Fan exploitation rounds out over a rayon thread pool
        #[arg(long, default_value_t = false)]
        parallel: bool,
    },

    /// Check that the host toolchain can run a campaign
    Diagnostics,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { target, time, alpha, output, config, parallel } => {
            if !(0.0..=1.0).contains(&alpha) {
                return Err(anyhow::anyhow!("--alpha must be in 0..=1, got {alpha}"));
            }

            let cfg = config::load(config.as_deref()).context("loading configuration")?;

            qprintln!(cli.quiet, "bayzzer: analyzing {}", target.display());
            let (graph, network, alarms) =
                scheduler::build_campaign(&target, &cfg).map_err(|e| anyhow::anyhow!(e))?;
            qprintln!(
                cli.quiet,
                "derived {} fact(s), {} alarm(s) to fuzz",
                graph.total_facts(),
                alarms.len()
            );

            let work_dir = std::env::temp_dir();
            let params = scheduler::CampaignParams {
                total_budget: Duration::from_secs(time),
                alpha,
                parallel,
                quiet: cli.quiet,
            };
            let stats = scheduler::run_campaign(&target, &work_dir, &network, &alarms, &cfg, &params);

            let bugs = stats.unique_bugs.len();
            let summary = format!(
                "campaign complete: {} round(s), {} bug(s) found in {:.1}s",
                stats.rounds_run, bugs, stats.total_time
            );
            qprintln!(cli.quiet, "{}", if bugs > 0 { summary.red().bold() } else { summary.green() });
            storage::persist(&stats, &output).with_context(|| format!("writing {}", output.display()))?;
            qprintln!(cli.quiet, "results written to {}", output.display());
        }

        Commands::Diagnostics => {
            diagnostics::run_self_diagnostics()?;
        }
    }

    Ok(())
}
