// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Markwerk: scores photographed bubble answer sheets.
//
// Entry point. Initialises logging, resolves the data directory, and runs
// the requested subcommand.

mod cli;
mod commands;
mod services;

use clap::Parser;
use markwerk_core::human_errors::humanize_error;

use cli::{Cli, Commands};
use services::app_services::AppServices;

/// Process exit codes.
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const GENERAL_ERROR: i32 = 1;
    pub const INPUT_NOT_FOUND: i32 = 2;
    /// Every sheet in the batch failed.
    pub const NOTHING_SCORED: i32 = 3;
}

fn main() {
    let cli = Cli::parse();

    let default_level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    tracing::debug!("Markwerk starting");

    let result = AppServices::init().and_then(|services| match &cli.command {
        Commands::Score(args) => commands::run_score(args, &services),
        Commands::Inspect(args) => commands::run_inspect(args, &services),
        Commands::SampleKey(args) => commands::run_sample_key(args),
        Commands::Results(args) => commands::run_results(args, &services),
        Commands::InitConfig(args) => commands::run_init_config(args),
    });

    std::process::exit(match result {
        Ok(code) => code,
        Err(e) => {
            let human = humanize_error(&e);
            eprintln!("Error: {e}");
            eprintln!("{} {}", human.message, human.suggestion);
            exit_codes::GENERAL_ERROR
        }
    });
}
