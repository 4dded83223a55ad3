// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Command-line interface definition.

use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};
use markwerk_core::error::Result;
use markwerk_core::types::DEFAULT_MARGIN;
use markwerk_core::BubbleLayout;
use uuid::Uuid;

/// Score photographed bubble answer sheets against an answer key.
#[derive(Debug, Parser)]
#[command(name = "markwerk", version, about)]
pub struct Cli {
    /// Raise log verbosity (-v debug, -vv trace). RUST_LOG overrides this.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Score a batch of sheet photos and store the results
    Score(ScoreArgs),
    /// Detect the marks on one sheet without scoring it
    Inspect(InspectArgs),
    /// Write a sample answer key for a layout
    SampleKey(SampleKeyArgs),
    /// List stored results
    Results(ResultsArgs),
    /// Write the default pipeline configuration
    InitConfig(InitConfigArgs),
}

/// Bubble grid of the sheets being processed.
#[derive(Debug, Args)]
pub struct LayoutArgs {
    /// Number of questions (grid rows)
    #[arg(long)]
    pub rows: u32,

    /// Options per question (grid columns)
    #[arg(long)]
    pub cols: u32,

    /// Fraction of each cell trimmed on every side before measuring ink
    #[arg(long, default_value_t = DEFAULT_MARGIN)]
    pub margin: f32,
}

impl LayoutArgs {
    pub fn layout(&self) -> Result<BubbleLayout> {
        BubbleLayout::new(self.rows, self.cols, self.margin)
    }
}

#[derive(Debug, Args)]
pub struct ScoreArgs {
    /// Answer key JSON
    #[arg(short, long)]
    pub key: PathBuf,

    #[command(flatten)]
    pub layout: LayoutArgs,

    /// Subject categories JSON (list of {label, start, end})
    #[arg(long)]
    pub categories: Option<PathBuf>,

    /// Pipeline configuration JSON
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Answer-key set label, e.g. "Set 1"
    #[arg(long)]
    pub set: Option<String>,

    /// Result database (defaults to the data directory)
    #[arg(long)]
    pub db: Option<PathBuf>,

    /// Also write the batch report as JSON
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Worker threads (defaults to one per core)
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Sheet photos or directories of photos
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,
}

#[derive(Debug, Args)]
pub struct InspectArgs {
    #[command(flatten)]
    pub layout: LayoutArgs,

    /// Pipeline configuration JSON
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Sheet photo
    pub image: PathBuf,
}

#[derive(Debug, Args)]
pub struct SampleKeyArgs {
    #[command(flatten)]
    pub layout: LayoutArgs,

    /// Where to write the key
    #[arg(short, long)]
    pub output: PathBuf,
}

#[derive(Debug, Args)]
pub struct ResultsArgs {
    /// Result database (defaults to the data directory)
    #[arg(long)]
    pub db: Option<PathBuf>,

    /// Only show this run
    #[arg(long)]
    pub run: Option<Uuid>,
}

#[derive(Debug, Args)]
pub struct InitConfigArgs {
    /// Where to write the configuration
    #[arg(short, long)]
    pub output: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn score_arguments_parse() {
        let cli = Cli::parse_from([
            "markwerk", "score", "--key", "key.json", "--rows", "20", "--cols", "5", "--set",
            "Set 1", "-j", "4", "scans/",
        ]);
        let Commands::Score(args) = cli.command else {
            panic!("expected score");
        };
        assert_eq!(args.layout.rows, 20);
        assert_eq!(args.layout.margin, DEFAULT_MARGIN);
        assert_eq!(args.jobs, Some(4));
        assert_eq!(args.set.as_deref(), Some("Set 1"));
        assert_eq!(args.inputs, [PathBuf::from("scans/")]);
    }

    #[test]
    fn layout_is_validated() {
        let args = LayoutArgs {
            rows: 0,
            cols: 5,
            margin: 0.2,
        };
        assert!(args.layout().is_err());
    }
}
