// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// Parses the command line with clap and hands a RunRequest to
// Layer 2. Parsing is "known args only": unrecognised tokens
// never fail the run.
//
//   fairrec --model BPR --dataset milk_tea \
//           --config_files "basic.yaml milk_tea.yaml" --epochs=50

pub mod commands;

use anyhow::Result;
use clap::Parser;
use std::io::IsTerminal;
use commands::{overrides_from, split_known_args, RunArgs};

use crate::application::run_use_case::{RunRequest, RunUseCase};

#[derive(Parser, Debug)]
#[command(
    name = "fairrec",
    version,
    about = "Train and evaluate a recommender, then write its test ranking to disk."
)]
pub struct Cli {
    #[command(flatten)]
    pub args: RunArgs,

    /// `--key=value` tokens clap never saw
    #[arg(skip)]
    pub overrides: Vec<(String, String)>,
}

impl Cli {
    /// Parse from the process arguments.
    pub fn from_env() -> Self {
        Self::from_args(std::env::args())
    }

    pub fn from_args<I, S>(argv: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let (known, leftover) = split_known_args(argv);
        let mut cli = Cli::parse_from(known);
        cli.overrides = overrides_from(&leftover);
        cli
    }

    pub fn request(&self) -> RunRequest {
        RunRequest {
            model:        self.args.model.clone(),
            dataset:      self.args.dataset.clone(),
            config_files: self.args.config_file_list(),
            overrides:    self.overrides.clone(),
        }
    }

    /// Run the experiment and print the results.
    ///
    /// Progress bars are only drawn when stderr is a terminal.
    pub fn run(self) -> Result<()> {
        let outcome = RunUseCase::new()
            .with_progress(std::io::stderr().is_terminal())
            .execute(&self.request())?;
        println!("Best valid ({:.4}): {}", outcome.best_valid_score, outcome.best_valid_result);
        println!("Test result: {}", outcome.test_result);
        println!("Rank file: {} ({} rows)", outcome.rank_path.display(), outcome.rank_rows.len());
        Ok(())
    }
}
