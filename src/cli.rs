//! CLI interface module
//!
//! Provides command-line interface using clap derive macros.

use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use tracing::Level;

use crate::config::CliOverrides;
use crate::selection::TierProbabilities;

/// Exit codes for the CLI
///
/// These codes follow standard Unix conventions and provide
/// specific error categories for scripting and automation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// Success
    Success = 0,
    /// Unclassified failure
    GeneralError = 1,
    /// Invalid arguments or selection constraints
    InvalidArgs = 2,
    /// Input file or directory not found
    InputNotFound = 3,
    /// Output could not be written
    OutputError = 4,
    /// Source document could not be parsed
    ProcessingError = 5,
}

impl ExitCode {
    /// Convert to process exit code
    pub fn code(self) -> i32 {
        self as i32
    }

    /// Get human-readable description
    pub fn description(self) -> &'static str {
        match self {
            ExitCode::Success => "Success",
            ExitCode::GeneralError => "General error",
            ExitCode::InvalidArgs => "Invalid arguments or selection constraints",
            ExitCode::InputNotFound => "Input file or directory not found",
            ExitCode::OutputError => "Output error (permission denied, disk full, etc.)",
            ExitCode::ProcessingError => "Source document parse error",
        }
    }
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code.code()
    }
}

impl From<ExitCode> for std::process::ExitCode {
    fn from(code: ExitCode) -> Self {
        std::process::ExitCode::from(code.code() as u8)
    }
}

/// Exam question bank extractor and question-set builder
#[derive(Parser, Debug)]
#[command(name = "qbank-pdf")]
#[command(version)]
#[command(about = "Parse exam question-bank PDFs and build randomised question sets", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only report errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Configuration file (default: ./qbank.toml, then the user config directory)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

impl Cli {
    /// Log level selected by `-q` / `-v`
    pub fn log_level(&self) -> Level {
        if self.quiet {
            return Level::ERROR;
        }
        match self.verbose {
            0 => Level::WARN,
            1 => Level::INFO,
            2 => Level::DEBUG,
            _ => Level::TRACE,
        }
    }
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Parse question PDFs (general, then excluded) into the question store
    ParseQs(ParseArgs),
    /// Parse answer PDFs into the answer store
    ParseAs(ParseArgs),
    /// Assemble a question set from a JSON selection spec
    Qset(QsetArgs),
    /// Export every question identifier as JSON
    Allids(ExportArgs),
    /// Export the test / domain / skill tree as JSON
    Skilltree(SkillTreeArgs),
    /// Write a standalone answer key for an existing question PDF
    AnswerKey(AnswerKeyArgs),
    /// Show configuration and store information
    Info,
}

/// Arguments for the parse commands
#[derive(Args, Debug)]
pub struct ParseArgs {
    /// Output CSV (default: the configured store)
    pub output: Option<PathBuf>,
}

/// Arguments for the qset command
#[derive(Args, Debug)]
pub struct QsetArgs {
    /// Selection spec (JSON)
    pub input: PathBuf,

    /// Question store to select from
    #[arg(long)]
    pub questions: Option<PathBuf>,

    /// Answer store used for the answer key
    #[arg(long)]
    pub answers: Option<PathBuf>,

    /// Seed for reproducible selection
    #[arg(long)]
    pub seed: Option<u64>,

    /// Keep selection order instead of shuffling
    #[arg(long = "no-shuffle")]
    pub no_shuffle: bool,

    /// Easy share in proportion mode (requires --medium and --hard)
    #[arg(long, requires_all = ["medium", "hard"])]
    pub easy: Option<f64>,

    /// Medium share in proportion mode
    #[arg(long, requires_all = ["easy", "hard"])]
    pub medium: Option<f64>,

    /// Hard share in proportion mode
    #[arg(long, requires_all = ["easy", "medium"])]
    pub hard: Option<f64>,

    /// Show the selection without writing any PDF
    #[arg(long)]
    pub dry_run: bool,
}

impl QsetArgs {
    /// Tier probabilities given on the command line, unvalidated
    pub fn probabilities(&self) -> Option<TierProbabilities> {
        match (self.easy, self.medium, self.hard) {
            (Some(easy), Some(medium), Some(hard)) => Some(TierProbabilities { easy, medium, hard }),
            _ => None,
        }
    }

    /// Config overrides carried by these arguments
    pub fn overrides(&self) -> CliOverrides {
        let mut overrides = CliOverrides::new();
        overrides.question_store = self.questions.clone();
        overrides.answer_store = self.answers.clone();
        overrides.seed = self.seed;
        overrides.probabilities = self.probabilities();
        if self.no_shuffle {
            overrides = overrides.with_shuffle(false);
        }
        overrides
    }
}

/// Arguments for JSON exports
#[derive(Args, Debug)]
pub struct ExportArgs {
    /// Output JSON
    pub output: PathBuf,

    /// Question store to read
    #[arg(long)]
    pub questions: Option<PathBuf>,
}

/// Arguments for the skilltree command
#[derive(Args, Debug)]
pub struct SkillTreeArgs {
    /// Output JSON
    #[arg(default_value = "skill-tree.json")]
    pub output: PathBuf,

    /// Question store to read
    #[arg(long)]
    pub questions: Option<PathBuf>,

    /// Count per difficulty tier ([easy, medium, hard]) instead of totals
    #[arg(long)]
    pub difficulty: bool,
}

/// Arguments for the answer-key command
#[derive(Args, Debug)]
pub struct AnswerKeyArgs {
    /// Question PDF to key
    pub question_pdf: PathBuf,

    /// Output PDF
    pub output: PathBuf,

    /// Answer store to read
    #[arg(long)]
    pub answers: Option<PathBuf>,
}

/// Create a styled progress bar for document processing
pub fn create_progress_bar(total: u64) -> ProgressBar {
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})",
            )
            .expect("Invalid progress bar template")
            .progress_chars("#>-"),
    );
    pb
}

/// Create a spinner for indeterminate progress
pub fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .expect("Invalid spinner template"),
    );
    pb.set_message(message.to_string());
    pb
}
