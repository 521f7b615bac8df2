//! qbank-pdf - exam question bank extractor and question-set builder
//!
//! CLI entry point

use clap::Parser;
use indicatif::ProgressBar;
use qbank_pdf::{
    // CLI
    create_progress_bar, create_spinner, AnswerKeyArgs, Cli, Commands, ExitCode, ExportArgs,
    ParseArgs, QsetArgs, SkillTreeArgs,
    // Config
    CliOverrides, Config, ConfigError,
    // Pipeline
    PipelineConfig, PipelineError, ProgressCallback, QbankPipeline,
    // Selection
    SelectionSpec,
};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing_subscriber::EnvFilter;

/// Failure of one CLI command
#[derive(Debug, Error)]
enum CommandError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

impl CommandError {
    fn exit_code(&self) -> ExitCode {
        match self {
            CommandError::Config(ConfigError::NotFound(_)) => ExitCode::InputNotFound,
            CommandError::Config(_) => ExitCode::InvalidArgs,
            CommandError::Pipeline(e) => e.exit_code(),
        }
    }
}

type CommandResult = Result<(), CommandError>;

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();
    init_tracing(&cli);

    let result = match &cli.command {
        Commands::ParseQs(args) => run_parse_questions(&cli, args),
        Commands::ParseAs(args) => run_parse_answers(&cli, args),
        Commands::Qset(args) => run_qset(&cli, args),
        Commands::Allids(args) => run_allids(&cli, args),
        Commands::Skilltree(args) => run_skilltree(&cli, args),
        Commands::AnswerKey(args) => run_answer_key(&cli, args),
        Commands::Info => run_info(&cli),
    };

    match result {
        Ok(()) => ExitCode::Success.into(),
        Err(e) => {
            eprintln!("Error: {}", e);
            e.exit_code().into()
        }
    }
}

fn init_tracing(cli: &Cli) {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(cli.log_level().into()))
        .with_writer(std::io::stderr)
        .init();
}

/// Load the config file and apply command-line overrides
fn pipeline_config(cli: &Cli, overrides: &CliOverrides) -> Result<PipelineConfig, ConfigError> {
    let file_config = match &cli.config {
        Some(path) => Config::load_from_path(path)?,
        None => Config::load()?,
    };
    file_config.merge_with_cli(overrides)
}

// ============ Progress Callback Implementation ============

/// indicatif-backed progress callback
struct CliProgress {
    bar: Mutex<Option<ProgressBar>>,
    quiet: bool,
}

impl CliProgress {
    fn new(quiet: bool) -> Self {
        Self {
            bar: Mutex::new(None),
            quiet,
        }
    }
}

impl ProgressCallback for CliProgress {
    fn on_step_start(&self, step: &str) {
        if self.quiet {
            return;
        }
        let spinner = create_spinner(step);
        spinner.enable_steady_tick(Duration::from_millis(100));
        if let Ok(mut slot) = self.bar.lock() {
            *slot = Some(spinner);
        }
    }

    fn on_step_progress(&self, current: usize, total: usize) {
        let Ok(mut slot) = self.bar.lock() else {
            return;
        };
        let Some(pb) = slot.as_ref() else {
            return;
        };
        if pb.length().is_none() {
            pb.finish_and_clear();
            *slot = Some(create_progress_bar(total as u64));
        }
        if let Some(pb) = slot.as_ref() {
            pb.set_position(current as u64);
        }
    }

    fn on_step_complete(&self, step: &str, message: &str) {
        if let Ok(mut slot) = self.bar.lock() {
            if let Some(pb) = slot.take() {
                pb.finish_and_clear();
            }
        }
        if !self.quiet {
            println!("{}: {}", step, message);
        }
    }

    fn on_debug(&self, message: &str) {
        tracing::debug!("{}", message);
    }
}

// ============ Parse Commands ============

fn run_parse_questions(cli: &Cli, args: &ParseArgs) -> CommandResult {
    let mut overrides = CliOverrides::new();
    overrides.question_store = args.output.clone();
    let pipeline = QbankPipeline::new(pipeline_config(cli, &overrides)?);

    let summary = pipeline.parse_questions_with_progress(&CliProgress::new(cli.quiet))?;
    if !cli.quiet {
        println!(
            "Complete! Exported {} questions from {} documents to '{}'",
            summary.records,
            summary.documents,
            summary.store.display()
        );
    }
    Ok(())
}

fn run_parse_answers(cli: &Cli, args: &ParseArgs) -> CommandResult {
    let mut overrides = CliOverrides::new();
    overrides.answer_store = args.output.clone();
    let pipeline = QbankPipeline::new(pipeline_config(cli, &overrides)?);

    let summary = pipeline.parse_answers_with_progress(&CliProgress::new(cli.quiet))?;
    if !cli.quiet {
        println!(
            "Complete! Exported {} answers from {} documents to '{}'",
            summary.records,
            summary.documents,
            summary.store.display()
        );
    }
    Ok(())
}

// ============ Question Set Command ============

fn run_qset(cli: &Cli, args: &QsetArgs) -> CommandResult {
    let start_time = Instant::now();
    let pipeline = QbankPipeline::new(pipeline_config(cli, &args.overrides())?);

    if args.dry_run {
        let spec = SelectionSpec::load(&args.input).map_err(PipelineError::from)?;
        let bank = pipeline.load_bank()?;
        let records = pipeline.assemble(&spec, &bank)?;
        print_selection_plan(&spec, &records, pipeline.config());
        return Ok(());
    }

    let summary = pipeline.build_question_set_with_progress(&args.input, &CliProgress::new(cli.quiet))?;
    if !cli.quiet {
        println!(
            "Complete! {} questions, {} pages{} written to '{}' in {}",
            summary.questions,
            summary.pages,
            if summary.answer_key { " (with answer key)" } else { "" },
            summary.output_path.display(),
            qbank_pdf::util::format_duration(start_time.elapsed())
        );
    }
    Ok(())
}

/// Print the selection for dry-run mode
fn print_selection_plan(
    spec: &SelectionSpec,
    records: &[qbank_pdf::QuestionRecord],
    config: &PipelineConfig,
) {
    println!("=== Dry Run - Question Set ===");
    println!();
    println!("Output: {}", spec.output_path.display());
    println!("Questions: {} of {} requested", records.len(), spec.total_questions);
    match config.probabilities.or(spec.tier_probabilities) {
        Some(p) => println!(
            "Mode: proportion (easy {}, medium {}, hard {})",
            p.easy, p.medium, p.hard
        ),
        None => println!("Mode: quota"),
    }
    println!("Answer key: {}", if spec.include_ans_key { "YES" } else { "NO" });
    println!("Shuffle: {}", if config.shuffle { "YES" } else { "NO" });
    if let Some(seed) = config.seed {
        println!("Seed: {}", seed);
    }
    println!();
    for (i, record) in records.iter().enumerate() {
        println!(
            "{:>4}. {} [{}] {} / {} ({}, {})",
            i + 1,
            record.id,
            record.tier,
            record.domain,
            record.skill,
            record.source.display(),
            record.pages
        );
    }
}

// ============ Export Commands ============

fn run_allids(cli: &Cli, args: &ExportArgs) -> CommandResult {
    let mut overrides = CliOverrides::new();
    overrides.question_store = args.questions.clone();
    let pipeline = QbankPipeline::new(pipeline_config(cli, &overrides)?);

    let ids = pipeline.export_all_ids(&args.output)?;
    if !cli.quiet {
        println!(
            "Complete! Exported {} question IDs to '{}'",
            ids.q_ids.len(),
            args.output.display()
        );
    }
    Ok(())
}

fn run_skilltree(cli: &Cli, args: &SkillTreeArgs) -> CommandResult {
    let mut overrides = CliOverrides::new();
    overrides.question_store = args.questions.clone();
    let pipeline = QbankPipeline::new(pipeline_config(cli, &overrides)?);

    pipeline.export_skill_tree(&args.output, args.difficulty)?;
    if !cli.quiet {
        println!("Complete! Exported skill tree to '{}'", args.output.display());
    }
    Ok(())
}

fn run_answer_key(cli: &Cli, args: &AnswerKeyArgs) -> CommandResult {
    let mut overrides = CliOverrides::new();
    overrides.answer_store = args.answers.clone();
    let pipeline = QbankPipeline::new(pipeline_config(cli, &overrides)?);

    let count = pipeline.write_answer_key(&args.question_pdf, &args.output)?;
    if !cli.quiet {
        println!(
            "Complete! Answer key for {} questions written to '{}'",
            count,
            args.output.display()
        );
    }
    Ok(())
}

// ============ Info Command ============

fn run_info(cli: &Cli) -> CommandResult {
    println!("qbank-pdf v{}", env!("CARGO_PKG_VERSION"));
    println!();

    println!("Config File Locations:");
    if let Some(path) = &cli.config {
        println!("  Explicit: {}", path.display());
    }
    for path in Config::search_paths() {
        let state = if path.exists() { "found" } else { "not found" };
        println!("  {} ({})", path.display(), state);
    }

    let config = pipeline_config(cli, &CliOverrides::new())?;
    println!();
    println!("Sources:");
    for (label, dir) in [
        ("Questions", &config.question_dir),
        ("Excluded questions", &config.excluded_question_dir),
        ("Answers", &config.answer_dir),
        ("Excluded answers", &config.excluded_answer_dir),
    ] {
        let count = qbank_pdf::util::collect_pdf_files(dir).map(|f| f.len());
        match count {
            Ok(n) => println!("  {}: {} ({} PDFs)", label, dir.display(), n),
            Err(_) => println!("  {}: {} (missing)", label, dir.display()),
        }
    }

    println!();
    println!("Stores:");
    let pipeline = QbankPipeline::new(config.clone());
    match pipeline.load_bank() {
        Ok(bank) => println!("  Questions: {} ({} records)", config.question_store.display(), bank.len()),
        Err(e) => println!("  Questions: {} ({})", config.question_store.display(), e),
    }
    match pipeline.load_answers() {
        Ok(answers) => println!("  Answers: {} ({} records)", config.answer_store.display(), answers.len()),
        Err(e) => println!("  Answers: {} ({})", config.answer_store.display(), e),
    }

    Ok(())
}
