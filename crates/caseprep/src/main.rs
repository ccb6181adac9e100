use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use colored::Colorize;

use caseprep_core::{PracticeOutcome, PracticeRunner};
use caseprep_engine::EngineConfig;
use caseprep_llm::{AnthropicConfig, AnthropicProvider, CompletionProvider};
use caseprep_logging::{init_tracing, LogFormat, Logger};
use caseprep_prompts::CaseLibrary;
use caseprep_sessions::Skill;

mod chat;
mod config;

use config::{ProjectConfig, DEFAULT_MODEL};

#[derive(Parser, Debug)]
#[command(
    name = "caseprep",
    about = "Interactive case-interview practice coach",
    version,
    author
)]
struct Cli {
    /// Path to the case prompt file
    #[arg(long, default_value = "cases.json")]
    cases_file: PathBuf,

    /// Skill to practice (prompted interactively if omitted)
    #[arg(short, long, value_enum)]
    skill: Option<SkillChoice>,

    /// Model for both the interviewer and the feedback pass
    #[arg(short, long)]
    model: Option<String>,

    /// Maximum exchanges per run (default: unlimited)
    #[arg(short = 'n', long)]
    max_turns: Option<usize>,

    /// Log output format
    #[arg(long, value_enum, default_value = "pretty")]
    log_format: LogFormatChoice,

    /// Also write session events to this JSONL file
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Output the final result as JSON
    #[arg(long)]
    json_output: bool,

    /// Dry run: show the resolved configuration without starting
    #[arg(long)]
    dry_run: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SkillChoice {
    Clarifying,
    Framework,
}

impl From<SkillChoice> for Skill {
    fn from(choice: SkillChoice) -> Self {
        match choice {
            SkillChoice::Clarifying => Skill::ClarifyingQuestions,
            SkillChoice::Framework => Skill::Framework,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormatChoice {
    Pretty,
    Json,
    Compact,
}

impl From<LogFormatChoice> for LogFormat {
    fn from(choice: LogFormatChoice) -> Self {
        match choice {
            LogFormatChoice::Pretty => LogFormat::Pretty,
            LogFormatChoice::Json => LogFormat::Json,
            LogFormatChoice::Compact => LogFormat::Compact,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Keep tracing diagnostics quiet by default; RUST_LOG overrides
    let log_format: LogFormat = cli.log_format.into();
    init_tracing("warn", log_format);

    let working_dir = std::env::current_dir().context("Failed to get current directory")?;
    let project_config = ProjectConfig::load(&working_dir)?.unwrap_or_default();

    // CLI model overrides both roles; the config file can split them
    let interviewer_model = cli
        .model
        .clone()
        .or_else(|| project_config.interviewer_model().map(String::from))
        .unwrap_or_else(|| DEFAULT_MODEL.to_string());
    let feedback_model = cli
        .model
        .clone()
        .or_else(|| project_config.feedback_model().map(String::from))
        .unwrap_or_else(|| DEFAULT_MODEL.to_string());

    let library = CaseLibrary::load(&cli.cases_file);

    if cli.dry_run {
        println!("=== Dry Run ===");
        println!("Cases file: {}", cli.cases_file.display());
        println!("Cases loaded: {}", library.len());
        if let Some(error) = library.load_error() {
            println!("Case file problem: {}", error);
        }
        println!("Interviewer model: {}", interviewer_model);
        println!("Feedback model: {}", feedback_model);
        if let Some(max) = cli.max_turns {
            println!("Max turns: {}", max);
        } else {
            println!("Max turns: unlimited");
        }
        return Ok(());
    }

    // Missing credential is the one fatal startup error
    let api_key = std::env::var("ANTHROPIC_API_KEY")
        .context("ANTHROPIC_API_KEY is not set. Export your API key to start a session.")?;

    let interviewer_provider =
        AnthropicProvider::new(AnthropicConfig::new(api_key.clone()).with_model(interviewer_model))
            .context("Failed to build interviewer provider")?;
    let feedback_provider =
        AnthropicProvider::new(AnthropicConfig::new(api_key).with_model(feedback_model))
            .context("Failed to build feedback provider")?;

    tracing::debug!(
        interviewer = %interviewer_provider.provider_info().model,
        feedback = %feedback_provider.provider_info().model,
        "Providers ready"
    );

    // A broken case file degrades to the placeholder case; tell the user
    if let Some(error) = library.load_error() {
        eprintln!();
        eprintln!(
            "{} {}",
            "✗".bright_red(),
            format!("Case file problem: {}", error).bright_red()
        );
        eprintln!("  Continuing with a placeholder case.");
    }

    let skill: Skill = match cli.skill {
        Some(choice) => choice.into(),
        None => chat::select_skill(None)?,
    };

    let logger = match cli.log_file {
        Some(ref path) => Logger::with_file(log_format, path)
            .with_context(|| format!("Failed to open log file {}", path.display()))?,
        None => Logger::new(log_format),
    };
    let logger = Arc::new(logger);

    let mut engine_config = EngineConfig::default();
    if let Some(max_tokens) = project_config.interviewer_max_tokens() {
        engine_config.max_tokens = max_tokens;
    }

    let mut runner = PracticeRunner::new(
        &interviewer_provider,
        &feedback_provider,
        &library,
        logger,
        skill,
    )
    .with_engine_config(engine_config);
    if let Some(max_tokens) = project_config.feedback_max_tokens() {
        runner = runner.with_feedback_max_tokens(max_tokens);
    }
    if let Some(max_turns) = cli.max_turns {
        runner = runner.with_max_turns(max_turns);
    }

    // Handle Ctrl+C gracefully
    let interrupt_handle = runner.interrupt_handle();
    ctrlc::set_handler(move || {
        eprintln!("\nInterrupted. Finishing up...");
        interrupt_handle.store(true, Ordering::SeqCst);
    })
    .context("Failed to set Ctrl+C handler")?;

    let outcome = match chat::run_chat(&mut runner, skill).await {
        Ok(()) => runner.into_outcome(),
        Err(e) => runner.into_failure(format!("{:#}", e)),
    };

    if cli.json_output {
        let json = serde_json::to_string_pretty(&outcome)?;
        println!("{}", json);
    } else {
        print_outcome(&outcome);
    }

    std::process::exit(outcome.exit_code());
}

fn print_outcome(outcome: &PracticeOutcome) {
    match outcome {
        PracticeOutcome::Completed {
            exchanges,
            rated,
            total_duration_secs,
        } => {
            eprintln!();
            eprintln!("=== SESSION COMPLETE ===");
            eprintln!("Exchanges: {}", exchanges);
            eprintln!("Rated: {}", if *rated { "yes" } else { "no" });
            eprintln!("Duration: {:.1}s", total_duration_secs);
        }
        PracticeOutcome::Interrupted {
            exchanges,
            total_duration_secs,
        } => {
            eprintln!();
            eprintln!("=== INTERRUPTED ===");
            eprintln!("Stopped after {} exchange(s)", exchanges);
            eprintln!("Duration: {:.1}s", total_duration_secs);
        }
        PracticeOutcome::Failed {
            error,
            total_duration_secs,
        } => {
            eprintln!();
            eprintln!("=== FAILED ===");
            eprintln!("Error: {}", error);
            eprintln!("Duration: {:.1}s", total_duration_secs);
        }
    }
}
