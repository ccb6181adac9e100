//! Interactive session controller.
//!
//! Drives the practice loop one event at a time: read input, dispatch to
//! the runner, render the result. Completion requests block further input
//! until they return; streamed deltas only move a progress indicator.

use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::Result;
use colored::Colorize;
use dialoguer::{theme::ColorfulTheme, Input, Select};

use caseprep_core::{PracticeRunner, RatingError};
use caseprep_engine::{EngineReply, FeedbackAggregator, ProgressCallback, FEEDBACK_ERROR_PREFIX};
use caseprep_prompts::CasePrompt;
use caseprep_sessions::Skill;

/// Run the interactive practice loop until the user quits or interrupts
pub async fn run_chat(runner: &mut PracticeRunner<'_>, initial_skill: Skill) -> Result<()> {
    let mut skill = initial_skill;

    let case = runner.start_run(skill)?;
    print_case(&case);

    loop {
        if runner.is_interrupted() {
            break;
        }

        let line: String = match Input::with_theme(&ColorfulTheme::default())
            .with_prompt("you")
            .allow_empty(true)
            .interact_text()
        {
            Ok(line) => line,
            // Input aborted (e.g. Ctrl+C landed mid-read)
            Err(_) => break,
        };

        match line.trim() {
            "/quit" | "/q" => break,
            "/done" => {
                finish_and_rate(runner).await?;
                if !offer_next(runner, &mut skill)? {
                    break;
                }
            }
            "/new" => {
                let case = runner.start_run(skill)?;
                print_case(&case);
            }
            "/skill" => {
                skill = select_skill(Some(skill))?;
                let case = runner.switch_skill(skill)?;
                print_case(&case);
            }
            "/help" => print_help(),
            _ => submit_message(runner, &line).await,
        }
    }

    Ok(())
}

/// Skill selection menu; used at startup and for /skill
pub fn select_skill(current: Option<Skill>) -> Result<Skill> {
    let items = ["Clarifying questions", "Framework development"];
    let default = match current {
        Some(Skill::Framework) => 1,
        _ => 0,
    };

    let selection = Select::with_theme(&ColorfulTheme::default())
        .with_prompt("Which skill do you want to practice?")
        .items(&items)
        .default(default)
        .interact()?;

    Ok(if selection == 1 {
        Skill::Framework
    } else {
        Skill::ClarifyingQuestions
    })
}

async fn submit_message(runner: &mut PracticeRunner<'_>, message: &str) {
    eprint!("{}", "  interviewer is thinking".dimmed());
    let _ = std::io::stderr().flush();

    // Streamed deltas drive the indicator only; the reply renders whole
    let chunks = Arc::new(AtomicUsize::new(0));
    let counter = chunks.clone();
    let on_delta: ProgressCallback = Arc::new(move |_delta: &str| {
        if counter.fetch_add(1, Ordering::Relaxed) % 4 == 0 {
            eprint!("{}", ".".dimmed());
            let _ = std::io::stderr().flush();
        }
    });

    let reply = runner.submit(message, Some(on_delta)).await;
    eprintln!();

    if let EngineReply::Rejected { warning } = reply {
        eprintln!("  {} {}", "!".bright_yellow(), warning.bright_yellow());
    }
}

async fn finish_and_rate(runner: &mut PracticeRunner<'_>) -> Result<()> {
    match runner.finish().await {
        None => {
            eprintln!(
                "{}",
                "Nothing to summarize yet. Ask at least one question first.".dimmed()
            );
            return Ok(());
        }
        Some(feedback) if FeedbackAggregator::is_error(&feedback) => {
            eprintln!(
                "{} {}",
                "✗".bright_red(),
                "Feedback generation failed:".bright_red()
            );
            eprintln!(
                "  {}",
                feedback.trim_start_matches(FEEDBACK_ERROR_PREFIX).trim()
            );
        }
        Some(feedback) => print_feedback(&feedback),
    }

    collect_rating(runner)
}

fn collect_rating(runner: &mut PracticeRunner<'_>) -> Result<()> {
    if runner.session().is_rated() {
        return Ok(());
    }

    let items = [
        "★☆☆☆☆  1 · not useful",
        "★★☆☆☆  2",
        "★★★☆☆  3",
        "★★★★☆  4",
        "★★★★★  5 · excellent",
    ];
    let selection = Select::with_theme(&ColorfulTheme::default())
        .with_prompt("How useful was this practice run?")
        .items(&items)
        .default(4)
        .interact()?;
    let stars = (selection + 1) as u8;

    let mut comment = String::new();
    loop {
        match runner.rate(stars, &comment) {
            Ok(()) => break,
            Err(RatingError::CommentRequired) => {
                comment = Input::with_theme(&ColorfulTheme::default())
                    .with_prompt("What should improve? (required for low ratings)")
                    .allow_empty(true)
                    .interact_text()?;
            }
            Err(e) => {
                eprintln!("  {} {}", "!".bright_yellow(), e.to_string().bright_yellow());
                break;
            }
        }
    }

    Ok(())
}

/// Post-rating menu; returns false when the user is done
fn offer_next(runner: &mut PracticeRunner<'_>, skill: &mut Skill) -> Result<bool> {
    let items = ["Practice another case", "Switch skill", "Quit"];
    let selection = Select::with_theme(&ColorfulTheme::default())
        .with_prompt("What next?")
        .items(&items)
        .default(0)
        .interact()?;

    match selection {
        0 => {
            let case = runner.start_run(*skill)?;
            print_case(&case);
            Ok(true)
        }
        1 => {
            *skill = select_skill(Some(*skill))?;
            let case = runner.switch_skill(*skill)?;
            print_case(&case);
            Ok(true)
        }
        _ => Ok(false),
    }
}

fn print_case(case: &CasePrompt) {
    eprintln!();
    eprintln!("  {}", case.display_title().bold().bright_white());
    eprintln!();
    for line in case.prompt_text.lines() {
        eprintln!("  {}", line);
    }
    eprintln!();
    eprintln!(
        "  {}",
        "Type your question or framework. Commands: /done  /new  /skill  /quit  /help".dimmed()
    );
    eprintln!();
}

fn print_feedback(feedback: &str) {
    eprintln!();
    for line in feedback.lines() {
        if let Some(heading) = line.strip_prefix('#') {
            eprintln!(
                "{}",
                heading.trim_start_matches('#').trim().bold().bright_white()
            );
        } else {
            eprintln!("{}", line);
        }
    }
    eprintln!();
}

fn print_help() {
    eprintln!();
    eprintln!("  {}", "Commands".bold());
    eprintln!("  /done   end the run: get aggregate feedback, then rate it");
    eprintln!("  /new    start a fresh run with a new case");
    eprintln!("  /skill  switch the practiced skill (resets the run)");
    eprintln!("  /quit   leave without feedback");
    eprintln!();
}
