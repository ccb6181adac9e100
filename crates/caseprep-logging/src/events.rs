use colored::Colorize;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

/// Structured log events for a practice session
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LogEvent {
    PracticeStarted {
        session_id: String,
        skill: String,
    },
    CaseSelected {
        case_id: String,
        title: String,
    },
    QuestionSubmitted {
        turn_number: usize,
        preview: String,
    },
    ReplyReceived {
        turn_number: usize,
        answer: String,
        assessment: String,
        /// Marks the synthetic turn substituted on endpoint failure
        degraded: bool,
    },
    FeedbackStarted {
        exchanges: usize,
        elapsed_secs: u64,
    },
    FeedbackGenerated {
        feedback_len: usize,
        is_error: bool,
    },
    RatingRecorded {
        session_id: String,
        skill: String,
        case_id: Option<String>,
        stars: u8,
        comment: String,
    },
    SessionReset {
        skill: String,
    },
    ErrorEncountered {
        context: String,
        error: String,
    },
}

impl LogEvent {
    /// Add a timestamp to serialize with the event
    fn with_timestamp(&self) -> serde_json::Value {
        let mut value = serde_json::to_value(self).unwrap_or_default();
        if let Some(obj) = value.as_object_mut() {
            obj.insert(
                "timestamp".to_string(),
                serde_json::Value::String(chrono::Utc::now().to_rfc3339()),
            );
        }
        value
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable format with colors and visual structure
    #[default]
    Pretty,
    /// JSON lines format for machine consumption
    Json,
    /// Compact single-line format
    Compact,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            "compact" => Ok(LogFormat::Compact),
            _ => Err(format!("Unknown log format: {}", s)),
        }
    }
}

/// Logger for session events - handles both console output and file logging
pub struct Logger {
    format: LogFormat,
    file_writer: Option<Mutex<File>>,
}

impl Logger {
    pub fn new(format: LogFormat) -> Self {
        Self {
            format,
            file_writer: None,
        }
    }

    /// Create a logger with file output in addition to console
    pub fn with_file(format: LogFormat, log_path: &Path) -> std::io::Result<Self> {
        if let Some(parent) = log_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_path)?;

        Ok(Self {
            format,
            file_writer: Some(Mutex::new(file)),
        })
    }

    pub fn log(&self, event: &LogEvent) {
        // File sink is always JSON, whatever the console format
        if let Some(ref writer) = self.file_writer {
            if let Ok(mut file) = writer.lock() {
                let json = event.with_timestamp();
                let _ = writeln!(file, "{}", json);
            }
        }

        match self.format {
            LogFormat::Json => self.log_json(event),
            LogFormat::Pretty => self.log_pretty(event),
            LogFormat::Compact => self.log_compact(event),
        }
    }

    fn log_json(&self, event: &LogEvent) {
        if let Ok(json) = serde_json::to_string(event) {
            let _ = writeln!(std::io::stderr(), "{}", json);
        }
    }

    fn log_pretty(&self, event: &LogEvent) {
        let mut stderr = std::io::stderr();
        match event {
            LogEvent::PracticeStarted { session_id, skill } => {
                let _ = writeln!(stderr);
                let _ = writeln!(
                    stderr,
                    "{}",
                    "╭─────────────────────────────────────────────────────────────────────╮"
                        .bright_blue()
                );
                let _ = writeln!(
                    stderr,
                    "{}  {}{}",
                    "│".bright_blue(),
                    "caseprep".bold().bright_white(),
                    " ".repeat(59) + &"│".bright_blue().to_string()
                );
                let _ = writeln!(
                    stderr,
                    "{}  {} {}",
                    "│".bright_blue(),
                    "Skill:".dimmed(),
                    Self::truncate_with_padding(skill, 60, 67).dimmed()
                );
                let _ = writeln!(
                    stderr,
                    "{}  {} {}",
                    "│".bright_blue(),
                    "Session:".dimmed(),
                    Self::truncate_with_padding(session_id, 58, 65).dimmed()
                );
                let _ = writeln!(
                    stderr,
                    "{}",
                    "╰─────────────────────────────────────────────────────────────────────╯"
                        .bright_blue()
                );
                let _ = writeln!(stderr);
            }
            LogEvent::CaseSelected { title, .. } => {
                let header = format!("─ Case: {} ", title);
                let padding = "─".repeat(70usize.saturating_sub(header.chars().count() + 1));
                let _ = writeln!(
                    stderr,
                    "{}{}{}",
                    "┌".bright_blue(),
                    header.bright_blue().bold(),
                    padding.bright_blue()
                );
                let _ = writeln!(stderr);
            }
            LogEvent::QuestionSubmitted { turn_number, .. } => {
                let _ = writeln!(stderr);
                let _ = writeln!(
                    stderr,
                    "  {} {} {}",
                    "▶".bright_cyan(),
                    "YOU".bright_cyan().bold(),
                    format!("· turn {}", turn_number).dimmed()
                );
            }
            LogEvent::ReplyReceived {
                answer,
                assessment,
                degraded,
                ..
            } => {
                let _ = writeln!(
                    stderr,
                    "  {} {}",
                    "▶".bright_magenta(),
                    "INTERVIEWER".bright_magenta().bold()
                );
                for line in answer.lines() {
                    let _ = writeln!(stderr, "    {} {}", "│".dimmed(), line);
                }
                let assessment_line = if *degraded {
                    format!("✗ Assessment: {}", assessment).bright_red().to_string()
                } else {
                    format!("✦ Assessment: {}", assessment)
                        .bright_yellow()
                        .to_string()
                };
                let _ = writeln!(stderr, "    {}", assessment_line);
                let _ = writeln!(stderr);
            }
            LogEvent::FeedbackStarted {
                exchanges,
                elapsed_secs,
            } => {
                let _ = writeln!(
                    stderr,
                    "  {} {} {}",
                    "▶".bright_magenta(),
                    "FEEDBACK".bright_magenta().bold(),
                    format!("· {} exchange(s) in {}s", exchanges, elapsed_secs).dimmed()
                );
            }
            LogEvent::FeedbackGenerated { is_error, .. } => {
                if *is_error {
                    let _ = writeln!(
                        stderr,
                        "    {}",
                        "✗ Feedback generation failed".bright_red()
                    );
                } else {
                    let _ = writeln!(stderr, "    {}", "✓ Feedback ready".bright_green());
                }
                let _ = writeln!(stderr);
            }
            LogEvent::RatingRecorded { stars, .. } => {
                let filled = "★".repeat(*stars as usize);
                let empty = "☆".repeat(5usize.saturating_sub(*stars as usize));
                let _ = writeln!(
                    stderr,
                    "{} Rating recorded: {}{}",
                    "✓".bright_green(),
                    filled.bright_yellow(),
                    empty.dimmed()
                );
            }
            LogEvent::SessionReset { skill } => {
                let _ = writeln!(
                    stderr,
                    "{}",
                    format!("— session reset · skill: {} —", skill).dimmed()
                );
            }
            LogEvent::ErrorEncountered { context, error } => {
                let _ = writeln!(
                    stderr,
                    "{} {}: {}",
                    "✗".bright_red(),
                    context,
                    error.bright_red()
                );
            }
        }
    }

    fn log_compact(&self, event: &LogEvent) {
        let mut stderr = std::io::stderr();
        let timestamp = chrono::Utc::now().format("%H:%M:%S");
        let msg = match event {
            LogEvent::PracticeStarted { skill, .. } => {
                format!("[{}] practice:start {}", timestamp, skill)
            }
            LogEvent::CaseSelected { case_id, .. } => {
                format!("[{}] case:{}", timestamp, case_id)
            }
            LogEvent::QuestionSubmitted {
                turn_number,
                preview,
            } => format!("[{}] you:{} {}", timestamp, turn_number, preview),
            LogEvent::ReplyReceived {
                turn_number,
                degraded,
                ..
            } => format!(
                "[{}] interviewer:{}{}",
                timestamp,
                turn_number,
                if *degraded { " (error turn)" } else { "" }
            ),
            LogEvent::FeedbackStarted { exchanges, .. } => {
                format!("[{}] feedback:start {} exchange(s)", timestamp, exchanges)
            }
            LogEvent::FeedbackGenerated {
                feedback_len,
                is_error,
            } => format!(
                "[{}] feedback:{} {}b",
                timestamp,
                if *is_error { "error" } else { "done" },
                feedback_len
            ),
            LogEvent::RatingRecorded { stars, .. } => {
                format!("[{}] rating:{}", timestamp, stars)
            }
            LogEvent::SessionReset { skill } => {
                format!("[{}] session:reset {}", timestamp, skill)
            }
            LogEvent::ErrorEncountered { context, error } => {
                format!("[{}] error:{}:{}", timestamp, context, error)
            }
        };
        let _ = writeln!(stderr, "{}", msg);
    }

    /// Truncate a string and pad to exact width
    fn truncate_with_padding(s: &str, max_len: usize, total_width: usize) -> String {
        let truncated = if s.len() > max_len {
            format!("{}...", &s[..max_len - 3])
        } else {
            s.to_string()
        };

        let padding_needed = total_width.saturating_sub(truncated.len() + 1); // +1 for trailing │
        format!("{}{}│", truncated, " ".repeat(padding_needed))
    }
}
