use serde::{Deserialize, Serialize};
use std::time::Duration;

/// The final outcome of a practice run
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PracticeOutcome {
    /// Run finished normally
    Completed {
        exchanges: usize,
        rated: bool,
        total_duration_secs: f64,
    },
    /// User requested stop (e.g., Ctrl+C)
    Interrupted {
        exchanges: usize,
        total_duration_secs: f64,
    },
    /// Unrecoverable error
    Failed {
        error: String,
        total_duration_secs: f64,
    },
}

impl PracticeOutcome {
    pub fn completed(exchanges: usize, rated: bool, duration: Duration) -> Self {
        Self::Completed {
            exchanges,
            rated,
            total_duration_secs: duration.as_secs_f64(),
        }
    }

    pub fn interrupted(exchanges: usize, duration: Duration) -> Self {
        Self::Interrupted {
            exchanges,
            total_duration_secs: duration.as_secs_f64(),
        }
    }

    pub fn failed(error: String, duration: Duration) -> Self {
        Self::Failed {
            error,
            total_duration_secs: duration.as_secs_f64(),
        }
    }

    pub fn exchanges(&self) -> usize {
        match self {
            Self::Completed { exchanges, .. } => *exchanges,
            Self::Interrupted { exchanges, .. } => *exchanges,
            Self::Failed { .. } => 0,
        }
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Completed { .. } => 0,
            Self::Interrupted { .. } => 130,
            Self::Failed { .. } => 2,
        }
    }
}
