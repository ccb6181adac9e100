use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The skill a practice run exercises
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Skill {
    ClarifyingQuestions,
    Framework,
}

impl std::fmt::Display for Skill {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Skill::ClarifyingQuestions => write!(f, "clarifying-questions"),
            Skill::Framework => write!(f, "framework"),
        }
    }
}

impl std::str::FromStr for Skill {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "clarifying-questions" | "clarifying" | "questions" => Ok(Skill::ClarifyingQuestions),
            "framework" | "frameworks" => Ok(Skill::Framework),
            _ => Err(format!("Unknown skill: {}", s)),
        }
    }
}

/// Who produced a transcript turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnRole {
    Interviewee,
    Interviewer,
}

impl std::fmt::Display for TurnRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TurnRole::Interviewee => write!(f, "Interviewee"),
            TurnRole::Interviewer => write!(f, "Interviewer"),
        }
    }
}

/// A single transcript entry, append-only and strictly alternating
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub role: TurnRole,
    pub content: String,
    /// Quality assessment attached to interviewer turns
    pub assessment: Option<String>,
}

/// A recorded satisfaction rating for one practice run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRating {
    pub stars: u8,
    pub comment: String,
    pub case_id: Option<String>,
    pub recorded_at: DateTime<Utc>,
}
