use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::types::{SessionRating, Skill, Turn, TurnRole};

#[derive(Error, Debug, PartialEq, Eq)]
pub enum SessionError {
    #[error("transcript turn out of order: expected {expected}, got {got}")]
    OutOfTurn { expected: TurnRole, got: TurnRole },

    #[error("an exchange is already in flight")]
    Busy,
}

/// Mutable state for one practice run, scoped to a single session.
///
/// Created on first use, reset whenever the active skill changes or the
/// user starts a new run, and gone when the process exits. Nothing here
/// persists across sessions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PracticeSession {
    id: String,
    skill: Skill,
    case_id: Option<String>,
    transcript: Vec<Turn>,
    started_at: Option<DateTime<Utc>>,
    final_feedback: Option<String>,
    rating: Option<SessionRating>,
    /// Gates new submissions while a completion request is in flight
    pending: bool,
}

impl PracticeSession {
    pub fn new(skill: Skill) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            skill,
            case_id: None,
            transcript: Vec::new(),
            started_at: None,
            final_feedback: None,
            rating: None,
            pending: false,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn skill(&self) -> Skill {
        self.skill
    }

    pub fn case_id(&self) -> Option<&str> {
        self.case_id.as_deref()
    }

    pub fn transcript(&self) -> &[Turn] {
        &self.transcript
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn final_feedback(&self) -> Option<&str> {
        self.final_feedback.as_deref()
    }

    pub fn rating(&self) -> Option<&SessionRating> {
        self.rating.as_ref()
    }

    pub fn is_rated(&self) -> bool {
        self.rating.is_some()
    }

    pub fn has_feedback(&self) -> bool {
        self.final_feedback.is_some()
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    /// Clear everything except identity; called on skill change or new run
    pub fn reset(&mut self, skill: Skill) {
        debug!(session_id = %self.id, %skill, "Resetting session");
        self.skill = skill;
        self.case_id = None;
        self.transcript.clear();
        self.started_at = None;
        self.final_feedback = None;
        self.rating = None;
        self.pending = false;
    }

    /// Attach the selected case and stamp the run start
    pub fn begin_run(&mut self, case_id: impl Into<String>) {
        self.case_id = Some(case_id.into());
        self.started_at = Some(Utc::now());
    }

    /// Seconds since the run started, zero if it has not
    pub fn elapsed_seconds(&self) -> u64 {
        self.started_at
            .map(|t| (Utc::now() - t).num_seconds().max(0) as u64)
            .unwrap_or(0)
    }

    /// Mark a completion request in flight; rejects if one already is
    pub fn begin_exchange(&mut self) -> Result<(), SessionError> {
        if self.pending {
            return Err(SessionError::Busy);
        }
        self.pending = true;
        Ok(())
    }

    /// Clear the in-flight flag; safe to call on every exit path
    pub fn finish_exchange(&mut self) {
        self.pending = false;
    }

    fn expected_role(&self) -> TurnRole {
        if self.transcript.len() % 2 == 0 {
            TurnRole::Interviewee
        } else {
            TurnRole::Interviewer
        }
    }

    fn push_turn(&mut self, turn: Turn) -> Result<usize, SessionError> {
        let expected = self.expected_role();
        if turn.role != expected {
            return Err(SessionError::OutOfTurn {
                expected,
                got: turn.role,
            });
        }
        self.transcript.push(turn);
        Ok(self.transcript.len() - 1)
    }

    /// Append a user message; returns its transcript index
    pub fn push_interviewee(&mut self, content: impl Into<String>) -> Result<usize, SessionError> {
        self.push_turn(Turn {
            role: TurnRole::Interviewee,
            content: content.into(),
            assessment: None,
        })
    }

    /// Append an interviewer reply; returns its 1-based turn number
    pub fn push_interviewer(
        &mut self,
        content: impl Into<String>,
        assessment: Option<String>,
    ) -> Result<usize, SessionError> {
        let index = self.push_turn(Turn {
            role: TurnRole::Interviewer,
            content: content.into(),
            assessment,
        })?;
        Ok(Self::turn_number(index))
    }

    /// 1-based exchange number for the turn at a transcript index
    pub fn turn_number(index: usize) -> usize {
        index / 2 + 1
    }

    /// Number of completed interviewee/interviewer exchanges
    pub fn exchanges(&self) -> usize {
        self.transcript.len() / 2
    }

    /// Store aggregate feedback; later calls read it back instead of regenerating
    pub fn set_final_feedback(&mut self, feedback: impl Into<String>) {
        self.final_feedback = Some(feedback.into());
    }

    pub fn set_rating(&mut self, rating: SessionRating) {
        self.rating = Some(rating);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_turn_number_from_index() {
        assert_eq!(PracticeSession::turn_number(0), 1);
        assert_eq!(PracticeSession::turn_number(1), 1);
        assert_eq!(PracticeSession::turn_number(2), 2);
        assert_eq!(PracticeSession::turn_number(3), 2);
        assert_eq!(PracticeSession::turn_number(8), 5);
    }

    #[test]
    fn test_alternation_enforced() {
        let mut session = PracticeSession::new(Skill::ClarifyingQuestions);

        session.push_interviewee("What is the market share?").unwrap();
        let err = session.push_interviewee("again?").unwrap_err();
        assert!(matches!(err, SessionError::OutOfTurn { .. }));

        let turn = session
            .push_interviewer("About 12%.", Some("Good question".into()))
            .unwrap();
        assert_eq!(turn, 1);
    }

    #[test]
    fn test_busy_flag_gates_exchanges() {
        let mut session = PracticeSession::new(Skill::Framework);

        session.begin_exchange().unwrap();
        assert_eq!(session.begin_exchange(), Err(SessionError::Busy));
        session.finish_exchange();
        assert!(session.begin_exchange().is_ok());
    }
}
