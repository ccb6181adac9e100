use chrono::Utc;
use thiserror::Error;
use tracing::info;

use caseprep_logging::{LogEvent, Logger, RatingRecord, RatingWriter};
use caseprep_sessions::{PracticeSession, SessionRating};

#[derive(Error, Debug, PartialEq, Eq)]
pub enum RatingError {
    #[error("rating must be between 1 and 5 stars, got {0}")]
    InvalidStars(u8),

    #[error("a comment is required for ratings of 3 stars or fewer")]
    CommentRequired,

    #[error("this practice run has already been rated")]
    AlreadyRated,
}

/// Validates and records the end-of-run satisfaction rating.
///
/// Four or five stars submit as-is; three stars or fewer require a
/// non-empty comment. An accepted rating mutates the session exactly once
/// and emits one structured telemetry line.
pub struct RatingCollector<'a> {
    logger: &'a Logger,
    writer: Option<&'a RatingWriter>,
}

impl<'a> RatingCollector<'a> {
    pub fn new(logger: &'a Logger, writer: Option<&'a RatingWriter>) -> Self {
        Self { logger, writer }
    }

    pub fn record(
        &self,
        session: &mut PracticeSession,
        stars: u8,
        comment: &str,
    ) -> Result<(), RatingError> {
        if !(1..=5).contains(&stars) {
            return Err(RatingError::InvalidStars(stars));
        }

        let comment = comment.trim();
        if stars <= 3 && comment.is_empty() {
            return Err(RatingError::CommentRequired);
        }

        if session.is_rated() {
            return Err(RatingError::AlreadyRated);
        }

        let rating = SessionRating {
            stars,
            comment: comment.to_string(),
            case_id: session.case_id().map(String::from),
            recorded_at: Utc::now(),
        };

        info!(stars, session_id = session.id(), "Recording rating");

        self.logger.log(&LogEvent::RatingRecorded {
            session_id: session.id().to_string(),
            skill: session.skill().to_string(),
            case_id: rating.case_id.clone(),
            stars,
            comment: rating.comment.clone(),
        });

        if let Some(writer) = self.writer {
            writer.write(&RatingRecord {
                session_id: session.id().to_string(),
                skill: session.skill().to_string(),
                case_id: rating.case_id.clone(),
                stars,
                comment: rating.comment.clone(),
                timestamp: rating.recorded_at,
            });
        }

        session.set_rating(rating);
        Ok(())
    }
}
