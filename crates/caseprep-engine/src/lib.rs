mod engine;
mod feedback;
mod prompts;
mod reply;

pub use engine::{ConversationEngine, EngineConfig, EngineReply, ProgressCallback, ERROR_TURN_ASSESSMENT};
pub use feedback::{FeedbackAggregator, FEEDBACK_ERROR_PREFIX};
pub use prompts::CoachPrompts;
pub use reply::{InterviewerReply, ANSWER_MARKER, ASSESSMENT_MARKER};
