use tracing::{info, warn};

use caseprep_llm::{CompletionProvider, CompletionRequest, MessageRole};
use caseprep_sessions::PracticeSession;

use crate::prompts::CoachPrompts;

/// Literal prefix marking a stored feedback string as a failure.
/// Callers must render such strings as errors, never as content.
pub const FEEDBACK_ERROR_PREFIX: &str = "[feedback-error]";

/// Generates the end-of-run aggregate feedback, exactly once per run
pub struct FeedbackAggregator<'a> {
    provider: &'a dyn CompletionProvider,
    max_tokens: u32,
}

impl<'a> FeedbackAggregator<'a> {
    pub fn new(provider: &'a dyn CompletionProvider) -> Self {
        Self {
            provider,
            max_tokens: 2000,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Whether a stored feedback string is the error-tagged failure form
    pub fn is_error(feedback: &str) -> bool {
        feedback.starts_with(FEEDBACK_ERROR_PREFIX)
    }

    /// Summarize the practice run.
    ///
    /// Returns the stored value unchanged when feedback was already
    /// generated or the run was already rated, and `None` when there is
    /// nothing to summarize. Otherwise issues a single non-streamed
    /// completion; a failure is stored as an error-tagged string so the
    /// run never attempts a second generation.
    pub async fn summarize(
        &self,
        session: &mut PracticeSession,
        case_text: &str,
    ) -> Option<String> {
        if session.has_feedback() || session.is_rated() {
            return session.final_feedback().map(str::to_string);
        }

        if session.transcript().is_empty() {
            return None;
        }

        let prompt = CoachPrompts::build_feedback_prompt(case_text, session.transcript());
        let request = CompletionRequest::new()
            .with_system_prompt(CoachPrompts::feedback_system_instruction())
            .with_message(MessageRole::User, prompt)
            .with_max_tokens(self.max_tokens);

        let feedback = match self.provider.complete(request).await {
            Ok(response) => {
                info!(
                    exchanges = session.exchanges(),
                    feedback_len = response.content.len(),
                    "Aggregate feedback generated"
                );
                response.content
            }
            Err(e) => {
                warn!(error = %e, "Feedback generation failed; storing error tag");
                format!("{} {}", FEEDBACK_ERROR_PREFIX, e)
            }
        };

        session.set_final_feedback(feedback.clone());
        Some(feedback)
    }
}
