use std::sync::Arc;

use futures::StreamExt;
use tracing::{debug, warn};

use caseprep_llm::{CompletionError, CompletionProvider, CompletionRequest, MessageRole};
use caseprep_sessions::PracticeSession;

use crate::prompts::CoachPrompts;
use crate::reply::InterviewerReply;

/// Assessment attached to the synthetic turn appended on endpoint failure
pub const ERROR_TURN_ASSESSMENT: &str = "not applicable due to error";

/// Receives each streamed delta; display only, never acted on mid-stream
pub type ProgressCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// Sampling and length settings for per-turn completions
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_tokens: 1024,
            temperature: 0.5,
        }
    }
}

/// What a submission did to the session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineReply {
    /// An interviewer turn was appended; `degraded` marks the synthetic
    /// error turn substituted when the endpoint failed
    Answered { turn_number: usize, degraded: bool },
    /// Input rejected before any state mutation
    Rejected { warning: String },
}

/// Runs one interviewee/interviewer exchange against the completion endpoint
pub struct ConversationEngine<'a> {
    provider: &'a dyn CompletionProvider,
    config: EngineConfig,
}

impl<'a> ConversationEngine<'a> {
    pub fn new(provider: &'a dyn CompletionProvider, config: EngineConfig) -> Self {
        Self { provider, config }
    }

    /// Submit one user message.
    ///
    /// Appends the interviewee turn, streams the completion into a single
    /// buffer, parses the two-part reply, and appends the interviewer turn.
    /// Endpoint failures are swallowed into a synthetic turn; the pending
    /// flag is cleared on every exit path.
    pub async fn submit(
        &self,
        session: &mut PracticeSession,
        case_text: &str,
        message: &str,
        on_delta: Option<ProgressCallback>,
    ) -> EngineReply {
        let message = message.trim();
        if message.is_empty() {
            return EngineReply::Rejected {
                warning: "Please enter a question or framework before submitting.".to_string(),
            };
        }

        if let Err(e) = session.begin_exchange() {
            return EngineReply::Rejected {
                warning: e.to_string(),
            };
        }

        // History for the prompt excludes the message being submitted
        let prompt = CoachPrompts::build_turn_prompt(case_text, session.transcript(), message);

        if let Err(e) = session.push_interviewee(message) {
            session.finish_exchange();
            return EngineReply::Rejected {
                warning: e.to_string(),
            };
        }

        let request = CompletionRequest::new()
            .with_system_prompt(CoachPrompts::system_instruction(session.skill()))
            .with_message(MessageRole::User, prompt)
            .with_max_tokens(self.config.max_tokens)
            .with_temperature(self.config.temperature);

        let (content, assessment, degraded) = match self.collect_response(request, on_delta).await
        {
            Ok(raw) => {
                let reply = InterviewerReply::parse(&raw);
                (reply.answer, reply.assessment, false)
            }
            Err(e) => {
                warn!(error = %e, "Completion request failed; substituting synthetic turn");
                (
                    format!("The interviewer could not respond ({}). Please try again.", e),
                    ERROR_TURN_ASSESSMENT.to_string(),
                    true,
                )
            }
        };

        let pushed = session.push_interviewer(content, Some(assessment));
        session.finish_exchange();

        match pushed {
            Ok(turn_number) => EngineReply::Answered {
                turn_number,
                degraded,
            },
            Err(e) => EngineReply::Rejected {
                warning: e.to_string(),
            },
        }
    }

    /// Stream the completion and concatenate it into one buffer
    async fn collect_response(
        &self,
        request: CompletionRequest,
        on_delta: Option<ProgressCallback>,
    ) -> Result<String, CompletionError> {
        let mut stream = self.provider.stream_complete(request).await?;

        let mut buffer = String::new();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            if !chunk.delta.is_empty() {
                if let Some(ref callback) = on_delta {
                    callback(&chunk.delta);
                }
                buffer.push_str(&chunk.delta);
            }
        }

        debug!(response_len = buffer.len(), "Completion stream finished");
        Ok(buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use caseprep_llm::MockProvider;
    use caseprep_sessions::Skill;
    use std::sync::Mutex;

    const CASE: &str = "Client X wants to enter market Y";

    fn session() -> PracticeSession {
        let mut session = PracticeSession::new(Skill::ClarifyingQuestions);
        session.begin_run("market-entry");
        session
    }

    #[tokio::test]
    async fn test_submit_appends_parsed_exchange() {
        let provider = MockProvider::new()
            .with_reply("###ANSWER###\nAbout 12%.\n###ASSESSMENT###\nGood, specific question.");
        let engine = ConversationEngine::new(&provider, EngineConfig::default());
        let mut session = session();

        let reply = engine
            .submit(
                &mut session,
                CASE,
                "What is the company's current market share?",
                None,
            )
            .await;

        assert_eq!(
            reply,
            EngineReply::Answered {
                turn_number: 1,
                degraded: false
            }
        );

        let transcript = session.transcript();
        assert_eq!(transcript.len(), 2);
        assert_eq!(
            transcript[0].content,
            "What is the company's current market share?"
        );
        assert_eq!(transcript[1].content, "About 12%.");
        assert_eq!(
            transcript[1].assessment.as_deref(),
            Some("Good, specific question.")
        );
        assert!(!session.is_pending());
    }

    #[tokio::test]
    async fn test_empty_message_rejected_without_mutation() {
        let provider = MockProvider::new();
        let engine = ConversationEngine::new(&provider, EngineConfig::default());
        let mut session = session();

        let reply = engine.submit(&mut session, CASE, "   \n  ", None).await;

        assert!(matches!(reply, EngineReply::Rejected { .. }));
        assert!(session.transcript().is_empty());
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn test_endpoint_failure_appends_synthetic_turn() {
        let provider =
            MockProvider::new().with_error(CompletionError::Unavailable("quota".into()));
        let engine = ConversationEngine::new(&provider, EngineConfig::default());
        let mut session = session();

        let reply = engine
            .submit(&mut session, CASE, "Is the market growing?", None)
            .await;

        assert_eq!(
            reply,
            EngineReply::Answered {
                turn_number: 1,
                degraded: true
            }
        );

        let transcript = session.transcript();
        assert_eq!(transcript.len(), 2);
        assert!(transcript[1].content.contains("could not respond"));
        assert_eq!(
            transcript[1].assessment.as_deref(),
            Some(ERROR_TURN_ASSESSMENT)
        );
        // Busy flag cleared on the error path too
        assert!(!session.is_pending());
    }

    #[tokio::test]
    async fn test_second_exchange_gets_turn_number_two() {
        let provider = MockProvider::new()
            .with_reply("###ANSWER###\nA.\n###ASSESSMENT###\nFine.")
            .with_reply("###ANSWER###\nB.\n###ASSESSMENT###\nBetter.");
        let engine = ConversationEngine::new(&provider, EngineConfig::default());
        let mut session = session();

        engine.submit(&mut session, CASE, "first", None).await;
        let reply = engine.submit(&mut session, CASE, "second", None).await;

        assert_eq!(
            reply,
            EngineReply::Answered {
                turn_number: 2,
                degraded: false
            }
        );
    }

    #[tokio::test]
    async fn test_progress_callback_sees_whole_stream() {
        let raw = "###ANSWER###\nLong enough to arrive in several chunks.\n###ASSESSMENT###\nOk.";
        let provider = MockProvider::new().with_reply(raw);
        let engine = ConversationEngine::new(&provider, EngineConfig::default());
        let mut session = session();

        let seen = Arc::new(Mutex::new(String::new()));
        let sink = seen.clone();
        let callback: ProgressCallback = Arc::new(move |delta: &str| {
            sink.lock().unwrap().push_str(delta);
        });

        engine
            .submit(&mut session, CASE, "question", Some(callback))
            .await;

        assert_eq!(&*seen.lock().unwrap(), raw);
    }

    #[tokio::test]
    async fn test_prompt_history_excludes_current_message() {
        let provider = MockProvider::new()
            .with_reply("###ANSWER###\nA.\n###ASSESSMENT###\nFine.")
            .with_reply("###ANSWER###\nB.\n###ASSESSMENT###\nFine.");
        let engine = ConversationEngine::new(&provider, EngineConfig::default());
        let mut session = session();

        engine.submit(&mut session, CASE, "first question", None).await;
        engine.submit(&mut session, CASE, "second question", None).await;

        let calls = provider.calls();
        let second_prompt = &calls[1].messages[0].content;
        assert!(second_prompt.contains("Interviewee: first question"));
        // The new message appears in its own section, not in the history
        assert!(!second_prompt.contains("Interviewee: second question"));
    }
}
