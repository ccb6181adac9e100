use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tracing::{info, warn};

use caseprep_engine::{ConversationEngine, EngineConfig, EngineReply, FeedbackAggregator, ProgressCallback};
use caseprep_llm::CompletionProvider;
use caseprep_logging::{LogEvent, Logger, RatingWriter};
use caseprep_prompts::{CaseLibrary, CasePicker, CasePrompt};
use caseprep_sessions::{PracticeSession, SessionStore, Skill};

use crate::error::PracticeError;
use crate::outcome::PracticeOutcome;
use crate::ratings::{RatingCollector, RatingError};

/// Orchestrates practice runs: case selection, exchanges, feedback, rating.
///
/// One runner owns one session namespace. The UI layer drives it one event
/// at a time; a completion in flight blocks further submissions via the
/// session's pending flag.
pub struct PracticeRunner<'a> {
    interviewer: &'a dyn CompletionProvider,
    feedback: &'a dyn CompletionProvider,
    library: &'a CaseLibrary,
    logger: Arc<Logger>,
    engine_config: EngineConfig,
    feedback_max_tokens: Option<u32>,
    max_turns: Option<usize>,
    picker: CasePicker,
    store: SessionStore,
    session_id: String,
    rating_writer: Option<RatingWriter>,
    interrupted: Arc<AtomicBool>,
    started: Instant,
}

impl<'a> PracticeRunner<'a> {
    pub fn new(
        interviewer: &'a dyn CompletionProvider,
        feedback: &'a dyn CompletionProvider,
        library: &'a CaseLibrary,
        logger: Arc<Logger>,
        skill: Skill,
    ) -> Self {
        let picker = CasePicker::new(library);
        let mut store = SessionStore::new();
        let session_id = store.create(skill);

        logger.log(&LogEvent::PracticeStarted {
            session_id: session_id.clone(),
            skill: skill.to_string(),
        });

        Self {
            interviewer,
            feedback,
            library,
            logger,
            engine_config: EngineConfig::default(),
            feedback_max_tokens: None,
            max_turns: None,
            picker,
            store,
            session_id,
            rating_writer: None,
            interrupted: Arc::new(AtomicBool::new(false)),
            started: Instant::now(),
        }
    }

    pub fn with_engine_config(mut self, config: EngineConfig) -> Self {
        self.engine_config = config;
        self
    }

    pub fn with_feedback_max_tokens(mut self, max_tokens: u32) -> Self {
        self.feedback_max_tokens = Some(max_tokens);
        self
    }

    pub fn with_max_turns(mut self, max_turns: usize) -> Self {
        self.max_turns = Some(max_turns);
        self
    }

    /// Get a handle to signal interruption
    pub fn interrupt_handle(&self) -> Arc<AtomicBool> {
        self.interrupted.clone()
    }

    pub fn is_interrupted(&self) -> bool {
        self.interrupted.load(Ordering::SeqCst)
    }

    pub fn session(&self) -> &PracticeSession {
        self.store
            .get(&self.session_id)
            .expect("active session missing from store")
    }

    fn session_mut(&mut self) -> &mut PracticeSession {
        self.store
            .get_mut(&self.session_id)
            .expect("active session missing from store")
    }

    /// Begin a fresh run: reset the session and draw the next case.
    ///
    /// The draw history survives the reset, so no case repeats until the
    /// whole library has been seen.
    pub fn start_run(&mut self, skill: Skill) -> Result<CasePrompt, PracticeError> {
        let case_id = self.picker.pick().ok_or(PracticeError::NoCases)?;
        let case = self
            .library
            .get(&case_id)
            .ok_or(PracticeError::CaseNotFound(case_id))?
            .clone();

        let session = self.session_mut();
        session.reset(skill);
        session.begin_run(&case.id);

        info!(case_id = %case.id, %skill, "Practice run started");
        self.logger.log(&LogEvent::CaseSelected {
            case_id: case.id.clone(),
            title: case.display_title().to_string(),
        });

        Ok(case)
    }

    /// Switch the active skill, resetting all run state
    pub fn switch_skill(&mut self, skill: Skill) -> Result<CasePrompt, PracticeError> {
        self.session_mut().reset(skill);
        self.logger.log(&LogEvent::SessionReset {
            skill: skill.to_string(),
        });
        self.start_run(skill)
    }

    /// The case the current run practices against
    pub fn current_case(&self) -> Option<&CasePrompt> {
        self.library.get(self.session().case_id()?)
    }

    /// Submit one user message to the conversation engine
    pub async fn submit(
        &mut self,
        message: &str,
        on_delta: Option<ProgressCallback>,
    ) -> EngineReply {
        if self.session().is_pending() {
            return EngineReply::Rejected {
                warning: "A reply is still in flight. Wait for it to finish.".to_string(),
            };
        }

        if let Some(max) = self.max_turns {
            if self.session().exchanges() >= max {
                return EngineReply::Rejected {
                    warning: format!(
                        "Turn limit of {} reached. Finish the run with /done.",
                        max
                    ),
                };
            }
        }

        let case_text = match self.current_case() {
            Some(case) => case.prompt_text.clone(),
            None => {
                return EngineReply::Rejected {
                    warning: "No active case. Start a run first.".to_string(),
                }
            }
        };

        let provider = self.interviewer;
        let config = self.engine_config.clone();
        let logger = self.logger.clone();

        let engine = ConversationEngine::new(provider, config);
        let session = self
            .store
            .get_mut(&self.session_id)
            .expect("active session missing from store");

        let preview: String = message.trim().chars().take(80).collect();
        let reply = engine.submit(session, &case_text, message, on_delta).await;

        if let EngineReply::Answered {
            turn_number,
            degraded,
        } = &reply
        {
            logger.log(&LogEvent::QuestionSubmitted {
                turn_number: *turn_number,
                preview,
            });
            if let Some(turn) = session.transcript().last() {
                logger.log(&LogEvent::ReplyReceived {
                    turn_number: *turn_number,
                    answer: turn.content.clone(),
                    assessment: turn
                        .assessment
                        .clone()
                        .unwrap_or_else(|| "(none)".to_string()),
                    degraded: *degraded,
                });
            }
        }

        reply
    }

    /// Generate (or re-read) the end-of-run aggregate feedback
    pub async fn finish(&mut self) -> Option<String> {
        if self.session().transcript().is_empty() {
            return None;
        }

        let case_text = self.current_case().map(|c| c.prompt_text.clone())?;

        self.logger.log(&LogEvent::FeedbackStarted {
            exchanges: self.session().exchanges(),
            elapsed_secs: self.session().elapsed_seconds(),
        });

        let provider = self.feedback;
        let logger = self.logger.clone();
        let mut aggregator = FeedbackAggregator::new(provider);
        if let Some(max_tokens) = self.feedback_max_tokens {
            aggregator = aggregator.with_max_tokens(max_tokens);
        }
        let session = self
            .store
            .get_mut(&self.session_id)
            .expect("active session missing from store");

        let feedback = aggregator.summarize(session, &case_text).await;

        if let Some(ref text) = feedback {
            logger.log(&LogEvent::FeedbackGenerated {
                feedback_len: text.len(),
                is_error: FeedbackAggregator::is_error(text),
            });
        }

        feedback
    }

    /// Record the satisfaction rating for the current run
    pub fn rate(&mut self, stars: u8, comment: &str) -> Result<(), RatingError> {
        if self.rating_writer.is_none() {
            match RatingWriter::new(&self.session_id) {
                Ok(writer) => self.rating_writer = Some(writer),
                Err(e) => {
                    warn!(error = %e, "Rating telemetry sink unavailable");
                }
            }
        }

        let logger = self.logger.clone();
        let writer = self.rating_writer.as_ref();
        let collector = RatingCollector::new(&logger, writer);

        let session = self
            .store
            .get_mut(&self.session_id)
            .expect("active session missing from store");
        collector.record(session, stars, comment)
    }

    /// Consume the runner into a failure outcome
    pub fn into_failure(self, error: String) -> PracticeOutcome {
        PracticeOutcome::failed(error, self.started.elapsed())
    }

    /// Consume the runner into the run's final outcome
    pub fn into_outcome(self) -> PracticeOutcome {
        let exchanges = self.session().exchanges();
        let rated = self.session().is_rated();
        let duration = self.started.elapsed();

        if self.is_interrupted() {
            PracticeOutcome::interrupted(exchanges, duration)
        } else {
            PracticeOutcome::completed(exchanges, rated, duration)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use caseprep_llm::MockProvider;
    use caseprep_logging::LogFormat;
    use caseprep_prompts::CasePrompt;

    fn library() -> CaseLibrary {
        CaseLibrary::from_cases(vec![
            CasePrompt {
                id: "market-entry".into(),
                title: Some("Market entry".into()),
                prompt_text: "Client X wants to enter market Y".into(),
            },
            CasePrompt {
                id: "profitability".into(),
                title: None,
                prompt_text: "Client Z has falling margins".into(),
            },
        ])
        .unwrap()
    }

    fn logger() -> Arc<Logger> {
        Arc::new(Logger::new(LogFormat::Compact))
    }

    #[tokio::test]
    async fn test_full_run_records_exchange_and_feedback() {
        let provider = MockProvider::new()
            .with_reply("###ANSWER###\nAbout 12%.\n###ASSESSMENT###\nGood, specific question.")
            .with_reply("# Overall rating: 4/5\n\n## Summary\nSolid run.");
        let library = library();
        let mut runner =
            PracticeRunner::new(&provider, &provider, &library, logger(), Skill::ClarifyingQuestions);

        let case = runner.start_run(Skill::ClarifyingQuestions).unwrap();
        assert!(library.get(&case.id).is_some());

        let reply = runner
            .submit("What is the company's current market share?", None)
            .await;
        assert_eq!(
            reply,
            EngineReply::Answered {
                turn_number: 1,
                degraded: false
            }
        );

        let feedback = runner.finish().await.unwrap();
        assert!(feedback.contains("Overall rating"));

        // Feedback is memoized: only the turn and the summary hit the endpoint
        runner.finish().await.unwrap();
        assert_eq!(provider.call_count(), 2);

        let outcome = runner.into_outcome();
        assert_eq!(outcome.exchanges(), 1);
        assert_eq!(outcome.exit_code(), 0);
    }

    #[tokio::test]
    async fn test_submit_without_active_case_rejected() {
        let provider = MockProvider::new();
        let library = library();
        let mut runner = PracticeRunner::new(&provider, &provider, &library, logger(), Skill::Framework);

        let reply = runner.submit("hello?", None).await;
        assert!(matches!(reply, EngineReply::Rejected { .. }));
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn test_max_turns_gate() {
        let provider = MockProvider::new()
            .with_reply("###ANSWER###\nA.\n###ASSESSMENT###\nFine.");
        let library = library();
        let mut runner = PracticeRunner::new(&provider, &provider, &library, logger(), Skill::Framework)
            .with_max_turns(1);

        runner.start_run(Skill::Framework).unwrap();
        runner.submit("first", None).await;

        let reply = runner.submit("second", None).await;
        assert!(matches!(reply, EngineReply::Rejected { .. }));
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn test_new_runs_cycle_through_library_without_repeats() {
        let provider = MockProvider::new();
        let library = library();
        let mut runner = PracticeRunner::new(&provider, &provider, &library, logger(), Skill::Framework);

        let first = runner.start_run(Skill::Framework).unwrap();
        let second = runner.start_run(Skill::Framework).unwrap();
        assert_ne!(first.id, second.id);

        // Library exhausted; the third run may repeat
        let third = runner.start_run(Skill::Framework).unwrap();
        assert!(library.get(&third.id).is_some());
    }

    #[tokio::test]
    async fn test_switch_skill_resets_run_state() {
        let provider = MockProvider::new()
            .with_reply("###ANSWER###\nA.\n###ASSESSMENT###\nFine.");
        let library = library();
        let mut runner =
            PracticeRunner::new(&provider, &provider, &library, logger(), Skill::ClarifyingQuestions);

        runner.start_run(Skill::ClarifyingQuestions).unwrap();
        runner.submit("a question", None).await;
        assert_eq!(runner.session().exchanges(), 1);

        runner.switch_skill(Skill::Framework).unwrap();
        assert_eq!(runner.session().skill(), Skill::Framework);
        assert!(runner.session().transcript().is_empty());
    }

    #[tokio::test]
    async fn test_interrupted_outcome() {
        let provider = MockProvider::new();
        let library = library();
        let runner = PracticeRunner::new(&provider, &provider, &library, logger(), Skill::Framework);

        runner.interrupt_handle().store(true, Ordering::SeqCst);
        let outcome = runner.into_outcome();
        assert_eq!(outcome.exit_code(), 130);
    }
}
