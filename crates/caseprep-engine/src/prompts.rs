use caseprep_sessions::{PracticeSession, Skill, Turn, TurnRole};

use crate::reply::{ANSWER_MARKER, ASSESSMENT_MARKER};

/// Prompt templates for the simulated interviewer and the feedback pass
pub struct CoachPrompts;

impl CoachPrompts {
    /// System instruction for per-turn interviewer replies
    pub fn system_instruction(skill: Skill) -> String {
        let focus = match skill {
            Skill::ClarifyingQuestions => {
                "The candidate is practicing asking clarifying questions about the case \
                 before structuring it. Answer only what is asked, the way a real \
                 interviewer would: share facts a reasonable interviewer would reveal, \
                 deflect questions the candidate should answer themselves."
            }
            Skill::Framework => {
                "The candidate is practicing structuring the case. They will propose a \
                 framework; react the way a real interviewer would: probe weak branches, \
                 acknowledge solid structure, and nudge without solving the case for them."
            }
        };

        format!(
            "You are a seasoned management-consulting interviewer running a practice \
             case interview. Stay in character and keep replies concise. {}",
            focus
        )
    }

    /// System instruction for the aggregate feedback pass
    pub fn feedback_system_instruction() -> String {
        "You are a seasoned management-consulting interview coach writing final \
         feedback after a practice case interview. Be specific, reference the \
         candidate's actual inputs, and keep a constructive tone."
            .to_string()
    }

    /// Per-turn user instruction: case context, prior transcript, the new
    /// input, and the two-section response contract.
    pub fn build_turn_prompt(case_text: &str, history: &[Turn], message: &str) -> String {
        format!(
            r#"## Case
{case}

## Conversation so far
{history}

## New input from the candidate
{message}

Respond with exactly two sections, in this order, each introduced by its marker on its own line.

{answer_marker}
Your in-character reply to the candidate's input, grounded in the case.

{assessment_marker}
One or two sentences assessing the quality of the candidate's input at this stage of a case interview: what was strong, what was weak, and what a top candidate would have done instead."#,
            case = truncate_output(case_text, 8000),
            history = Self::format_history(history),
            message = message,
            answer_marker = ANSWER_MARKER,
            assessment_marker = ASSESSMENT_MARKER,
        )
    }

    /// Feedback prompt: the transcript as numbered input/response/assessment
    /// blocks plus the fixed markdown structure and five-point rubric.
    pub fn build_feedback_prompt(case_text: &str, transcript: &[Turn]) -> String {
        format!(
            r#"## Case
{case}

## Practice transcript
{transcript}

Write aggregate feedback on the candidate's performance as markdown with exactly this structure:

# Overall rating: <N>/5

## Summary
## Strengths
## Improvement areas
## Actionable next steps
## Example alternatives

Score against a five-point rubric: 5 = inputs an experienced consultant would produce; 4 = strong with minor gaps; 3 = adequate but generic or unfocused; 2 = significant gaps in relevance or structure; 1 = inputs that would end the interview early. In "Example alternatives", rewrite one or two of the candidate's weaker inputs the way a top candidate would have put them."#,
            case = truncate_output(case_text, 8000),
            transcript = Self::format_numbered_transcript(transcript),
        )
    }

    /// Transcript as `"<Role>: <content>"` lines for the turn prompt
    fn format_history(history: &[Turn]) -> String {
        if history.is_empty() {
            return "(no prior exchanges)".to_string();
        }
        history
            .iter()
            .map(|turn| format!("{}: {}", turn.role, turn.content))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Transcript as numbered Input / Response / Assessment blocks
    fn format_numbered_transcript(transcript: &[Turn]) -> String {
        let mut lines = Vec::new();
        for (index, turn) in transcript.iter().enumerate() {
            let n = PracticeSession::turn_number(index);
            match turn.role {
                TurnRole::Interviewee => {
                    lines.push(format!("Input {}:\n{}", n, turn.content));
                }
                TurnRole::Interviewer => {
                    lines.push(format!("Response to Input {}:\n{}", n, turn.content));
                    lines.push(format!(
                        "Assessment of Input {}:\n{}",
                        n,
                        turn.assessment.as_deref().unwrap_or("(none)")
                    ));
                }
            }
        }
        lines.join("\n\n")
    }
}

fn truncate_output(output: &str, max_len: usize) -> &str {
    if output.len() <= max_len {
        output
    } else {
        // Try to truncate at a line boundary
        if let Some(pos) = output[..max_len].rfind('\n') {
            &output[..pos]
        } else {
            &output[..max_len]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exchange(n: usize) -> Vec<Turn> {
        let mut turns = Vec::new();
        for i in 1..=n {
            turns.push(Turn {
                role: TurnRole::Interviewee,
                content: format!("question {}", i),
                assessment: None,
            });
            turns.push(Turn {
                role: TurnRole::Interviewer,
                content: format!("answer {}", i),
                assessment: Some(format!("assessment {}", i)),
            });
        }
        turns
    }

    #[test]
    fn test_turn_prompt_carries_contract_and_context() {
        let prompt = CoachPrompts::build_turn_prompt(
            "Client X wants to enter market Y",
            &exchange(1),
            "What is the company's current market share?",
        );

        assert!(prompt.contains("Client X wants to enter market Y"));
        assert!(prompt.contains("Interviewee: question 1"));
        assert!(prompt.contains("Interviewer: answer 1"));
        assert!(prompt.contains("What is the company's current market share?"));
        assert!(prompt.contains(ANSWER_MARKER));
        assert!(prompt.contains(ASSESSMENT_MARKER));
        // Two-section contract: answer marker comes first
        assert!(prompt.find(ANSWER_MARKER).unwrap() < prompt.find(ASSESSMENT_MARKER).unwrap());
    }

    #[test]
    fn test_turn_prompt_with_empty_history() {
        let prompt = CoachPrompts::build_turn_prompt("case", &[], "first question");
        assert!(prompt.contains("(no prior exchanges)"));
    }

    #[test]
    fn test_feedback_prompt_numbers_exchanges() {
        let prompt = CoachPrompts::build_feedback_prompt("case", &exchange(2));

        assert!(prompt.contains("Input 1:\nquestion 1"));
        assert!(prompt.contains("Response to Input 1:\nanswer 1"));
        assert!(prompt.contains("Assessment of Input 1:\nassessment 1"));
        assert!(prompt.contains("Input 2:\nquestion 2"));
        assert!(prompt.contains("Assessment of Input 2:\nassessment 2"));
        assert!(prompt.contains("# Overall rating"));
        assert!(prompt.contains("## Example alternatives"));
    }

    #[test]
    fn test_feedback_prompt_handles_missing_assessment() {
        let transcript = vec![
            Turn {
                role: TurnRole::Interviewee,
                content: "q".into(),
                assessment: None,
            },
            Turn {
                role: TurnRole::Interviewer,
                content: "a".into(),
                assessment: None,
            },
        ];
        let prompt = CoachPrompts::build_feedback_prompt("case", &transcript);
        assert!(prompt.contains("Assessment of Input 1:\n(none)"));
    }

    #[test]
    fn test_truncate_prefers_line_boundary() {
        let text = "line one\nline two\nline three";
        let truncated = truncate_output(text, 15);
        assert_eq!(truncated, "line one");

        assert_eq!(truncate_output("short", 100), "short");
    }
}
