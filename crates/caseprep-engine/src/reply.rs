use tracing::debug;

/// Marker the model must place before its in-character answer
pub const ANSWER_MARKER: &str = "###ANSWER###";
/// Marker the model must place before its quality assessment
pub const ASSESSMENT_MARKER: &str = "###ASSESSMENT###";

const MISSING_MARKERS_ASSESSMENT: &str =
    "(no assessment: the response was missing its section markers)";
const MISSING_ASSESSMENT: &str =
    "(no assessment: the response was missing the assessment marker)";
const MISSING_ANSWER: &str = "(no answer: the response was missing the answer marker)";
const EMPTY_RESPONSE: &str = "(the interviewer returned an empty response)";

/// The two-part interviewer reply extracted from raw model output.
///
/// Parsing is total: malformed responses fall back to placeholder text
/// rather than an error, so a sloppy model never breaks the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterviewerReply {
    pub answer: String,
    pub assessment: String,
}

impl InterviewerReply {
    /// Split raw output at the two markers.
    ///
    /// Marker search is ASCII-case-insensitive and indifferent to
    /// surrounding whitespace. Fallbacks when markers are missing:
    /// no markers keeps the full text as the answer, a lone answer marker
    /// loses only the assessment, a lone assessment marker loses only the
    /// answer, and an empty response yields placeholders for both.
    pub fn parse(raw: &str) -> Self {
        debug!(output_len = raw.len(), "Parsing interviewer reply");

        if raw.trim().is_empty() {
            return Self {
                answer: EMPTY_RESPONSE.to_string(),
                assessment: EMPTY_RESPONSE.to_string(),
            };
        }

        match find_marker(raw, ANSWER_MARKER) {
            Some((_, answer_end)) => {
                let after_answer = &raw[answer_end..];
                match find_marker(after_answer, ASSESSMENT_MARKER) {
                    Some((assessment_start, assessment_end)) => Self {
                        answer: after_answer[..assessment_start].trim().to_string(),
                        assessment: after_answer[assessment_end..].trim().to_string(),
                    },
                    None => Self {
                        answer: after_answer.trim().to_string(),
                        assessment: MISSING_ASSESSMENT.to_string(),
                    },
                }
            }
            None => match find_marker(raw, ASSESSMENT_MARKER) {
                Some((_, assessment_end)) => Self {
                    answer: MISSING_ANSWER.to_string(),
                    assessment: raw[assessment_end..].trim().to_string(),
                },
                None => Self {
                    answer: raw.trim().to_string(),
                    assessment: MISSING_MARKERS_ASSESSMENT.to_string(),
                },
            },
        }
    }
}

/// Locate an ASCII marker case-insensitively; returns (start, end) byte offsets
fn find_marker(haystack: &str, marker: &str) -> Option<(usize, usize)> {
    haystack
        .as_bytes()
        .windows(marker.len())
        .position(|window| window.eq_ignore_ascii_case(marker.as_bytes()))
        .map(|pos| (pos, pos + marker.len()))
}
