//! Case prompt library for caseprep.
//!
//! Loads the fixed set of case prompts from a JSON file at startup and
//! hands them out via id lookup or random selection without repeats.

mod library;
mod picker;

pub use library::{CaseLibrary, CasePrompt, LibraryError, PLACEHOLDER_CASE_ID};
pub use picker::CasePicker;
