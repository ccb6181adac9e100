use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use thiserror::Error;
use tracing::warn;

/// Id of the synthetic prompt installed when the case file cannot be loaded
pub const PLACEHOLDER_CASE_ID: &str = "placeholder";

/// A single case prompt, immutable once loaded
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CasePrompt {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    pub prompt_text: String,
}

impl CasePrompt {
    /// Title if present, otherwise the id
    pub fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.id)
    }
}

#[derive(Error, Debug)]
pub enum LibraryError {
    #[error("failed to read case file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse case file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("duplicate case id: {0}")]
    DuplicateId(String),

    #[error("case file contains no prompts")]
    Empty,
}

/// The loaded set of case prompts.
///
/// Loading never aborts startup: a missing or malformed file degrades to a
/// single placeholder prompt carrying the load error, which the UI surfaces
/// as a blocking banner.
pub struct CaseLibrary {
    cases: Vec<CasePrompt>,
    load_error: Option<String>,
}

impl CaseLibrary {
    /// Load the case file, degrading to a placeholder on any failure
    pub fn load(path: &Path) -> Self {
        match Self::try_load(path) {
            Ok(library) => library,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Falling back to placeholder case");
                Self::placeholder(e.to_string())
            }
        }
    }

    fn try_load(path: &Path) -> Result<Self, LibraryError> {
        let content = std::fs::read_to_string(path)?;
        let cases: Vec<CasePrompt> = serde_json::from_str(&content)?;
        Self::from_cases(cases)
    }

    /// Build a library from an in-memory set, enforcing id uniqueness
    pub fn from_cases(cases: Vec<CasePrompt>) -> Result<Self, LibraryError> {
        if cases.is_empty() {
            return Err(LibraryError::Empty);
        }

        let mut seen = HashSet::new();
        for case in &cases {
            if !seen.insert(case.id.as_str()) {
                return Err(LibraryError::DuplicateId(case.id.clone()));
            }
        }

        Ok(Self {
            cases,
            load_error: None,
        })
    }

    fn placeholder(error: String) -> Self {
        let prompt_text = format!(
            "No case prompts could be loaded ({}). \
             This placeholder case stands in so the session can still run: \
             your client is a regional retailer considering an online channel. \
             Practice against it, or fix the case file and restart.",
            error
        );
        Self {
            cases: vec![CasePrompt {
                id: PLACEHOLDER_CASE_ID.to_string(),
                title: Some("Placeholder case".to_string()),
                prompt_text,
            }],
            load_error: Some(error),
        }
    }

    /// The error that forced the placeholder, if loading failed
    pub fn load_error(&self) -> Option<&str> {
        self.load_error.as_deref()
    }

    pub fn get(&self, id: &str) -> Option<&CasePrompt> {
        self.cases.iter().find(|c| c.id == id)
    }

    pub fn ids(&self) -> Vec<String> {
        self.cases.iter().map(|c| c.id.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.cases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CasePrompt> {
        self.cases.iter()
    }
}
