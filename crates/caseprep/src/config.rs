//! Project configuration file support for caseprep.
//!
//! Loads configuration from `caseprep.toml` in the working directory.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

/// Default model when neither the CLI nor the config file names one
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";

/// The config file name
pub const CONFIG_FILE_NAME: &str = "caseprep.toml";

/// Project-level configuration loaded from `caseprep.toml`
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ProjectConfig {
    /// Global default model (applies to both roles)
    pub model: Option<String>,
    /// Interviewer-role configuration (per-turn replies)
    #[serde(default)]
    pub interviewer: RoleConfig,
    /// Feedback-role configuration (end-of-run summary)
    #[serde(default)]
    pub feedback: RoleConfig,
}

/// Configuration for a specific role (interviewer or feedback)
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct RoleConfig {
    /// Model to use for this role
    pub model: Option<String>,
    /// Response-length budget for this role
    pub max_tokens: Option<u32>,
}

impl ProjectConfig {
    /// Load configuration from the working directory.
    ///
    /// Returns:
    /// - `Ok(Some(config))` if file exists and parses successfully
    /// - `Ok(None)` if file does not exist
    /// - `Err(...)` if file exists but fails to parse (hard error)
    pub fn load(working_dir: &Path) -> Result<Option<Self>> {
        let config_path = working_dir.join(CONFIG_FILE_NAME);

        if !config_path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read {}", config_path.display()))?;

        let config: ProjectConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", config_path.display()))?;

        Ok(Some(config))
    }

    /// Effective model for the interviewer role.
    /// Priority: [interviewer].model > global model > None
    pub fn interviewer_model(&self) -> Option<&str> {
        self.interviewer.model.as_deref().or(self.model.as_deref())
    }

    /// Effective model for the feedback role.
    /// Priority: [feedback].model > global model > None
    pub fn feedback_model(&self) -> Option<&str> {
        self.feedback.model.as_deref().or(self.model.as_deref())
    }

    pub fn interviewer_max_tokens(&self) -> Option<u32> {
        self.interviewer.max_tokens
    }

    pub fn feedback_max_tokens(&self) -> Option<u32> {
        self.feedback.max_tokens
    }
}
