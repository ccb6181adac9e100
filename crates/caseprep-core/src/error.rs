use thiserror::Error;

#[derive(Error, Debug)]
pub enum PracticeError {
    #[error("case not found: {0}")]
    CaseNotFound(String),

    #[error("no cases available to practice against")]
    NoCases,

    #[error("session error: {0}")]
    Session(#[from] caseprep_sessions::SessionError),
}
