use std::collections::HashMap;

use crate::session::PracticeSession;
use crate::types::Skill;

/// In-memory session registry, keyed by session id.
///
/// Each session is isolated under its own namespace key; no mutable state
/// crosses session boundaries and nothing survives the process.
#[derive(Default)]
pub struct SessionStore {
    sessions: HashMap<String, PracticeSession>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a fresh session and return its id
    pub fn create(&mut self, skill: Skill) -> String {
        let session = PracticeSession::new(skill);
        let id = session.id().to_string();
        self.sessions.insert(id.clone(), session);
        id
    }

    pub fn get(&self, id: &str) -> Option<&PracticeSession> {
        self.sessions.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut PracticeSession> {
        self.sessions.get_mut(id)
    }

    pub fn remove(&mut self, id: &str) -> Option<PracticeSession> {
        self.sessions.remove(id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
