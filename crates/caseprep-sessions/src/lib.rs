pub mod session;
pub mod store;
pub mod types;

pub use session::{PracticeSession, SessionError};
pub use store::SessionStore;
pub use types::{SessionRating, Skill, Turn, TurnRole};
