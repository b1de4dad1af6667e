//! Browser session orchestration: lifecycle, login, join/leave protocols,
//! popup sweeping, and element resolution.

pub mod error;
pub mod join;
pub mod login;
pub mod machine;
pub mod popups;
pub mod resolver;
pub mod status;

pub use error::SessionError;
pub use machine::SessionMachine;
pub use status::{SessionPhase, SessionState, SessionStatusHandle};

use crate::config::{ConfirmPolicy, Credentials};

/// Everything a [`SessionMachine`] needs beyond the engine itself.
#[derive(Clone)]
pub struct SessionSettings {
    pub credentials: Credentials,
    pub headless: bool,
    pub strictness: ConfirmPolicy,
}
