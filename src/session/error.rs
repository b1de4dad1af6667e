//! Session error taxonomy.
//!
//! Leaf-step failures (a single popup, a camera toggle) never become one of
//! these — they are swallowed and logged at their call site. Everything here
//! is a decision-point failure surfaced to the caller.

use crate::browser::DriverError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session not initialized")]
    NotInitialized,

    #[error("operation `{operation}` not allowed while session is {phase}")]
    InvalidState {
        operation: &'static str,
        phase: &'static str,
    },

    #[error("no locator candidate became visible for {step}")]
    ResolutionFailed { step: String },

    #[error("failed to interact with {step}: {reason}")]
    InteractionFailed { step: String, reason: String },

    #[error("browser failed to launch after {attempts} attempts and fallback")]
    LaunchFailed { attempts: u32 },

    #[error("authentication rejected: {reason}")]
    AuthRejected { reason: String },

    #[error("could not confirm outcome of {step}")]
    Unconfirmed { step: String },

    #[error(transparent)]
    Driver(#[from] DriverError),
}

impl SessionError {
    pub fn resolution(step: impl Into<String>) -> Self {
        Self::ResolutionFailed { step: step.into() }
    }

    pub fn interaction(step: impl Into<String>, reason: impl ToString) -> Self {
        Self::InteractionFailed {
            step: step.into(),
            reason: reason.to_string(),
        }
    }
}
