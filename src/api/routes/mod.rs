//! API route modules.

pub mod session;
pub mod speech;

pub use super::AppState;
