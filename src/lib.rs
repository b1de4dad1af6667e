pub mod api;
pub mod app;
pub mod browser;
pub mod config;
pub mod global;
pub mod session;
pub mod speech;
