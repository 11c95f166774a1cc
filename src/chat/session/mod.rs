//! Session lifecycle: at most one live session per widget, created lazily.

pub mod manager;

pub use manager::{EnsuredSession, SessionManager};
