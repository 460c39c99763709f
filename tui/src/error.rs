//! Error Types
//!
//! Terminal I/O failures are fatal to a session: the display cannot work
//! without a terminal. Everything else (decode anomalies, failing callbacks)
//! is absorbed where it happens and never reaches this type.

use std::io;

use thiserror::Error;

use crate::config::ConfigError;
use crate::display::SessionState;

/// Errors surfaced by the display
#[derive(Debug, Error)]
pub enum DisplayError {
    /// Writing to or reading from the terminal failed
    #[error("Terminal I/O failed: {0}")]
    Io(#[from] io::Error),

    /// Configuration could not be loaded
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A global tracing subscriber is already installed
    #[error("Failed to install log interceptor: {0}")]
    LogInstall(String),

    /// Operation not valid in the current session state
    #[error("Display session is {0:?}")]
    InvalidState(SessionState),
}

pub type Result<T> = std::result::Result<T, DisplayError>;
