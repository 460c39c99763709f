//! Console Display - terminal front end for the voice assistant client
//!
//! The screen is split into two regions that never overlap:
//!
//! - a framed **dashboard** at the top (status, connection, emotion, last
//!   text and the most recent warning/error log lines)
//! - an **input area** at the bottom: a separator and a raw-mode prompt that
//!   decodes UTF-8 keystrokes and redraws the whole line on every edit
//!
//! # Architecture
//!
//! - **Display**: session lifecycle and the single UI task that owns the
//!   terminal; collaborators update it through a [`DisplayHandle`]
//! - **Render**: direct cursor addressing with crossterm
//! - **Input**: termios raw mode, poll-based reads, UTF-8 assembly
//! - **Dispatcher**: serialized execution of application callbacks
//! - **Log layer**: `tracing` layer routing WARN+ records into the dashboard

pub mod config;
pub mod dispatcher;
pub mod display;
pub mod error;
pub mod geometry;
pub mod input;
pub mod log_layer;
pub mod render;
pub mod state;

pub use config::{ConfigError, DisplayConfig};
pub use dispatcher::{Callbacks, Command, HELP_TEXT};
pub use display::{Display, DisplayHandle, ExitReason, SessionState};
pub use error::{DisplayError, Result};
pub use geometry::TerminalGeometry;
pub use input::{InputError, InputSource, ReaderInput, TerminalInput};
pub use log_layer::DashboardLogLayer;
pub use state::DashboardState;
