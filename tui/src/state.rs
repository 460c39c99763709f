//! Dashboard State
//!
//! The data shown in the dashboard region. Owned by the display session and
//! mutated only from its UI task; the renderer reads it during a pass.

use std::collections::VecDeque;

/// Number of log lines kept for the dashboard
pub const DEFAULT_LOG_CAPACITY: usize = 6;

/// Bounded FIFO of formatted log lines
///
/// Once full, pushing a line evicts the oldest one.
#[derive(Clone, Debug)]
pub struct LogLines {
    lines: VecDeque<String>,
    capacity: usize,
}

impl LogLines {
    /// Create an empty buffer holding at most `capacity` lines (minimum 1)
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            lines: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a line, evicting the oldest when full
    pub fn push(&mut self, line: impl Into<String>) {
        if self.lines.len() == self.capacity {
            self.lines.pop_front();
        }
        self.lines.push_back(line.into());
    }

    /// Lines in arrival order, oldest first
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for LogLines {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_LOG_CAPACITY)
    }
}

/// Everything the dashboard region displays
#[derive(Clone, Debug, Default)]
pub struct DashboardState {
    /// Status line (e.g. "Listening", "Speaking")
    pub status: String,
    /// Whether the protocol client is connected
    pub connected: bool,
    /// Current emotion label
    pub emotion: String,
    /// Free-form text (last utterance, button status, help legend)
    pub text: String,
    /// Recently intercepted warning/error log lines
    pub logs: LogLines,
}

impl DashboardState {
    /// Create an empty state with room for `log_capacity` log lines
    pub fn new(log_capacity: usize) -> Self {
        Self {
            logs: LogLines::with_capacity(log_capacity),
            ..Self::default()
        }
    }

    /// Label for the connection flag
    pub fn connection_label(&self) -> &'static str {
        if self.connected {
            "Connected"
        } else {
            "Disconnected"
        }
    }
}
