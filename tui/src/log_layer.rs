//! Log Interceptor
//!
//! A `tracing_subscriber` layer that captures WARN and ERROR events and
//! forwards them, formatted, into the running display session.
//!
//! # Lifetime
//!
//! The layer is installed once per process, but it only forwards while a
//! display session has a sink attached. `Display` attaches its sink when the
//! session starts and the returned [`SinkGuard`] detaches it on close.
//! Events arriving with no sink attached are dropped.
//!
//! # Threading
//!
//! Events can be emitted from any thread. The layer never renders: it sends
//! the formatted line over an unbounded channel, and the display's UI task
//! appends it to the dashboard and redraws.

use std::fmt::{self, Write as _};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Local};
use tokio::sync::mpsc;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::error::{DisplayError, Result};

/// Receiving end of the log sink
pub type LogReceiver = mpsc::UnboundedReceiver<String>;

type Slot = Arc<Mutex<Option<mpsc::UnboundedSender<String>>>>;

/// Format a record as `timestamp [logger] - LEVEL - message`
pub fn format_record(
    timestamp: DateTime<Local>,
    target: &str,
    level: &Level,
    message: &str,
) -> String {
    format!(
        "{} [{}] - {} - {}",
        timestamp.format("%Y-%m-%d %H:%M:%S"),
        target,
        level,
        message
    )
}

/// Whether a level is captured for the dashboard
pub fn is_captured(level: &Level) -> bool {
    matches!(*level, Level::ERROR | Level::WARN)
}

/// Layer forwarding WARN+ events to an attached display
#[derive(Clone, Default)]
pub struct DashboardLogLayer {
    slot: Slot,
}

impl DashboardLogLayer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a fresh sink, replacing any previous one
    pub fn attach(&self) -> (SinkGuard, LogReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        if let Ok(mut slot) = self.slot.lock() {
            *slot = Some(tx);
        }
        (
            SinkGuard {
                slot: Arc::clone(&self.slot),
            },
            rx,
        )
    }

    pub fn is_attached(&self) -> bool {
        self.slot.lock().map(|slot| slot.is_some()).unwrap_or(false)
    }

    /// Install as the process-wide subscriber
    ///
    /// The subscriber has no formatting layer writing to stdout or stderr:
    /// anything printed there would tear the managed screen regions. The
    /// filter comes from `RUST_LOG`, or `default_filter` when unset.
    pub fn install(&self, default_filter: &str) -> Result<()> {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(default_filter));
        tracing_subscriber::registry()
            .with(filter)
            .with(self.clone())
            .try_init()
            .map_err(|e| DisplayError::LogInstall(e.to_string()))
    }

    fn forward(&self, line: String) {
        if let Ok(slot) = self.slot.lock() {
            if let Some(tx) = slot.as_ref() {
                let _ = tx.send(line);
            }
        }
    }
}

impl fmt::Debug for DashboardLogLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DashboardLogLayer")
            .field("attached", &self.is_attached())
            .finish()
    }
}

impl<S: Subscriber> Layer<S> for DashboardLogLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let meta = event.metadata();
        if !is_captured(meta.level()) {
            return;
        }

        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);

        self.forward(format_record(
            Local::now(),
            meta.target(),
            meta.level(),
            &visitor.finish(),
        ));
    }
}

/// Detaches the display's sink when dropped
#[must_use = "dropping the guard detaches the sink immediately"]
pub struct SinkGuard {
    slot: Slot,
}

impl Drop for SinkGuard {
    fn drop(&mut self) {
        if let Ok(mut slot) = self.slot.lock() {
            slot.take();
        }
    }
}

/// Collects the `message` field plus any extra fields as `key=value`
#[derive(Default)]
struct MessageVisitor {
    message: String,
    fields: String,
}

impl MessageVisitor {
    fn finish(self) -> String {
        if self.fields.is_empty() {
            self.message
        } else if self.message.is_empty() {
            self.fields.trim_start().to_string()
        } else {
            format!("{}{}", self.message, self.fields)
        }
    }
}

impl Visit for MessageVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message.push_str(value);
        } else {
            let _ = write!(self.fields, " {}={}", field.name(), value);
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            let _ = write!(self.message, "{value:?}");
        } else {
            let _ = write!(self.fields, " {}={:?}", field.name(), value);
        }
    }
}
