//! Command Dispatcher
//!
//! Completed input lines become [`Command`]s. Commands that call back into
//! the application are queued as [`PendingCommand`]s and executed one at a
//! time by a single consumer loop, so two user-triggered actions never run
//! concurrently.
//!
//! The consumer waits for work with a timeout so it notices shutdown even
//! when the queue is idle. A failing (or panicking) action is logged and the
//! loop carries on.

use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::sync::mpsc;

/// Legend shown in the dashboard text field for the help command
pub const HELP_TEXT: &str = "r: start/stop | x: abort | q: quit | h: help | others: send text";

/// A classified input line
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    /// `q`: end the session
    Quit,
    /// `h`: show the command legend
    Help,
    /// `r`: start/stop automatic conversation
    ToggleAuto,
    /// `x`: abort the current response
    Abort,
    /// Anything else: send as text
    FreeText(String),
}

impl Command {
    /// Classify a completed line; blank lines yield nothing
    ///
    /// Single-letter commands are matched case-insensitively. Free text keeps
    /// its original case, trimmed.
    pub fn parse(line: &str) -> Option<Self> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return None;
        }
        let command = match trimmed.to_lowercase().as_str() {
            "q" => Command::Quit,
            "h" => Command::Help,
            "r" => Command::ToggleAuto,
            "x" => Command::Abort,
            _ => Command::FreeText(trimmed.to_string()),
        };
        Some(command)
    }
}

/// Future returned by callbacks
pub type ActionFuture = BoxFuture<'static, anyhow::Result<()>>;

/// Callback taking no arguments
pub type Callback = Arc<dyn Fn() -> ActionFuture + Send + Sync>;

/// Callback taking the typed text
pub type TextCallback = Arc<dyn Fn(String) -> ActionFuture + Send + Sync>;

/// Application callbacks invoked in response to keystrokes
///
/// Every entry is optional; commands without a registered callback are
/// dropped silently.
#[derive(Clone, Default)]
pub struct Callbacks {
    on_toggle_auto: Option<Callback>,
    on_abort: Option<Callback>,
    on_send_text: Option<TextCallback>,
    on_mode_toggle: Option<Callback>,
}

fn boxed_callback<F, Fut>(f: F) -> Callback
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    Arc::new(move || f().boxed())
}

impl Callbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_toggle_auto<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.on_toggle_auto = Some(boxed_callback(f));
        self
    }

    pub fn on_abort<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.on_abort = Some(boxed_callback(f));
        self
    }

    pub fn on_send_text<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.on_send_text = Some(Arc::new(move |text| f(text).boxed()));
        self
    }

    pub fn on_mode_toggle<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.on_mode_toggle = Some(boxed_callback(f));
        self
    }

    /// The queued action for a command, if it maps to a registered callback
    ///
    /// `Quit` and `Help` are handled by the display itself and never queue.
    pub fn action_for(&self, command: &Command) -> Option<PendingCommand> {
        match command {
            Command::Quit | Command::Help => None,
            Command::ToggleAuto => self
                .on_toggle_auto
                .clone()
                .map(|cb| PendingCommand::new("toggle_auto", move || cb())),
            Command::Abort => self
                .on_abort
                .clone()
                .map(|cb| PendingCommand::new("abort", move || cb())),
            Command::FreeText(text) => {
                let text = text.clone();
                self.on_send_text
                    .clone()
                    .map(|cb| PendingCommand::new("send_text", move || cb(text)))
            }
        }
    }

    /// The queued action for the mode toggle, if registered
    pub fn mode_toggle(&self) -> Option<PendingCommand> {
        self.on_mode_toggle
            .clone()
            .map(|cb| PendingCommand::new("mode_toggle", move || cb()))
    }
}

impl fmt::Debug for Callbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callbacks")
            .field("on_toggle_auto", &self.on_toggle_auto.is_some())
            .field("on_abort", &self.on_abort.is_some())
            .field("on_send_text", &self.on_send_text.is_some())
            .field("on_mode_toggle", &self.on_mode_toggle.is_some())
            .finish()
    }
}

/// One queued action, run at most once
pub struct PendingCommand {
    label: &'static str,
    action: Box<dyn FnOnce() -> ActionFuture + Send>,
}

impl PendingCommand {
    pub fn new<F>(label: &'static str, action: F) -> Self
    where
        F: FnOnce() -> ActionFuture + Send + 'static,
    {
        Self {
            label,
            action: Box::new(action),
        }
    }

    pub fn label(&self) -> &'static str {
        self.label
    }

    async fn run(self) -> anyhow::Result<()> {
        (self.action)().await
    }
}

impl fmt::Debug for PendingCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingCommand")
            .field("label", &self.label)
            .finish()
    }
}

/// Producer side of the dispatcher queue
#[derive(Clone, Debug)]
pub struct CommandQueue {
    tx: mpsc::UnboundedSender<PendingCommand>,
}

impl CommandQueue {
    /// Queue an action; returns false once the dispatcher has gone away
    pub fn enqueue(&self, command: PendingCommand) -> bool {
        self.tx.send(command).is_ok()
    }
}

/// Single consumer draining the queue
pub struct CommandDispatcher {
    rx: mpsc::UnboundedReceiver<PendingCommand>,
    poll_interval: Duration,
    running: Arc<AtomicBool>,
}

/// Create a queue and its dispatcher
pub fn channel(poll_interval: Duration, running: Arc<AtomicBool>) -> (CommandQueue, CommandDispatcher) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        CommandQueue { tx },
        CommandDispatcher {
            rx,
            poll_interval,
            running,
        },
    )
}

impl CommandDispatcher {
    /// Run queued actions one after another until shutdown
    ///
    /// Returns when `running` is cleared (checked at least every
    /// `poll_interval`) or every `CommandQueue` has been dropped. Actions
    /// already queued when `running` is cleared still run. Returns the number
    /// of actions that completed successfully.
    pub async fn run(mut self) -> usize {
        let mut completed = 0;

        loop {
            let command = if self.running.load(Ordering::SeqCst) {
                match tokio::time::timeout(self.poll_interval, self.rx.recv()).await {
                    Err(_) => continue,
                    Ok(None) => break,
                    Ok(Some(command)) => command,
                }
            } else {
                match self.rx.try_recv() {
                    Ok(command) => command,
                    Err(_) => break,
                }
            };

            if execute(command).await {
                completed += 1;
            }
        }

        tracing::debug!(completed, "command dispatcher stopped");
        completed
    }
}

/// Run one action, absorbing errors and panics
async fn execute(command: PendingCommand) -> bool {
    let label = command.label();
    tracing::debug!(action = label, "dispatching");

    match AssertUnwindSafe(command.run()).catch_unwind().await {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            tracing::error!("Command processing error ({}): {:#}", label, e);
            false
        }
        Err(_) => {
            tracing::error!("Command processing panicked ({})", label);
            false
        }
    }
}
