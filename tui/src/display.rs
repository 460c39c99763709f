//! Display Facade
//!
//! The public face of the terminal display: state updates, callback
//! registration and the session lifecycle.
//!
//! # Architecture
//!
//! One UI task owns the dashboard state and the terminal output. Everything
//! else talks to it through messages:
//!
//! - [`DisplayHandle`] (cloneable) sends state updates from collaborators
//! - the input thread sends edits and completed lines
//! - the log layer sends formatted warning/error lines
//!
//! Completed lines are classified into [`Command`]s; those mapping to an
//! application callback go to the [`CommandDispatcher`], which runs them one
//! at a time on its own task.
//!
//! # Lifecycle
//!
//! `Created -> Started -> Running -> Closing -> Closed`. A closed display
//! cannot be restarted; updates sent after closing are accepted and ignored.
//!
//! [`CommandDispatcher`]: crate::dispatcher::CommandDispatcher

use std::io::{self, IsTerminal, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};

use crate::config::DisplayConfig;
use crate::dispatcher::{self, Callbacks, Command, CommandQueue, HELP_TEXT};
use crate::error::{DisplayError, Result};
use crate::geometry::TerminalGeometry;
use crate::input::{InputError, InputSource, TerminalInput};
use crate::log_layer::{DashboardLogLayer, LogReceiver};
use crate::render::ScreenRenderer;
use crate::state::DashboardState;

/// Message written once the session has ended
pub const CLOSING_MESSAGE: &str = "Closing application...";

/// Session lifecycle
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    /// Constructed, nothing drawn yet
    Created,
    /// Screen initialized, tasks not yet launched
    Started,
    /// Input reader and dispatcher running
    Running,
    /// Shutdown requested, waiting for tasks to exit
    Closing,
    /// Terminal restored, session over
    Closed,
}

/// Why a session ended
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExitReason {
    /// The user entered the quit command
    Quit,
    /// The user pressed Ctrl-C
    Interrupted,
    /// Standard input reached end of file
    InputClosed,
    /// A collaborator called [`DisplayHandle::close`]
    Closed,
}

#[derive(Debug)]
enum UiMessage {
    Status { text: String, connected: bool },
    Text(String),
    Emotion(String),
    ButtonStatus(String),
    ToggleMode,
    Log(String),
    InputEdited(String),
    InputSubmitted(String),
    InputEnded(InputError),
    Close,
}

/// Cloneable sender for state updates
///
/// Safe to use from any task or thread. Every update triggers a dashboard
/// redraw on the UI task.
#[derive(Clone, Debug)]
pub struct DisplayHandle {
    tx: mpsc::UnboundedSender<UiMessage>,
}

impl DisplayHandle {
    fn send(&self, message: UiMessage) {
        let _ = self.tx.send(message);
    }

    /// Set the status line and connection flag
    pub fn update_status(&self, text: impl Into<String>, connected: bool) {
        self.send(UiMessage::Status {
            text: text.into(),
            connected,
        });
    }

    /// Set the text field; blank text is ignored and the rest is trimmed
    pub fn update_text(&self, text: impl Into<String>) {
        self.send(UiMessage::Text(text.into()));
    }

    /// Set the emotion label
    pub fn update_emotion(&self, name: impl Into<String>) {
        self.send(UiMessage::Emotion(name.into()));
    }

    /// Show a button status in the text field
    pub fn update_button_status(&self, text: impl Into<String>) {
        self.send(UiMessage::ButtonStatus(text.into()));
    }

    /// Queue the mode-toggle callback, if one is registered
    pub fn toggle_mode(&self) {
        self.send(UiMessage::ToggleMode);
    }

    /// There is no window to show or hide in a terminal
    pub fn toggle_window_visibility(&self) {
        tracing::debug!("Window visibility toggle not supported in terminal mode");
    }

    /// End the session
    pub fn close(&self) {
        self.send(UiMessage::Close);
    }

    /// True once the session has closed and updates are discarded
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Terminal dashboard with an input prompt
pub struct Display<W: Write = io::Stdout> {
    config: DisplayConfig,
    state: DashboardState,
    renderer: ScreenRenderer<W>,
    callbacks: Callbacks,
    session: SessionState,
    running: Arc<AtomicBool>,
    tx: mpsc::UnboundedSender<UiMessage>,
    rx: mpsc::UnboundedReceiver<UiMessage>,
    log_layer: Option<DashboardLogLayer>,
    geometry: Option<TerminalGeometry>,
}

impl Display<io::Stdout> {
    /// Display on standard output
    ///
    /// Escape sequences are used when stdout is a terminal, unless
    /// `force_ansi` says otherwise.
    pub fn new(config: DisplayConfig) -> Self {
        let ansi = config
            .force_ansi
            .unwrap_or_else(|| io::stdout().is_terminal());
        Self::with_writer(config, io::stdout(), ansi)
    }

    /// Run a session reading from standard input
    pub async fn run_terminal(&mut self) -> Result<ExitReason> {
        let input = TerminalInput::new(self.renderer.is_ansi(), self.config.input_poll());
        self.run(input).await
    }
}

impl<W: Write> Display<W> {
    /// Display writing to `out`
    pub fn with_writer(config: DisplayConfig, out: W, ansi: bool) -> Self {
        let renderer = ScreenRenderer::new(out, ansi)
            .with_title(config.title.clone())
            .with_prompt(config.prompt.clone())
            .with_truncate_limit(config.truncate_limit);
        let (tx, rx) = mpsc::unbounded_channel();

        Self {
            state: DashboardState::new(config.log_capacity),
            config,
            renderer,
            callbacks: Callbacks::default(),
            session: SessionState::Created,
            running: Arc::new(AtomicBool::new(false)),
            tx,
            rx,
            log_layer: None,
            geometry: None,
        }
    }

    /// Forward intercepted log records into the dashboard while running
    pub fn with_log_layer(mut self, layer: DashboardLogLayer) -> Self {
        self.log_layer = Some(layer);
        self
    }

    /// Use a fixed geometry instead of querying the terminal
    pub fn with_geometry(mut self, geometry: TerminalGeometry) -> Self {
        self.geometry = Some(geometry);
        self
    }

    /// Register application callbacks; only allowed before the session starts
    pub fn register_callbacks(&mut self, callbacks: Callbacks) -> Result<()> {
        if self.session != SessionState::Created {
            return Err(DisplayError::InvalidState(self.session));
        }
        self.callbacks = callbacks;
        Ok(())
    }

    pub fn handle(&self) -> DisplayHandle {
        DisplayHandle {
            tx: self.tx.clone(),
        }
    }

    pub fn session_state(&self) -> SessionState {
        self.session
    }

    pub fn dashboard(&self) -> &DashboardState {
        &self.state
    }

    pub fn writer(&self) -> &W {
        self.renderer.get_ref()
    }

    pub fn is_interactive(&self) -> bool {
        self.renderer.is_ansi()
    }

    fn transition(&mut self, next: SessionState) {
        tracing::debug!(from = ?self.session, to = ?next, "display session state");
        self.session = next;
    }

    fn geometry(&self) -> TerminalGeometry {
        self.geometry.unwrap_or_else(TerminalGeometry::current)
    }

    fn render_dashboard(&mut self) -> io::Result<()> {
        let geometry = self.geometry();
        self.renderer.render_dashboard(&self.state, geometry, false)
    }

    /// Clear the screen and draw both regions
    pub fn start(&mut self) -> Result<()> {
        if self.session != SessionState::Created {
            return Err(DisplayError::InvalidState(self.session));
        }
        self.transition(SessionState::Started);

        let geometry = self.geometry();
        self.renderer.render_dashboard(&self.state, geometry, true)?;
        self.renderer.render_input_area(geometry)?;
        Ok(())
    }

    /// Run the session until quit, interrupt, end of input or close
    ///
    /// Starts the display first if needed. Returns once the input reader and
    /// the dispatcher have stopped and the closing message is written.
    pub async fn run<I: InputSource>(&mut self, input: I) -> Result<ExitReason> {
        if self.session == SessionState::Created {
            self.start()?;
        }
        if self.session != SessionState::Started {
            return Err(DisplayError::InvalidState(self.session));
        }

        let (log_guard, mut log_rx) = match &self.log_layer {
            Some(layer) => {
                let (guard, rx) = layer.attach();
                (Some(guard), rx)
            }
            None => (None, mpsc::unbounded_channel().1),
        };

        self.running.store(true, Ordering::SeqCst);
        self.transition(SessionState::Running);

        let (queue, dispatcher) =
            dispatcher::channel(self.config.poll_interval(), Arc::clone(&self.running));
        let dispatch_task = tokio::spawn(dispatcher.run());
        let (outcome, input_done) = match self.spawn_input(input) {
            Ok(done) => (self.event_loop(&queue, &mut log_rx).await, Some(done)),
            Err(e) => {
                tracing::error!("Failed to start input reader: {}", e);
                (Err(e.into()), None)
            }
        };

        self.transition(SessionState::Closing);
        self.running.store(false, Ordering::SeqCst);
        drop(queue);

        if let Err(e) = dispatch_task.await {
            tracing::warn!("Command dispatcher task failed: {}", e);
        }
        if let Some(done) = input_done {
            if tokio::time::timeout(self.shutdown_grace(), done).await.is_err() {
                tracing::warn!("Input reader still blocked after close");
            }
        }

        drop(log_guard);
        // Later handle updates fail at the sender instead of queueing here
        self.rx.close();
        self.transition(SessionState::Closed);

        if let Err(e) = self.renderer.write_message(CLOSING_MESSAGE) {
            tracing::debug!("Could not write closing message: {}", e);
        }
        outcome
    }

    /// How long close waits for the input thread to notice shutdown
    fn shutdown_grace(&self) -> Duration {
        self.config.input_poll() * 2 + Duration::from_millis(100)
    }

    /// Start the input thread; the receiver fires when it exits
    fn spawn_input<I: InputSource>(&self, mut input: I) -> io::Result<oneshot::Receiver<()>> {
        let tx = self.tx.clone();
        let running = Arc::clone(&self.running);
        let (done_tx, done_rx) = oneshot::channel();

        std::thread::Builder::new()
            .name("display-input".to_string())
            .spawn(move || {
                while running.load(Ordering::SeqCst) {
                    let edit_tx = tx.clone();
                    let mut on_edit = move |line: &str| {
                        let _ = edit_tx.send(UiMessage::InputEdited(line.to_string()));
                    };
                    match input.read_line(&running, &mut on_edit) {
                        Ok(line) => {
                            if tx.send(UiMessage::InputSubmitted(line)).is_err() {
                                break;
                            }
                        }
                        Err(e) => {
                            let _ = tx.send(UiMessage::InputEnded(e));
                            break;
                        }
                    }
                }
                let _ = done_tx.send(());
            })?;

        Ok(done_rx)
    }

    async fn event_loop(
        &mut self,
        queue: &CommandQueue,
        log_rx: &mut LogReceiver,
    ) -> Result<ExitReason> {
        loop {
            // Log lines first: they were emitted before whatever woke us
            let message = tokio::select! {
                biased;
                Some(line) = log_rx.recv() => UiMessage::Log(line),
                Some(message) = self.rx.recv() => message,
                else => UiMessage::Close,
            };

            match message {
                UiMessage::Status { text, connected } => {
                    self.state.status = text;
                    self.state.connected = connected;
                    self.render_dashboard()?;
                }
                UiMessage::Text(text) => {
                    let text = text.trim();
                    if !text.is_empty() {
                        self.state.text = text.to_string();
                        self.render_dashboard()?;
                    }
                }
                UiMessage::Emotion(name) => {
                    self.state.emotion = name;
                    self.render_dashboard()?;
                }
                UiMessage::ButtonStatus(text) => {
                    self.state.text = text;
                    self.render_dashboard()?;
                }
                UiMessage::ToggleMode => match self.callbacks.mode_toggle() {
                    Some(action) => {
                        queue.enqueue(action);
                    }
                    None => tracing::debug!("Mode toggle not supported in terminal mode"),
                },
                UiMessage::Log(line) => {
                    self.state.logs.push(line);
                    if self.renderer.is_ansi() {
                        self.render_dashboard()?;
                    }
                }
                UiMessage::InputEdited(line) => {
                    let geometry = self.geometry();
                    self.renderer.redraw_input_line(geometry, &line)?;
                }
                UiMessage::InputSubmitted(line) => {
                    if let Some(reason) = self.submit_line(&line, queue)? {
                        return Ok(reason);
                    }
                }
                UiMessage::InputEnded(InputError::Interrupted) => {
                    return Ok(ExitReason::Interrupted)
                }
                UiMessage::InputEnded(InputError::Closed) => return Ok(ExitReason::InputClosed),
                UiMessage::InputEnded(InputError::Io(e)) => return Err(e.into()),
                UiMessage::Close => return Ok(ExitReason::Closed),
            }
        }
    }

    /// Handle a completed input line
    fn submit_line(&mut self, line: &str, queue: &CommandQueue) -> Result<Option<ExitReason>> {
        let geometry = self.geometry();
        if self.renderer.is_ansi() {
            self.renderer.end_input_line(geometry)?;
            self.renderer.clear_input_area(geometry)?;
            self.renderer.render_dashboard(&self.state, geometry, false)?;
        }

        match Command::parse(line) {
            Some(Command::Quit) => return Ok(Some(ExitReason::Quit)),
            Some(Command::Help) => {
                self.state.text = HELP_TEXT.to_string();
                self.render_dashboard()?;
            }
            Some(command) => match self.callbacks.action_for(&command) {
                Some(action) => {
                    queue.enqueue(action);
                }
                None => tracing::debug!(?command, "no callback registered"),
            },
            None => {}
        }

        self.renderer.render_input_area(geometry)?;
        Ok(None)
    }
}
