//! Integration Tests for the Display Session
//!
//! These tests drive a whole session: scripted keystrokes go in through an
//! [`InputSource`], callbacks record what they were asked to do, and the
//! rendered output is captured in a `Vec<u8>`.
//!
//! # Test Coverage
//!
//! 1. **Commands**: help, toggle, abort, free text and quit
//! 2. **State updates**: handle updates reach the dashboard
//! 3. **Log capture**: WARN records land in the dashboard's log lines
//! 4. **Lifecycle**: close, interrupt, end of input, restart rejection

use std::io::Cursor;
use std::sync::atomic::AtomicBool;
use std::sync::{mpsc as std_mpsc, Arc, Mutex};
use std::time::Duration;

use pretty_assertions::assert_eq;
use tracing_subscriber::layer::SubscriberExt;

use console_display::{
    Callbacks, DashboardLogLayer, Display, DisplayConfig, DisplayError, ExitReason, InputError,
    InputSource, ReaderInput, SessionState, TerminalGeometry, HELP_TEXT,
};

// ============================================================================
// Helpers
// ============================================================================

fn test_config() -> DisplayConfig {
    DisplayConfig {
        poll_interval_ms: 20,
        input_poll_ms: 5,
        ..DisplayConfig::default()
    }
}

fn interactive_display() -> Display<Vec<u8>> {
    Display::with_writer(test_config(), Vec::new(), true)
        .with_geometry(TerminalGeometry::new(80, 24))
}

fn keys(script: &str) -> ReaderInput<Cursor<Vec<u8>>> {
    ReaderInput::new(Cursor::new(script.as_bytes().to_vec()))
}

fn output_of(display: &Display<Vec<u8>>) -> String {
    String::from_utf8_lossy(display.writer()).into_owned()
}

/// Drop CSI and two-byte escape sequences, keep the text
fn strip_ansi(output: &str) -> String {
    let mut plain = String::new();
    let mut chars = output.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch != '\x1b' {
            plain.push(ch);
            continue;
        }
        if chars.next_if_eq(&'[').is_some() {
            for c in chars.by_ref() {
                if c.is_ascii_alphabetic() {
                    break;
                }
            }
        } else {
            chars.next();
        }
    }
    plain
}

/// Records every callback invocation in order
#[derive(Clone, Default)]
struct Recorder {
    calls: Arc<Mutex<Vec<String>>>,
}

impl Recorder {
    fn record(&self, call: impl Into<String>) {
        self.calls.lock().unwrap().push(call.into());
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn callbacks(&self) -> Callbacks {
        let toggle = self.clone();
        let abort = self.clone();
        let text = self.clone();
        let mode = self.clone();
        Callbacks::new()
            .on_toggle_auto(move || {
                let recorder = toggle.clone();
                async move {
                    recorder.record("toggle_auto");
                    Ok(())
                }
            })
            .on_abort(move || {
                let recorder = abort.clone();
                async move {
                    recorder.record("abort");
                    Ok(())
                }
            })
            .on_send_text(move |line| {
                let recorder = text.clone();
                async move {
                    recorder.record(format!("send_text:{line}"));
                    Ok(())
                }
            })
            .on_mode_toggle(move || {
                let recorder = mode.clone();
                async move {
                    recorder.record("mode_toggle");
                    Ok(())
                }
            })
    }
}

/// Input fed line by line from the test, waiting while the script is idle
struct ScriptedInput {
    lines: std_mpsc::Receiver<String>,
}

impl ScriptedInput {
    fn new() -> (std_mpsc::Sender<String>, Self) {
        let (tx, lines) = std_mpsc::channel();
        (tx, Self { lines })
    }
}

impl InputSource for ScriptedInput {
    fn read_line(
        &mut self,
        running: &AtomicBool,
        on_edit: &mut dyn FnMut(&str),
    ) -> Result<String, InputError> {
        loop {
            if !running.load(std::sync::atomic::Ordering::SeqCst) {
                return Err(InputError::Closed);
            }
            match self.lines.recv_timeout(Duration::from_millis(5)) {
                Ok(line) => {
                    on_edit(&line);
                    return Ok(line);
                }
                Err(std_mpsc::RecvTimeoutError::Timeout) => continue,
                Err(std_mpsc::RecvTimeoutError::Disconnected) => return Err(InputError::Closed),
            }
        }
    }
}

// ============================================================================
// Commands
// ============================================================================

#[tokio::test]
async fn test_help_shows_legend_without_callbacks() {
    let recorder = Recorder::default();
    let mut display = interactive_display();
    display.register_callbacks(recorder.callbacks()).unwrap();

    let reason = display.run(keys("h\r")).await.unwrap();

    assert_eq!(reason, ExitReason::InputClosed);
    assert_eq!(display.dashboard().text, HELP_TEXT);
    assert!(recorder.calls().is_empty());
    assert!(strip_ansi(&output_of(&display)).contains(&format!("Text: {HELP_TEXT}")));
}

#[tokio::test]
async fn test_toggle_auto_invoked_once() {
    let recorder = Recorder::default();
    let mut display = interactive_display();
    display.register_callbacks(recorder.callbacks()).unwrap();

    let reason = display.run(keys("r\rq\r")).await.unwrap();

    assert_eq!(reason, ExitReason::Quit);
    assert_eq!(recorder.calls(), vec!["toggle_auto".to_string()]);
}

#[tokio::test]
async fn test_free_text_sent_verbatim() {
    let recorder = Recorder::default();
    let mut display = interactive_display();
    display.register_callbacks(recorder.callbacks()).unwrap();

    display.run(keys("hello world\rq\r")).await.unwrap();

    assert_eq!(recorder.calls(), vec!["send_text:hello world".to_string()]);
}

#[tokio::test]
async fn test_commands_case_insensitive_and_ordered() {
    let recorder = Recorder::default();
    let mut display = interactive_display();
    display.register_callbacks(recorder.callbacks()).unwrap();

    let reason = display.run(keys("X\r  R \rHi There\rQ\r")).await.unwrap();

    assert_eq!(reason, ExitReason::Quit);
    assert_eq!(
        recorder.calls(),
        vec![
            "abort".to_string(),
            "toggle_auto".to_string(),
            "send_text:Hi There".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_blank_lines_ignored() {
    let recorder = Recorder::default();
    let mut display = interactive_display();
    display.register_callbacks(recorder.callbacks()).unwrap();

    display.run(keys("\r   \rq\r")).await.unwrap();

    assert!(recorder.calls().is_empty());
}

#[tokio::test]
async fn test_commands_without_callbacks_are_dropped() {
    let mut display = interactive_display();

    let reason = display.run(keys("r\rx\rhello\rq\r")).await.unwrap();

    assert_eq!(reason, ExitReason::Quit);
    assert_eq!(display.session_state(), SessionState::Closed);
}

#[tokio::test]
async fn test_wide_character_edit_and_submit() {
    let recorder = Recorder::default();
    let mut display = interactive_display();
    display.register_callbacks(recorder.callbacks()).unwrap();

    display.run(keys("你好\x7f\rq\r")).await.unwrap();

    assert_eq!(recorder.calls(), vec!["send_text:你".to_string()]);
    let plain = strip_ansi(&output_of(&display));
    assert!(plain.contains("Input: 你好"));
}

// ============================================================================
// State Updates
// ============================================================================

#[tokio::test]
async fn test_handle_updates_reach_dashboard() {
    let mut display = interactive_display();
    let handle = display.handle();

    handle.update_status("Listening", true);
    handle.update_emotion("happy");
    handle.update_text("  how are you  ");
    handle.update_text("   ");

    display.run(keys("q\r")).await.unwrap();

    let state = display.dashboard();
    assert_eq!(state.status, "Listening");
    assert!(state.connected);
    assert_eq!(state.emotion, "happy");
    assert_eq!(state.text, "how are you");

    let plain = strip_ansi(&output_of(&display));
    assert!(plain.contains("Status: Listening"));
    assert!(plain.contains("Connection: Connected"));
    assert!(plain.contains("Emotion: happy"));
}

#[tokio::test]
async fn test_button_status_sets_text() {
    let mut display = interactive_display();
    display.handle().update_button_status("Recording");

    display.run(keys("q\r")).await.unwrap();

    assert_eq!(display.dashboard().text, "Recording");
}

#[tokio::test]
async fn test_toggle_mode_runs_callback() {
    let recorder = Recorder::default();
    let mut display = interactive_display();
    display.register_callbacks(recorder.callbacks()).unwrap();
    display.handle().toggle_mode();

    display.run(keys("q\r")).await.unwrap();

    assert_eq!(recorder.calls(), vec!["mode_toggle".to_string()]);
}

#[tokio::test]
async fn test_long_status_truncated() {
    let mut display = Display::with_writer(test_config(), Vec::new(), false);
    display.handle().update_status("s".repeat(200), true);

    display.run(keys("q\r")).await.unwrap();

    let output = output_of(&display);
    assert!(output.contains(&format!("\rStatus: {}…", "s".repeat(79))));
    assert!(!output.contains(&"s".repeat(80)));
}

#[tokio::test]
async fn test_non_interactive_output_is_plain() {
    let mut display = Display::with_writer(test_config(), Vec::new(), false);
    display.handle().update_status("Listening", true);

    display.run(keys("q\r")).await.unwrap();

    let output = output_of(&display);
    assert!(output.contains("\rStatus: Listening"));
    assert!(output.contains("Closing application..."));
    assert!(!output.contains('\x1b'));
    assert!(!output.contains('┌'));
}

// ============================================================================
// Log Capture
// ============================================================================

#[tokio::test]
async fn test_warnings_fill_log_lines() {
    let layer = DashboardLogLayer::new();
    let subscriber = tracing_subscriber::registry().with(layer.clone());
    let _default = tracing::subscriber::set_default(subscriber);

    let (script, input) = ScriptedInput::new();
    let quit = script.clone();
    let callbacks = Callbacks::new().on_send_text(move |_| {
        let quit = quit.clone();
        async move {
            for i in 1..=7 {
                tracing::warn!("record {}", i);
            }
            tracing::info!("not shown");
            let _ = quit.send("q".to_string());
            Ok(())
        }
    });

    let mut display = interactive_display().with_log_layer(layer.clone());
    display.register_callbacks(callbacks).unwrap();
    script.send("log please".to_string()).unwrap();

    let reason = display.run(input).await.unwrap();
    assert_eq!(reason, ExitReason::Quit);

    let logs: Vec<String> = display.dashboard().logs.iter().map(String::from).collect();
    assert_eq!(logs.len(), 6);
    for (line, i) in logs.iter().zip(2..=7) {
        assert!(line.ends_with(&format!("- WARN - record {i}")), "{line}");
    }
    assert!(!layer.is_attached());
    assert!(strip_ansi(&output_of(&display)).contains("record 7"));
}

// ============================================================================
// Lifecycle
// ============================================================================

#[tokio::test]
async fn test_close_from_handle_ends_session() {
    let (_script, input) = ScriptedInput::new();
    let mut display = interactive_display();
    display.handle().close();

    let reason = tokio::time::timeout(Duration::from_secs(5), display.run(input))
        .await
        .expect("close should end the session")
        .unwrap();

    assert_eq!(reason, ExitReason::Closed);
    assert_eq!(display.session_state(), SessionState::Closed);
    assert!(output_of(&display).ends_with("\nClosing application...\n"));
}

#[tokio::test]
async fn test_ctrl_c_interrupts() {
    let recorder = Recorder::default();
    let mut display = interactive_display();
    display.register_callbacks(recorder.callbacks()).unwrap();

    let reason = display.run(keys("abc\x03")).await.unwrap();

    assert_eq!(reason, ExitReason::Interrupted);
    assert!(recorder.calls().is_empty());
    assert_eq!(display.session_state(), SessionState::Closed);
}

#[tokio::test]
async fn test_end_of_input_closes_session() {
    let mut display = interactive_display();

    let reason = display.run(keys("")).await.unwrap();

    assert_eq!(reason, ExitReason::InputClosed);
    assert_eq!(display.session_state(), SessionState::Closed);
}

#[tokio::test]
async fn test_closed_display_cannot_restart() {
    let mut display = interactive_display();
    display.run(keys("q\r")).await.unwrap();

    let again = display.run(keys("q\r")).await;
    assert!(matches!(
        again,
        Err(DisplayError::InvalidState(SessionState::Closed))
    ));
    assert!(display.register_callbacks(Callbacks::new()).is_err());
}

#[tokio::test]
async fn test_updates_after_close_are_ignored() {
    let mut display = interactive_display();
    let handle = display.handle();
    display.run(keys("q\r")).await.unwrap();
    let before = output_of(&display);
    assert!(handle.is_closed());

    handle.update_status("Late", true);
    handle.update_text("too late");

    assert_eq!(display.dashboard().status, "");
    assert_eq!(output_of(&display), before);
}
