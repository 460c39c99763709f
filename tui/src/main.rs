//! Console Display Entry Point
//!
//! Runs the dashboard against a simulated assistant so the display can be
//! exercised without a backend.
//!
//! Usage:
//!   console-display
//!
//! Settings come from `$XDG_CONFIG_HOME/console-display/display.toml` and
//! `CONSOLE_DISPLAY_*` environment variables. `RUST_LOG` overrides the log
//! filter.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use console_display::{
    Callbacks, DashboardLogLayer, Display, DisplayConfig, DisplayHandle, ExitReason,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = DisplayConfig::load()?;

    // Route warnings into the dashboard; nothing may print over the screen
    let log_layer = DashboardLogLayer::new();
    log_layer.install(&config.log_filter)?;

    let mut display = Display::new(config).with_log_layer(log_layer);
    let handle = display.handle();
    display.register_callbacks(demo_callbacks(handle.clone()))?;

    handle.update_status("Standby", false);
    tokio::spawn(simulate_connection(handle.clone()));

    let reason = display.run_terminal().await?;
    tracing::debug!(?reason, "display session ended");

    if reason == ExitReason::Interrupted {
        std::process::exit(130);
    }
    Ok(())
}

/// Pretend to reach the server after a short delay
async fn simulate_connection(handle: DisplayHandle) {
    tokio::time::sleep(Duration::from_secs(1)).await;
    handle.update_status("Standby", true);
    handle.update_emotion("neutral");
}

fn demo_callbacks(handle: DisplayHandle) -> Callbacks {
    let listening = Arc::new(AtomicBool::new(false));

    let toggle_handle = handle.clone();
    let abort_handle = handle.clone();
    let text_handle = handle.clone();
    let mode_handle = handle;

    Callbacks::new()
        .on_toggle_auto(move || {
            let handle = toggle_handle.clone();
            let listening = Arc::clone(&listening);
            async move {
                let now_listening = !listening.fetch_xor(true, Ordering::SeqCst);
                if now_listening {
                    handle.update_status("Listening", true);
                    handle.update_emotion("happy");
                } else {
                    handle.update_status("Standby", true);
                    handle.update_emotion("neutral");
                }
                Ok(())
            }
        })
        .on_abort(move || {
            let handle = abort_handle.clone();
            async move {
                tracing::warn!("Response aborted by user");
                handle.update_button_status("Aborted");
                Ok(())
            }
        })
        .on_send_text(move |text| {
            let handle = text_handle.clone();
            async move {
                handle.update_status("Speaking", true);
                tokio::time::sleep(Duration::from_millis(300)).await;
                handle.update_text(format!("You said: {text}"));
                handle.update_status("Standby", true);
                Ok(())
            }
        })
        .on_mode_toggle(move || {
            let handle = mode_handle.clone();
            async move {
                handle.update_button_status("Mode switched");
                Ok(())
            }
        })
}
