//! Screen Renderer
//!
//! Draws the two screen regions with direct cursor addressing:
//!
//! ```text
//! ┌──────────────────────────────┐  row 1
//! │      XiaoZhi AI Terminal     │
//! ├──────────────────────────────┤
//! │Status: Listening             │  body rows (status, connection,
//! │Connection: Connected         │  emotion, text, then log lines)
//! │...                           │
//! └──────────────────────────────┘  row = dashboard_rows
//! ══════════════════════════════════  separator
//! Input: what the user is typing     input row
//!                                    overflow row (kept blank)
//! ```
//!
//! Every dashboard pass saves and restores the cursor so the prompt cursor
//! is left where the user is typing. The renderer tracks how many rows the
//! previous frame used and clears at least that many, so a shrinking frame
//! never leaves stale rows behind.
//!
//! When the output is not an interactive terminal, only the status line is
//! printed in place (carriage-return overwrite).

use std::io::{self, Write};

use crossterm::cursor::{MoveTo, RestorePosition, SavePosition};
use crossterm::queue;
use crossterm::style::{style, Print, PrintStyledContent, Stylize};
use crossterm::terminal::{Clear, ClearType};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::geometry::TerminalGeometry;
use crate::state::DashboardState;

/// Marker appended to truncated text
pub const ELLIPSIS: char = '…';

/// Rows of the frame that are not body rows: top, title, separator, bottom
const FRAME_ROWS: u16 = 4;

/// Cut `text` to at most `limit` characters, ending with an ellipsis if cut
pub fn truncate(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    if limit == 0 {
        return String::new();
    }
    let mut out: String = text.chars().take(limit - 1).collect();
    out.push(ELLIPSIS);
    out
}

/// Cut `text` so its display width does not exceed `width` columns
pub fn clip_width(text: &str, width: usize) -> &str {
    let mut used = 0;
    for (idx, ch) in text.char_indices() {
        let w = ch.width().unwrap_or(0);
        if used + w > width {
            return &text[..idx];
        }
        used += w;
    }
    text
}

/// Clip `text` to `width` columns and pad the remainder with spaces
pub fn fit_width(text: &str, width: usize) -> String {
    let clipped = clip_width(text, width);
    let pad = width.saturating_sub(clipped.width());
    format!("{clipped}{}", " ".repeat(pad))
}

/// Center `text` within `width` columns
fn center(text: &str, width: usize) -> String {
    let clipped = clip_width(text, width);
    let free = width.saturating_sub(clipped.width());
    let left = free / 2;
    format!("{}{clipped}{}", " ".repeat(left), " ".repeat(free - left))
}

/// Tail of `content` that fits on the input row after the prompt
///
/// Keeps the end of the text so the cursor stays next to what is being typed.
pub fn visible_input(content: &str, columns: u16, prompt_width: usize) -> &str {
    let max_width = (columns as usize)
        .saturating_sub(prompt_width)
        .saturating_sub(1)
        .max(1);
    let mut used = 0;
    let mut start = content.len();
    for (idx, ch) in content.char_indices().rev() {
        let w = ch.width().unwrap_or(0);
        if used + w > max_width {
            break;
        }
        used += w;
        start = idx;
    }
    &content[start..]
}

/// Body lines for the dashboard: four primary lines followed by log lines
pub fn dashboard_lines(state: &DashboardState, limit: usize) -> Vec<String> {
    let mut lines = vec![
        format!("Status: {}", truncate(&state.status, limit)),
        format!("Connection: {}", state.connection_label()),
        format!("Emotion: {}", truncate(&state.emotion, limit)),
        format!("Text: {}", truncate(&state.text, limit)),
    ];
    lines.extend(state.logs.iter().map(|line| truncate(line, limit)));
    lines
}

/// Writes both screen regions to a terminal (or any writer, in tests)
pub struct ScreenRenderer<W: Write> {
    out: W,
    /// Output is an interactive terminal that understands escape sequences
    ansi: bool,
    title: String,
    prompt: String,
    truncate_limit: usize,
    /// Rows drawn by the previous dashboard frame
    last_drawn_rows: u16,
}

impl<W: Write> ScreenRenderer<W> {
    pub fn new(out: W, ansi: bool) -> Self {
        Self {
            out,
            ansi,
            title: " XiaoZhi AI Terminal ".to_string(),
            prompt: "Input: ".to_string(),
            truncate_limit: 80,
            last_drawn_rows: 0,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = prompt.into();
        self
    }

    pub fn with_truncate_limit(mut self, limit: usize) -> Self {
        self.truncate_limit = limit;
        self
    }

    /// Whether escape sequences are written at all
    pub fn is_ansi(&self) -> bool {
        self.ansi
    }

    /// Rows drawn by the most recent dashboard frame
    pub fn last_drawn_rows(&self) -> u16 {
        self.last_drawn_rows
    }

    pub fn get_ref(&self) -> &W {
        &self.out
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    /// Move the cursor to the start of a 1-based row
    fn goto(&mut self, row: u16) -> io::Result<()> {
        queue!(self.out, MoveTo(0, row.max(1) - 1))
    }

    /// Move to a row and erase it
    fn clear_row(&mut self, row: u16) -> io::Result<()> {
        self.goto(row)?;
        queue!(self.out, Clear(ClearType::CurrentLine))
    }

    /// Draw the dashboard region
    ///
    /// `full_redraw` clears the whole screen first; used when the session
    /// starts.
    pub fn render_dashboard(
        &mut self,
        state: &DashboardState,
        geometry: TerminalGeometry,
        full_redraw: bool,
    ) -> io::Result<()> {
        let lines = dashboard_lines(state, self.truncate_limit);

        if !self.ansi {
            queue!(self.out, Print(format!("\r{}        ", lines[0])))?;
            return self.out.flush();
        }

        let cols = geometry.columns as usize;
        let inner = cols.saturating_sub(2).max(2);
        let layout = geometry.layout();
        let body_rows = layout.dashboard_rows.saturating_sub(FRAME_ROWS).max(1);
        let total_rows = FRAME_ROWS + body_rows;

        queue!(self.out, SavePosition)?;

        if full_redraw {
            queue!(self.out, Clear(ClearType::All), MoveTo(0, 0))?;
        }

        let rows_to_clear = self.last_drawn_rows.max(total_rows);
        for row in 1..=rows_to_clear {
            self.clear_row(row)?;
        }

        let rule = "─".repeat(inner);
        let top = format!("┌{rule}┐");
        let separator = format!("├{rule}┤");
        let bottom = format!("└{rule}┘");

        self.clear_row(1)?;
        queue!(self.out, Print(clip_width(&top, cols)))?;

        self.clear_row(2)?;
        let title = center(&self.title, inner);
        if cols >= inner + 2 {
            queue!(
                self.out,
                Print("│"),
                PrintStyledContent(style(title).bold().cyan()),
                Print("│")
            )?;
        } else {
            queue!(self.out, Print(clip_width(&format!("│{title}│"), cols)))?;
        }

        self.clear_row(3)?;
        queue!(self.out, Print(clip_width(&separator, cols)))?;

        for idx in 0..body_rows {
            let row = FRAME_ROWS + idx;
            let text = lines.get(idx as usize).map(String::as_str).unwrap_or("");
            let body = fit_width(text, inner);
            self.clear_row(row)?;
            if cols < inner + 2 {
                queue!(self.out, Print(clip_width(&format!("│{body}│"), cols)))?;
            } else if idx == 0 {
                queue!(
                    self.out,
                    Print("│"),
                    PrintStyledContent(style(body).green()),
                    Print("│")
                )?;
            } else {
                queue!(self.out, Print(format!("│{body}│")))?;
            }
        }

        self.clear_row(total_rows)?;
        queue!(self.out, Print(clip_width(&bottom, cols)))?;

        queue!(self.out, RestorePosition)?;
        self.out.flush()?;

        self.last_drawn_rows = total_rows;
        Ok(())
    }

    /// Draw the separator and an empty prompt, leaving the cursor after it
    ///
    /// Rows below the bottom of the screen are skipped; a terminal would
    /// clamp them onto the last row, on top of the dashboard.
    pub fn render_input_area(&mut self, geometry: TerminalGeometry) -> io::Result<()> {
        if !self.ansi {
            return Ok(());
        }
        let layout = geometry.layout();

        queue!(self.out, SavePosition)?;

        if layout.fits(layout.separator_row) {
            self.clear_row(layout.separator_row)?;
            queue!(self.out, Print("═".repeat(geometry.columns as usize)))?;
        }
        if layout.input_visible() {
            self.clear_row(layout.input_row)?;
            self.write_prompt()?;
        }
        if layout.fits(layout.overflow_row) {
            self.clear_row(layout.overflow_row)?;
        }

        queue!(self.out, RestorePosition)?;
        if layout.input_visible() {
            self.goto(layout.input_row)?;
            self.write_prompt()?;
        }
        self.out.flush()
    }

    /// Rewrite the whole input row with `content`
    ///
    /// The row is erased and written again on every keystroke. Erasing a
    /// single column at a time leaves half glyphs behind when a wide
    /// character is removed.
    pub fn redraw_input_line(&mut self, geometry: TerminalGeometry, content: &str) -> io::Result<()> {
        let layout = geometry.layout();
        if !self.ansi || !layout.input_visible() {
            return Ok(());
        }
        let visible = visible_input(content, geometry.columns, self.prompt.width());

        self.clear_row(layout.input_row)?;
        self.write_prompt()?;
        queue!(self.out, Print(visible))?;
        self.out.flush()
    }

    /// Finish the current input line (the reader returned on Enter)
    pub fn end_input_line(&mut self, geometry: TerminalGeometry) -> io::Result<()> {
        if !self.ansi || !geometry.layout().input_visible() {
            return Ok(());
        }
        queue!(self.out, Print("\r\n"))?;
        self.out.flush()
    }

    /// Blank the separator, the prompt row and the overflow row
    pub fn clear_input_area(&mut self, geometry: TerminalGeometry) -> io::Result<()> {
        if !self.ansi {
            return Ok(());
        }
        let layout = geometry.layout();
        for row in layout.input_area_rows() {
            if layout.fits(row) {
                self.clear_row(row)?;
            }
        }
        self.out.flush()
    }

    /// Print a plain message below everything else (used on close)
    pub fn write_message(&mut self, message: &str) -> io::Result<()> {
        queue!(self.out, Print(format!("\n{message}\n")))?;
        self.out.flush()
    }

    fn write_prompt(&mut self) -> io::Result<()> {
        let label = self.prompt.trim_end();
        let padding = &self.prompt[label.len()..];
        queue!(
            self.out,
            PrintStyledContent(style(label.to_string()).bold().cyan()),
            Print(padding.to_string())
        )
    }
}
