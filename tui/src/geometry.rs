//! Terminal Geometry
//!
//! Queries the current terminal size and derives the two-region layout
//! (dashboard on top, input area at the bottom).
//!
//! Geometry is never cached: the terminal can be resized at any moment, so
//! every render asks again. A failed query falls back to 80x24.

use std::io;

/// Columns used when the terminal size cannot be queried
pub const FALLBACK_COLUMNS: u16 = 80;

/// Rows used when the terminal size cannot be queried
pub const FALLBACK_ROWS: u16 = 24;

/// Lines reserved for the input area: separator, prompt, overflow
pub const INPUT_AREA_LINES: u16 = 3;

/// The dashboard never shrinks below this many rows
pub const MIN_DASHBOARD_ROWS: u16 = 5;

/// Current terminal dimensions
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TerminalGeometry {
    /// Width in columns (always >= 1)
    pub columns: u16,
    /// Height in rows (always >= 1)
    pub rows: u16,
}

impl TerminalGeometry {
    /// Create a geometry, clamping both dimensions to at least 1
    pub fn new(columns: u16, rows: u16) -> Self {
        Self {
            columns: columns.max(1),
            rows: rows.max(1),
        }
    }

    /// The 80x24 geometry used when the OS query fails
    pub fn fallback() -> Self {
        Self::new(FALLBACK_COLUMNS, FALLBACK_ROWS)
    }

    /// Query the controlling terminal
    pub fn current() -> Self {
        Self::from_query(crossterm::terminal::size())
    }

    /// Build a geometry from the result of a size query
    pub fn from_query(result: io::Result<(u16, u16)>) -> Self {
        match result {
            Ok((columns, rows)) if columns > 0 && rows > 0 => Self::new(columns, rows),
            Ok(_) | Err(_) => Self::fallback(),
        }
    }

    /// Derive the row layout for this geometry
    pub fn layout(&self) -> Layout {
        Layout::for_rows(self.rows)
    }
}

impl Default for TerminalGeometry {
    fn default() -> Self {
        Self::fallback()
    }
}

/// `(columns, rows)` of the controlling terminal, `(80, 24)` on failure
pub fn size() -> (u16, u16) {
    let geometry = TerminalGeometry::current();
    (geometry.columns, geometry.rows)
}

/// Row assignment for the two screen regions (1-based terminal rows)
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Layout {
    /// Rows owned by the dashboard, starting at row 1
    pub dashboard_rows: u16,
    /// Row of the horizontal separator above the prompt
    pub separator_row: u16,
    /// Row holding the prompt and the text being typed
    pub input_row: u16,
    /// Reserved row that absorbs wide-character wrap residue
    pub overflow_row: u16,
    /// Rows on the screen; input-area rows past this are not drawn
    pub screen_rows: u16,
}

impl Layout {
    /// Compute the layout for a terminal with `rows` rows
    ///
    /// The input area always starts directly below the dashboard. On very
    /// small terminals this pushes it past the last row rather than letting
    /// the two regions share a row; rows that do not fit are not drawn.
    pub fn for_rows(rows: u16) -> Self {
        let dashboard_rows = rows.saturating_sub(INPUT_AREA_LINES).max(MIN_DASHBOARD_ROWS);
        let separator_row = dashboard_rows + 1;
        Self {
            dashboard_rows,
            separator_row,
            input_row: separator_row + 1,
            overflow_row: separator_row + 2,
            screen_rows: rows,
        }
    }

    /// Whether `row` is on the screen
    pub fn fits(&self, row: u16) -> bool {
        row <= self.screen_rows
    }

    /// Whether the prompt row is on the screen
    pub fn input_visible(&self) -> bool {
        self.fits(self.input_row)
    }

    /// Rows of the input area, top to bottom
    pub fn input_area_rows(&self) -> [u16; 3] {
        [self.separator_row, self.input_row, self.overflow_row]
    }
}
