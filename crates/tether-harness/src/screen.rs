//! Rendered terminal view of captured output.
//!
//! A [`ScreenSnapshot`] replays captured stdout through a `vt100` terminal
//! emulator and freezes what a user would see: the visible rows after cursor
//! movement, line erases, and redraws have been applied. Where the raw
//! capture of a redrawn menu contains every intermediate frame, the snapshot
//! contains only the final one.

use std::fmt;

/// A frozen capture of the emulated terminal screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScreenSnapshot {
    /// The full screen text with rows joined by newlines.
    pub text: String,
    /// Each row of screen text.
    pub rows: Vec<String>,
    /// Cursor position as (row, col), zero-indexed.
    pub cursor: (u16, u16),
    /// Terminal dimensions as (rows, cols).
    pub size: (u16, u16),
}

impl ScreenSnapshot {
    /// Render `output` on an emulated terminal of `rows` x `cols`.
    pub fn render(output: &[u8], rows: u16, cols: u16) -> Self {
        let mut parser = vt100::Parser::new(rows, cols, 0);
        parser.process(output);
        let screen = parser.screen();

        let row_texts = (0..rows)
            .map(|r| screen.contents_between(r, 0, r, cols))
            .collect();

        Self {
            text: screen.contents(),
            rows: row_texts,
            cursor: screen.cursor_position(),
            size: (rows, cols),
        }
    }

    /// Whether the visible screen contains `needle`.
    pub fn contains(&self, needle: &str) -> bool {
        self.text.contains(needle)
    }

    /// Text of row `row`, or an empty string when out of bounds.
    pub fn row(&self, row: u16) -> &str {
        self.rows.get(usize::from(row)).map_or("", String::as_str)
    }

    /// Returns `true` if this snapshot differs from another in visible text
    /// or cursor position.
    pub fn differs_from(&self, other: &ScreenSnapshot) -> bool {
        self.text != other.text || self.cursor != other.cursor
    }

    /// Bordered text rendering for diagnostics.
    pub fn dump(&self) -> String {
        let cols = usize::from(self.size.1);
        let border = format!("+{}+", "-".repeat(cols));

        let mut lines = Vec::with_capacity(self.rows.len() + 3);
        lines.push(border.clone());
        for row in &self.rows {
            let display: String = row.chars().take(cols).collect();
            lines.push(format!("|{display:<cols$}|"));
        }
        lines.push(border);
        lines.push(format!(
            "cursor=({},{}) size={}x{}",
            self.cursor.0, self.cursor.1, self.size.1, self.size.0
        ));
        lines.join("\n")
    }
}

impl fmt::Display for ScreenSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.dump())
    }
}
