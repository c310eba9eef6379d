//! Terminal UI utilities.
//!
//! ## Components
//!
//! - `TabWriter` - aligns tab-separated cells into padded columns
//!
//! ## Example
//!
//! ```rust
//! let mut w = gvend::ui::TabWriter::new(1);
//! w.push("github.com/pkg/errors\tmaster");
//! w.push("golang.org/x/net\tHEAD");
//! for line in w.lines() {
//!     println!("{line}");
//! }
//! ```

use console::measure_text_width;
use std::cmp;

/// Column alignment for `\t`-separated lines.
///
/// Text after the last tab of a line is not a cell and is never padded.
pub struct TabWriter {
    padding: usize,
    rows: Vec<Vec<String>>,
}

impl TabWriter {
    pub fn new(padding: usize) -> Self {
        Self {
            padding,
            rows: Vec::new(),
        }
    }

    pub fn push(&mut self, line: &str) {
        self.rows
            .push(line.split('\t').map(str::to_string).collect());
    }

    pub fn lines(&self) -> Vec<String> {
        let columns = self.rows.iter().map(Vec::len).max().unwrap_or(0);
        let mut widths = vec![0; columns];
        for row in &self.rows {
            let cells = row.len().saturating_sub(1);
            for (i, cell) in row.iter().take(cells).enumerate() {
                widths[i] = cmp::max(widths[i], measure_text_width(cell));
            }
        }

        self.rows
            .iter()
            .map(|row| {
                let mut line = String::new();
                let last = row.len().saturating_sub(1);
                for (i, cell) in row.iter().enumerate() {
                    line.push_str(cell);
                    if i < last {
                        let pad = widths[i] + self.padding - measure_text_width(cell);
                        line.push_str(&" ".repeat(pad));
                    }
                }
                line
            })
            .collect()
    }
}
