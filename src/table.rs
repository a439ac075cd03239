use serde::{Deserialize, Serialize};

use crate::cell::Row;
use crate::config::{NoHeaderPolicy, ViewConfig};
use crate::header::positional_labels;
use crate::trimmer::trim;

/// A sheet ready for display.
///
/// Every body row has exactly `header.len()` cells.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TableView {
    pub header: Vec<String>,
    pub body: Vec<Vec<String>>,
    /// Index of the detected header row in the trimmed matrix.
    pub header_row: Option<usize>,
}

impl TableView {
    pub fn is_empty(&self) -> bool {
        self.header.is_empty() && self.body.is_empty()
    }

    pub fn width(&self) -> usize {
        self.header.len()
    }
}

/// Normalize a raw sheet and format it for display.
///
/// The pipeline is trim, then header detection, then per-cell formatting.
/// Header cells are shown as their raw text; body cells go through the
/// formatter and are padded or cut to the header width.
pub fn render(rows: &[Row], config: &ViewConfig) -> TableView {
    let clean = trim(rows);
    let Some(first) = clean.first() else {
        return TableView::default();
    };

    let header_row = config.hints.locate(&clean);
    let (header, body_start): (Vec<String>, usize) = match header_row {
        Some(i) => (clean[i].iter().map(|c| c.to_text()).collect(), i + 1),
        None => {
            let start = match config.no_header {
                NoHeaderPolicy::SkipFirstRow => 1,
                NoHeaderPolicy::KeepFirstRow => 0,
            };
            (positional_labels(first.len()), start)
        }
    };

    let width = header.len();
    let body: Vec<Vec<String>> = clean[body_start..]
        .iter()
        .map(|row| {
            (0..width)
                .map(|c| config.formatter.format_opt(row.get(c)))
                .collect()
        })
        .collect();

    TableView {
        header,
        body,
        header_row,
    }
}
