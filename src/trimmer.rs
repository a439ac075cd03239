use crate::cell::{Cell, Matrix, Row};

/// True when every cell of the row is blank (an empty row counts as blank).
pub fn is_blank_row(row: &[Cell]) -> bool {
    row.iter().all(|c| c.is_blank())
}

/// Width of the meaningful part of a row: one past its last non-blank cell.
fn used_width(row: &[Cell]) -> usize {
    row.iter()
        .rposition(|c| !c.is_blank())
        .map_or(0, |i| i + 1)
}

/// Reduce a raw sheet matrix to its bounding box.
///
/// Blank rows are removed wherever they occur, so row indices of the result
/// do not match the input. Every retained row is sliced to the widest
/// meaningful width across retained rows; shorter rows are left short.
///
/// # Examples
/// ```
/// use sheetview::cell::text_row;
/// use sheetview::trimmer::trim;
///
/// let raw = vec![
///     text_row(&["A", "B", "", ""]),
///     text_row(&["", "", ""]),
///     text_row(&["C", "", "D", " "]),
/// ];
/// let trimmed = trim(&raw);
/// assert_eq!(trimmed, vec![text_row(&["A", "B", ""]), text_row(&["C", "", "D"])]);
/// ```
pub fn trim(rows: &[Row]) -> Matrix {
    let kept: Vec<&Row> = rows.iter().filter(|r| !is_blank_row(r)).collect();
    if kept.is_empty() {
        return Vec::new();
    }

    let width = kept.iter().map(|r| used_width(r)).max().unwrap_or(0);

    kept.into_iter()
        .map(|r| r[..width.min(r.len())].to_vec())
        .collect()
}
