use serde::{Deserialize, Serialize};
use std::fmt;

/// One value of a decoded sheet, before any presentation logic.
///
/// The JSON form is untagged: `null` is [`Cell::Empty`], strings, numbers and
/// booleans map to the matching variant.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Default)]
#[serde(untagged)]
pub enum Cell {
    #[default]
    Empty,
    Bool(bool),
    Number(f64),
    Text(String),
}

/// A single (possibly ragged) row of cells.
pub type Row = Vec<Cell>;

/// Rows of cells as decoded from one sheet.
pub type Matrix = Vec<Row>;

impl Cell {
    /// Canonical stringification of the cell.
    ///
    /// Integral numbers print without a fractional part (`1500`, not `1500.0`),
    /// booleans print as `TRUE`/`FALSE` and an empty cell is the empty string.
    pub fn to_text(&self) -> String {
        self.to_string()
    }

    /// True when the canonical text is empty after trimming whitespace.
    pub fn is_blank(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(s) => s.trim().is_empty(),
            Cell::Number(_) | Cell::Bool(_) => false,
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Empty => Ok(()),
            Cell::Bool(true) => f.write_str("TRUE"),
            Cell::Bool(false) => f.write_str("FALSE"),
            Cell::Number(n) => write!(f, "{}", n),
            Cell::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for Cell {
    fn from(s: &str) -> Self {
        Cell::Text(s.to_string())
    }
}

impl From<String> for Cell {
    fn from(s: String) -> Self {
        Cell::Text(s)
    }
}

impl From<f64> for Cell {
    fn from(n: f64) -> Self {
        Cell::Number(n)
    }
}

impl From<bool> for Cell {
    fn from(b: bool) -> Self {
        Cell::Bool(b)
    }
}

impl<T: Into<Cell>> From<Option<T>> for Cell {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Cell::Empty)
    }
}

/// Build a row of text cells, mostly useful in tests and fixtures.
pub fn text_row(values: &[&str]) -> Row {
    values.iter().map(|v| Cell::from(*v)).collect()
}
