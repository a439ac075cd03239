use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::cell::Cell;

lazy_static! {
    static ref NOT_APPLICABLE: Regex = Regex::new(r"(?i)^n/?a$").unwrap();
    static ref NUMERIC_ID: Regex = Regex::new(r"^[0-9]{5,}$").unwrap();
}

/// Thousands separator of the Spanish grouping convention (`1.500`).
pub const DEFAULT_THOUSANDS_SEPARATOR: char = '.';

/// One classification step of the cell formatter.
///
/// Rules run in order and the first one returning a value wins; a cell no
/// rule claims is shown as its trimmed text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CellRule {
    /// Empty or whitespace-only text renders as nothing.
    Blank,
    /// Numbers in `(0, 1]` render as a whole percentage.
    Fraction,
    /// Whole numbers above 1000 render with thousands separators.
    LargeInteger,
    /// `N/A`, `n/a`, `NA`... normalise to `N/A`.
    NotApplicable,
    /// `$`-prefixed text has its whitespace removed.
    Currency,
    /// Runs of five or more digits render grouped.
    NumericId,
}

pub const DEFAULT_RULES: &[CellRule] = &[
    CellRule::Blank,
    CellRule::Fraction,
    CellRule::LargeInteger,
    CellRule::NotApplicable,
    CellRule::Currency,
    CellRule::NumericId,
];

/// Parse display text as a number, accepting a comma as decimal separator.
///
/// Only the first comma is replaced, so `1,200,5` does not parse.
pub fn parse_number(text: &str) -> Option<f64> {
    text.replacen(',', ".", 1)
        .parse::<f64>()
        .ok()
        .filter(|n| n.is_finite())
}

/// Insert `separator` every three digits from the right.
///
/// `digits` must be a plain run of ASCII digits.
pub fn group_digits(digits: &str, separator: char) -> String {
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(separator);
        }
        out.push(ch);
    }
    out
}

impl CellRule {
    /// Apply this rule to trimmed, non-empty-checked text.
    ///
    /// `number` is the result of [`parse_number`] on the same text.
    pub fn apply(&self, text: &str, number: Option<f64>, separator: char) -> Option<String> {
        match self {
            CellRule::Blank => text.is_empty().then(String::new),
            CellRule::Fraction => number
                .filter(|n| *n > 0.0 && *n <= 1.0)
                .map(|n| format!("{}%", (n * 100.0).round() as i64)),
            CellRule::LargeInteger => number
                .filter(|n| *n > 1000.0 && n.fract() == 0.0)
                .map(|n| group_digits(&n.to_string(), separator)),
            CellRule::NotApplicable => NOT_APPLICABLE
                .is_match(text)
                .then(|| "N/A".to_string()),
            CellRule::Currency => text
                .starts_with('$')
                .then(|| text.chars().filter(|c| !c.is_whitespace()).collect()),
            CellRule::NumericId => NUMERIC_ID.is_match(text).then(|| {
                let significant = text.trim_start_matches('0');
                if significant.is_empty() {
                    "0".to_string()
                } else {
                    group_digits(significant, separator)
                }
            }),
        }
    }
}

/// Maps raw cells to display strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CellFormatter {
    pub rules: Vec<CellRule>,
    pub thousands_separator: char,
}

impl Default for CellFormatter {
    fn default() -> Self {
        CellFormatter {
            rules: DEFAULT_RULES.to_vec(),
            thousands_separator: DEFAULT_THOUSANDS_SEPARATOR,
        }
    }
}

impl CellFormatter {
    /// Format one cell for display. Never fails; unknown shapes come back as
    /// their trimmed text.
    pub fn format(&self, cell: &Cell) -> String {
        let raw = cell.to_text();
        let text = raw.trim();
        let number = if text.is_empty() {
            None
        } else {
            parse_number(text)
        };

        for rule in &self.rules {
            if let Some(shown) = rule.apply(text, number, self.thousands_separator) {
                return shown;
            }
        }
        text.to_string()
    }

    /// Format a possibly out-of-range cell; a missing cell is the empty string.
    pub fn format_opt(&self, cell: Option<&Cell>) -> String {
        cell.map(|c| self.format(c)).unwrap_or_default()
    }
}

/// Format a cell with the default rules and Spanish grouping.
///
/// # Examples
/// ```
/// use sheetview::cell::Cell;
/// use sheetview::formatter::format_cell;
///
/// assert_eq!(format_cell(&Cell::from("0.25")), "25%");
/// assert_eq!(format_cell(&Cell::from("1500")), "1.500");
/// assert_eq!(format_cell(&Cell::from("$ 1,200")), "$1,200");
/// ```
pub fn format_cell(cell: &Cell) -> String {
    CellFormatter::default().format(cell)
}
