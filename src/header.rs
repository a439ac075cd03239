use serde::{Deserialize, Serialize};

use crate::cell::Row;

/// Column names this domain's sheets use; any of them in a row marks the header.
pub const DEFAULT_HINTS: &[&str] = &[
    "TIPO",
    "TIPO DE UNIDAD",
    "DESCI",
    "MOD",
    "NO.SERIE",
    "COBERTURAS",
    "LÍMITES",
    "LIMITES",
    "DEDUCIBLES",
];

/// Number of leading rows examined when looking for the header.
pub const DEFAULT_SCAN_LIMIT: usize = 20;

/// Vocabulary used to recognise a header row among leading noise rows
/// (titles, spacers, merged-cell leftovers).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "HintsFile")]
pub struct HeaderHints {
    tokens: Vec<String>,
    scan_limit: usize,
}

/// On-disk form; tokens are normalised when converted.
#[derive(Deserialize)]
struct HintsFile {
    tokens: Option<Vec<String>>,
    scan_limit: Option<usize>,
}

impl From<HintsFile> for HeaderHints {
    fn from(file: HintsFile) -> Self {
        let scan_limit = file.scan_limit.unwrap_or(DEFAULT_SCAN_LIMIT);
        match file.tokens {
            Some(tokens) => HeaderHints::new(tokens, scan_limit),
            None => HeaderHints::new(DEFAULT_HINTS.iter().copied(), scan_limit),
        }
    }
}

impl Default for HeaderHints {
    fn default() -> Self {
        Self::new(DEFAULT_HINTS.iter().copied(), DEFAULT_SCAN_LIMIT)
    }
}

impl HeaderHints {
    /// Tokens are matched case-insensitively; they are stored uppercased.
    pub fn new<I, S>(tokens: I, scan_limit: usize) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        HeaderHints {
            tokens: tokens
                .into_iter()
                .map(|t| t.as_ref().to_uppercase())
                .filter(|t| !t.is_empty())
                .collect(),
            scan_limit,
        }
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    pub fn scan_limit(&self) -> usize {
        self.scan_limit
    }

    /// True when the row's uppercased, space-joined text contains any token.
    pub fn matches(&self, row: &Row) -> bool {
        let joined = row
            .iter()
            .map(|c| c.to_text().to_uppercase())
            .collect::<Vec<_>>()
            .join(" ");
        self.tokens.iter().any(|t| joined.contains(t.as_str()))
    }

    /// Index of the first row, within the scan window, that looks like a header.
    ///
    /// A hint appearing in a title row above the real header is reported as
    /// the header; the heuristic does not try to disambiguate.
    pub fn locate(&self, rows: &[Row]) -> Option<usize> {
        rows.iter()
            .take(self.scan_limit)
            .position(|row| self.matches(row))
    }
}

/// Synthesized labels used when no header row was found.
pub fn positional_labels(width: usize) -> Vec<String> {
    (1..=width).map(|i| format!("Column {}", i)).collect()
}
