use calamine::{Data, ExcelDateTime, Range, Reader, open_workbook_auto_from_rs};
use log::debug;
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use std::path::Path;
use thiserror::Error;

use crate::cell::{Cell, Matrix, Row};
use crate::config::ViewConfig;
use crate::table::{TableView, render};

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("unsupported file type: {0}")]
    UnsupportedFormat(String),
    #[error("cannot decode workbook: {0}")]
    Workbook(#[from] calamine::Error),
    #[error("cannot decode CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("cannot read file: {0}")]
    Io(#[from] std::io::Error),
    #[error("workbook has no sheets")]
    NoSheets,
}

/// One decoded sheet: its name and raw rows, anchored at A1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sheet {
    pub name: String,
    pub rows: Matrix,
}

/// An uploaded workbook, sheets in workbook order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workbook {
    pub file_name: String,
    pub sheets: Vec<Sheet>,
}

/// A sheet after normalization and formatting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderedSheet {
    pub name: String,
    pub table: TableView,
}

impl Workbook {
    pub fn sheet_names(&self) -> Vec<&str> {
        self.sheets.iter().map(|s| s.name.as_str()).collect()
    }

    pub fn sheet(&self, name: &str) -> Option<&Sheet> {
        self.sheets.iter().find(|s| s.name == name)
    }

    /// Render every sheet with the same view settings.
    pub fn render(&self, config: &ViewConfig) -> Vec<RenderedSheet> {
        self.sheets
            .iter()
            .map(|s| RenderedSheet {
                name: s.name.clone(),
                table: render(&s.rows, config),
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Spreadsheet,
    Csv,
}

fn detect_format(file_name: &str) -> Result<Format, LoadError> {
    let extension = Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase());

    match extension.as_deref() {
        Some("xlsx") | Some("xlsm") | Some("xlsb") | Some("xls") | Some("ods") => {
            Ok(Format::Spreadsheet)
        }
        Some("csv") => Ok(Format::Csv),
        Some(ext) => Err(LoadError::UnsupportedFormat(ext.to_string())),
        None => Err(LoadError::UnsupportedFormat(file_name.to_string())),
    }
}

/// Decode an uploaded file into raw sheet matrices.
///
/// The format is chosen from the file name's extension.
///
/// # Examples
/// ```
/// use sheetview::loader::from_bytes;
///
/// let book = from_bytes("fleet.csv", b"TIPO,MOD\nTRACTO,2020\n").unwrap();
/// assert_eq!(book.sheet_names(), vec!["fleet"]);
/// assert_eq!(book.sheets[0].rows.len(), 2);
/// ```
pub fn from_bytes(file_name: &str, bytes: &[u8]) -> Result<Workbook, LoadError> {
    let sheets = match detect_format(file_name)? {
        Format::Spreadsheet => spreadsheet_sheets(bytes)?,
        Format::Csv => vec![Sheet {
            name: file_stem(file_name),
            rows: csv_rows(bytes)?,
        }],
    };

    if sheets.is_empty() {
        return Err(LoadError::NoSheets);
    }

    Ok(Workbook {
        file_name: file_name.to_string(),
        sheets,
    })
}

/// Read a workbook from disk.
pub fn load_path(path: impl AsRef<Path>) -> Result<Workbook, LoadError> {
    let path = path.as_ref();
    let bytes = std::fs::read(path)?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    from_bytes(&file_name, &bytes)
}

fn file_stem(file_name: &str) -> String {
    Path::new(file_name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| file_name.to_string())
}

fn spreadsheet_sheets(bytes: &[u8]) -> Result<Vec<Sheet>, LoadError> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))?;

    let mut sheets = Vec::new();
    for name in workbook.sheet_names() {
        let range = workbook.worksheet_range(&name)?;
        let rows = range_rows(&range);
        debug!("decoded sheet {:?}: {} rows", name, rows.len());
        sheets.push(Sheet { name, rows });
    }
    Ok(sheets)
}

/// Convert a calamine range to rows anchored at A1.
///
/// calamine ranges start at the first used cell; leading empty rows and
/// columns are restored so column positions match the sheet.
fn range_rows(range: &Range<Data>) -> Matrix {
    let Some((start_row, start_col)) = range.start() else {
        return Vec::new();
    };

    let mut rows: Matrix = vec![Vec::new(); start_row as usize];
    for data_row in range.rows() {
        let mut row: Row = vec![Cell::Empty; start_col as usize];
        row.extend(data_row.iter().map(to_cell));
        rows.push(row);
    }
    rows
}

fn to_cell(data: &Data) -> Cell {
    match data {
        Data::Empty => Cell::Empty,
        Data::String(s) => Cell::Text(s.clone()),
        Data::Int(i) => Cell::Number(*i as f64),
        Data::Float(f) => Cell::Number(*f),
        Data::Bool(b) => Cell::Bool(*b),
        Data::DateTime(dt) => date_cell(dt),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Cell::Text(s.clone()),
        Data::Error(e) => Cell::Text(e.to_string()),
    }
}

/// Date-formatted cells become text the way the sheet shows them: a date,
/// a time of day, or both. Durations print as elapsed `H:MM:SS`.
fn date_cell(dt: &ExcelDateTime) -> Cell {
    let serial = dt.as_f64();
    if dt.is_duration() {
        let secs = (serial * 86_400.0).round() as i64;
        return Cell::Text(format!("{}:{:02}:{:02}", secs / 3600, secs % 3600 / 60, secs % 60));
    }

    let Some(stamp) = dt.as_datetime() else {
        return Cell::Number(serial);
    };
    let pattern = if serial.floor() <= 0.0 {
        "%H:%M:%S"
    } else if serial.fract() == 0.0 {
        "%Y-%m-%d"
    } else {
        "%Y-%m-%d %H:%M:%S"
    };
    Cell::Text(stamp.format(pattern).to_string())
}

/// Pick the delimiter that splits the first line into the most fields.
/// Ties go to the comma.
fn sniff_delimiter(content: &[u8]) -> u8 {
    let first_line = content.split(|b| *b == b'\n').next().unwrap_or_default();
    [b',', b';', b'\t']
        .into_iter()
        .rev()
        .max_by_key(|d| first_line.iter().filter(|b| *b == d).count())
        .filter(|d| first_line.contains(d))
        .unwrap_or(b',')
}

fn csv_rows(bytes: &[u8]) -> Result<Matrix, LoadError> {
    let content = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(sniff_delimiter(content))
        .has_headers(false)
        .flexible(true)
        .from_reader(content);

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(record.iter().map(Cell::from).collect());
    }
    Ok(rows)
}
