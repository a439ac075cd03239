use std::error::Error;

use crate::table::TableView;

/// Convert a rendered table to CSV
///
/// The header row comes first, followed by the formatted body rows.
/// Quoting of commas, quotes and newlines is left to the `csv` writer.
///
/// # Examples
/// ```
/// use sheetview::downloader::to_csv;
/// use sheetview::table::TableView;
///
/// let table = TableView {
///     header: vec!["TIPO".into(), "LIMITES".into()],
///     body: vec![vec!["TRACTO".into(), "$1,000".into()]],
///     header_row: Some(0),
/// };
/// assert_eq!(to_csv(&table).unwrap(), "TIPO,LIMITES\nTRACTO,\"$1,000\"\n");
/// ```
pub fn to_csv(table: &TableView) -> Result<String, Box<dyn Error>> {
    let mut writer = csv::WriterBuilder::new()
        .flexible(true)
        .from_writer(Vec::new());

    if !table.header.is_empty() {
        writer.write_record(&table.header)?;
    }
    for row in &table.body {
        writer.write_record(row)?;
    }

    let bytes = writer.into_inner().map_err(|e| e.into_error())?;
    Ok(String::from_utf8(bytes)?)
}

/// Render a table as left-aligned text columns separated by ` | `.
pub fn to_text(table: &TableView) -> String {
    if table.is_empty() {
        return "No data to display.\n".to_string();
    }

    let mut widths: Vec<usize> = table.header.iter().map(|h| h.chars().count()).collect();
    for row in &table.body {
        for (i, cell) in row.iter().enumerate() {
            if let Some(w) = widths.get_mut(i) {
                *w = (*w).max(cell.chars().count());
            }
        }
    }

    let line = |cells: &[String]| -> String {
        let padded: Vec<String> = cells
            .iter()
            .zip(&widths)
            .map(|(cell, w)| format!("{:<width$}", cell, width = *w))
            .collect();
        format!("{}\n", padded.join(" | ").trim_end())
    };

    let mut out = line(&table.header[..]);
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    out.push_str(&format!("{}\n", rule.join("-+-")));
    for row in &table.body {
        out.push_str(&line(&row[..]));
    }
    out
}
