/*!
# Sheetview

A spreadsheet viewer: upload a workbook, see every sheet as a clean table,
and ask the enrichment service for a modified copy.

## Overview

Sheets coming out of real workbooks are noisy. Titles sit above the column
names, spacer rows split the data and formatting leaves dead columns on the
right. This crate turns such a sheet into a table that reads well:

1. **Trimming** drops blank rows anywhere in the sheet and cuts trailing
   blank columns (see [`trimmer`]).
2. **Header detection** looks through the first rows for one that mentions a
   known column name such as `TIPO DE UNIDAD` or `NO.SERIE` (see [`header`]).
3. **Cell presentation** turns each value into display text: fractions become
   percentages, large integers get thousands separators, `n/a` becomes `N/A`,
   currency is compacted (see [`formatter`]).

[`table::render`] chains the three steps. All of them are pure functions;
rendering the same sheet twice gives the same table.

## Architecture

### Core
- **cell**: raw cell values and their canonical text
- **trimmer**: bounding-box trimming
- **header**: header-row detection
- **formatter**: ordered cell classification rules
- **table**: the render contract (`header` + aligned `body`)

### Around the core
- **loader**: decodes `.xlsx`/`.xls`/`.ods` (calamine) and `.csv` uploads
- **rules**: explains the enrichment rules document; nothing is evaluated here
- **downloader**: CSV and plain-text output of rendered tables
- **config**: view settings (TOML) and server settings (environment)
- **csrf**: token issuance for mutating requests

### Web layer (feature `web`)
- **backend**: client for the remote enrichment service
- **app**: axum routes and middleware

## REST API Endpoints

- `GET /api/csrf` - Issues a CSRF token
- `POST /api/preview` - Renders every sheet of an uploaded file
- `POST /api/export` - Forwards a file and sheet name to the enrichment service
- `GET /api/sample-data` - Relays the enrichment rules document
- `GET /api/sample-data/explain` - The rules document, summarized
*/

pub mod cell;
pub mod config;
pub mod csrf;
pub mod downloader;
pub mod formatter;
pub mod header;
pub mod loader;
pub mod rules;
pub mod table;
pub mod trimmer;

#[cfg(feature = "web")]
pub mod app;
#[cfg(feature = "web")]
pub mod backend;

pub use cell::{Cell, Matrix, Row};
pub use config::{NoHeaderPolicy, Settings, ViewConfig};
pub use formatter::{CellFormatter, CellRule, format_cell};
pub use header::HeaderHints;
pub use loader::{LoadError, Workbook};
pub use table::{TableView, render};
pub use trimmer::trim;
