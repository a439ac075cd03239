#![cfg(not(tarpaulin_include))]

use clap::{Parser, Subcommand};
use log::debug;
use std::io::{self, Write};
use std::path::PathBuf;

use sheetview::config::ViewConfig;
use sheetview::downloader::{to_csv, to_text};
use sheetview::loader::load_path;
use sheetview::rules::RulesSummary;

#[derive(Parser)]
#[command(name = "sheetview", version, about = "Preview spreadsheet sheets as clean tables")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Render one sheet (or every sheet) as a table
    View {
        file: PathBuf,
        /// Only render this sheet
        #[arg(long)]
        sheet: Option<String>,
        /// Write CSV instead of an aligned table
        #[arg(long)]
        csv: bool,
        /// TOML file with header hints and formatting settings
        #[arg(long, env = "VIEW_CONFIG")]
        config: Option<PathBuf>,
    },
    /// List the sheets of a workbook
    Sheets { file: PathBuf },
    /// Explain an enrichment rules document
    Rules { file: PathBuf },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    let stdout = io::stdout();
    let mut out = stdout.lock();

    match cli.command {
        Command::View {
            file,
            sheet,
            csv,
            config,
        } => {
            let config = match config {
                Some(path) => ViewConfig::load(path)?,
                None => ViewConfig::default(),
            };
            let book = load_path(&file)?;
            debug!("loaded {} sheet(s) from {}", book.sheets.len(), file.display());

            if let Some(name) = &sheet {
                if book.sheet(name).is_none() {
                    return Err(format!(
                        "Sheet '{}' not found. Available: {}",
                        name,
                        book.sheet_names().join(", ")
                    )
                    .into());
                }
            }

            for rendered in book.render(&config) {
                if sheet.as_deref().is_some_and(|s| s != rendered.name) {
                    continue;
                }
                if csv {
                    out.write_all(to_csv(&rendered.table)?.as_bytes())?;
                } else {
                    writeln!(out, "== {} ==", rendered.name)?;
                    out.write_all(to_text(&rendered.table).as_bytes())?;
                    writeln!(out)?;
                }
            }
        }
        Command::Sheets { file } => {
            let book = load_path(&file)?;
            for name in book.sheet_names() {
                writeln!(out, "{}", name)?;
            }
        }
        Command::Rules { file } => {
            let text = std::fs::read_to_string(&file)?;
            let rules: serde_json::Value = serde_json::from_str(&text)?;
            out.write_all(RulesSummary::from_value(&rules).explain().as_bytes())?;
        }
    }

    Ok(())
}
