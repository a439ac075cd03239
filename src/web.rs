#![cfg(not(tarpaulin_include))]

use sheetview::app;
use sheetview::config::Settings;

/// Main entry point for the viewer web server
///
/// Reads its settings from the environment (`BIND_ADDR`, `BACKEND_URL`,
/// `BACKEND_API_KEY`, `STATIC_DIR`, `VIEW_CONFIG`, `BACKEND_TIMEOUT_SECS`)
/// and serves the preview, export and rules API until interrupted.
/// Log verbosity follows `RUST_LOG` (default `info`).
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let settings = Settings::from_env()?;
    app::run(settings).await
}
