use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::formatter::CellFormatter;
use crate::header::HeaderHints;

pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:3000";
pub const DEFAULT_STATIC_DIR: &str = "static";
pub const DEFAULT_BACKEND_TIMEOUT_SECS: u64 = 120;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid value for {name}: {value}")]
    InvalidVar { name: &'static str, value: String },
}

/// What to do with the first trimmed row when no header row was recognised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoHeaderPolicy {
    /// Leave the first row out of the body, exactly as when it is the header.
    #[default]
    SkipFirstRow,
    /// Keep the first row as data under the synthesized labels.
    KeepFirstRow,
}

/// Presentation settings for rendering a sheet.
///
/// ```toml
/// no_header = "skip_first_row"
///
/// [hints]
/// tokens = ["TIPO", "NO.SERIE"]
/// scan_limit = 20
///
/// [formatter]
/// thousands_separator = "."
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewConfig {
    pub hints: HeaderHints,
    pub formatter: CellFormatter,
    pub no_header: NoHeaderPolicy,
}

impl ViewConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Server settings, read from the environment.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub bind_addr: String,
    pub backend_url: Option<String>,
    pub backend_api_key: Option<String>,
    pub backend_timeout_secs: u64,
    pub static_dir: PathBuf,
    pub view: ViewConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            backend_url: None,
            backend_api_key: None,
            backend_timeout_secs: DEFAULT_BACKEND_TIMEOUT_SECS,
            static_dir: PathBuf::from(DEFAULT_STATIC_DIR),
            view: ViewConfig::default(),
        }
    }
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build settings from any variable source. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Settings::default();

        let backend_timeout_secs = match var("BACKEND_TIMEOUT_SECS") {
            Some(v) => v.parse().map_err(|_| ConfigError::InvalidVar {
                name: "BACKEND_TIMEOUT_SECS",
                value: v,
            })?,
            None => defaults.backend_timeout_secs,
        };

        let view = match var("VIEW_CONFIG") {
            Some(path) => ViewConfig::load(path)?,
            None => defaults.view,
        };

        Ok(Settings {
            bind_addr: var("BIND_ADDR").unwrap_or(defaults.bind_addr),
            backend_url: var("BACKEND_URL").map(|u| u.trim_end_matches('/').to_string()),
            backend_api_key: var("BACKEND_API_KEY"),
            backend_timeout_secs,
            static_dir: var("STATIC_DIR").map(PathBuf::from).unwrap_or(defaults.static_dir),
            view,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn defaults_when_environment_is_empty() {
        let settings = Settings::from_lookup(lookup(&[])).unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.bind_addr, "127.0.0.1:3000");
    }

    #[test]
    fn reads_backend_settings() {
        let settings = Settings::from_lookup(lookup(&[
            ("BACKEND_URL", "http://backend:8000/"),
            ("BACKEND_API_KEY", "secret"),
            ("BACKEND_TIMEOUT_SECS", "5"),
            ("BIND_ADDR", "0.0.0.0:8080"),
        ]))
        .unwrap();
        assert_eq!(settings.backend_url.as_deref(), Some("http://backend:8000"));
        assert_eq!(settings.backend_api_key.as_deref(), Some("secret"));
        assert_eq!(settings.backend_timeout_secs, 5);
        assert_eq!(settings.bind_addr, "0.0.0.0:8080");
    }

    #[test]
    fn blank_variables_are_unset() {
        let settings = Settings::from_lookup(lookup(&[("BACKEND_API_KEY", "  ")])).unwrap();
        assert_eq!(settings.backend_api_key, None);
    }

    #[test]
    fn rejects_bad_timeout() {
        let err = Settings::from_lookup(lookup(&[("BACKEND_TIMEOUT_SECS", "soon")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidVar { name: "BACKEND_TIMEOUT_SECS", .. }));
    }

    #[test]
    fn view_config_from_toml() {
        let config = ViewConfig::from_toml_str(
            r#"
            no_header = "keep_first_row"

            [hints]
            tokens = ["serial"]

            [formatter]
            thousands_separator = ","
            "#,
        )
        .unwrap();
        assert_eq!(config.no_header, NoHeaderPolicy::KeepFirstRow);
        assert_eq!(config.hints.tokens(), ["SERIAL"]);
        assert_eq!(config.formatter.thousands_separator, ',');
        assert_eq!(config.formatter.rules, CellFormatter::default().rules);
    }

    #[test]
    fn view_config_file_via_environment() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[hints]\nscan_limit = 5").unwrap();
        let path = file.path().to_string_lossy().into_owned();

        let settings = Settings::from_lookup(lookup(&[("VIEW_CONFIG", path.as_str())])).unwrap();
        assert_eq!(settings.view.hints.scan_limit(), 5);
        assert_eq!(settings.view.no_header, NoHeaderPolicy::SkipFirstRow);
    }

    #[test]
    fn missing_view_config_file_is_an_error() {
        let err = ViewConfig::load("/definitely/not/here.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
