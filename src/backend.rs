//! Client for the remote enrichment service.
//!
//! The service owns the enrichment rules. This side only forwards the
//! uploaded workbook and relays whatever comes back.

use log::{debug, info};
use reqwest::multipart::{Form, Part};
use std::time::Duration;
use thiserror::Error;

use crate::config::Settings;

pub const XLSX_MIME: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";
pub const JSON_MIME: &str = "application/json";
pub const API_KEY_HEADER: &str = "X-API-KEY";

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Missing BACKEND_URL or BACKEND_API_KEY")]
    NotConfigured,
    #[error("backend request failed: {0}")]
    Http(#[from] reqwest::Error),
}

/// Status, headers and body of a backend response, relayed untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct UpstreamResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub content_disposition: Option<String>,
    pub body: Vec<u8>,
}

/// Name offered for the file returned by an export.
pub fn modified_file_name(original: &str) -> String {
    format!("modified_{}", original)
}

#[derive(Clone)]
pub struct BackendClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl BackendClient {
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Result<Self, BackendError> {
        let http = reqwest::Client::builder()
            .user_agent(format!("sheetview/{}", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    /// Build a client when both the URL and the key are configured.
    pub fn from_settings(settings: &Settings) -> Result<Self, BackendError> {
        match (&settings.backend_url, &settings.backend_api_key) {
            (Some(url), Some(key)) => Self::new(
                url,
                key,
                Duration::from_secs(settings.backend_timeout_secs),
            ),
            _ => Err(BackendError::NotConfigured),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Send a workbook and the sheet to transform; returns the upstream reply.
    pub async fn export(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
        sheet_name: &str,
    ) -> Result<UpstreamResponse, BackendError> {
        info!(
            "forwarding export of {:?} (sheet {:?}, {} bytes)",
            file_name,
            sheet_name,
            bytes.len()
        );
        let part = Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str(XLSX_MIME)?;
        let form = Form::new()
            .part("file", part)
            .text("sheet_name", sheet_name.to_string());

        let response = self
            .http
            .post(format!("{}/export", self.base_url))
            .header(API_KEY_HEADER, &self.api_key)
            .multipart(form)
            .send()
            .await?;
        relay(response).await
    }

    /// Fetch the enrichment rules document.
    pub async fn sample_data(&self) -> Result<UpstreamResponse, BackendError> {
        let response = self
            .http
            .get(format!("{}/sample-data", self.base_url))
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await?;
        relay(response).await
    }
}

async fn relay(response: reqwest::Response) -> Result<UpstreamResponse, BackendError> {
    let status = response.status().as_u16();
    let header = |name: reqwest::header::HeaderName| {
        response
            .headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    let content_type = header(reqwest::header::CONTENT_TYPE);
    let content_disposition = header(reqwest::header::CONTENT_DISPOSITION);

    let body = response.bytes().await?.to_vec();
    debug!("upstream replied {} with {} bytes", status, body.len());

    Ok(UpstreamResponse {
        status,
        content_type,
        content_disposition,
        body,
    })
}
