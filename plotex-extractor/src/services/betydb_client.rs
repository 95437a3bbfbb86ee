//! BETYdb traits API client
//!
//! Trait rows go to the BETYdb v1 API as one CSV document per run:
//! `POST {url}/api/v1/traits.csv?key=...` with `Content-Type: text/csv`. A 200 or
//! 201 response carries the ids of the inserted traits.

use plotex_common::config::BetyDbConfig;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

const TRAITS_API_PATH: &str = "api/v1/traits";
const CONTENT_TYPE: &str = "text/csv";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const USER_AGENT: &str = concat!("plotex-extractor/", env!("CARGO_PKG_VERSION"));

/// BETYdb client errors
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("BETYdb URL or API key is not configured")]
    NotConfigured,

    #[error("Network error: {0}")]
    Network(String),

    #[error("Error submitting data to BETYdb: {status} -- {reason}")]
    Status { status: u16, reason: String },

    #[error("Parse error: {0}")]
    Parse(String),
}

#[derive(Debug, Deserialize)]
struct TraitsResponse {
    data: TraitsData,
}

#[derive(Debug, Deserialize)]
struct TraitsData {
    ids_of_new_traits: Vec<i64>,
}

/// BETYdb traits endpoint
pub struct BetyDbClient {
    http_client: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl BetyDbClient {
    /// `base_url` is the BETYdb instance root, with or without a trailing slash
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Result<Self, UploadError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| UploadError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            endpoint: traits_endpoint(base_url),
            api_key: api_key.to_string(),
        })
    }

    pub fn from_config(config: &BetyDbConfig) -> Result<Self, UploadError> {
        let url = config
            .url
            .as_deref()
            .filter(|url| !url.trim().is_empty())
            .ok_or(UploadError::NotConfigured)?;
        let key = config
            .key
            .as_deref()
            .filter(|key| !key.trim().is_empty())
            .ok_or(UploadError::NotConfigured)?;
        let timeout = Duration::from_secs(config.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS));

        Self::new(url, key, timeout)
    }

    /// Full CSV upload URL (without the key)
    pub fn upload_url(&self) -> String {
        format!("{}.csv", self.endpoint)
    }

    /// Upload `header` plus `rows` as one CSV document
    ///
    /// Returns the ids BETYdb assigned to the new trait records.
    pub async fn upload(&self, header: &str, rows: &[String]) -> Result<Vec<i64>, UploadError> {
        let body = csv_document(header, rows);

        tracing::debug!(rows = rows.len(), url = %self.upload_url(), "Submitting traits to BETYdb");

        let response = self
            .http_client
            .post(self.upload_url())
            .query(&[("key", self.api_key.as_str())])
            .header(reqwest::header::CONTENT_TYPE, CONTENT_TYPE)
            .body(body)
            .send()
            .await
            .map_err(|e| UploadError::Network(e.to_string()))?;

        let status = response.status();
        if status != reqwest::StatusCode::OK && status != reqwest::StatusCode::CREATED {
            let reason = status.canonical_reason().unwrap_or("Unknown").to_string();
            tracing::error!(
                "Error submitting data to BETYdb: {} -- {}",
                status.as_u16(),
                reason
            );
            return Err(UploadError::Status {
                status: status.as_u16(),
                reason,
            });
        }

        let parsed: TraitsResponse = response
            .json()
            .await
            .map_err(|e| UploadError::Parse(e.to_string()))?;

        tracing::info!("Data successfully submitted to BETYdb.");
        tracing::debug!(ids = ?parsed.data.ids_of_new_traits, "New BETYdb trait ids");

        Ok(parsed.data.ids_of_new_traits)
    }
}

fn traits_endpoint(base_url: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), TRAITS_API_PATH)
}

fn csv_document(header: &str, rows: &[String]) -> String {
    std::iter::once(header)
        .chain(rows.iter().map(String::as_str))
        .collect::<Vec<_>>()
        .join("\n")
}
