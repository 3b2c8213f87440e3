//! HTTP transport: implements [`SheetService`] against the Sheets v4 REST API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::Url;
use serde::de::DeserializeOwned;
use sheetsync_core::config::Config;
use tracing::debug;

use crate::error::SheetServiceError;
use crate::service::{BatchUpdateRequest, BatchUpdateResponse, SheetService, ValueRange};

/// Configuration for the HTTP transport.
#[derive(Debug, Clone)]
pub struct HttpSheetConfig {
    pub base_url: String,
    pub spreadsheet_id: String,
    pub access_token: Option<String>,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
}

impl From<&Config> for HttpSheetConfig {
    fn from(cfg: &Config) -> Self {
        Self {
            base_url: cfg.transport.base_url.clone(),
            spreadsheet_id: cfg.sheet.spreadsheet_id.clone(),
            access_token: cfg.transport.access_token.clone(),
            connect_timeout: cfg.transport.connect_timeout(),
            request_timeout: cfg.transport.request_timeout(),
        }
    }
}

pub struct HttpSheetService {
    config: HttpSheetConfig,
    client: reqwest::Client,
}

impl HttpSheetService {
    pub fn new(config: HttpSheetConfig) -> Result<Self, SheetServiceError> {
        if config.spreadsheet_id.trim().is_empty() {
            return Err(invalid("spreadsheet id is required"));
        }
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .default_headers(auth_headers(config.access_token.as_deref())?)
            .build()
            .map_err(|e| invalid(&format!("build http client: {e}")))?;
        Ok(Self { config, client })
    }

    /// `{base}/spreadsheets/{id}/{segments...}` with each segment percent-encoded.
    pub fn endpoint(&self, segments: &[&str]) -> Result<Url, SheetServiceError> {
        let mut url = Url::parse(self.config.base_url.trim())
            .map_err(|e| invalid(&format!("invalid base url: {e}")))?;
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|()| invalid("base url cannot carry a path"))?;
            path.pop_if_empty();
            path.push("spreadsheets");
            path.push(self.config.spreadsheet_id.trim());
            for segment in segments {
                path.push(segment);
            }
        }
        Ok(url)
    }

    pub fn values_url(&self, range: &str) -> Result<Url, SheetServiceError> {
        let mut url = self.endpoint(&["values", range])?;
        url.query_pairs_mut()
            .append_pair("majorDimension", "ROWS")
            .append_pair("valueRenderOption", "FORMATTED_VALUE");
        Ok(url)
    }

    pub fn batch_update_url(&self) -> Result<Url, SheetServiceError> {
        self.endpoint(&["values:batchUpdate"])
    }
}

#[async_trait]
impl SheetService for HttpSheetService {
    async fn get_values(&self, range: &str) -> Result<ValueRange, SheetServiceError> {
        let url = self.values_url(range)?;
        debug!(%url, "fetching sheet values");
        let response = self.client.get(url).send().await.map_err(map_send_error)?;
        decode(response).await
    }

    async fn batch_update(
        &self,
        request: BatchUpdateRequest,
    ) -> Result<BatchUpdateResponse, SheetServiceError> {
        let url = self.batch_update_url()?;
        debug!(%url, ranges = request.data.len(), "sending batch update");
        let response = self
            .client
            .post(url)
            .json(&request)
            .send()
            .await
            .map_err(map_send_error)?;
        decode(response).await
    }
}

fn invalid(message: &str) -> SheetServiceError {
    SheetServiceError::InvalidRequest {
        message: message.to_string(),
    }
}

fn auth_headers(token: Option<&str>) -> Result<HeaderMap, SheetServiceError> {
    let mut headers = HeaderMap::new();
    if let Some(token) = token.map(str::trim).filter(|t| !t.is_empty()) {
        let mut value = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|e| invalid(&format!("invalid auth header: {e}")))?;
        value.set_sensitive(true);
        headers.insert(AUTHORIZATION, value);
    }
    Ok(headers)
}

fn map_send_error(err: reqwest::Error) -> SheetServiceError {
    if err.is_timeout() {
        SheetServiceError::Timeout {
            message: err.to_string(),
        }
    } else if err.is_builder() {
        invalid(&err.to_string())
    } else {
        SheetServiceError::Network {
            message: err.to_string(),
        }
    }
}

async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, SheetServiceError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(SheetServiceError::Http {
            status: status.as_u16(),
            message: error_message(&body).unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .unwrap_or("request failed")
                    .to_string()
            }),
        });
    }
    response.json::<T>().await.map_err(|e| {
        if e.is_timeout() {
            SheetServiceError::Timeout {
                message: e.to_string(),
            }
        } else {
            SheetServiceError::Decode {
                message: e.to_string(),
            }
        }
    })
}

/// `error.message` from a structured error body, if present.
pub fn error_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value
        .get("error")?
        .get("message")?
        .as_str()
        .map(str::to_string)
}
