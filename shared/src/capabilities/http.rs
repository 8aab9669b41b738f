use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use url::Url;

use crux_http::Http;

use crate::event::Event;
use crate::model::{Activity, ApiEnvelope, CategoryEntry};

pub const DEFAULT_BASE_URL: &str = "http://localhost:8080/api";
pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const BASE_URL_ENV: &str = "ACTIVITIES_API_BASE_URL";
pub const MAX_URL_LENGTH: usize = 2048;

const JSON: &str = "application/json";

#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum TransportError {
    #[error("invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("request failed: {message}")]
    Request { message: String },

    #[error("HTTP error {status}")]
    Status { status: u16 },

    #[error("invalid response: {reason}")]
    InvalidResponse { reason: String },
}

impl TransportError {
    fn invalid_url(url: &str, reason: impl Into<String>) -> Self {
        Self::InvalidUrl {
            url: truncate_url(url),
            reason: reason.into(),
        }
    }

    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::Status { status } if (400..500).contains(status))
    }

    #[must_use]
    pub fn is_server_error(&self) -> bool {
        matches!(self, Self::Status { status } if (500..600).contains(status))
    }
}

fn truncate_url(url: &str) -> String {
    if url.len() <= 100 {
        url.to_string()
    } else {
        let cut = (0..=100).rev().find(|&i| url.is_char_boundary(i)).unwrap_or(0);
        format!("{}...", &url[..cut])
    }
}

/// Where and how the activities backend is reached.
///
/// The timeout is applied by the shell that executes the HTTP effects; the
/// core only carries it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub timeout_ms: u64,
    pub page_size: u32,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.into(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl ApiConfig {
    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self, TransportError> {
        let base_url = base_url.into();
        validate_base_url(&base_url)?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            ..Self::default()
        })
    }

    /// Defaults, with the base URL taken from `ACTIVITIES_API_BASE_URL` when set.
    pub fn from_env() -> Result<Self, TransportError> {
        match std::env::var(BASE_URL_ENV) {
            Ok(url) if !url.trim().is_empty() => Self::with_base_url(url.trim()),
            _ => Ok(Self::default()),
        }
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, TransportError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| TransportError::invalid_url(&self.base_url, e.to_string()))?;
        url.path_segments_mut()
            .map_err(|()| TransportError::invalid_url(&self.base_url, "URL cannot be a base"))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    pub fn activities_page_url(&self, page: u32, size: u32) -> Result<Url, TransportError> {
        let mut url = self.endpoint(&["activities"])?;
        url.query_pairs_mut()
            .append_pair("page", &page.to_string())
            .append_pair("size", &size.to_string());
        Ok(url)
    }

    pub fn filtered_activities_url(
        &self,
        category_name: &str,
        iso_date_time: &str,
    ) -> Result<Url, TransportError> {
        if category_name.trim().is_empty() {
            return Err(TransportError::invalid_url(
                &self.base_url,
                "category segment cannot be empty",
            ));
        }
        self.endpoint(&["activities", "filter", category_name, iso_date_time])
    }

    pub fn categories_url(&self) -> Result<Url, TransportError> {
        self.endpoint(&["categories"])
    }
}

fn validate_base_url(url: &str) -> Result<(), TransportError> {
    let trimmed = url.trim();
    if trimmed.is_empty() {
        return Err(TransportError::invalid_url(url, "URL cannot be empty"));
    }
    if trimmed.len() > MAX_URL_LENGTH {
        return Err(TransportError::invalid_url(
            url,
            format!("URL exceeds maximum length of {MAX_URL_LENGTH} bytes"),
        ));
    }

    let parsed = Url::parse(trimmed).map_err(|e| TransportError::invalid_url(url, e.to_string()))?;

    let scheme = parsed.scheme();
    if scheme != "http" && scheme != "https" {
        return Err(TransportError::invalid_url(
            url,
            format!("invalid scheme '{scheme}', only 'http' and 'https' are allowed"),
        ));
    }
    if parsed.host_str().is_none() {
        return Err(TransportError::invalid_url(url, "URL must have a host"));
    }
    if !parsed.username().is_empty() || parsed.password().is_some() {
        return Err(TransportError::invalid_url(url, "credentials in URL are not allowed"));
    }
    Ok(())
}

type RawResult = crux_http::Result<crux_http::Response<Vec<u8>>>;

impl From<crux_http::Error> for TransportError {
    fn from(e: crux_http::Error) -> Self {
        match e {
            // crux_http reports 4xx/5xx as errors before the body is handed back.
            crux_http::Error::Http(http) => Self::Status {
                status: http.code.into(),
            },
            other => Self::Request {
                message: other.to_string(),
            },
        }
    }
}

fn decode_envelope<T: DeserializeOwned>(result: RawResult) -> Result<T, TransportError> {
    let mut response = result?;

    let status = response.status();
    if !status.is_success() {
        return Err(TransportError::Status {
            status: status.into(),
        });
    }

    let body = response.take_body().unwrap_or_default();
    serde_json::from_slice::<ApiEnvelope<T>>(&body)
        .map(|envelope| envelope.data)
        .map_err(|e| TransportError::InvalidResponse {
            reason: format!("failed to parse JSON: {e}"),
        })
}

pub(crate) fn decode_activities(result: RawResult) -> Result<Vec<Activity>, TransportError> {
    decode_envelope(result)
}

pub(crate) fn decode_category_names(result: RawResult) -> Result<Vec<String>, TransportError> {
    decode_envelope::<Vec<CategoryEntry>>(result)
        .map(|entries| entries.into_iter().map(CategoryEntry::into_name).collect())
}

/// Typed requests against the activities backend. Each call either hands
/// the request to the shell or fails before anything is sent; responses come
/// back as the event built by `make_event`.
pub struct Gateway<'a> {
    http: &'a Http<Event>,
    config: &'a ApiConfig,
}

impl<'a> Gateway<'a> {
    #[must_use]
    pub fn new(http: &'a Http<Event>, config: &'a ApiConfig) -> Self {
        Self { http, config }
    }

    pub fn fetch_activities_page<F>(&self, page: u32, size: u32, make_event: F) -> Result<(), TransportError>
    where
        F: FnOnce(Result<Vec<Activity>, TransportError>) -> Event + Send + 'static,
    {
        let url = self.config.activities_page_url(page, size)?;
        self.get(&url, move |result| make_event(decode_activities(result)));
        Ok(())
    }

    pub fn fetch_filtered_activities<F>(
        &self,
        category_name: &str,
        iso_date_time: &str,
        make_event: F,
    ) -> Result<(), TransportError>
    where
        F: FnOnce(Result<Vec<Activity>, TransportError>) -> Event + Send + 'static,
    {
        let url = self
            .config
            .filtered_activities_url(category_name, iso_date_time)?;
        self.get(&url, move |result| make_event(decode_activities(result)));
        Ok(())
    }

    pub fn fetch_all_category_names<F>(&self, make_event: F) -> Result<(), TransportError>
    where
        F: FnOnce(Result<Vec<String>, TransportError>) -> Event + Send + 'static,
    {
        let url = self.config.categories_url()?;
        self.get(&url, move |result| make_event(decode_category_names(result)));
        Ok(())
    }

    fn get<F>(&self, url: &Url, make_event: F)
    where
        F: FnOnce(RawResult) -> Event + Send + 'static,
    {
        tracing::debug!(url = %url, "GET");
        self.http
            .get(url.as_str())
            .header("Content-Type", JSON)
            .header("Accept", JSON)
            .send(make_event);
    }
}
