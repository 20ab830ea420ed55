//! HTTP access to the configuration API.
//!
//! Every call resolves to a value: transport failures, error statuses,
//! unparsable bodies and bodies carrying an `error` property all come back as
//! [`ErrorResponse`] so that a batch of calls always completes.

use crate::config::Config;
use anyhow::{Context, Result};
use reqwest::header::{ACCEPT, AUTHORIZATION};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Put,
}

impl HttpMethod {
    fn as_reqwest(self) -> reqwest::Method {
        match self {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Put => reqwest::Method::PUT,
        }
    }
}

/// A single call against the configuration API
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub url: String,
    pub method: HttpMethod,
    /// Value of the `lang` query parameter; `Some("")` sends an empty one
    pub lang: Option<String>,
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: HttpMethod::Get,
            lang: None,
            body: None,
        }
    }

    pub fn put(url: impl Into<String>, body: Value) -> Self {
        Self {
            url: url.into(),
            method: HttpMethod::Put,
            lang: None,
            body: Some(body),
        }
    }

    pub fn with_lang(mut self, lang: impl Into<String>) -> Self {
        self.lang = Some(lang.into());
        self
    }

    /// Whether this request selects a language variant
    pub fn uses_language(&self) -> bool {
        self.lang.as_deref().is_some_and(|lang| !lang.is_empty())
    }
}

/// Error marker returned in place of a resource
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} (HTTP {status})")]
pub struct ErrorResponse {
    /// HTTP status of the response; 0 when no response was received
    pub status: u16,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    /// A 200 whose body could not be used; the write itself went through
    pub fn is_spurious(&self) -> bool {
        self.status == 200
    }
}

pub type ApiResult = std::result::Result<Value, ErrorResponse>;

/// Any object with an `error` property is a failed call, whatever the status
pub fn is_error_marker(value: &Value) -> bool {
    value.get("error").is_some()
}

pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    /// Set once a non-empty `lang` parameter has been sent
    language_touched: AtomicBool,
}

impl ApiClient {
    pub fn new(config: &Config) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            http,
            base_url: config.api_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            language_touched: AtomicBool::new(false),
        })
    }

    /// Join relative links onto the base URL; absolute links are kept as-is
    pub fn resolve_url(&self, url: &str) -> String {
        if url.starts_with("http://") || url.starts_with("https://") {
            url.to_string()
        } else {
            format!("{}/{}", self.base_url, url.trim_start_matches('/'))
        }
    }

    pub async fn call(&self, request: ApiRequest) -> ApiResult {
        if request.uses_language() {
            self.language_touched.store(true, Ordering::SeqCst);
        }

        let url = self.resolve_url(&request.url);
        debug!(
            "{:?} {} (lang: {})",
            request.method,
            url,
            request.lang.as_deref().unwrap_or("-")
        );

        let mut builder = self
            .http
            .request(request.method.as_reqwest(), &url)
            .header(ACCEPT, "application/json");
        if let Some(key) = &self.api_key {
            builder = builder.header(AUTHORIZATION, format!("apikey {}", key));
        }
        if let Some(lang) = &request.lang {
            builder = builder.query(&[("lang", lang.as_str())]);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(|e| {
            ErrorResponse::new(
                e.status().map(|s| s.as_u16()).unwrap_or(0),
                format!("Request to {} failed: {}", url, e),
            )
        })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            ErrorResponse::new(
                status.as_u16(),
                format!("Failed to read response from {}: {}", url, e),
            )
        })?;

        if !status.is_success() {
            let message = error_message_from_body(&body)
                .unwrap_or_else(|| format!("API error ({}) from {}", status, url));
            return Err(ErrorResponse::new(status.as_u16(), message));
        }

        let value: Value = serde_json::from_str(&body).map_err(|e| {
            ErrorResponse::new(
                status.as_u16(),
                format!("Failed to parse response from {}: {}", url, e),
            )
        })?;

        if is_error_marker(&value) {
            return Err(ErrorResponse::new(status.as_u16(), marker_message(&value)));
        }

        Ok(value)
    }

    /// Whether a non-empty `lang` parameter was sent since the last reset
    pub fn language_touched(&self) -> bool {
        self.language_touched.load(Ordering::SeqCst)
    }

    /// Issue one GET with an empty `lang` parameter to clear the session
    /// language the platform keeps from the last `lang` it saw.
    ///
    /// Does nothing unless a language parameter was used. The response is
    /// discarded.
    pub async fn reset_language(&self, link: &str) {
        if !self.language_touched() {
            return;
        }

        info!("Resetting session language via {}", link);
        match self.call(ApiRequest::get(link).with_lang("")).await {
            Ok(_) => debug!("Language reset finished"),
            Err(e) => warn!("Language reset call failed: {}", e),
        }
        self.language_touched.store(false, Ordering::SeqCst);
    }
}

/// Pull a readable message out of an error body
fn error_message_from_body(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }

    match serde_json::from_str::<Value>(trimmed) {
        Ok(value) => value
            .pointer("/errorList/error/0/errorMessage")
            .or_else(|| value.get("message"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .or_else(|| Some(trimmed.to_string())),
        Err(_) => Some(trimmed.to_string()),
    }
}

fn marker_message(value: &Value) -> String {
    value
        .get("message")
        .and_then(Value::as_str)
        .or_else(|| value.get("error").and_then(Value::as_str))
        .map(str::to_string)
        .unwrap_or_else(|| format!("Error response: {}", value))
}
