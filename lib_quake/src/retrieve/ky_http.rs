//! # HTTP Retrieval Utilities
//!
//! This module provides an asynchronous API client wrapper around `reqwest`.
//! It includes middleware support for exponential backoff retries, a bounded
//! per-request timeout and standardized JSON response handling.

use std::time::Duration;

use anyhow::Context;
use reqwest::{Method, StatusCode, Url};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use serde::de::DeserializeOwned;

/// A standardized container for API responses.
///
/// This struct wraps the deserialized data along with metadata about the
/// HTTP transaction, such as the status code.
#[derive(Debug)]
pub struct ApiResponse<T> {
    /// The successfully deserialized response body, if any.
    pub data: Option<T>,
    /// The raw error body returned by the server if the request failed.
    pub error_body: Option<String>,
    /// The numeric HTTP status code.
    pub status: u16,
    /// Indicates if the status code was in the 2xx range.
    pub success: bool,
}

/// Transport settings for an [`ApiClient`].
#[derive(Debug, Clone)]
pub struct ApiClientOptions {
    /// Upper bound on a single attempt, connect included.
    pub timeout: Duration,
    /// Retries on transient failures (connect errors, 5xx, 429).
    pub max_retries: u32,
    /// Sent as the `User-Agent` header.
    pub user_agent: String,
}

impl Default for ApiClientOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            max_retries: 3,
            user_agent: "quakewatch/1.0".to_string(),
        }
    }
}

/// A flexible asynchronous HTTP client.
///
/// Built on top of `reqwest_middleware`, it handles base URLs and automatic
/// retries.
#[derive(Clone)]
pub struct ApiClient {
    /// The underlying middleware-enabled client.
    inner: ClientWithMiddleware,
    /// The base URL to which all relative paths are joined.
    base_url: Url,
}

impl ApiClient {
    /// Creates a new `ApiClient` instance with a retry policy.
    ///
    /// # Arguments
    /// * `base_url` - The absolute base URL for the API (e.g., "https://api.example.com/v1/").
    /// * `options` - Timeout, retry and user agent settings.
    ///
    /// # Errors
    /// Fails if `base_url` is not an absolute URL or the TLS backend cannot be initialized.
    pub fn new(base_url: &str, options: &ApiClientOptions) -> anyhow::Result<Self> {
        let url = Url::parse(base_url)
            .with_context(|| format!("invalid base URL (must be absolute): {base_url}"))?;

        let http = reqwest::Client::builder()
            .timeout(options.timeout)
            .user_agent(options.user_agent.as_str())
            .build()
            .context("failed to build HTTP client")?;

        let retry_policy = ExponentialBackoff::builder().build_with_max_retries(options.max_retries);
        let client = ClientBuilder::new(http)
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();

        Ok(Self {
            inner: client,
            base_url: url,
        })
    }

    /// The absolute URL relative paths are joined onto.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Performs a request with query parameters and handles the response.
    ///
    /// Non-2xx statuses are not errors: they come back with `success: false`
    /// and the raw body in `error_body`. `204 No Content` is a success with
    /// `data: None`.
    ///
    /// # Errors
    /// Returns an `anyhow::Error` if URL joining, network execution or JSON
    /// decoding of a successful body fails.
    pub async fn request<T>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
    ) -> anyhow::Result<ApiResponse<T>>
    where
        T: DeserializeOwned,
    {
        let full_url = self.base_url.join(path)?;
        let response: reqwest::Response = self
            .inner
            .request(method, full_url)
            .query(query)
            .send()
            .await?;

        let status = response.status();

        if status == StatusCode::NO_CONTENT {
            return Ok(ApiResponse {
                data: None,
                error_body: None,
                status: status.as_u16(),
                success: true,
            });
        }

        if status.is_success() {
            let data = response.json::<T>().await?;
            Ok(ApiResponse {
                data: Some(data),
                error_body: None,
                status: status.as_u16(),
                success: true,
            })
        } else {
            let error_text = response.text().await.ok();
            Ok(ApiResponse {
                data: None,
                error_body: error_text,
                status: status.as_u16(),
                success: false,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relative_base_url_is_rejected() {
        let result = ApiClient::new("earthquake.usgs.gov/fdsnws", &ApiClientOptions::default());
        assert!(result.is_err());
    }

    #[test]
    fn test_path_joins_under_base() {
        let client = ApiClient::new(
            "https://earthquake.usgs.gov/fdsnws/event/1/",
            &ApiClientOptions::default(),
        )
        .unwrap();
        let joined = client.base_url().join("query").unwrap();
        assert_eq!(joined.as_str(), "https://earthquake.usgs.gov/fdsnws/event/1/query");
    }
}
