//! Shared JSON-over-HTTP client for the upstream APIs.
//!
//! Every adapter talks to its upstream through an [`ApiClient`]: requests
//! are signed by a [`RequestSigner`], transient failures are retried with
//! exponential backoff, and non-2xx answers become [`SourceError::Api`].

use crate::error::{Result, SourceError};
use backon::{ExponentialBuilder, Retryable};
use reqwest::{Method, Url};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;

const USER_AGENT: &str = concat!("metrica/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
const MAX_RETRIES: usize = 3;
const MIN_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Attaches authentication to an outgoing request.
///
/// Implement this per upstream authentication scheme.
pub trait RequestSigner: Send + Sync {
    /// Returns the request with authentication applied.
    fn sign(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder;
}

/// Signs requests with an `Authorization: Bearer` header.
#[derive(Clone)]
pub struct BearerSigner {
    token: String,
}

impl BearerSigner {
    /// Creates a signer for `token`.
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

impl std::fmt::Debug for BearerSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BearerSigner").finish_non_exhaustive()
    }
}

impl RequestSigner for BearerSigner {
    fn sign(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request.bearer_auth(&self.token)
    }
}

/// JSON client bound to one upstream base URL.
#[derive(Clone)]
pub struct ApiClient {
    service: &'static str,
    base_url: String,
    http: reqwest::Client,
    signer: Arc<dyn RequestSigner>,
    min_retry_delay: Duration,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("service", &self.service)
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    /// Creates a client for `service` rooted at `base_url`.
    pub fn new(
        service: &'static str,
        base_url: impl Into<String>,
        signer: Arc<dyn RequestSigner>,
    ) -> Result<Self> {
        let base_url = base_url.into();
        Url::parse(&base_url).map_err(|e| SourceError::InvalidUrl {
            url: base_url.clone(),
            message: e.to_string(),
        })?;

        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| SourceError::network(service, e.to_string()))?;

        Ok(Self {
            service,
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
            signer,
            min_retry_delay: MIN_RETRY_DELAY,
        })
    }

    /// Sets the first backoff delay; later retries double it.
    pub fn with_min_retry_delay(mut self, delay: Duration) -> Self {
        self.min_retry_delay = delay;
        self
    }

    /// Upstream system name used in errors and logs.
    pub fn service(&self) -> &'static str {
        self.service
    }

    /// Builds the absolute URL for `path` with `query` parameters.
    pub fn url(&self, path: &str, query: &[(&str, String)]) -> Result<Url> {
        let raw = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        Url::parse_with_params(&raw, query).map_err(|e| SourceError::InvalidUrl {
            url: raw.clone(),
            message: e.to_string(),
        })
    }

    /// `GET` and decode a JSON response.
    pub async fn get_json<T>(&self, path: &str, query: &[(&str, String)]) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let url = self.url(path, query)?;
        self.send_with_retry(Method::GET, url, None).await
    }

    /// `POST` a JSON body and decode a JSON response.
    pub async fn post_json<B, T>(
        &self,
        path: &str,
        query: &[(&str, String)],
        body: &B,
    ) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.url(path, query)?;
        let body = serde_json::to_value(body)
            .map_err(|e| SourceError::parse(self.service, format!("request body: {e}")))?;
        self.send_with_retry(Method::POST, url, Some(body)).await
    }

    async fn send_with_retry<T>(
        &self,
        method: Method,
        url: Url,
        body: Option<serde_json::Value>,
    ) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let attempt = || self.send_once(method.clone(), url.clone(), body.as_ref());

        attempt
            .retry(
                ExponentialBuilder::default()
                    .with_min_delay(self.min_retry_delay)
                    .with_max_times(MAX_RETRIES),
            )
            .when(SourceError::is_retryable)
            .notify(|err: &SourceError, delay: Duration| {
                tracing::warn!(
                    service = self.service,
                    error = %err,
                    delay_ms = delay.as_millis() as u64,
                    "Retrying request"
                );
            })
            .await
    }

    async fn send_once<T>(
        &self,
        method: Method,
        url: Url,
        body: Option<&serde_json::Value>,
    ) -> Result<T>
    where
        T: DeserializeOwned,
    {
        tracing::debug!(service = self.service, method = %method, url = %url, "Sending request");

        let mut request = self.signer.sign(self.http.request(method, url));
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| SourceError::network(self.service, e.to_string()))?;

        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| SourceError::network(self.service, e.to_string()))?;

        if !status.is_success() {
            return Err(SourceError::api(
                self.service,
                status.as_u16(),
                String::from_utf8_lossy(&bytes),
            ));
        }

        serde_json::from_slice(&bytes).map_err(|e| SourceError::parse(self.service, e.to_string()))
    }
}
