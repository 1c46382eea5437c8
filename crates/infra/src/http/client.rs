use std::time::Duration;

use propdesk_domain::{BackendConfig, PropDeskError};
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client as ReqwestClient, Method, RequestBuilder, Response};
use tracing::debug;

use crate::errors::InfraError;

/// HTTP client for the backend with built-in retry and timeout support.
#[derive(Clone, Debug)]
pub struct HttpClient {
    client: ReqwestClient,
    max_attempts: usize,
    base_backoff: Duration,
}

impl HttpClient {
    /// Start building a new HTTP client.
    pub fn builder() -> HttpClientBuilder {
        HttpClientBuilder::default()
    }

    /// Client for `config`: its timeout, attempt budget and `apikey` header.
    ///
    /// # Errors
    /// Returns `PropDeskError::Config` if the anon key is not a valid header
    /// value, or an infrastructure error if the TLS backend cannot start
    pub fn for_backend(config: &BackendConfig) -> Result<Self, PropDeskError> {
        let mut key = HeaderValue::from_str(&config.anon_key)
            .map_err(|_| PropDeskError::Config("anon key is not a valid header value".into()))?;
        key.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert("apikey", key);

        Self::builder()
            .timeout(config.request_timeout())
            .max_attempts(config.max_attempts)
            .user_agent(concat!("propdesk-session/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .build()
    }

    /// Create a request builder using the underlying reqwest client.
    pub fn request<U>(&self, method: Method, url: U) -> RequestBuilder
    where
        U: reqwest::IntoUrl,
    {
        self.client.request(method, url)
    }

    /// Execute the provided request builder with retry semantics.
    ///
    /// Retries use exponential backoff until the attempt budget is spent.
    /// Which failures are retried depends on the method:
    /// - connection failures are always retried, the server never saw them
    /// - server errors and timeouts are retried only for idempotent methods
    ///
    /// Token grants and logout are `POST`s with one-shot effects (a rotated
    /// refresh token, a revoked session) and are therefore sent once. Any
    /// other response is returned as-is for the caller to interpret.
    ///
    /// # Errors
    /// Returns `PropDeskError::Network` when the final attempt fails in
    /// transport
    pub async fn send(&self, builder: RequestBuilder) -> Result<Response, PropDeskError> {
        let attempts = self.max_attempts.max(1);

        for attempt in 0..attempts {
            let cloned_builder = builder.try_clone().ok_or_else(|| {
                PropDeskError::Internal(
                    "request body cannot be cloned; buffer the body to enable retries".into(),
                )
            })?;

            let request = cloned_builder.build().map_err(|err| {
                let infra: InfraError = err.into();
                PropDeskError::from(infra)
            })?;

            let method = request.method().clone();
            let repeatable = method.is_idempotent();
            let path = request.url().path().to_string();
            debug!(attempt = attempt + 1, %method, %path, "sending HTTP request");

            match self.client.execute(request).await {
                Ok(response) => {
                    let status = response.status();
                    debug!(attempt = attempt + 1, %method, %path, %status, "received HTTP response");

                    if status.is_server_error() && repeatable && attempt + 1 < attempts {
                        self.sleep_with_backoff(attempt + 1).await;
                        continue;
                    }

                    return Ok(response);
                }
                Err(err) => {
                    debug!(attempt = attempt + 1, %method, %path, error = %err, "HTTP request failed");

                    if attempt + 1 < attempts && should_retry_error(&err, repeatable) {
                        self.sleep_with_backoff(attempt + 1).await;
                        continue;
                    }

                    let infra: InfraError = err.into();
                    return Err(PropDeskError::from(infra));
                }
            }
        }

        Err(PropDeskError::Internal("http client exhausted retries without producing a result".into()))
    }

    fn backoff_delay(&self, retry_number: usize) -> Duration {
        let shift = u32::try_from(retry_number.saturating_sub(1).min(8)).unwrap_or(8);
        self.base_backoff.saturating_mul(1u32 << shift)
    }

    async fn sleep_with_backoff(&self, retry_number: usize) {
        let delay = self.backoff_delay(retry_number);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

/// Builder for [`HttpClient`].
#[derive(Debug)]
pub struct HttpClientBuilder {
    timeout: Duration,
    max_attempts: usize,
    base_backoff: Duration,
    user_agent: Option<String>,
    default_headers: Option<HeaderMap>,
}

impl Default for HttpClientBuilder {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            max_attempts: 2,
            base_backoff: Duration::from_millis(200),
            user_agent: None,
            default_headers: None,
        }
    }
}

impl HttpClientBuilder {
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Configure the total number of attempts (initial try + retries).
    pub fn max_attempts(mut self, attempts: usize) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub fn base_backoff(mut self, backoff: Duration) -> Self {
        self.base_backoff = backoff;
        self
    }

    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    pub fn default_headers(mut self, headers: HeaderMap) -> Self {
        self.default_headers = Some(headers);
        self
    }

    /// # Errors
    /// Returns an infrastructure error if the reqwest client cannot be built
    pub fn build(self) -> Result<HttpClient, PropDeskError> {
        let mut builder = ReqwestClient::builder().timeout(self.timeout).no_proxy();

        if let Some(agent) = self.user_agent {
            builder = builder.user_agent(agent);
        }

        if let Some(headers) = self.default_headers {
            builder = builder.default_headers(headers);
        }

        let client = builder.build().map_err(|err| {
            let infra: InfraError = err.into();
            PropDeskError::from(infra)
        })?;

        Ok(HttpClient { client, max_attempts: self.max_attempts.max(1), base_backoff: self.base_backoff })
    }
}

fn should_retry_error(err: &reqwest::Error, repeatable: bool) -> bool {
    err.is_connect() || (repeatable && (err.is_timeout() || err.is_request()))
}
