//! Retrying HTTP client shared by every remote call
//!
//! Responses with a retryable status (408, 425, 429, 5xx gateway errors) and
//! transport failures are retried under the configured [`RetryPolicy`]. Any
//! other response, including 404, is handed back so callers can decide.

use crate::error::{Error, Result};
use crate::retry::{HttpStatusError, HttpStatusPredicate, RetryError, RetryExecutorBuilder, TracingObserver};
use crate::types::{RetryPolicy, RuntimeConfig};
use std::fmt;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Failure of a single HTTP attempt
#[derive(Debug)]
pub struct HttpError {
    pub status: Option<u16>,
    pub message: String,
}

impl fmt::Display for HttpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(f, "HTTP {}: {}", status, self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for HttpError {}

impl HttpStatusError for HttpError {
    fn status_code(&self) -> Option<u16> {
        self.status
    }
}

/// reqwest client wrapped with retry and cancellation
#[derive(Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    policy: RetryPolicy,
    cancel: CancellationToken,
}

impl HttpClient {
    /// Build a client using the network settings and the retry policy for `operation`
    pub fn new(config: &RuntimeConfig, operation: &str, cancel: CancellationToken) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(config.network.user_agent.clone())
            .timeout(Duration::from_secs(config.network.http_timeout_secs))
            .build()
            .map_err(|e| Error::invalid_config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            policy: config.retry_policies.policy_for(operation),
            cancel,
        })
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Underlying reqwest client, for requests that must not be retried
    pub fn inner(&self) -> &reqwest::Client {
        &self.client
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Send the request produced by `build`, rebuilding it for every attempt
    pub async fn send<F>(&self, endpoint: &str, build: F) -> Result<reqwest::Response>
    where
        F: Fn(&reqwest::Client) -> reqwest::RequestBuilder,
    {
        let predicate = HttpStatusPredicate::default_http();
        let executor = RetryExecutorBuilder::new()
            .with_policy(self.policy.clone())
            .with_predicate(predicate.clone())
            .with_observer(TracingObserver::new(endpoint))
            .with_cancel(self.cancel.clone())
            .build();

        let result = executor
            .execute(|| {
                let request = build(&self.client);
                let predicate = &predicate;
                async move {
                    let response = request.send().await.map_err(|e| HttpError {
                        status: e.status().map(|s| s.as_u16()),
                        message: e.to_string(),
                    })?;
                    let status = response.status().as_u16();
                    if predicate.is_retryable_code(status) {
                        return Err(HttpError {
                            status: Some(status),
                            message: response
                                .status()
                                .canonical_reason()
                                .unwrap_or("retryable status")
                                .to_string(),
                        });
                    }
                    Ok(response)
                }
            })
            .await;

        result.map_err(|err| match err {
            RetryError::Cancelled { .. } => Error::Cancelled,
            RetryError::Exhausted { source, .. } | RetryError::NonRetryable(source) => {
                Error::upstream(endpoint, source.to_string())
            }
        })
    }

    /// Send `request` exactly once, for calls that are not idempotent
    pub async fn send_once(&self, endpoint: &str, request: reqwest::RequestBuilder) -> Result<reqwest::Response> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(Error::Cancelled),
            response = request.send() => response.map_err(|e| Error::upstream(endpoint, e.to_string())),
        }
    }

    /// GET `url` and decode a JSON body, failing on any non-success status
    pub async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        bearer: Option<&str>,
    ) -> Result<T> {
        let response = self
            .send(url, |client| {
                let request = client.get(url).header("Accept", "application/json");
                match bearer {
                    Some(token) => request.bearer_auth(token),
                    None => request,
                }
            })
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::upstream(url, format!("unexpected status {}", status)));
        }
        response
            .json::<T>()
            .await
            .map_err(|e| Error::upstream(url, format!("invalid JSON: {}", e)))
    }
}

/// Extract the `rel="next"` target of a `Link` header
///
/// Format: `<https://api.github.com/repos/o/r/tags?page=2>; rel="next"`.
/// Relative targets are resolved against `base` (scheme and host).
pub fn next_link(link: &str, base: &str) -> Option<String> {
    for part in link.split(',') {
        let part = part.trim();
        if !part.contains("rel=\"next\"") {
            continue;
        }
        let start = part.find('<')?;
        let end = part.find('>')?;
        let url = &part[start + 1..end];
        if url.starts_with('/') {
            return Some(format!("{}{}", base.trim_end_matches('/'), url));
        }
        return Some(url.to_string());
    }
    None
}
