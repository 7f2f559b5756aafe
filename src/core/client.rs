// src/core/client.rs

use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use url::Url;

use crate::core::engine_api::EngineAction;
use crate::core::error::EngineError;

/// Attempt budget and fixed pause between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { attempts: 3, delay: Duration::from_secs(1) }
    }
}

/// Runs `op` until it succeeds, fails with a non-retryable error, or the
/// attempt budget is spent.
///
/// Each retryable failure is logged. Cancellation is checked before every
/// attempt and raced against the pause between attempts, so an abandoned
/// caller never waits out a full delay.
///
/// # Arguments
/// * `policy` - Attempt budget and delay. A budget of zero is treated as one.
/// * `cancel` - Token checked between attempts.
/// * `action` - Label used in logs and errors.
/// * `op` - Produces one attempt; receives the 1-based attempt number.
pub async fn retry<T, F, Fut>(
    policy: RetryPolicy,
    cancel: &CancellationToken,
    action: &'static str,
    mut op: F,
) -> Result<T, EngineError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, EngineError>>,
{
    let max_attempts = policy.attempts.max(1);
    let mut attempt = 0;
    loop {
        if cancel.is_cancelled() {
            return Err(EngineError::Cancelled(action));
        }
        attempt += 1;
        let error = match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) if !e.is_retryable() => return Err(e),
            Err(e) => e,
        };

        warn!(action, attempt, max_attempts, error = %error, "Engine call attempt failed.");
        if attempt >= max_attempts {
            return Err(EngineError::ExhaustedRetries {
                action,
                attempts: attempt,
                last: Box::new(error),
            });
        }

        tokio::select! {
            _ = cancel.cancelled() => return Err(EngineError::Cancelled(action)),
            _ = tokio::time::sleep(policy.delay) => {}
        }
    }
}

/// The one handle every coordinator uses to talk to the engine.
///
/// Owns a pooled `reqwest::Client`, the engine base URL, and the API key.
/// Holds no per-scan state, so a single instance is shared behind an `Arc`
/// by every concurrent run and progress query.
#[derive(Clone)]
pub struct ResilientClient {
    http: reqwest::Client,
    base_url: Url,
    api_key: String,
    policy: RetryPolicy,
}

// The API key stays out of logs.
impl fmt::Debug for ResilientClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResilientClient")
            .field("base_url", &self.base_url.as_str())
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl ResilientClient {
    /// Builds the client.
    ///
    /// # Arguments
    /// * `base_url` - Engine root, e.g. `http://zap:8090/`. A missing trailing
    ///   slash is added so relative action paths join underneath it.
    /// * `api_key` - Sent as the `apikey` query parameter on every call.
    /// * `policy` - Retry budget applied to each `call`.
    /// * `request_timeout` - Upper bound for a single HTTP attempt.
    pub fn new(
        mut base_url: Url,
        api_key: impl Into<String>,
        policy: RetryPolicy,
        request_timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        let http = reqwest::Client::builder()
            .user_agent(concat!("VanguardRS/", env!("CARGO_PKG_VERSION")))
            .timeout(request_timeout)
            .build()?;
        Ok(Self { http, base_url, api_key: api_key.into(), policy })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Issues `action` with the retry policy and returns the decoded JSON body.
    ///
    /// `scope` is the value of the action's scoping parameter (target URL or
    /// job identifier).
    pub async fn call(
        &self,
        action: EngineAction,
        scope: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<Value, EngineError> {
        retry(self.policy, cancel, action.name(), |attempt| {
            debug!(action = %action, attempt, "Calling engine.");
            self.send_once(action, scope)
        })
        .await
    }

    /// A single attempt with no retries, for callers that only want to know
    /// whether the engine answers right now.
    pub async fn probe(&self, action: EngineAction) -> Result<Value, EngineError> {
        self.send_once(action, None).await
    }

    async fn send_once(&self, action: EngineAction, scope: Option<&str>) -> Result<Value, EngineError> {
        let url = self.endpoint_url(action, scope)?;
        let response = self.http.get(url).send().await.map_err(|e| EngineError::TransientTransport {
            action: action.name(),
            message: e.without_url().to_string(),
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|e| format!("<unreadable body: {}>", e));
            return Err(EngineError::NonSuccessResponse {
                action: action.name(),
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response.bytes().await.map_err(|e| EngineError::TransientTransport {
            action: action.name(),
            message: e.without_url().to_string(),
        })?;
        serde_json::from_slice(&bytes).map_err(|e| EngineError::EngineProtocol {
            action: action.name(),
            message: format!("body is not valid JSON: {}", e),
        })
    }

    fn endpoint_url(&self, action: EngineAction, scope: Option<&str>) -> Result<Url, EngineError> {
        let detail = action.detail();
        let mut url = self.base_url.join(detail.path).map_err(|e| {
            EngineError::InvalidInput(format!("cannot address {} under {}: {}", action, self.base_url, e))
        })?;
        {
            let mut query = url.query_pairs_mut();
            if let (Some(param), Some(value)) = (detail.param, scope) {
                query.append_pair(param, value);
            }
            query.append_pair("apikey", &self.api_key);
        }
        Ok(url)
    }
}
