//! Resilient request executor.
//!
//! Sends one request through a [`Transport`] with bounded retries:
//! network failures back off `min(base + attempt * step, cap)`, HTTP 429
//! waits the rate-limit cooldown, and any other non-2xx response fails
//! immediately with the best message the body offers. A successful
//! response reporting zero remaining rate limit sleeps the cooldown
//! before returning.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::types::ApiError;

/// Longest error text kept from a response body.
const MAX_ERROR_CHARS: usize = 400;

// ---------------------------------------------------------------------------
// Transport seam
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// A request relative to the API base URL. The body is raw JSON text so
/// numeric fields keep their exact decimal form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub body: Option<String>,
}

impl ApiRequest {
    pub fn get(path: &str) -> Self {
        Self {
            method: Method::Get,
            path: path.to_string(),
            body: None,
        }
    }

    pub fn post(path: &str, body: String) -> Self {
        Self {
            method: Method::Post,
            path: path.to_string(),
            body: Some(body),
        }
    }
}

/// What the executor needs from an HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    /// Raw `x-ratelimit-remaining` header, if present.
    pub rate_limit_remaining: Option<String>,
    pub body: String,
}

/// Connection-level failure (DNS, TLS, timeout, reset).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct TransportError(pub String);

/// Raw HTTP round trip. Implemented over reqwest in production and by
/// scripted fakes in tests.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &ApiRequest) -> Result<RawResponse, TransportError>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn send(&self, request: &ApiRequest) -> Result<RawResponse, TransportError> {
        (**self).send(request).await
    }
}

// ---------------------------------------------------------------------------
// Retry policy
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub retry_count: u32,
    pub rate_limit_wait: Duration,
    pub backoff_base: Duration,
    pub backoff_step: Duration,
    pub backoff_cap: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retry_count: 3,
            rate_limit_wait: Duration::from_secs(60),
            backoff_base: Duration::from_secs(2),
            backoff_step: Duration::from_secs(1),
            backoff_cap: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// Same retry budget with every wait set to zero.
    pub fn immediate(retry_count: u32) -> Self {
        Self {
            retry_count,
            rate_limit_wait: Duration::ZERO,
            backoff_base: Duration::ZERO,
            backoff_step: Duration::ZERO,
            backoff_cap: Duration::ZERO,
        }
    }

    /// Wait before retrying after network failure number `attempt` (0-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        (self.backoff_base + self.backoff_step * attempt).min(self.backoff_cap)
    }
}

// ---------------------------------------------------------------------------
// Executor
// ---------------------------------------------------------------------------

pub struct RequestExecutor<T> {
    transport: T,
    policy: RetryPolicy,
}

impl<T: Transport> RequestExecutor<T> {
    pub fn new(transport: T, policy: RetryPolicy) -> Self {
        Self { transport, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Send `request` and return its JSON body. Non-object bodies are
    /// wrapped as `{"data": ...}`.
    pub async fn execute(&self, request: &ApiRequest) -> Result<Value, ApiError> {
        let retries = self.policy.retry_count;

        for attempt in 0..=retries {
            let response = match self.transport.send(request).await {
                Ok(r) => r,
                Err(e) => {
                    if attempt >= retries {
                        return Err(ApiError::Network {
                            attempts: attempt + 1,
                            message: e.0,
                        });
                    }
                    let wait = self.policy.backoff(attempt);
                    warn!(path = %request.path, attempt, wait_secs = wait.as_secs_f64(), error = %e, "Network error, retrying");
                    tokio::time::sleep(wait).await;
                    continue;
                }
            };

            if response.status == 429 {
                if attempt >= retries {
                    return Err(ApiError::RateLimited {
                        attempts: attempt + 1,
                    });
                }
                warn!(
                    path = %request.path,
                    attempt,
                    wait_secs = self.policy.rate_limit_wait.as_secs_f64(),
                    "Rate limited, waiting before retry"
                );
                tokio::time::sleep(self.policy.rate_limit_wait).await;
                continue;
            }

            if !(200..300).contains(&response.status) {
                return Err(ApiError::Http {
                    status: response.status,
                    message: extract_message(&response.body),
                });
            }

            let parsed = parse_body(&response.body)?;

            if let Some(remaining) = response
                .rate_limit_remaining
                .as_deref()
                .and_then(|r| r.trim().parse::<i64>().ok())
            {
                if remaining <= 0 {
                    warn!(
                        wait_secs = self.policy.rate_limit_wait.as_secs_f64(),
                        "x-ratelimit-remaining=0, cooling down"
                    );
                    tokio::time::sleep(self.policy.rate_limit_wait).await;
                }
            }

            debug!(path = %request.path, status = response.status, attempt, "API request ok");
            return Ok(parsed);
        }

        Err(ApiError::Network {
            attempts: retries + 1,
            message: "request failed after all retries".into(),
        })
    }
}

fn parse_body(body: &str) -> Result<Value, ApiError> {
    let value: Value = serde_json::from_str(body)
        .map_err(|e| ApiError::MalformedResponse(format!("invalid JSON: {e}")))?;
    if value.is_object() {
        Ok(value)
    } else {
        Ok(serde_json::json!({ "data": value }))
    }
}

/// Best-effort error text: `message`, then `error`, then the JSON itself,
/// then the raw body. Truncated to 400 characters.
pub fn extract_message(body: &str) -> String {
    let text = match serde_json::from_str::<Value>(body) {
        Ok(value) => {
            let field = ["message", "error"]
                .iter()
                .find_map(|key| value.as_object().and_then(|o| o.get(*key)));
            match field {
                Some(Value::String(s)) => s.clone(),
                Some(other) => other.to_string(),
                None => value.to_string(),
            }
        }
        Err(_) if body.trim().is_empty() => "Unknown error".to_string(),
        Err(_) => body.to_string(),
    };
    text.chars().take(MAX_ERROR_CHARS).collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
