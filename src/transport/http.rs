use super::{Transport, TransportError, TransportRequest, TransportResponse};
use crate::Result;
use async_trait::async_trait;
use reqwest::header::{HeaderValue, CONTENT_TYPE};
use serde_json::{json, Value};
use std::env;
use std::time::{Duration, Instant};
use tracing::debug;

/// `reqwest`-backed transport.
///
/// - JSON bodies with a default `Content-Type: application/json`
/// - 2xx is success; other statuses become [`TransportResponse::Error`] with
///   the parsed body (JSON when possible, else text)
/// - retries with exponential backoff on transport errors, 5xx and 429;
///   timeouts are not retried
pub struct HttpTransport {
    client: reqwest::Client,
    timeout: Duration,
    retries: u32,
    retry_delay: Duration,
}

impl HttpTransport {
    /// Defaults can be overridden via env:
    /// - `REST_KIT_HTTP_TIMEOUT_SECS` (default 30)
    /// - `REST_KIT_HTTP_RETRIES` (default 0)
    /// - `REST_KIT_HTTP_RETRY_DELAY_MS` (default 1000)
    pub fn new() -> Result<Self> {
        let timeout_secs = env::var("REST_KIT_HTTP_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(30);
        let retries = env::var("REST_KIT_HTTP_RETRIES")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(0);
        let retry_delay_ms = env::var("REST_KIT_HTTP_RETRY_DELAY_MS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(1000);

        let client = reqwest::Client::builder()
            .pool_idle_timeout(Some(Duration::from_secs(90)))
            .build()
            .map_err(TransportError::Http)?;

        Ok(Self {
            client,
            timeout: Duration::from_secs(timeout_secs),
            retries,
            retry_delay: Duration::from_millis(retry_delay_ms),
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    fn backoff_delay(&self, attempt: u32) -> Duration {
        // retry_delay * 2^attempt
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.retry_delay.saturating_mul(factor)
    }

    async fn attempt(
        &self,
        request: &TransportRequest,
    ) -> std::result::Result<TransportResponse, TransportError> {
        let mut headers = request.headers.clone();
        if !headers.contains_key(CONTENT_TYPE) {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        }

        let mut req = self
            .client
            .request(request.method.into(), &request.url)
            .headers(headers)
            .timeout(self.timeout);
        if let Some(body) = request.body.as_ref().filter(|_| request.method.allows_body()) {
            req = req.json(body);
        }

        let response = req.send().await.map_err(classify)?;
        let status = response.status();
        let is_json = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.contains("json"))
            .unwrap_or(false);
        let text = response.text().await.map_err(classify)?;

        if status.is_success() {
            let data = if text.is_empty() {
                Value::Null
            } else if is_json {
                serde_json::from_str(&text).unwrap_or(Value::String(text))
            } else {
                Value::String(text)
            };
            return Ok(TransportResponse::Success {
                data,
                status: Some(status.as_u16()),
                duration_ms: None,
            });
        }

        let reason = status.canonical_reason().unwrap_or_default();
        let data = if text.is_empty() {
            Value::String(format!(
                "Request failed with status: {} {}",
                status.as_u16(),
                reason
            ))
        } else {
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        };
        Ok(TransportResponse::Error {
            data,
            status: Some(status.as_u16()),
            info: Some(json!({ "statusText": reason })),
        })
    }
}

fn classify(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout
    } else {
        TransportError::Http(e)
    }
}

fn should_retry(outcome: &std::result::Result<TransportResponse, TransportError>) -> bool {
    match outcome {
        Ok(TransportResponse::Error {
            status: Some(status),
            ..
        }) => *status >= 500 || *status == 429,
        Ok(_) => false,
        Err(e) => e.is_retryable(),
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(
        &self,
        request: TransportRequest,
    ) -> std::result::Result<TransportResponse, TransportError> {
        let started = Instant::now();
        let mut attempt = 0u32;
        loop {
            let outcome = self.attempt(&request).await;
            if attempt < self.retries && should_retry(&outcome) {
                let delay = self.backoff_delay(attempt);
                debug!(
                    url = %request.url,
                    attempt = attempt + 1,
                    delay_ms = delay.as_millis() as u64,
                    "retrying request"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
                continue;
            }
            return outcome.map(|response| match response {
                TransportResponse::Success { data, status, .. } => TransportResponse::Success {
                    data,
                    status,
                    duration_ms: Some(started.elapsed().as_millis() as u64),
                },
                other => other,
            });
        }
    }

    fn name(&self) -> &str {
        "http"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_is_exponential() {
        let t = HttpTransport::new()
            .unwrap()
            .with_retry_delay(Duration::from_millis(100));
        assert_eq!(t.backoff_delay(0), Duration::from_millis(100));
        assert_eq!(t.backoff_delay(1), Duration::from_millis(200));
        assert_eq!(t.backoff_delay(3), Duration::from_millis(800));
    }

    #[test]
    fn test_retry_rules() {
        let server_error = Ok(TransportResponse::Error {
            data: Value::Null,
            status: Some(503),
            info: None,
        });
        let throttled = Ok(TransportResponse::Error {
            data: Value::Null,
            status: Some(429),
            info: None,
        });
        let not_found = Ok(TransportResponse::Error {
            data: Value::Null,
            status: Some(404),
            info: None,
        });
        assert!(should_retry(&server_error));
        assert!(should_retry(&throttled));
        assert!(!should_retry(&not_found));
        assert!(!should_retry(&Ok(TransportResponse::success(Value::Null))));
        assert!(!should_retry(&Err(TransportError::Timeout)));
    }
}
