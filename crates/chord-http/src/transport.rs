//! Rate-limited REST transport
//!
//! Every request goes through the [`RateLimiter`]. 429 responses are retried
//! after the indicated wait, 5xx responses and transport failures after an
//! exponential backoff; everything else fails immediately with a typed error.

use crate::ratelimit::{RateLimitHeaders, RateLimitedBody, RateLimiter};
use crate::route::Route;
use chord_common::{ApiError, ClientError, ClientResult, HttpConfig};
use reqwest::header::AUTHORIZATION;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace, warn};

pub const USER_AGENT: &str = concat!("chord (https://github.com/chord-rs/chord, ", env!("CARGO_PKG_VERSION"), ")");
pub const AUDIT_LOG_REASON: &str = "x-audit-log-reason";

const MAX_SERVER_BACKOFF: Duration = Duration::from_secs(30);

/// Optional parts of a request
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub body: Option<Value>,
    /// Shown in the guild audit log
    pub reason: Option<String>,
}

impl RequestOptions {
    pub fn json(body: Value) -> Self {
        Self {
            body: Some(body),
            reason: None,
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

/// Successful response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    /// Decode the body
    pub fn json<T: DeserializeOwned>(&self) -> ClientResult<T> {
        serde_json::from_str(&self.body)
            .map_err(|e| ClientError::protocol(format!("undecodable response body: {e}")))
    }

    /// Body as JSON, `null` for empty bodies
    pub fn value(&self) -> ClientResult<Value> {
        if self.body.trim().is_empty() {
            return Ok(Value::Null);
        }
        self.json()
    }
}

pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
    authorization: String,
    limiter: Arc<RateLimiter>,
    max_attempts: u32,
    server_error_backoff: Duration,
}

impl HttpTransport {
    pub fn new(token: &str, config: &HttpConfig) -> ClientResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .user_agent(USER_AGENT)
            .build()
            .map_err(ClientError::connectivity)?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            authorization: format!("Bot {}", token.trim()),
            limiter: Arc::new(RateLimiter::new(config.global_per_second)),
            max_attempts: config.max_attempts.max(1),
            server_error_backoff: config.server_error_backoff(),
        })
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Perform a request with an optional JSON body
    pub async fn request(&self, route: Route, body: Option<Value>) -> ClientResult<HttpResponse> {
        self.request_with(&route, RequestOptions { body, reason: None })
            .await
    }

    pub async fn request_with(&self, route: &Route, options: RequestOptions) -> ClientResult<HttpResponse> {
        let url = format!("{}{}", self.base_url, route.path()?);
        let mut permit = self.limiter.acquire(route).await;
        let mut attempt = 0;

        loop {
            attempt += 1;
            if attempt > 1 {
                self.limiter.wait(&mut permit).await;
            }

            let mut request = self
                .client
                .request(route.method().clone(), &url)
                .header(AUTHORIZATION, &self.authorization);
            if let Some(reason) = &options.reason {
                request = request.header(AUDIT_LOG_REASON, encode_reason(reason));
            }
            if let Some(body) = &options.body {
                request = request.json(body);
            }

            trace!(route = %route, bucket = %permit.bucket_key(), attempt, "Sending request");

            let response = match request.send().await {
                Ok(response) => response,
                Err(e) if e.is_builder() => return Err(ClientError::invalid_configuration(e)),
                Err(e) => {
                    if attempt >= self.max_attempts {
                        return Err(ClientError::connectivity(e));
                    }
                    let delay = self.server_backoff(attempt);
                    warn!(route = %route, attempt, error = %e, delay_ms = delay.as_millis() as u64, "Request failed, retrying");
                    tokio::time::sleep(delay).await;
                    continue;
                }
            };

            let status = response.status().as_u16();
            let headers = RateLimitHeaders::from_headers(response.headers());
            let body = match response.text().await {
                Ok(body) => body,
                Err(e) => {
                    if attempt >= self.max_attempts {
                        return Err(ClientError::connectivity(e));
                    }
                    tokio::time::sleep(self.server_backoff(attempt)).await;
                    continue;
                }
            };
            self.limiter.update(route, &mut permit, &headers);

            debug!(route = %route, status, remaining = ?headers.remaining, "Response received");

            match status {
                200..=299 => return Ok(HttpResponse { status, body }),
                429 => {
                    let (retry_after, global) = RateLimitedBody::resolve(&body, &headers);
                    // The lock outlives this permit, so later callers wait too
                    self.limiter.rate_limited(&mut permit, retry_after, global);
                    if attempt >= self.max_attempts {
                        return Err(ClientError::RateLimited {
                            route: route.to_string(),
                            attempts: attempt,
                            retry_after,
                        });
                    }
                }
                500..=599 => {
                    if attempt >= self.max_attempts {
                        return Err(ClientError::ServerFault {
                            attempts: attempt,
                            error: ApiError::from_response(status, &body),
                        });
                    }
                    let delay = self.server_backoff(attempt);
                    warn!(route = %route, status, attempt, delay_ms = delay.as_millis() as u64, "Server error, retrying");
                    tokio::time::sleep(delay).await;
                }
                401 => return Err(ClientError::Unauthorized(ApiError::from_response(status, &body))),
                403 => return Err(ClientError::Forbidden(ApiError::from_response(status, &body))),
                _ => return Err(ClientError::ClientRequest(ApiError::from_response(status, &body))),
            }
        }
    }

    /// Retry delay after the given failed attempt (1-based)
    fn server_backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.server_error_backoff
            .saturating_mul(1 << exponent)
            .min(MAX_SERVER_BACKOFF)
    }
}

/// Audit log reasons travel percent-encoded
fn encode_reason(reason: &str) -> String {
    let mut encoded = String::with_capacity(reason.len());
    for byte in reason.bytes() {
        if byte.is_ascii_alphanumeric() || b"-_.~ ".contains(&byte) {
            encoded.push(byte as char);
        } else {
            encoded.push_str(&format!("%{byte:02X}"));
        }
    }
    encoded
}
