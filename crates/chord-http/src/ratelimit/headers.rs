//! Rate-limit response headers

use reqwest::header::HeaderMap;
use serde::Deserialize;
use std::time::Duration;

pub const LIMIT: &str = "x-ratelimit-limit";
pub const REMAINING: &str = "x-ratelimit-remaining";
pub const RESET_AFTER: &str = "x-ratelimit-reset-after";
pub const BUCKET: &str = "x-ratelimit-bucket";
pub const GLOBAL: &str = "x-ratelimit-global";
pub const SCOPE: &str = "x-ratelimit-scope";
pub const RETRY_AFTER: &str = "retry-after";

/// Rate-limit information carried by one response
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RateLimitHeaders {
    pub limit: Option<u32>,
    pub remaining: Option<u32>,
    pub reset_after: Option<Duration>,
    /// Service-assigned bucket hash
    pub bucket: Option<String>,
    pub global: bool,
    /// `user`, `global` or `shared`
    pub scope: Option<String>,
    /// `retry-after` header, in milliseconds
    pub retry_after: Option<Duration>,
}

impl RateLimitHeaders {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let text = |name: &str| headers.get(name).and_then(|v| v.to_str().ok()).map(str::trim);

        Self {
            limit: text(LIMIT).and_then(|v| v.parse().ok()),
            remaining: text(REMAINING).and_then(|v| v.parse().ok()),
            reset_after: text(RESET_AFTER).and_then(parse_seconds),
            bucket: text(BUCKET).filter(|v| !v.is_empty()).map(str::to_string),
            global: text(GLOBAL).is_some_and(|v| v.eq_ignore_ascii_case("true")),
            scope: text(SCOPE).map(str::to_string),
            retry_after: text(RETRY_AFTER).and_then(parse_millis),
        }
    }

    /// Whether the response told us anything about the bucket
    pub fn is_empty(&self) -> bool {
        self.remaining.is_none() && self.reset_after.is_none() && self.bucket.is_none()
    }
}

/// Body of a 429 response
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RateLimitedBody {
    #[serde(default)]
    pub retry_after: Option<f64>,
    #[serde(default)]
    pub global: bool,
}

impl RateLimitedBody {
    /// Wait time for a 429; the body value wins over the header
    pub fn resolve(body: &str, headers: &RateLimitHeaders) -> (Duration, bool) {
        let parsed: Self = serde_json::from_str(body).unwrap_or_default();
        let retry_after = parsed
            .retry_after
            .and_then(seconds_to_duration)
            .or(headers.retry_after)
            .or(headers.reset_after)
            .unwrap_or(Duration::from_secs(1));
        let global = parsed.global || headers.global || headers.scope.as_deref() == Some("global");
        (retry_after, global)
    }
}

fn parse_seconds(raw: &str) -> Option<Duration> {
    raw.parse::<f64>().ok().and_then(seconds_to_duration)
}

fn parse_millis(raw: &str) -> Option<Duration> {
    raw.parse::<f64>().ok().and_then(|ms| seconds_to_duration(ms / 1000.0))
}

fn seconds_to_duration(secs: f64) -> Option<Duration> {
    if secs.is_finite() && secs >= 0.0 {
        Some(Duration::from_secs_f64(secs))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_static(value));
        }
        map
    }

    #[test]
    fn test_parse_headers() {
        let parsed = RateLimitHeaders::from_headers(&headers(&[
            (LIMIT, "5"),
            (REMAINING, "0"),
            (RESET_AFTER, "1.250"),
            (BUCKET, "abcd1234"),
            (SCOPE, "user"),
        ]));

        assert_eq!(parsed.limit, Some(5));
        assert_eq!(parsed.remaining, Some(0));
        assert_eq!(parsed.reset_after, Some(Duration::from_millis(1250)));
        assert_eq!(parsed.bucket.as_deref(), Some("abcd1234"));
        assert!(!parsed.global);
        assert!(!parsed.is_empty());
    }

    #[test]
    fn test_missing_headers() {
        let parsed = RateLimitHeaders::from_headers(&HeaderMap::new());
        assert!(parsed.is_empty());
        assert_eq!(parsed, RateLimitHeaders::default());
    }

    #[test]
    fn test_garbage_values_ignored() {
        let parsed = RateLimitHeaders::from_headers(&headers(&[
            (REMAINING, "-1"),
            (RESET_AFTER, "soon"),
        ]));
        assert_eq!(parsed.remaining, None);
        assert_eq!(parsed.reset_after, None);
    }

    #[test]
    fn test_body_retry_after_wins() {
        let parsed = RateLimitHeaders::from_headers(&headers(&[(RETRY_AFTER, "5000"), (GLOBAL, "true")]));
        let (wait, global) = RateLimitedBody::resolve(r#"{"retry_after": 0.5, "global": false}"#, &parsed);
        assert_eq!(wait, Duration::from_millis(500));
        assert!(global);

        let (wait, _) = RateLimitedBody::resolve("not json", &parsed);
        assert_eq!(wait, Duration::from_secs(5));
    }

    #[test]
    fn test_retry_after_header_is_milliseconds() {
        let parsed = RateLimitHeaders::from_headers(&headers(&[(RETRY_AFTER, "2000")]));
        assert_eq!(parsed.retry_after, Some(Duration::from_secs(2)));

        let (wait, global) = RateLimitedBody::resolve("", &parsed);
        assert_eq!(wait, Duration::from_secs(2));
        assert!(!global);
    }
}
