//! # chord-http
//!
//! REST side of the client: per-route rate limiting, retrying transport and a
//! few typed endpoints.

pub mod api;
pub mod ratelimit;
pub mod route;
pub mod transport;

pub use api::{GatewayBot, SessionStartLimit};
pub use ratelimit::{RateLimitHeaders, RateLimiter, RatelimitPermit};
pub use reqwest::Method;
pub use route::Route;
pub use transport::{HttpResponse, HttpTransport, RequestOptions};
