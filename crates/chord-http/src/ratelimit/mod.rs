//! REST rate limiting

mod bucket;
pub mod headers;
mod limiter;

pub use bucket::{Bucket, BucketState};
pub use headers::{RateLimitHeaders, RateLimitedBody};
pub use limiter::{RateLimiter, RatelimitPermit};
