pub mod backoff;
pub mod cache;
pub mod error;
pub mod exec;
pub mod metrics;
pub mod model;
pub mod retry;

pub use cache::{cache_key, CacheEntry, CacheError, ResponseCache};
pub use error::HttpStatusError;
pub use exec::{HttpExec, ReqwestExecutor};
pub use retry::{RetryPolicy, RetryTransport};
