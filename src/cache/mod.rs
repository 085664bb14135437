//! Response caching for idempotent read requests.
//!
//! Successful read responses are stored with a validity window (TTL) and
//! served without network access while valid. Expired entries are evicted
//! lazily on lookup; there is no background sweep.

mod stats;
mod store;

pub use stats::CacheStats;
pub use store::ResponseCache;
