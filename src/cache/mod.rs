//! Caching subsystem.
//!
//! [`ResponseCache`] holds fetched collections keyed by request shape, with
//! lazy TTL expiry and batched invalidation. The cache is not
//! persisted; it only lives as long as the client that owns it.
//!
//! See the [`response`] module docs for the invalidation model.

pub mod response;

pub use response::{CacheConfig, CacheEntry, ResponseCache};
