//! Read caching with TTL support.
//!
//! This crate provides a cache-aside layer for bulk read queries, absorbing
//! repeated listing calls. Time is read through an injectable [`Clock`] so
//! expiry can be tested deterministically, and writers invalidate entries
//! explicitly after changes that affect a cached query.

#![warn(missing_docs)]

mod cache;
mod clock;
mod config;

pub use cache::{CacheEntry, ReadCache};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ReadCacheConfig, ReadCacheConfigBuilder};
