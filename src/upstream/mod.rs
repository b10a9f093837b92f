//! Upstream clients: the caching reverse-proxy in front of the MET product
//! suite, and the separately-authenticated Frost stations API.

pub mod cache;
pub mod client;

pub use cache::{CacheInfo, CacheStatus};
pub use client::{FetchOptions, RequestPolicy, UpstreamClient, UpstreamResponse};
