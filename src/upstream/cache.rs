//! Proxy cache-header parsing.
//!
//! The reverse-proxy reports cache state in two headers: `X-Cache-Status`
//! (HIT, MISS, EXPIRED, BYPASS) and `Age` (seconds since the entry was
//! stored). Parsing is idempotent and order-independent across the two.

use serde::{Deserialize, Serialize};

/// Header carrying the proxy's cache verdict.
pub const CACHE_STATUS_HEADER: &str = "x-cache-status";
/// Standard freshness header.
pub const AGE_HEADER: &str = "age";

/// Known proxy cache verdicts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CacheStatus {
    Hit,
    Miss,
    Expired,
    Bypass,
}

impl CacheStatus {
    /// Parse a header value, case-insensitively.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "HIT" => Some(CacheStatus::Hit),
            "MISS" => Some(CacheStatus::Miss),
            "EXPIRED" => Some(CacheStatus::Expired),
            "BYPASS" => Some(CacheStatus::Bypass),
            _ => None,
        }
    }

    /// Whether the body was served from cache. An EXPIRED entry was still
    /// served stale from cache, so it counts.
    pub fn is_cached(self) -> bool {
        matches!(self, CacheStatus::Hit | CacheStatus::Expired)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CacheStatus::Hit => "HIT",
            CacheStatus::Miss => "MISS",
            CacheStatus::Expired => "EXPIRED",
            CacheStatus::Bypass => "BYPASS",
        }
    }
}

/// Parsed cache metadata for one upstream response.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheInfo {
    pub cached: bool,
    pub age_seconds: Option<u64>,
    pub status: Option<CacheStatus>,
}

impl CacheInfo {
    /// Derive cache info from the raw header values.
    ///
    /// Unknown status values yield `cached=false` with no status. Negative
    /// or non-numeric ages are discarded.
    pub fn from_values(status: Option<&str>, age: Option<&str>) -> Self {
        let status = status.and_then(CacheStatus::parse);
        let age_seconds = age.and_then(|v| v.trim().parse::<u64>().ok());
        Self {
            cached: status.map(CacheStatus::is_cached).unwrap_or(false),
            age_seconds,
            status,
        }
    }
}
