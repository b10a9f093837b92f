//! Source attribution and the dual-shape response envelope.
//!
//! Every successful data-tool response carries provider attribution and
//! cache freshness; error envelopes carry the typed error record instead.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ToolError;
use crate::protocol::CallToolResult;
use crate::upstream::cache::CacheInfo;

/// Provider identity for the MET product suite behind the proxy.
pub const PROVIDER: &str = "MET Norway";
pub const LICENSE_URI: &str = "https://creativecommons.org/licenses/by/4.0/";
pub const CREDIT_LINE: &str = "Data from MET Norway, licensed under CC BY 4.0";

/// Gazetteer attribution.
pub const GAZETTEER_PROVIDER: &str = "Kartverket";
pub const GAZETTEER_CREDIT_LINE: &str =
    "Place names from the Norwegian Mapping Authority (Kartverket), CC BY 4.0";

/// Attribution and freshness metadata attached to data-tool results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceMetadata {
    pub provider: String,
    pub product: String,
    pub license_uri: String,
    pub credit_line: String,
    pub cached: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age_seconds: Option<u64>,
}

/// Build source metadata for a product from the proxy's cache info.
pub fn source_metadata(product: &str, cache: &CacheInfo) -> SourceMetadata {
    SourceMetadata {
        provider: PROVIDER.to_string(),
        product: product.to_string(),
        license_uri: LICENSE_URI.to_string(),
        credit_line: CREDIT_LINE.to_string(),
        cached: cache.cached,
        age_seconds: cache.age_seconds,
    }
}

/// Build a successful dual-shape envelope: one text summary plus the
/// structured payload.
pub fn tool_response(structured: Value, summary: impl Into<String>) -> CallToolResult {
    let summary = summary.into();
    debug_assert!(!summary.is_empty(), "summary must be non-empty");
    CallToolResult::with_structured(summary, structured)
}

/// Build an error envelope from a typed tool error.
///
/// The text summary is the error message, suffixed with a retry hint when the
/// upstream advertised one. Attribution is never attached to errors.
pub fn error_response(err: &ToolError) -> CallToolResult {
    let mut summary = err.message.clone();
    if let Some(seconds) = err.details.retry_after_seconds {
        summary.push_str(&format!(" Retry after {} seconds.", seconds));
    }
    CallToolResult {
        content: vec![crate::protocol::Content::Text { text: summary }],
        is_error: true,
        structured_content: Some(serde_json::json!({
            "error": {
                "code": err.code,
                "message": err.message,
                "retryable": err.retryable(),
                "details": err.details,
            }
        })),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upstream::cache::CacheStatus;

    #[test]
    fn metadata_carries_license_and_credit() {
        let cache = CacheInfo {
            cached: true,
            age_seconds: Some(120),
            status: Some(CacheStatus::Hit),
        };
        let meta = source_metadata("Locationforecast 2.0", &cache);
        assert!(!meta.license_uri.is_empty());
        assert!(!meta.credit_line.is_empty());
        assert!(meta.cached);
        assert_eq!(meta.age_seconds, Some(120));
    }

    #[test]
    fn metadata_is_deterministic() {
        let cache = CacheInfo::default();
        let a = source_metadata("Nowcast 2.0", &cache);
        let b = source_metadata("Nowcast 2.0", &cache);
        assert_eq!(a, b);
    }

    #[test]
    fn error_envelope_appends_retry_hint() {
        let err = crate::error::ToolError::from_status(429, "Rate limit exceeded")
            .with_retry_after(30);
        let envelope = error_response(&err);
        assert!(envelope.is_error);
        assert_eq!(
            envelope.first_text(),
            Some("Rate limit exceeded Retry after 30 seconds.")
        );
        let structured = envelope.structured_content.unwrap();
        assert_eq!(structured["error"]["code"], "RATE_LIMITED");
        assert_eq!(structured["error"]["retryable"], true);
        assert!(structured.get("source").is_none());
    }

    #[test]
    fn error_envelope_without_retry_hint() {
        let err = crate::error::ToolError::invalid_input("Latitude out of range");
        let envelope = error_response(&err);
        assert_eq!(envelope.first_text(), Some("Latitude out of range"));
        let structured = envelope.structured_content.unwrap();
        assert_eq!(structured["error"]["retryable"], false);
    }
}
