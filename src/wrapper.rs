//! The instrumentation wrapper applied to every registered tool.
//!
//! For each call it establishes the request context, emits paired
//! `tool.start`/`tool.end` logs sharing one request id, records call and
//! latency metrics, and extracts the proxy cache status from successful
//! results. Metrics are updated after the body completes, so a reader who
//! has seen the end log also sees the counter.

use std::sync::Arc;

use serde_json::Value;

use crate::context::{self, RequestCtx};
use crate::error::ErrorCode;
use crate::metrics::{MetricsRegistry, Outcome};
use crate::tool::{Tool, ToolHandler};
use crate::upstream::cache::CacheStatus;

/// Input keys safe to echo into logs. Everything else is dropped.
const LOGGED_INPUT_KEYS: &[&str] = &[
    "location",
    "timeWindow",
    "resolution",
    "language",
    "activityType",
    "vesselType",
    "query",
    "limit",
];

/// Wrap a tool with instrumentation. Applied once, at registration.
pub fn instrument(tool: Tool, metrics: MetricsRegistry) -> Tool {
    let name = tool.name.clone();
    Tool {
        name: tool.name.clone(),
        description: tool.description.clone(),
        handler: Arc::new(InstrumentedHandler {
            inner: tool.handler,
            tool_name: name,
            metrics,
        }),
    }
}

struct InstrumentedHandler {
    inner: Arc<dyn ToolHandler>,
    tool_name: String,
    metrics: MetricsRegistry,
}

impl ToolHandler for InstrumentedHandler {
    fn call(
        &self,
        args: Value,
    ) -> crate::tool::BoxFuture<'_, crate::error::Result<crate::protocol::CallToolResult>> {
        Box::pin(async move {
            let request_id = uuid::Uuid::new_v4().to_string();
            let ctx = RequestCtx::new(request_id.clone(), self.tool_name.clone());

            tracing::info!(
                request_id = %request_id,
                tool = %self.tool_name,
                input = %sanitize_input(&args),
                "tool.start"
            );

            // The guard guarantees exactly one tool.end per start, even when
            // a client disconnect drops this future mid-call.
            let mut guard = EndGuard {
                request_id,
                tool_name: self.tool_name.clone(),
                metrics: self.metrics.clone(),
                ctx: ctx.clone(),
                done: false,
            };

            let result = context::with_context(ctx, self.inner.call(args)).await;

            match &result {
                Ok(envelope) => {
                    let outcome = if envelope.is_error {
                        Outcome::Error
                    } else {
                        Outcome::Success
                    };
                    let error_code = if envelope.is_error {
                        extract_error_code(envelope)
                    } else {
                        None
                    };
                    guard.complete(outcome, error_code, None);

                    if !envelope.is_error {
                        if let Some(cached) = envelope
                            .structured_content
                            .as_ref()
                            .and_then(|s| s.get("source"))
                            .and_then(|s| s.get("cached"))
                            .and_then(Value::as_bool)
                        {
                            let status = if cached {
                                CacheStatus::Hit
                            } else {
                                CacheStatus::Miss
                            };
                            self.metrics.record_cache_status(status);
                        }
                    }
                }
                Err(e) => {
                    // Tool bodies return envelopes; an escaped error is a bug.
                    guard.complete(
                        Outcome::Error,
                        Some(ErrorCode::InternalError),
                        Some(e.to_string()),
                    );
                }
            }

            result
        })
    }

    fn input_schema(&self) -> Value {
        self.inner.input_schema()
    }
}

struct EndGuard {
    request_id: String,
    tool_name: String,
    metrics: MetricsRegistry,
    ctx: RequestCtx,
    done: bool,
}

impl EndGuard {
    fn complete(&mut self, outcome: Outcome, error_code: Option<ErrorCode>, detail: Option<String>) {
        self.done = true;
        let latency_ms = self.ctx.elapsed_ms();
        match (error_code, detail) {
            (Some(code), Some(detail)) => tracing::error!(
                request_id = %self.request_id,
                tool = %self.tool_name,
                latency_ms,
                outcome = outcome.as_str(),
                error_code = code.as_str(),
                error = %detail,
                "tool.end"
            ),
            (Some(code), None) => tracing::info!(
                request_id = %self.request_id,
                tool = %self.tool_name,
                latency_ms,
                outcome = outcome.as_str(),
                error_code = code.as_str(),
                "tool.end"
            ),
            _ => tracing::info!(
                request_id = %self.request_id,
                tool = %self.tool_name,
                latency_ms,
                outcome = outcome.as_str(),
                "tool.end"
            ),
        }
        self.metrics.record_tool_call(&self.tool_name, outcome);
        self.metrics.record_latency(&self.tool_name, latency_ms);
    }
}

impl Drop for EndGuard {
    fn drop(&mut self) {
        if self.done {
            return;
        }
        // The call was cancelled: the transport dropped the future before
        // the body finished (client disconnect). In-flight upstream work is
        // released by the drop; the outcome is still recorded.
        let latency_ms = self.ctx.elapsed_ms();
        tracing::info!(
            request_id = %self.request_id,
            tool = %self.tool_name,
            latency_ms,
            outcome = Outcome::Error.as_str(),
            error_code = ErrorCode::UpstreamUnavailable.as_str(),
            cancelled = true,
            "tool.end"
        );
        self.metrics.record_tool_call(&self.tool_name, Outcome::Error);
        self.metrics.record_latency(&self.tool_name, latency_ms);
    }
}

/// Keep only whitelisted keys of the input object for logging.
fn sanitize_input(args: &Value) -> String {
    let Some(object) = args.as_object() else {
        return "{}".to_string();
    };
    let filtered: serde_json::Map<String, Value> = object
        .iter()
        .filter(|(key, _)| LOGGED_INPUT_KEYS.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();
    Value::Object(filtered).to_string()
}

/// Pull the error code out of an error envelope.
///
/// Prefers the structured record; falls back to matching the code name at
/// the start of the summary text.
fn extract_error_code(envelope: &crate::protocol::CallToolResult) -> Option<ErrorCode> {
    if let Some(code) = envelope
        .structured_content
        .as_ref()
        .and_then(|s| s.get("error"))
        .and_then(|e| e.get("code"))
    {
        return serde_json::from_value(code.clone()).ok();
    }

    let text = envelope.first_text()?;
    [
        ErrorCode::InvalidInput,
        ErrorCode::OutOfCoverage,
        ErrorCode::RateLimited,
        ErrorCode::UpstreamUnavailable,
        ErrorCode::InternalError,
    ]
    .into_iter()
    .find(|code| text.starts_with(code.as_str()))
}
