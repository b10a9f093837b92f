//! Per-call request context.
//!
//! Every tool invocation runs inside a task-local [`RequestCtx`] binding
//! established by the wrapper (see [`crate::wrapper`]). Any code on the
//! call's logical task, including composite sub-calls and spawned work that
//! inherits the scope, can read the current request id without threading it
//! through function signatures. The binding is dropped when the tool result
//! is returned; it never leaks across unrelated calls.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

tokio::task_local! {
    static REQUEST_CTX: RequestCtx;
}

/// Immutable per-call context. Created once by the tool wrapper.
#[derive(Clone)]
pub struct RequestCtx {
    request_id: Arc<str>,
    tool_name: Arc<str>,
    started: Instant,
}

impl std::fmt::Debug for RequestCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestCtx")
            .field("request_id", &self.request_id)
            .field("tool_name", &self.tool_name)
            .finish()
    }
}

impl RequestCtx {
    pub fn new(request_id: impl Into<String>, tool_name: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into().into(),
            tool_name: tool_name.into().into(),
            started: Instant::now(),
        }
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn tool_name(&self) -> &str {
        &self.tool_name
    }

    /// Milliseconds elapsed since the context was created.
    pub fn elapsed_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }
}

/// Run `fut` with `ctx` as the task-local request context.
pub async fn with_context<F>(ctx: RequestCtx, fut: F) -> F::Output
where
    F: Future,
{
    REQUEST_CTX.scope(ctx, fut).await
}

/// The request id of the current tool call, if one is in scope.
pub fn current_request_id() -> Option<String> {
    REQUEST_CTX
        .try_with(|ctx| ctx.request_id().to_string())
        .ok()
}

/// The tool name of the current call, if one is in scope.
pub fn current_tool_name() -> Option<String> {
    REQUEST_CTX.try_with(|ctx| ctx.tool_name().to_string()).ok()
}

/// A clone of the current context, if one is in scope.
pub fn current() -> Option<RequestCtx> {
    REQUEST_CTX.try_with(|ctx| ctx.clone()).ok()
}
