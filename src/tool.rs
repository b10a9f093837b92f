//! Tool definition and builder API.
//!
//! Tools are built with a fluent builder: a name, a description, and a typed
//! async handler whose input type derives [`JsonSchema`] so `tools/list` can
//! surface a schema. Handlers that need shared state (upstream clients,
//! metrics, the gazetteer) take it as a leading argument via
//! [`ToolBuilder::handler_with_state`].

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{Error, Result, ToolError};
use crate::protocol::{CallToolResult, ToolDefinition};

/// A boxed future for tool handlers.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// The core abstraction for tool execution.
pub trait ToolHandler: Send + Sync {
    /// Execute the tool with the given arguments.
    fn call(&self, args: Value) -> BoxFuture<'_, Result<CallToolResult>>;

    /// The tool's input schema.
    fn input_schema(&self) -> Value;
}

/// A complete tool definition with handler.
pub struct Tool {
    pub name: String,
    pub description: Option<String>,
    pub(crate) handler: Arc<dyn ToolHandler>,
}

impl Tool {
    pub fn builder(name: impl Into<String>) -> ToolBuilder {
        ToolBuilder::new(name)
    }

    /// The tool definition for `tools/list`.
    pub fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name.clone(),
            description: self.description.clone(),
            input_schema: self.handler.input_schema(),
        }
    }

    /// Call the tool.
    pub fn call(&self, args: Value) -> BoxFuture<'_, Result<CallToolResult>> {
        self.handler.call(args)
    }
}

/// Builder for creating tools with a fluent API.
pub struct ToolBuilder {
    name: String,
    description: Option<String>,
}

impl ToolBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Specify a typed handler.
    ///
    /// Invalid input surfaces as an `INVALID_INPUT` tool error envelope, not
    /// a protocol error, so clients always get the dual-shape response.
    pub fn handler<I, F, Fut>(self, handler: F) -> Tool
    where
        I: JsonSchema + DeserializeOwned + Send + Sync + 'static,
        F: Fn(I) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<CallToolResult>> + Send + 'static,
    {
        Tool {
            name: self.name,
            description: self.description,
            handler: Arc::new(TypedHandler {
                handler,
                _phantom: std::marker::PhantomData::<fn() -> I>,
            }),
        }
    }

    /// Specify a typed handler that receives shared state.
    pub fn handler_with_state<S, I, F, Fut>(self, state: Arc<S>, handler: F) -> Tool
    where
        S: Send + Sync + 'static,
        I: JsonSchema + DeserializeOwned + Send + Sync + 'static,
        F: Fn(Arc<S>, I) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<CallToolResult>> + Send + 'static,
    {
        self.handler(move |input: I| handler(state.clone(), input))
    }
}

/// Handler that deserializes input to a specific type.
struct TypedHandler<I, F> {
    handler: F,
    _phantom: std::marker::PhantomData<fn() -> I>,
}

impl<I, F, Fut> ToolHandler for TypedHandler<I, F>
where
    I: JsonSchema + DeserializeOwned + Send + Sync + 'static,
    F: Fn(I) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<CallToolResult>> + Send + 'static,
{
    fn call(&self, args: Value) -> BoxFuture<'_, Result<CallToolResult>> {
        Box::pin(async move {
            let input: I = match serde_json::from_value(args) {
                Ok(input) => input,
                Err(e) => {
                    let err = ToolError::invalid_input(format!("Invalid input: {}", e));
                    return Ok(crate::attribution::error_response(&err));
                }
            };
            (self.handler)(input).await
        })
    }

    fn input_schema(&self) -> Value {
        let schema = schemars::schema_for!(I);
        serde_json::to_value(schema).unwrap_or_else(|_| {
            serde_json::json!({
                "type": "object"
            })
        })
    }
}

/// A name-indexed, shared set of instrumented tools.
///
/// Composite tools call their sub-tools through this handle so the
/// instrumentation wrapper applies to the inner call as well; there is no
/// bare entry point that bypasses it.
#[derive(Clone, Default)]
pub struct ToolSet {
    tools: Arc<std::sync::RwLock<std::collections::HashMap<String, Arc<Tool>>>>,
}

impl ToolSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, tool: Tool) {
        let mut tools = self.tools.write().unwrap();
        tools.insert(tool.name.clone(), Arc::new(tool));
    }

    pub fn get(&self, name: &str) -> Option<Arc<Tool>> {
        let tools = self.tools.read().unwrap();
        tools.get(name).cloned()
    }

    /// All tools, sorted by name for a stable `tools/list`.
    pub fn list(&self) -> Vec<Arc<Tool>> {
        let tools = self.tools.read().unwrap();
        let mut all: Vec<_> = tools.values().cloned().collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        all
    }

    /// Invoke a registered tool by name.
    pub async fn call(&self, name: &str, args: Value) -> Result<CallToolResult> {
        let tool = self
            .get(name)
            .ok_or_else(|| Error::Internal(format!("Unknown tool: {}", name)))?;
        tool.call(args).await
    }
}
