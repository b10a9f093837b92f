//! MCP router: routes requests to tools, resources and prompts.
//!
//! The router implements Tower's `Service` trait so the JSON-RPC framing and
//! any middleware compose over it. Registered handlers live behind an `Arc`
//! shared across clones; session state is per-clone so the HTTP transport can
//! hand each request a fresh session over the same registry.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use tower_service::Service;

use crate::error::{Error, JsonRpcError, Result};
use crate::prompt::Prompt;
use crate::protocol::*;
use crate::resource::Resource;
use crate::session::{SessionPhase, SessionState};
use crate::tool::{Tool, ToolSet};

/// MCP router dispatching requests to registered handlers.
#[derive(Clone)]
pub struct McpRouter {
    inner: Arc<McpRouterInner>,
    session: SessionState,
}

struct McpRouterInner {
    server_name: String,
    server_version: String,
    instructions: Option<String>,
    tools: ToolSet,
    resources: Vec<Resource>,
    prompts: Vec<Prompt>,
}

impl std::fmt::Debug for McpRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("McpRouter")
            .field("server_name", &self.inner.server_name)
            .field("tools_count", &self.inner.tools.list().len())
            .field("resources_count", &self.inner.resources.len())
            .field("prompts_count", &self.inner.prompts.len())
            .field("session_phase", &self.session.phase())
            .finish()
    }
}

impl Default for McpRouter {
    fn default() -> Self {
        Self::new()
    }
}

impl McpRouter {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(McpRouterInner {
                server_name: "nordvaer".to_string(),
                server_version: env!("CARGO_PKG_VERSION").to_string(),
                instructions: None,
                tools: ToolSet::new(),
                resources: Vec::new(),
                prompts: Vec::new(),
            }),
            session: SessionState::new(),
        }
    }

    pub fn server_info(mut self, name: impl Into<String>, version: impl Into<String>) -> Self {
        let inner = Arc::get_mut(&mut self.inner).expect("router not yet shared");
        inner.server_name = name.into();
        inner.server_version = version.into();
        self
    }

    pub fn instructions(mut self, instructions: impl Into<String>) -> Self {
        let inner = Arc::get_mut(&mut self.inner).expect("router not yet shared");
        inner.instructions = Some(instructions.into());
        self
    }

    /// Register the shared tool set.
    pub fn toolset(mut self, tools: ToolSet) -> Self {
        let inner = Arc::get_mut(&mut self.inner).expect("router not yet shared");
        inner.tools = tools;
        self
    }

    /// Register a single tool (test convenience).
    pub fn tool(self, tool: Tool) -> Self {
        self.inner.tools.insert(tool);
        self
    }

    pub fn resource(mut self, resource: Resource) -> Self {
        let inner = Arc::get_mut(&mut self.inner).expect("router not yet shared");
        inner.resources.push(resource);
        self
    }

    pub fn prompt(mut self, prompt: Prompt) -> Self {
        let inner = Arc::get_mut(&mut self.inner).expect("router not yet shared");
        inner.prompts.push(prompt);
        self
    }

    /// The shared tool set (used by composite tools and tests).
    pub fn tools(&self) -> &ToolSet {
        &self.inner.tools
    }

    pub fn session(&self) -> &SessionState {
        &self.session
    }

    /// A clone of this router bound to a brand-new session.
    ///
    /// The HTTP transport calls this per request. Distinct clients can reuse
    /// the same correlation ids; a shared session would let responses route
    /// to the wrong connection.
    pub fn with_fresh_session(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            session: SessionState::new(),
        }
    }

    pub fn handle_notification(&self, notification: McpNotification) {
        match notification {
            McpNotification::Initialized => {
                self.session.set_phase(SessionPhase::Initialized);
            }
            McpNotification::Unknown { method } => {
                tracing::debug!(method = %method, "Ignoring unknown notification");
            }
        }
    }

    async fn handle(&self, request: McpRequest) -> Result<McpResponse> {
        match request {
            McpRequest::Initialize(params) => self.handle_initialize(params),
            McpRequest::Ping => Ok(McpResponse::Ping),
            request => {
                if !self.session.is_ready() {
                    return Err(Error::JsonRpc(JsonRpcError::invalid_request(
                        "Session not initialized",
                    )));
                }
                match request {
                    McpRequest::ListTools => self.handle_list_tools(),
                    McpRequest::CallTool(params) => self.handle_call_tool(params).await,
                    McpRequest::ListResources => self.handle_list_resources(),
                    McpRequest::ReadResource(params) => self.handle_read_resource(params).await,
                    McpRequest::ListPrompts => self.handle_list_prompts(),
                    McpRequest::GetPrompt(params) => self.handle_get_prompt(params).await,
                    McpRequest::Unknown { method } => {
                        Err(Error::JsonRpc(JsonRpcError::method_not_found(&method)))
                    }
                    McpRequest::Initialize(_) | McpRequest::Ping => unreachable!(),
                }
            }
        }
    }

    fn handle_initialize(&self, params: InitializeParams) -> Result<McpResponse> {
        tracing::debug!(
            client = %params.client_info.name,
            version = %params.protocol_version,
            "Initializing session"
        );
        self.session.set_phase(SessionPhase::Initializing);

        let capabilities = ServerCapabilities {
            tools: Some(ToolsCapability::default()),
            resources: (!self.inner.resources.is_empty()).then(ResourcesCapability::default),
            prompts: (!self.inner.prompts.is_empty()).then(PromptsCapability::default),
        };

        Ok(McpResponse::Initialize(InitializeResult {
            protocol_version: PROTOCOL_VERSION.to_string(),
            capabilities,
            server_info: Implementation {
                name: self.inner.server_name.clone(),
                version: self.inner.server_version.clone(),
            },
            instructions: self.inner.instructions.clone(),
        }))
    }

    fn handle_list_tools(&self) -> Result<McpResponse> {
        let tools = self
            .inner
            .tools
            .list()
            .iter()
            .map(|t| t.definition())
            .collect();
        Ok(McpResponse::ListTools(ListToolsResult { tools }))
    }

    async fn handle_call_tool(&self, params: CallToolParams) -> Result<McpResponse> {
        let Some(tool) = self.inner.tools.get(&params.name) else {
            return Err(Error::JsonRpc(JsonRpcError::invalid_params(format!(
                "Unknown tool: {}",
                params.name
            ))));
        };
        let result = tool.call(params.arguments).await?;
        Ok(McpResponse::CallTool(result))
    }

    fn handle_list_resources(&self) -> Result<McpResponse> {
        let resources = self
            .inner
            .resources
            .iter()
            .map(|r| r.definition())
            .collect();
        Ok(McpResponse::ListResources(ListResourcesResult { resources }))
    }

    async fn handle_read_resource(&self, params: ReadResourceParams) -> Result<McpResponse> {
        let Some(resource) = self.inner.resources.iter().find(|r| r.uri == params.uri) else {
            return Err(Error::JsonRpc(JsonRpcError::invalid_params(format!(
                "Resource not found: {}",
                params.uri
            ))));
        };
        let result = resource.read().await?;
        Ok(McpResponse::ReadResource(result))
    }

    fn handle_list_prompts(&self) -> Result<McpResponse> {
        let prompts = self.inner.prompts.iter().map(|p| p.definition()).collect();
        Ok(McpResponse::ListPrompts(ListPromptsResult { prompts }))
    }

    async fn handle_get_prompt(&self, params: GetPromptParams) -> Result<McpResponse> {
        let Some(prompt) = self.inner.prompts.iter().find(|p| p.name == params.name) else {
            return Err(Error::JsonRpc(JsonRpcError::invalid_params(format!(
                "Prompt not found: {}",
                params.name
            ))));
        };
        for arg in prompt.arguments.iter().filter(|a| a.required) {
            if !params.arguments.contains_key(&arg.name) {
                return Err(Error::JsonRpc(JsonRpcError::invalid_params(format!(
                    "Missing required argument: {}",
                    arg.name
                ))));
            }
        }
        let result = prompt.get(params.arguments).await?;
        Ok(McpResponse::GetPrompt(result))
    }
}

/// A request routed through the service stack.
#[derive(Debug)]
pub struct RouterRequest {
    pub id: RequestId,
    pub inner: McpRequest,
}

/// The routed response, errors already mapped to JSON-RPC objects.
pub struct RouterResponse {
    pub id: RequestId,
    pub inner: std::result::Result<McpResponse, JsonRpcError>,
}

impl RouterResponse {
    pub fn into_jsonrpc(self) -> JsonRpcResponse {
        match self.inner {
            Ok(response) => match response.into_value() {
                Ok(value) => JsonRpcResponse::result(self.id, value),
                Err(e) => JsonRpcResponse::error(
                    Some(self.id),
                    JsonRpcError::internal_error(e.to_string()),
                ),
            },
            Err(error) => JsonRpcResponse::error(Some(self.id), error),
        }
    }
}

impl Service<RouterRequest> for McpRouter {
    type Response = RouterResponse;
    type Error = std::convert::Infallible; // Errors travel inside the response.
    type Future =
        Pin<Box<dyn Future<Output = std::result::Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<std::result::Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: RouterRequest) -> Self::Future {
        let router = self.clone();
        Box::pin(async move {
            let result = router.handle(req.inner).await;
            Ok(RouterResponse {
                id: req.id,
                inner: result.map_err(|e| match e {
                    Error::JsonRpc(err) => err,
                    // A tool body must not leak an error past its envelope;
                    // if one does, the client gets a generic protocol error.
                    _ => JsonRpcError::internal_error("Internal server error"),
                }),
            })
        })
    }
}
