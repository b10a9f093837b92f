//! JSON-RPC 2.0 framing and the MCP message subset this server speaks.
//!
//! Only the server-side surface is modelled: `initialize`, `ping`,
//! `tools/list`, `tools/call`, `resources/list`, `resources/read`,
//! `prompts/list` and `prompts/get`. Anything else arrives as
//! [`McpRequest::Unknown`] and is answered with a method-not-found error.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, JsonRpcError, Result};

/// MCP protocol version this server implements.
pub const PROTOCOL_VERSION: &str = "2025-03-26";

// =============================================================================
// JSON-RPC envelope types
// =============================================================================

/// A JSON-RPC request id. Clients may use numbers or strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    Number(i64),
    String(String),
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RequestId::Number(n) => write!(f, "{}", n),
            RequestId::String(s) => write!(f, "{}", s),
        }
    }
}

/// A single JSON-RPC 2.0 request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub id: RequestId,
    pub method: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub params: Value,
}

impl JsonRpcRequest {
    pub fn new(id: impl Into<RequestId>, method: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id: id.into(),
            method: method.into(),
            params: Value::Null,
        }
    }

    pub fn with_params(mut self, params: Value) -> Self {
        self.params = params;
        self
    }

    /// Validate the JSON-RPC version marker.
    pub fn validate(&self) -> std::result::Result<(), JsonRpcError> {
        if self.jsonrpc != "2.0" {
            return Err(JsonRpcError::invalid_request(format!(
                "Unsupported JSON-RPC version: {}",
                self.jsonrpc
            )));
        }
        Ok(())
    }
}

impl From<i64> for RequestId {
    fn from(n: i64) -> Self {
        RequestId::Number(n)
    }
}

impl From<&str> for RequestId {
    fn from(s: &str) -> Self {
        RequestId::String(s.to_string())
    }
}

/// A JSON-RPC notification (request without an id; never answered).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcNotification {
    pub jsonrpc: String,
    pub method: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub params: Value,
}

/// A successful JSON-RPC response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResultResponse {
    pub jsonrpc: String,
    pub id: RequestId,
    pub result: Value,
}

/// An error JSON-RPC response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcErrorResponse {
    pub jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<RequestId>,
    pub error: JsonRpcError,
}

/// Either response shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JsonRpcResponse {
    Result(JsonRpcResultResponse),
    Error(JsonRpcErrorResponse),
}

impl JsonRpcResponse {
    pub fn result(id: RequestId, result: Value) -> Self {
        JsonRpcResponse::Result(JsonRpcResultResponse {
            jsonrpc: "2.0".to_string(),
            id,
            result,
        })
    }

    pub fn error(id: Option<RequestId>, error: JsonRpcError) -> Self {
        JsonRpcResponse::Error(JsonRpcErrorResponse {
            jsonrpc: "2.0".to_string(),
            id,
            error,
        })
    }
}

/// An incoming message: one request or a batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JsonRpcMessage {
    Single(JsonRpcRequest),
    Batch(Vec<JsonRpcRequest>),
}

/// The matching outgoing shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JsonRpcResponseMessage {
    Single(JsonRpcResponse),
    Batch(Vec<JsonRpcResponse>),
}

// =============================================================================
// MCP requests
// =============================================================================

/// The decoded MCP request set.
#[derive(Debug, Clone)]
pub enum McpRequest {
    Initialize(InitializeParams),
    Ping,
    ListTools,
    CallTool(CallToolParams),
    ListResources,
    ReadResource(ReadResourceParams),
    ListPrompts,
    GetPrompt(GetPromptParams),
    Unknown { method: String },
}

impl McpRequest {
    /// Decode from a JSON-RPC request.
    pub fn from_jsonrpc(req: &JsonRpcRequest) -> Result<Self> {
        Ok(match req.method.as_str() {
            "initialize" => McpRequest::Initialize(
                serde_json::from_value(req.params.clone()).map_err(Error::Serialization)?,
            ),
            "ping" => McpRequest::Ping,
            "tools/list" => McpRequest::ListTools,
            "tools/call" => McpRequest::CallTool(
                serde_json::from_value(req.params.clone()).map_err(Error::Serialization)?,
            ),
            "resources/list" => McpRequest::ListResources,
            "resources/read" => McpRequest::ReadResource(
                serde_json::from_value(req.params.clone()).map_err(Error::Serialization)?,
            ),
            "prompts/list" => McpRequest::ListPrompts,
            "prompts/get" => McpRequest::GetPrompt(
                serde_json::from_value(req.params.clone()).map_err(Error::Serialization)?,
            ),
            other => McpRequest::Unknown {
                method: other.to_string(),
            },
        })
    }

    /// The wire method name, for logging.
    pub fn method_name(&self) -> &str {
        match self {
            McpRequest::Initialize(_) => "initialize",
            McpRequest::Ping => "ping",
            McpRequest::ListTools => "tools/list",
            McpRequest::CallTool(_) => "tools/call",
            McpRequest::ListResources => "resources/list",
            McpRequest::ReadResource(_) => "resources/read",
            McpRequest::ListPrompts => "prompts/list",
            McpRequest::GetPrompt(_) => "prompts/get",
            McpRequest::Unknown { method } => method,
        }
    }
}

/// Notifications the server reacts to.
#[derive(Debug, Clone)]
pub enum McpNotification {
    Initialized,
    Unknown { method: String },
}

impl McpNotification {
    pub fn from_jsonrpc(n: &JsonRpcNotification) -> Result<Self> {
        Ok(match n.method.as_str() {
            "notifications/initialized" => McpNotification::Initialized,
            other => McpNotification::Unknown {
                method: other.to_string(),
            },
        })
    }
}

/// Responses paired with [`McpRequest`].
#[derive(Debug, Clone)]
pub enum McpResponse {
    Initialize(InitializeResult),
    Ping,
    ListTools(ListToolsResult),
    CallTool(CallToolResult),
    ListResources(ListResourcesResult),
    ReadResource(ReadResourceResult),
    ListPrompts(ListPromptsResult),
    GetPrompt(GetPromptResult),
}

impl McpResponse {
    /// Serialize the response payload for the JSON-RPC `result` field.
    pub fn into_value(self) -> Result<Value> {
        let value = match self {
            McpResponse::Initialize(r) => serde_json::to_value(r)?,
            McpResponse::Ping => serde_json::json!({}),
            McpResponse::ListTools(r) => serde_json::to_value(r)?,
            McpResponse::CallTool(r) => serde_json::to_value(r)?,
            McpResponse::ListResources(r) => serde_json::to_value(r)?,
            McpResponse::ReadResource(r) => serde_json::to_value(r)?,
            McpResponse::ListPrompts(r) => serde_json::to_value(r)?,
            McpResponse::GetPrompt(r) => serde_json::to_value(r)?,
        };
        Ok(value)
    }
}

// =============================================================================
// Lifecycle
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeParams {
    pub protocol_version: String,
    #[serde(default)]
    pub capabilities: Value,
    pub client_info: Implementation,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeResult {
    pub protocol_version: String,
    pub capabilities: ServerCapabilities,
    pub server_info: Implementation,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
}

/// Server or client identification.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Implementation {
    pub name: String,
    pub version: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerCapabilities {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<ToolsCapability>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourcesCapability>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompts: Option<PromptsCapability>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolsCapability {}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResourcesCapability {}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PromptsCapability {}

// =============================================================================
// Tools
// =============================================================================

/// Tool metadata surfaced by `tools/list`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDefinition {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub input_schema: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListToolsResult {
    pub tools: Vec<ToolDefinition>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallToolParams {
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
}

/// The dual-shape tool envelope: a human summary plus machine-readable data.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallToolResult {
    pub content: Vec<Content>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_error: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structured_content: Option<Value>,
}

impl CallToolResult {
    /// A plain text result.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![Content::Text { text: text.into() }],
            is_error: false,
            structured_content: None,
        }
    }

    /// A text result with an attached structured payload.
    pub fn with_structured(text: impl Into<String>, structured: Value) -> Self {
        Self {
            content: vec![Content::Text { text: text.into() }],
            is_error: false,
            structured_content: Some(structured),
        }
    }

    /// A generic error result.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            content: vec![Content::Text {
                text: message.into(),
            }],
            is_error: true,
            structured_content: None,
        }
    }

    /// The first text block, if any.
    pub fn first_text(&self) -> Option<&str> {
        self.content.iter().find_map(|c| match c {
            Content::Text { text } => Some(text.as_str()),
        })
    }
}

/// A content block inside a tool result.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Content {
    Text { text: String },
}

// =============================================================================
// Resources
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceDefinition {
    pub uri: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListResourcesResult {
    pub resources: Vec<ResourceDefinition>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadResourceParams {
    pub uri: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadResourceResult {
    pub contents: Vec<ResourceContents>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceContents {
    pub uri: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    pub text: String,
}

impl ReadResourceResult {
    pub fn text(uri: impl Into<String>, mime_type: Option<&str>, text: impl Into<String>) -> Self {
        Self {
            contents: vec![ResourceContents {
                uri: uri.into(),
                mime_type: mime_type.map(|s| s.to_string()),
                text: text.into(),
            }],
        }
    }
}

// =============================================================================
// Prompts
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListPromptsResult {
    pub prompts: Vec<PromptDefinition>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptDefinition {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub arguments: Vec<PromptArgument>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptArgument {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub required: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetPromptParams {
    pub name: String,
    #[serde(default)]
    pub arguments: std::collections::HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetPromptResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub messages: Vec<PromptMessage>,
}

impl GetPromptResult {
    /// A single user-role text message.
    pub fn user_message(text: impl Into<String>) -> Self {
        Self {
            description: None,
            messages: vec![PromptMessage {
                role: "user".to_string(),
                content: Content::Text { text: text.into() },
            }],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptMessage {
    pub role: String,
    pub content: Content,
}
