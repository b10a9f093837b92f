//! Test utilities: a client that drives the router without manual JSON-RPC.

use std::collections::HashMap;

use serde_json::{Value, json};

use crate::jsonrpc::JsonRpcService;
use crate::protocol::{
    CallToolResult, GetPromptResult, JsonRpcRequest, JsonRpcResponse, McpNotification,
    ReadResourceResult,
};
use crate::router::McpRouter;

/// An in-process MCP client for tests.
///
/// ```rust,ignore
/// let mut client = TestClient::from_router(router);
/// client.initialize().await;
/// let result = client.call_tool("weather.get_forecast", json!({...})).await;
/// assert!(!result.is_error);
/// ```
pub struct TestClient {
    service: JsonRpcService<McpRouter>,
    router: McpRouter,
    next_id: i64,
}

impl TestClient {
    pub fn from_router(router: McpRouter) -> Self {
        Self {
            service: JsonRpcService::new(router.clone()),
            router,
            next_id: 1,
        }
    }

    fn next_id(&mut self) -> i64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    async fn request(&mut self, method: &str, params: Value) -> Value {
        let id = self.next_id();
        let request = JsonRpcRequest::new(id, method).with_params(params);
        match self.service.call_single(request).await.unwrap() {
            JsonRpcResponse::Result(r) => r.result,
            JsonRpcResponse::Error(e) => panic!("{} failed: {:?}", method, e.error),
        }
    }

    /// Run the initialize handshake and mark the session ready.
    pub async fn initialize(&mut self) -> Value {
        let result = self
            .request(
                "initialize",
                json!({
                    "protocolVersion": crate::protocol::PROTOCOL_VERSION,
                    "capabilities": {},
                    "clientInfo": {"name": "test-client", "version": "0.0.0"}
                }),
            )
            .await;
        self.router
            .handle_notification(McpNotification::Initialized);
        result
    }

    pub async fn list_tools(&mut self) -> Vec<Value> {
        self.request("tools/list", Value::Null).await["tools"]
            .as_array()
            .cloned()
            .unwrap_or_default()
    }

    pub async fn call_tool(&mut self, name: &str, arguments: Value) -> CallToolResult {
        let result = self
            .request("tools/call", json!({"name": name, "arguments": arguments}))
            .await;
        serde_json::from_value(result).expect("tool result shape")
    }

    pub async fn list_resources(&mut self) -> Vec<Value> {
        self.request("resources/list", Value::Null).await["resources"]
            .as_array()
            .cloned()
            .unwrap_or_default()
    }

    pub async fn read_resource(&mut self, uri: &str) -> ReadResourceResult {
        let result = self.request("resources/read", json!({"uri": uri})).await;
        serde_json::from_value(result).expect("resource result shape")
    }

    pub async fn list_prompts(&mut self) -> Vec<Value> {
        self.request("prompts/list", Value::Null).await["prompts"]
            .as_array()
            .cloned()
            .unwrap_or_default()
    }

    pub async fn get_prompt(&mut self, name: &str, arguments: HashMap<String, String>) -> GetPromptResult {
        let result = self
            .request("prompts/get", json!({"name": name, "arguments": arguments}))
            .await;
        serde_json::from_value(result).expect("prompt result shape")
    }
}
