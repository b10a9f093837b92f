//! JSON-RPC 2.0 framing over the MCP router.
//!
//! Handles version validation, request decoding, batch processing
//! (concurrent) and error conversion. Both transports drive their session's
//! router through this service.

use tower_service::Service;

use crate::error::{Error, JsonRpcError, Result};
use crate::protocol::{
    JsonRpcMessage, JsonRpcRequest, JsonRpcResponse, JsonRpcResponseMessage, McpRequest,
};
use crate::router::{RouterRequest, RouterResponse};

/// Service that frames JSON-RPC around an MCP-routing inner service.
pub struct JsonRpcService<S> {
    inner: S,
}

impl<S> JsonRpcService<S>
where
    S: Service<RouterRequest, Response = RouterResponse, Error = std::convert::Infallible>
        + Clone
        + Send
        + 'static,
    S::Future: Send,
{
    pub fn new(inner: S) -> Self {
        Self { inner }
    }

    /// Process a single JSON-RPC request.
    pub async fn call_single(&mut self, req: JsonRpcRequest) -> Result<JsonRpcResponse> {
        process_single(self.inner.clone(), req).await
    }

    /// Process a batch concurrently. Per-request failures become error
    /// responses rather than dropping the batch.
    pub async fn call_batch(&mut self, requests: Vec<JsonRpcRequest>) -> Result<Vec<JsonRpcResponse>> {
        if requests.is_empty() {
            return Err(Error::JsonRpc(JsonRpcError::invalid_request(
                "Empty batch request",
            )));
        }

        let futures: Vec<_> = requests
            .into_iter()
            .map(|req| {
                let inner = self.inner.clone();
                let req_id = req.id.clone();
                async move {
                    match process_single(inner, req).await {
                        Ok(resp) => resp,
                        Err(e) => JsonRpcResponse::error(
                            Some(req_id),
                            JsonRpcError::internal_error(e.to_string()),
                        ),
                    }
                }
            })
            .collect();

        Ok(futures::future::join_all(futures).await)
    }

    /// Process a message, single or batch.
    pub async fn call_message(&mut self, msg: JsonRpcMessage) -> Result<JsonRpcResponseMessage> {
        match msg {
            JsonRpcMessage::Single(req) => {
                Ok(JsonRpcResponseMessage::Single(self.call_single(req).await?))
            }
            JsonRpcMessage::Batch(requests) => {
                if requests.is_empty() {
                    return Ok(JsonRpcResponseMessage::Single(JsonRpcResponse::error(
                        None,
                        JsonRpcError::invalid_request("Empty batch request"),
                    )));
                }
                Ok(JsonRpcResponseMessage::Batch(self.call_batch(requests).await?))
            }
        }
    }
}

impl<S: Clone> Clone for JsonRpcService<S> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

async fn process_single<S>(mut inner: S, req: JsonRpcRequest) -> Result<JsonRpcResponse>
where
    S: Service<RouterRequest, Response = RouterResponse, Error = std::convert::Infallible>
        + Send
        + 'static,
    S::Future: Send,
{
    if let Err(e) = req.validate() {
        return Ok(JsonRpcResponse::error(Some(req.id), e));
    }

    let mcp_request = match McpRequest::from_jsonrpc(&req) {
        Ok(r) => r,
        Err(e) => {
            return Ok(JsonRpcResponse::error(
                Some(req.id),
                JsonRpcError::invalid_params(e.to_string()),
            ));
        }
    };

    let response = inner
        .call(RouterRequest {
            id: req.id,
            inner: mcp_request,
        })
        .await
        .unwrap(); // Infallible

    Ok(response.into_jsonrpc())
}
