//! # nordvaer
//!
//! An MCP tool-server for Nordic weather and Norwegian place names.
//!
//! LLM clients invoke named tools; the server validates input, fans out to
//! the MET product suite through a caching reverse-proxy (or to the Frost
//! stations API), normalises units, classifies risk and comfort, and
//! returns a dual-shape response: a short text summary plus a structured
//! payload carrying provider attribution and cache freshness.
//!
//! The crate is organised in three layers:
//!
//! - protocol plumbing (`protocol`, `jsonrpc`, `router`, `session`, `tool`)
//!   serving MCP over two transports (`transport::stdio`, `transport::http`);
//! - the instrumentation pipeline (`context`, `wrapper`, `metrics`) applied
//!   uniformly to every registered tool;
//! - the weather core (`upstream`, `coverage`, `timewindow`, `tools`,
//!   `gazetteer`) implementing the tool surface itself.

pub mod attribution;
pub mod config;
pub mod context;
pub mod coverage;
pub mod error;
pub mod gazetteer;
pub mod jsonrpc;
pub mod metrics;
pub mod prompt;
pub mod prompts;
pub mod protocol;
pub mod resource;
pub mod resources;
pub mod router;
pub mod session;
pub mod testing;
pub mod timewindow;
pub mod tool;
pub mod tools;
pub mod transport;
pub mod upstream;
pub mod wrapper;

pub use error::{Error, ErrorCode, Result, ToolError};
pub use metrics::MetricsRegistry;
pub use protocol::{CallToolResult, JsonRpcRequest, JsonRpcResponse};
pub use router::McpRouter;
pub use testing::TestClient;
pub use tool::{Tool, ToolBuilder};
pub use transport::{HttpTransport, StdioTransport};
