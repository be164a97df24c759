//! # crmcp_mcp
//!
//! MCP (Model Context Protocol) layer for crmcp.
//!
//! Parses JSON-RPC envelopes, separates public from authenticated methods,
//! resolves the caller through an [`crmcp_core::auth::IdentityResolver`] and
//! routes `tools/call` through the static tool catalog and hook pipeline into
//! the CRM service. HTTP transports live in `crmcp_api`.

pub mod dispatcher;
pub mod hooks;
pub mod jsonrpc;
pub mod tools;

pub use dispatcher::{Dispatch, Dispatcher, PROTOCOL_VERSION};
pub use tools::ToolInvoker;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
