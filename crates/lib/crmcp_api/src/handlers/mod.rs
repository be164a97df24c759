//! Request handlers.

pub mod discovery;
pub mod mcp;
pub mod oauth;
pub mod sse;
pub mod tools;
