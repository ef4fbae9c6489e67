//! MCP (Model Context Protocol) client for the graph data source.
//!
//! Sessions speak JSON-RPC 2.0 over the stdio of a spawned MCP server
//! (by default `mcp-neo4j-cypher`) and expose its tools to the agent.

mod client;
mod protocol;
mod session;

pub use client::{McpConnection, McpSession};
pub use protocol::{ToolDescriptor, PROTOCOL_VERSION};
pub use session::{McpSessionManager, ScopedSession, SessionManager, ToolOutput, ToolSession};
