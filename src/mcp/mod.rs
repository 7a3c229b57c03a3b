//! Model Context Protocol (MCP) server implementation.
//!
//! This module exposes KiCad PCB design automation as tools, resources and
//! prompts to AI assistants. The server communicates over stdio transport
//! using JSON-RPC 2.0 messages and drives a shared [`crate::kicad`] client
//! backend, so one session's project state carries across tool calls.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                          MCP Server                          │
//! │                                                              │
//! │   ┌─────────────┐    ┌─────────────┐    ┌───────────────┐    │
//! │   │  Transport  │───▶│   Server    │───▶│ KiCad client  │    │
//! │   │   (stdio)   │    │ (lifecycle) │    │ (mock/bridge) │    │
//! │   └─────────────┘    └─────────────┘    └───────────────┘    │
//! │          │                  │                                │
//! │          ▼                  ▼                                │
//! │   ┌──────────────────────────────────────────────────┐       │
//! │   │               JSON-RPC Messages                  │       │
//! │   └──────────────────────────────────────────────────┘       │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Protocol Version
//!
//! This implementation targets MCP protocol version 2024-11-05.

pub mod protocol;
pub mod server;
pub mod transport;

pub use protocol::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, MCP_PROTOCOL_VERSION};
pub use server::McpServer;
pub use transport::StdioTransport;
