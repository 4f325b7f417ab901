//! # mcpipe - Model Context Protocol over stdio
//!
//! A minimal client core for MCP servers that run as child processes.
//!
//! This crate re-exports the constituent crates:
//! - `mcpipe-core`: framing, JSON-RPC codec, request correlation, sessions
//! - `mcpipe-client`: the high-level client and its builder

pub use mcpipe_client as client;
pub use mcpipe_core as core;

/// Re-export commonly used items
pub mod prelude {
    pub use crate::client::prelude::*;
}
