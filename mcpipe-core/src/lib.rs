//! # mcpipe Core
//!
//! Core types and protocol machinery for talking to Model Context Protocol
//! (MCP) servers over a child process's standard I/O.
//!
//! This crate provides the building blocks the client is made of:
//! newline-delimited framing ([`transport`]), JSON-RPC 2.0 encoding and
//! validation ([`protocol::codec`]), request/response correlation
//! ([`protocol::correlator`]) and the connection lifecycle
//! ([`protocol::session`]).
//!
//! ## API Stability
//!
//! **Current Status: EXPERIMENTAL (v0.x.x)**
//!
//! During the 0.x.x series minor version bumps may include breaking changes;
//! patch version bumps are backward compatible.

#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod protocol;
pub mod transport;
pub mod types;

pub use config::ClientConfig;
pub use error::{Error, RemoteError, Result, TransportError};
pub use protocol::*;
pub use transport::{ServerParameters, StdioTransport, Transport};
pub use types::*;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::ClientConfig;
    pub use crate::error::{Error, RemoteError, Result, TransportError};
    pub use crate::protocol::*;
    pub use crate::transport::{ServerParameters, StdioTransport, Transport};
    pub use crate::types::*;
}
