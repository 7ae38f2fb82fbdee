//! dirbeat Common Types and Transport
//!
//! This crate provides the Directory Service (DIR) wire model and the TCP
//! transport layer shared by all dirbeat components.
//!
//! # Overview
//!
//! dirbeat is a service-presence agent for distributed file system nodes.
//! Every node runs one agent that keeps the central Directory Service
//! informed about the node's reachable endpoints, its service record and its
//! configuration. This crate contains the pieces both sides of that
//! conversation agree on:
//!
//! - **Protocol Layer**: service records, address mappings, configuration
//!   blobs, the RPC envelope and the error type
//! - **Transport Layer**: length-prefixed JSON framing over TCP
//!
//! # Wire Format
//!
//! Messages are sent with a 4-byte length prefix (big-endian u32) followed
//! by the JSON-encoded envelope:
//!
//! ```text
//! [4-byte length] [JSON data]
//! ```
//!
//! # Components
//!
//! - [`protocol`] - DIR entities, auth envelope, request/response types, errors
//! - [`transport`] - TCP client transport and a reusable server loop

pub mod protocol;
pub mod transport;

pub use protocol::*;
