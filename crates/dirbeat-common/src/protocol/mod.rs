//! DIR Protocol Definitions
//!
//! This module defines everything that travels between a node and the
//! Directory Service: the DIR entity model (services, address mappings,
//! configuration), the authentication envelope, the RPC request/response
//! types and the error type used throughout the system.
//!
//! # Versioning
//!
//! Every DIR entity carries an optimistic-concurrency `version` token. The
//! token is issued by DIR on read and must be echoed back on write; a
//! mismatched write is rejected. Callers never manufacture or increment a
//! version locally.
//!
//! # Example
//!
//! ```
//! use dirbeat_common::protocol::{DirRequest, DirResponse, UserCredentials};
//! use serde_json::json;
//!
//! let creds = UserCredentials::heartbeat();
//! let request = DirRequest::new("service_get_by_uuid", json!({"uuid": "u1"}), creds);
//! let response = DirResponse::success(request.id, json!({"services": []}));
//! assert!(response.success);
//! ```

pub mod auth;
pub mod envelope;
pub mod error;
pub mod types;

pub use auth::{Auth, AuthType, UserCredentials};
pub use envelope::{DirRequest, DirResponse, RequestId};
pub use error::{DirError, Result};
pub use types::*;
