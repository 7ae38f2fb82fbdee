//! DIR RPC Envelope
//!
//! Request and response framing for DIR calls, plus unique request ID
//! generation.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

use super::auth::{Auth, UserCredentials};

/// Unique identifier for a DIR request.
///
/// Combines a timestamp with a counter so IDs stay unique across restarts
/// and within the same runtime.
pub type RequestId = u64;

/// Global counter for ensuring unique request IDs
static REQUEST_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// A single DIR call.
///
/// Carries the operation name, JSON-encoded operation input, the
/// authentication token and the identity the call runs under. The agent
/// always sends `AUTH_NONE` with the synthetic heartbeat identity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DirRequest {
    pub id: RequestId,
    pub method: String,
    pub auth: Auth,
    pub creds: UserCredentials,
    pub params: serde_json::Value,
}

impl DirRequest {
    pub fn new(
        method: impl Into<String>,
        params: serde_json::Value,
        creds: UserCredentials,
    ) -> Self {
        Self {
            id: generate_request_id(),
            method: method.into(),
            auth: Auth::none(),
            creds,
            params,
        }
    }
}

/// The DIR side of a call: a result or an error message, never both.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DirResponse {
    pub id: RequestId,
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
    pub success: bool,
}

impl DirResponse {
    pub fn success(id: RequestId, result: serde_json::Value) -> Self {
        Self {
            id,
            result: Some(result),
            error: None,
            success: true,
        }
    }

    pub fn error(id: RequestId, error: impl Into<String>) -> Self {
        Self {
            id,
            result: None,
            error: Some(error.into()),
            success: false,
        }
    }
}

/// Generates a unique request ID.
///
/// Upper 32 bits: seconds since the UNIX epoch (valid until 2106).
/// Lower 32 bits: an atomic counter. Relaxed ordering is sufficient since
/// only uniqueness matters, not synchronization.
fn generate_request_id() -> RequestId {
    let timestamp = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);

    let counter = REQUEST_ID_COUNTER.fetch_add(1, Ordering::Relaxed);

    (timestamp << 32) | (counter & 0xFFFFFFFF)
}
