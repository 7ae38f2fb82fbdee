//! Authentication Envelope
//!
//! Every DIR call carries an authentication token and a set of user
//! credentials. The presence agent authenticates anonymously: the token is
//! always `AUTH_NONE` and the credentials are a fixed synthetic identity
//! that DIR uses for auditing, not for access control.

use serde::{Deserialize, Serialize};

/// Username of the synthetic heartbeat identity.
pub const HEARTBEAT_USER: &str = "hb-thread";

/// Group of the synthetic heartbeat identity.
pub const SERVICES_GROUP: &str = "xtreemfs-services";

/// Kind of authentication attached to a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthType {
    #[serde(rename = "AUTH_NONE")]
    None,
    #[serde(rename = "AUTH_PASSWORD")]
    Password,
}

/// Authentication token. The agent only ever sends the anonymous form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Auth {
    pub auth_type: AuthType,
}

impl Auth {
    pub fn none() -> Self {
        Self {
            auth_type: AuthType::None,
        }
    }
}

/// Identity a request is issued under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserCredentials {
    pub username: String,
    pub groups: Vec<String>,
}

impl UserCredentials {
    pub fn new(username: impl Into<String>, groups: Vec<String>) -> Self {
        Self {
            username: username.into(),
            groups,
        }
    }

    /// The fixed identity all presence-agent calls run under.
    pub fn heartbeat() -> Self {
        Self {
            username: HEARTBEAT_USER.to_owned(),
            groups: vec![SERVICES_GROUP.to_owned()],
        }
    }
}
