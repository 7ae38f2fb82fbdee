use std::net::SocketAddr;
use std::time::Duration;

use dirbeat_common::protocol::{
    KeyValuePair, SCHEME_PBRPC, SCHEME_PBRPCG, SCHEME_PBRPCS,
};

/// Cadence of the service record refresh.
pub const UPDATE_INTERVAL: Duration = Duration::from_secs(60);

/// Node-side configuration consumed by the agent.
///
/// `hostname` and `bind_address` override endpoint discovery: when either is
/// set, the agent advertises exactly that host instead of enumerating the
/// node's interfaces. An empty `hostname` means unset.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Port the local service listens on
    pub port: u16,
    /// Advertised hostname override; empty when unset
    pub hostname: String,
    /// Listen address override
    pub bind_address: Option<SocketAddr>,
    /// Whether the service speaks TLS
    pub use_ssl: bool,
    /// TLS in GRID mode (SSL handshake only, plain data channel)
    pub grid_ssl: bool,
    /// Refresh cadence; [`UPDATE_INTERVAL`] unless a test compresses time
    pub refresh_interval: Duration,
    /// Additional parameters uploaded with the configuration
    pub extra_parameters: Vec<(String, String)>,
}

impl AgentConfig {
    pub fn new(port: u16) -> Self {
        Self {
            port,
            hostname: String::new(),
            bind_address: None,
            use_ssl: false,
            grid_ssl: false,
            refresh_interval: UPDATE_INTERVAL,
            extra_parameters: Vec::new(),
        }
    }

    pub fn with_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = hostname.into();
        self
    }

    pub fn with_ssl(mut self, use_ssl: bool, grid_ssl: bool) -> Self {
        self.use_ssl = use_ssl;
        self.grid_ssl = grid_ssl;
        self
    }

    /// Whether endpoint discovery is overridden by an explicit host.
    pub fn has_address_override(&self) -> bool {
        !self.hostname.is_empty() || self.bind_address.is_some()
    }

    /// The scheme tag advertised for the primary endpoints.
    pub fn scheme(&self) -> &'static str {
        if !self.use_ssl {
            SCHEME_PBRPC
        } else if self.grid_ssl {
            SCHEME_PBRPCG
        } else {
            SCHEME_PBRPCS
        }
    }

    /// Flattens the configuration into the parameter list uploaded to DIR.
    pub fn to_parameters(&self) -> Vec<KeyValuePair> {
        let mut parameters = vec![
            KeyValuePair::new("listen.port", self.port.to_string()),
            KeyValuePair::new("ssl.enabled", self.use_ssl.to_string()),
            KeyValuePair::new("ssl.grid_ssl", self.grid_ssl.to_string()),
        ];
        if !self.hostname.is_empty() {
            parameters.push(KeyValuePair::new("hostname", self.hostname.clone()));
        }
        if let Some(addr) = self.bind_address {
            parameters.push(KeyValuePair::new("listen.address", addr.ip().to_string()));
        }
        for (key, value) in &self.extra_parameters {
            parameters.push(KeyValuePair::new(key.clone(), value.clone()));
        }
        parameters
    }
}
