//! DIR Entity Model
//!
//! The entities stored by the Directory Service: service records, address
//! mappings and configuration blobs. Field sets and wire names follow the
//! DIR interface; all entities serialize as JSON.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Transport scheme tag for plain TCP.
pub const SCHEME_PBRPC: &str = "pbrpc";
/// Transport scheme tag for TLS.
pub const SCHEME_PBRPCS: &str = "pbrpcs";
/// Transport scheme tag for TLS in GRID mode (SSL handshake only).
pub const SCHEME_PBRPCG: &str = "pbrpcg";
/// Transport scheme tag for UDP datagrams.
pub const SCHEME_PBRPCU: &str = "pbrpcu";

/// Prefix of service record attributes owned by DIR or operators. The agent
/// preserves these across refreshes.
pub const STATIC_ATTR_PREFIX: &str = "static.";

/// The status attribute; always present in a written record.
pub const STATUS_ATTR: &str = "static.status";

/// Advisory freshness hint attached to every address mapping, in seconds.
pub const DEFAULT_TTL_S: u32 = 3600;

/// The network selector matching every client network.
pub const MATCH_ALL_NETWORKS: &str = "*";

/// Stable identifier of a single service instance.
///
/// A 32-byte opaque string, immutable over a service's lifetime. DIR keys
/// all three entity kinds (services, mappings, configurations) by it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServiceId(String);

impl ServiceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ServiceId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

/// Kind of a registered service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServiceType {
    /// Unspecified or aggregate entry.
    Mixed,
    /// Metadata & Replica Catalog.
    Mrc,
    /// Object Storage Device.
    Osd,
    /// A volume fronted by one or more MRCs.
    Volume,
    /// The Directory Service itself.
    Dir,
}

/// Operator-visible availability of a service.
///
/// The wire encoding of a status inside a service record is the numeric
/// ordinal rendered as a string (see [`ServiceStatus::ordinal`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServiceStatus {
    Avail,
    ToBeRemoved,
    Removed,
}

impl ServiceStatus {
    /// Numeric ordinal used as the `static.status` attribute value.
    pub fn ordinal(self) -> u32 {
        match self {
            ServiceStatus::Avail => 0,
            ServiceStatus::ToBeRemoved => 1,
            ServiceStatus::Removed => 2,
        }
    }
}

/// A single key/value entry of a service data map or configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyValuePair {
    pub key: String,
    pub value: String,
}

impl KeyValuePair {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Insertion-ordered mapping with unique string keys.
///
/// The merge rules for service records are sensitive to insertion order
/// (static attributes first, then preserved replica keys, then generator
/// data), so this is a thin layer over a `Vec` rather than a hash map.
/// Inserting an existing key replaces the value in place and keeps the
/// key's original position.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServiceDataMap {
    entries: Vec<KeyValuePair>,
}

impl ServiceDataMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces `key`. Replacement keeps the original position.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|e| e.key == key) {
            Some(entry) => entry.value = value,
            None => self.entries.push(KeyValuePair { key, value }),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.key == key)
            .map(|e| e.value.as_str())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.iter().any(|e| e.key == key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &KeyValuePair> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(String, String)> for ServiceDataMap {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        let mut map = ServiceDataMap::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}

impl<'a> IntoIterator for &'a ServiceDataMap {
    type Item = &'a KeyValuePair;
    type IntoIter = std::slice::Iter<'a, KeyValuePair>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// A service record as stored by DIR.
///
/// `version` is DIR's optimistic-concurrency token: it is returned on read
/// and must be echoed on write. `data` mixes caller-supplied attributes with
/// DIR-owned `static.*` attributes; the agent's merge rules decide which
/// survive a refresh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Service {
    pub uuid: ServiceId,
    #[serde(rename = "type")]
    pub kind: ServiceType,
    pub name: String,
    pub version: u64,
    pub data: ServiceDataMap,
}

impl Service {
    pub fn new(uuid: ServiceId, kind: ServiceType, name: impl Into<String>) -> Self {
        Self {
            uuid,
            kind,
            name: name.into(),
            version: 0,
            data: ServiceDataMap::new(),
        }
    }
}

/// Result set of a service lookup; zero or one entries for a UUID query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceSet {
    pub services: Vec<Service>,
}

impl ServiceSet {
    pub fn first(&self) -> Option<&Service> {
        self.services.first()
    }
}

/// Binding of a service UUID to one reachable `scheme://host:port`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressMapping {
    pub uuid: ServiceId,
    pub version: u64,
    pub protocol: String,
    pub address: String,
    pub port: u16,
    pub match_network: String,
    pub ttl_s: u32,
    pub uri: String,
}

impl AddressMapping {
    /// Builds a mapping with the defaults the agent advertises: version 0,
    /// the match-all network selector and the standard TTL.
    pub fn new(uuid: ServiceId, protocol: &str, address: impl Into<String>, port: u16) -> Self {
        let address = address.into();
        // IPv6 literals are bracketed in the URI form only.
        let uri = if address.contains(':') {
            format!("{}://[{}]:{}", protocol, address, port)
        } else {
            format!("{}://{}:{}", protocol, address, port)
        };
        Self {
            uuid,
            version: 0,
            protocol: protocol.to_owned(),
            address,
            port,
            match_network: MATCH_ALL_NETWORKS.to_owned(),
            ttl_s: DEFAULT_TTL_S,
            uri,
        }
    }
}

/// The full set of mappings registered for one UUID.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressMappingSet {
    pub mappings: Vec<AddressMapping>,
}

/// A versioned flat configuration uploaded by a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Configuration {
    pub uuid: ServiceId,
    pub version: u64,
    pub parameters: Vec<KeyValuePair>,
}
