use async_trait::async_trait;

use dirbeat_common::protocol::error::Result;
use dirbeat_common::protocol::{
    AddressMappingSet, Configuration, Service, ServiceId, ServiceSet,
};

/// Wire names of the DIR operations.
pub mod methods {
    pub const ADDRESS_MAPPINGS_GET: &str = "address_mappings_get";
    pub const ADDRESS_MAPPINGS_SET: &str = "address_mappings_set";
    pub const SERVICE_GET_BY_UUID: &str = "service_get_by_uuid";
    pub const SERVICE_REGISTER: &str = "service_register";
    pub const SERVICE_DEREGISTER: &str = "service_deregister";
    pub const CONFIGURATION_GET: &str = "configuration_get";
    pub const CONFIGURATION_SET: &str = "configuration_set";
}

/// The DIR operations a presence agent consumes.
///
/// The agent holds an `Arc<dyn DirectoryService>`; production code passes a
/// [`crate::DirClient`], tests pass an in-memory directory. Individual calls
/// are linearizable from the caller's viewpoint; no ordering is assumed
/// between concurrent calls.
#[async_trait]
pub trait DirectoryService: Send + Sync {
    /// Returns all address mappings registered for `uuid`; empty set if none.
    async fn address_mappings_get(&self, uuid: &ServiceId) -> Result<AddressMappingSet>;

    /// Replaces the address mappings for the UUID carried in the set.
    /// The first mapping's version must echo the current one.
    async fn address_mappings_set(&self, mappings: &AddressMappingSet) -> Result<()>;

    /// Returns the service record for `uuid`, as a set of zero or one entries.
    async fn service_get_by_uuid(&self, uuid: &ServiceId) -> Result<ServiceSet>;

    /// Writes a service record. `service.version` must echo the version of
    /// the most recent read; DIR rejects stale writes. Returns the version
    /// assigned to the written record.
    async fn service_register(&self, service: &Service) -> Result<u64>;

    /// Removes the service record for `uuid`.
    async fn service_deregister(&self, uuid: &ServiceId) -> Result<()>;

    /// Returns the stored configuration for `uuid`; version 0 if none exists.
    async fn configuration_get(&self, uuid: &ServiceId) -> Result<Configuration>;

    /// Uploads a configuration. `config.version` must echo the current one.
    async fn configuration_set(&self, config: &Configuration) -> Result<()>;

    /// Whether the client can still issue calls. The supervisor skips the
    /// shutdown deregister when this is false.
    fn is_live(&self) -> bool {
        true
    }
}
