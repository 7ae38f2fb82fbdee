use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use dirbeat_common::protocol::error::{DirError, Result};
use dirbeat_common::protocol::{
    AddressMappingSet, Configuration, DirRequest, Service, ServiceId, ServiceSet,
    UserCredentials,
};
use dirbeat_common::transport::DirTransport;

use crate::pool::{ConnectionPool, PoolConfig};
use crate::service::{methods, DirectoryService};

#[derive(Deserialize)]
struct RegisterAck {
    version: u64,
}

/// Typed DIR client over pooled TCP connections.
///
/// Every call runs under anonymous auth with the fixed heartbeat identity.
/// There is no client-side retry: callers that refresh periodically get
/// their retry from the refresh cadence, and optimistic-concurrency
/// conflicts must be resolved by re-reading, not by replaying the write.
pub struct DirClient {
    transport: DirTransport,
    pool: ConnectionPool,
    creds: UserCredentials,
    live: AtomicBool,
}

impl DirClient {
    /// Creates a client for the DIR at `addr`. Connections are opened
    /// lazily on first use.
    pub fn new(addr: impl Into<String>) -> Self {
        Self::with_config(addr, PoolConfig::default())
    }

    pub fn with_config(addr: impl Into<String>, config: PoolConfig) -> Self {
        Self {
            transport: DirTransport::new(),
            pool: ConnectionPool::new(addr, config),
            creds: UserCredentials::heartbeat(),
            live: AtomicBool::new(true),
        }
    }

    /// Address of the DIR this client talks to.
    pub fn addr(&self) -> &str {
        self.pool.addr()
    }

    /// Marks the client as closed and drops idle connections. Calls issued
    /// afterwards fail with a connection error.
    pub async fn close(&self) {
        self.live.store(false, Ordering::SeqCst);
        self.pool.drain().await;
    }

    /// Issues one DIR call and decodes the result.
    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T> {
        if !self.live.load(Ordering::SeqCst) {
            return Err(DirError::Connection("client is closed".to_string()));
        }

        let mut stream = self.pool.acquire().await?;
        let request = DirRequest::new(method, params, self.creds.clone());

        let response = match self.transport.send_request(&mut stream, &request).await {
            Ok(response) => {
                self.pool.release(stream).await;
                response
            }
            Err(e) => {
                // Stream state is unknown after a transport error; drop it.
                tracing::debug!(method, error = %e, "transport error, discarding connection");
                return Err(e);
            }
        };

        if !response.success {
            return Err(DirError::Remote(
                response
                    .error
                    .unwrap_or_else(|| "unspecified error".to_string()),
            ));
        }

        let result = response.result.unwrap_or(Value::Null);
        Ok(serde_json::from_value(result)?)
    }
}

#[async_trait]
impl DirectoryService for DirClient {
    async fn address_mappings_get(&self, uuid: &ServiceId) -> Result<AddressMappingSet> {
        self.call(
            methods::ADDRESS_MAPPINGS_GET,
            json!({"uuid": uuid.as_str()}),
        )
        .await
    }

    async fn address_mappings_set(&self, mappings: &AddressMappingSet) -> Result<()> {
        self.call(methods::ADDRESS_MAPPINGS_SET, serde_json::to_value(mappings)?)
            .await
    }

    async fn service_get_by_uuid(&self, uuid: &ServiceId) -> Result<ServiceSet> {
        self.call(methods::SERVICE_GET_BY_UUID, json!({"uuid": uuid.as_str()}))
            .await
    }

    async fn service_register(&self, service: &Service) -> Result<u64> {
        let ack: RegisterAck = self
            .call(methods::SERVICE_REGISTER, serde_json::to_value(service)?)
            .await?;
        Ok(ack.version)
    }

    async fn service_deregister(&self, uuid: &ServiceId) -> Result<()> {
        self.call(methods::SERVICE_DEREGISTER, json!({"uuid": uuid.as_str()}))
            .await
    }

    async fn configuration_get(&self, uuid: &ServiceId) -> Result<Configuration> {
        self.call(methods::CONFIGURATION_GET, json!({"uuid": uuid.as_str()}))
            .await
    }

    async fn configuration_set(&self, config: &Configuration) -> Result<()> {
        self.call(methods::CONFIGURATION_SET, serde_json::to_value(config)?)
            .await
    }

    fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }
}
