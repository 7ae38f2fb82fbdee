//! Heartbeat Agent
//!
//! [`HeartbeatAgent`] owns the full presence lifecycle of one service:
//! startup registration, the periodic refresh loop and deregistration on
//! shutdown. It occupies a single task; the shutdown path and the loop body
//! share a critical region so a shutdown never overlaps an in-flight
//! refresh cycle.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use dirbeat_client::DirectoryService;
use dirbeat_common::protocol::error::{DirError, Result};
use dirbeat_common::protocol::{AddressMappingSet, Configuration, ServiceId, ServiceSet};

use crate::config::AgentConfig;
use crate::endpoints::discover_endpoints;
use crate::merge::merge_service_record;

/// Supplies the service records to refresh.
///
/// The embedder owns the generator; the agent invokes it once per refresh
/// cycle and sends every returned record through the merge. A generator
/// usually returns exactly one record, but an MRC hosting volumes returns
/// one per volume as well.
pub trait ServiceDataGenerator: Send + Sync {
    fn service_data(&self) -> ServiceSet;
}

/// Lifecycle phase of an agent, published on a watch channel.
///
/// ```text
/// New ──initialize──► Initializing ──start──► Running ──shutdown──► Stopping ──► Stopped
///                                                │
///                                                └──fatal error──► Crashed
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum AgentPhase {
    New,
    Initializing,
    Running,
    Stopping,
    Stopped,
    Crashed(String),
}

/// The service-presence agent.
///
/// Construction wires everything up but performs no I/O; [`initialize`]
/// runs the startup registration, [`start`] spawns the refresh loop and
/// [`shutdown`] stops it. All DIR traffic goes through the injected
/// [`DirectoryService`].
///
/// [`initialize`]: HeartbeatAgent::initialize
/// [`start`]: HeartbeatAgent::start
/// [`shutdown`]: HeartbeatAgent::shutdown
pub struct HeartbeatAgent {
    name: String,
    dir: Arc<dyn DirectoryService>,
    uuid: ServiceId,
    generator: Arc<dyn ServiceDataGenerator>,
    config: AgentConfig,
    advertise_datagram: bool,
    advertised_host: OnceLock<String>,
    quit: AtomicBool,
    shutdown_token: CancellationToken,
    /// Serializes the loop body and `shutdown()`; the refresh-interval wait
    /// happens outside it so shutdown stays responsive.
    cycle_lock: Mutex<()>,
    phase_tx: watch::Sender<AgentPhase>,
}

impl HeartbeatAgent {
    pub fn new(
        name: impl Into<String>,
        dir: Arc<dyn DirectoryService>,
        uuid: ServiceId,
        generator: Arc<dyn ServiceDataGenerator>,
        config: AgentConfig,
        advertise_datagram: bool,
    ) -> Self {
        let (phase_tx, _) = watch::channel(AgentPhase::New);
        Self {
            name: name.into(),
            dir,
            uuid,
            generator,
            config,
            advertise_datagram,
            advertised_host: OnceLock::new(),
            quit: AtomicBool::new(false),
            shutdown_token: CancellationToken::new(),
            cycle_lock: Mutex::new(()),
            phase_tx,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn uuid(&self) -> &ServiceId {
        &self.uuid
    }

    /// Subscribes to lifecycle phase changes.
    pub fn phases(&self) -> watch::Receiver<AgentPhase> {
        self.phase_tx.subscribe()
    }

    /// Token cancelled on shutdown; embedders may also cancel it directly to
    /// abort the loop without deregistering.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }

    /// The host this agent advertises. Set by `initialize()`; absent before
    /// that, or when interface enumeration found no address.
    pub fn advertised_host_name(&self) -> Option<&str> {
        self.advertised_host.get().map(String::as_str)
    }

    /// One-shot startup registration: endpoint discovery, address mapping
    /// registration, the initial record refresh and the configuration
    /// upload. Any error except a configuration-upload failure aborts
    /// startup.
    pub async fn initialize(&self) -> Result<()> {
        self.set_phase(AgentPhase::Initializing);

        match self.register_presence().await {
            Ok(()) => {}
            Err(e) => {
                error!(
                    uuid = %self.uuid,
                    error = %e,
                    "an error occurred while initially contacting the directory service"
                );
                return Err(e);
            }
        }

        // Best-effort: a node is operational without its configuration
        // stored at DIR.
        self.push_configuration().await;

        Ok(())
    }

    async fn register_presence(&self) -> Result<()> {
        let discovered =
            discover_endpoints(&self.uuid, &self.config, self.advertise_datagram).await?;

        if let Some(host) = discovered.advertised_host {
            let _ = self.advertised_host.set(host);
        }

        if discovered.mappings.is_empty() {
            warn!(
                uuid = %self.uuid,
                "no reachable endpoints discovered, skipping address mapping registration"
            );
        } else {
            self.register_address_mappings(AddressMappingSet {
                mappings: discovered.mappings,
            })
            .await?;
        }

        self.refresh_services().await
    }

    /// Fetches the current mapping version for this UUID and writes the
    /// discovered mapping set with it. The version rides on the first
    /// mapping only; the rest stay at 0.
    async fn register_address_mappings(&self, mut set: AddressMappingSet) -> Result<()> {
        let current = self.dir.address_mappings_get(&self.uuid).await?;
        let version = current.mappings.first().map(|m| m.version).unwrap_or(0);

        if let Some(first) = set.mappings.first_mut() {
            first.version = version;
        }

        info!(
            uuid = %self.uuid,
            count = set.mappings.len(),
            "registering address mappings for the service"
        );
        for mapping in &set.mappings {
            debug!(uuid = %self.uuid, uri = %mapping.uri, "address mapping");
        }

        self.dir.address_mappings_set(&set).await
    }

    /// One refresh cycle: for every record the generator returns, read the
    /// prior DIR record, merge, and write back with the echoed version.
    async fn refresh_services(&self) -> Result<()> {
        for reg in self.generator.service_data().services {
            let prior_set = self.dir.service_get_by_uuid(&reg.uuid).await?;
            let merged = merge_service_record(&reg, prior_set.first())?;
            self.dir.service_register(&merged).await?;

            debug!(
                uuid = %self.uuid,
                service = %reg.uuid,
                "service record successfully updated at the directory service"
            );
        }
        Ok(())
    }

    async fn push_configuration(&self) {
        match self.try_push_configuration().await {
            Ok(()) => {
                debug!(
                    uuid = %self.uuid,
                    "configuration successfully uploaded to the directory service"
                );
            }
            Err(e) => {
                warn!(
                    uuid = %self.uuid,
                    error = %e,
                    "could not upload the configuration to the directory service"
                );
            }
        }
    }

    async fn try_push_configuration(&self) -> Result<()> {
        let current = self.dir.configuration_get(&self.uuid).await?;
        let config = Configuration {
            uuid: self.uuid.clone(),
            version: current.version,
            parameters: self.config.to_parameters(),
        };
        self.dir.configuration_set(&config).await
    }

    /// Spawns the refresh loop.
    pub fn start(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    /// Runs the refresh loop on the current task until shutdown.
    pub async fn run(&self) {
        if self.quit.load(Ordering::SeqCst) {
            self.set_phase(AgentPhase::Stopped);
            return;
        }
        self.set_phase(AgentPhase::Running);

        match self.run_loop().await {
            Ok(()) => self.set_phase(AgentPhase::Stopped),
            Err(e) => {
                error!(uuid = %self.uuid, error = %e, "heartbeat loop aborted");
                self.set_phase(AgentPhase::Crashed(e.to_string()));
            }
        }
    }

    async fn run_loop(&self) -> Result<()> {
        while !self.quit.load(Ordering::SeqCst) {
            {
                let _cycle = self.cycle_lock.lock().await;
                if self.quit.load(Ordering::SeqCst) {
                    break;
                }

                tokio::select! {
                    result = self.refresh_services() => match result {
                        Ok(()) => {}
                        Err(DirError::Cancelled) => {
                            self.quit.store(true, Ordering::SeqCst);
                            break;
                        }
                        // A malformed registration is a generator bug; the
                        // loop must not keep writing garbage.
                        Err(e @ DirError::InvalidRegistration(_)) => return Err(e),
                        Err(e) => {
                            error!(
                                uuid = %self.uuid,
                                error = %e,
                                "could not refresh the service records at the directory service"
                            );
                        }
                    },
                    _ = self.shutdown_token.cancelled() => {
                        self.quit.store(true, Ordering::SeqCst);
                        break;
                    }
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(self.config.refresh_interval) => {}
                _ = self.shutdown_token.cancelled() => {}
            }
        }

        Ok(())
    }

    /// Stops the agent: waits for any in-flight refresh cycle, deregisters
    /// the service best-effort and wakes the loop out of its wait.
    /// Idempotent; concurrent and repeated calls deregister at most once.
    pub async fn shutdown(&self) {
        let _cycle = self.cycle_lock.lock().await;

        if self.quit.swap(true, Ordering::SeqCst) {
            self.shutdown_token.cancel();
            return;
        }

        self.set_phase(AgentPhase::Stopping);

        if self.dir.is_live() {
            if let Err(e) = self.dir.service_deregister(&self.uuid).await {
                warn!(
                    uuid = %self.uuid,
                    error = %e,
                    "could not deregister the service at the directory service"
                );
            }
        }

        self.shutdown_token.cancel();
    }

    fn set_phase(&self, phase: AgentPhase) {
        self.phase_tx.send_replace(phase);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_phase_is_new() {
        struct NoData;
        impl ServiceDataGenerator for NoData {
            fn service_data(&self) -> ServiceSet {
                ServiceSet::default()
            }
        }

        struct NoDir;
        #[async_trait::async_trait]
        impl DirectoryService for NoDir {
            async fn address_mappings_get(
                &self,
                _uuid: &ServiceId,
            ) -> Result<AddressMappingSet> {
                unimplemented!()
            }
            async fn address_mappings_set(&self, _mappings: &AddressMappingSet) -> Result<()> {
                unimplemented!()
            }
            async fn service_get_by_uuid(&self, _uuid: &ServiceId) -> Result<ServiceSet> {
                unimplemented!()
            }
            async fn service_register(
                &self,
                _service: &dirbeat_common::protocol::Service,
            ) -> Result<u64> {
                unimplemented!()
            }
            async fn service_deregister(&self, _uuid: &ServiceId) -> Result<()> {
                unimplemented!()
            }
            async fn configuration_get(&self, _uuid: &ServiceId) -> Result<Configuration> {
                unimplemented!()
            }
            async fn configuration_set(&self, _config: &Configuration) -> Result<()> {
                unimplemented!()
            }
        }

        let agent = HeartbeatAgent::new(
            "test hb",
            Arc::new(NoDir),
            ServiceId::from("u1"),
            Arc::new(NoData),
            AgentConfig::new(32636),
            false,
        );

        assert_eq!(*agent.phases().borrow(), AgentPhase::New);
        assert_eq!(agent.name(), "test hb");
        assert!(agent.advertised_host_name().is_none());
    }
}
