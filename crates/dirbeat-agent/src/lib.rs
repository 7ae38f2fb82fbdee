//! dirbeat Service-Presence Agent
//!
//! Every node of the file system embeds one [`HeartbeatAgent`]. The agent
//! makes the node's local service discoverable and configurable through the
//! central Directory Service (DIR), and keeps its record fresh:
//!
//! 1. **Startup** (`initialize`): discover the node's reachable endpoints,
//!    register them as address mappings, write an initial service record
//!    merged against whatever DIR already holds, and upload the node's
//!    configuration.
//! 2. **Steady state** (`start`): refresh the service record every
//!    [`config::UPDATE_INTERVAL`], preserving DIR-owned `static.*`
//!    attributes and volume replica keys across refreshes.
//! 3. **Shutdown** (`shutdown`): wait for any in-flight refresh, deregister
//!    from DIR best-effort and stop the loop.
//!
//! The service whose data is refreshed stays outside the agent: it supplies
//! a [`ServiceDataGenerator`] that is invoked once per refresh cycle. DIR
//! itself is reached through the [`dirbeat_client::DirectoryService`] trait,
//! so anything answering those seven operations will do.
//!
//! [`wait_for_dir`] is the companion helper that blocks node bring-up until
//! DIR accepts TCP connections.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use dirbeat_agent::{wait_for_dir, AgentConfig, HeartbeatAgent, ServiceDataGenerator};
//! use dirbeat_client::DirClient;
//! use dirbeat_common::protocol::{Service, ServiceId, ServiceSet, ServiceType};
//!
//! struct OsdData;
//!
//! impl ServiceDataGenerator for OsdData {
//!     fn service_data(&self) -> ServiceSet {
//!         let uuid = ServiceId::from("4f8a1c90-6d2e-4b77-9a01-d5c2e8f3a6b4");
//!         ServiceSet {
//!             services: vec![Service::new(uuid, ServiceType::Osd, "osd on node7")],
//!         }
//!     }
//! }
//!
//! # #[tokio::main]
//! # async fn main() -> dirbeat_common::protocol::Result<()> {
//! wait_for_dir("dir.example:32638", Duration::from_secs(30)).await?;
//!
//! let agent = Arc::new(HeartbeatAgent::new(
//!     "osd hb",
//!     Arc::new(DirClient::new("dir.example:32638")),
//!     ServiceId::from("4f8a1c90-6d2e-4b77-9a01-d5c2e8f3a6b4"),
//!     Arc::new(OsdData),
//!     AgentConfig::new(32640),
//!     false,
//! ));
//! agent.initialize().await?;
//! let handle = agent.clone().start();
//!
//! // ... node runs ...
//!
//! agent.shutdown().await;
//! handle.await.ok();
//! # Ok(())
//! # }
//! ```

pub mod agent;
pub mod config;
pub mod endpoints;
pub mod merge;
pub mod waiter;

pub use agent::{AgentPhase, HeartbeatAgent, ServiceDataGenerator};
pub use config::AgentConfig;
pub use endpoints::{discover_endpoints, DiscoveredEndpoints};
pub use merge::merge_service_record;
pub use waiter::wait_for_dir;
