//! dirbeat Directory Service Client
//!
//! This crate provides the typed client side of the DIR protocol:
//!
//! - [`DirectoryService`] - the trait describing the seven DIR operations a
//!   presence agent consumes. The agent is written against this trait, so
//!   tests can substitute an in-memory directory.
//! - [`DirClient`] - the production implementation: pooled TCP connections,
//!   length-prefixed JSON frames, anonymous auth with the fixed heartbeat
//!   identity.
//!
//! # Example
//!
//! ```no_run
//! use dirbeat_client::{DirClient, DirectoryService};
//! use dirbeat_common::protocol::ServiceId;
//!
//! # #[tokio::main]
//! # async fn main() -> dirbeat_common::protocol::Result<()> {
//! let client = DirClient::new("dir.example:32638");
//! let uuid = ServiceId::from("4f8a1c90-6d2e-4b77-9a01-d5c2e8f3a6b4");
//! let services = client.service_get_by_uuid(&uuid).await?;
//! println!("{} record(s)", services.services.len());
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod pool;
pub mod service;

pub use client::DirClient;
pub use service::{methods, DirectoryService};
