//! TCP Transport
//!
//! Length-prefixed JSON framing over TCP. [`DirTransport`] is the client
//! side used by the typed DIR client; [`RpcServer`] is a reusable
//! accept/dispatch loop for anything that answers DIR-style requests, such
//! as the in-process directory used by the integration tests.

pub mod codec;
pub mod server;
pub mod tcp;

pub use codec::JsonCodec;
pub use server::RpcServer;
pub use tcp::DirTransport;
