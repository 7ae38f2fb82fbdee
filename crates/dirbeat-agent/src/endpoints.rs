//! Endpoint Discovery
//!
//! Determines the address mappings a node advertises at DIR. Two paths:
//!
//! - No override configured: enumerate the node's network interfaces and
//!   advertise every reachable address under the primary scheme (loopback
//!   addresses only when nothing else exists).
//! - `hostname` or `bind_address` configured: advertise exactly that host.
//!   The host is checked against local name resolution best-effort; a
//!   failure is logged but does not stop startup, since the name may still
//!   resolve for clients.
//!
//! When datagram advertisement is on, every discovered address is published
//! a second time under the `pbrpcu` scheme, after all primary mappings.

use std::net::IpAddr;

use tracing::warn;

use dirbeat_common::protocol::error::Result;
use dirbeat_common::protocol::{AddressMapping, ServiceId, SCHEME_PBRPCU};

use crate::config::AgentConfig;

/// Outcome of endpoint discovery.
pub struct DiscoveredEndpoints {
    /// Mappings to register, primary scheme first, datagram mappings last
    pub mappings: Vec<AddressMapping>,
    /// The host other components should advertise; the first enumerated
    /// address, or the override host. Absent when enumeration found nothing.
    pub advertised_host: Option<String>,
}

/// Discovers the endpoints to register for `uuid`.
pub async fn discover_endpoints(
    uuid: &ServiceId,
    config: &AgentConfig,
    advertise_datagram: bool,
) -> Result<DiscoveredEndpoints> {
    if config.has_address_override() {
        Ok(override_endpoints(uuid, config, advertise_datagram).await)
    } else {
        enumerate_endpoints(uuid, config, advertise_datagram)
    }
}

fn enumerate_endpoints(
    uuid: &ServiceId,
    config: &AgentConfig,
    advertise_datagram: bool,
) -> Result<DiscoveredEndpoints> {
    let addresses = reachable_addresses()?;

    let mut mappings: Vec<AddressMapping> = addresses
        .iter()
        .map(|addr| {
            AddressMapping::new(uuid.clone(), config.scheme(), addr.to_string(), config.port)
        })
        .collect();

    if advertise_datagram {
        for addr in &addresses {
            mappings.push(AddressMapping::new(
                uuid.clone(),
                SCHEME_PBRPCU,
                addr.to_string(),
                config.port,
            ));
        }
    }

    let advertised_host = addresses.first().map(|addr| addr.to_string());

    Ok(DiscoveredEndpoints {
        mappings,
        advertised_host,
    })
}

async fn override_endpoints(
    uuid: &ServiceId,
    config: &AgentConfig,
    advertise_datagram: bool,
) -> DiscoveredEndpoints {
    let mut host = if !config.hostname.is_empty() {
        config.hostname.clone()
    } else {
        // has_address_override() guarantees one of the two is set
        config
            .bind_address
            .map(|addr| addr.ip().to_string())
            .unwrap_or_default()
    };
    if let Some(stripped) = host.strip_prefix('/') {
        host = stripped.to_owned();
    }

    let resolvable = tokio::net::lookup_host((host.as_str(), config.port))
        .await
        .map(|mut addrs| addrs.next().is_some())
        .unwrap_or(false);
    if !resolvable {
        warn!(
            uuid = %uuid,
            host = %host,
            "could not resolve the advertised hostname locally; make sure it is set \
             correctly, or clients and other services will fail to reach this service"
        );
    }

    let mut mappings = vec![AddressMapping::new(
        uuid.clone(),
        config.scheme(),
        host.clone(),
        config.port,
    )];
    if advertise_datagram {
        mappings.push(AddressMapping::new(
            uuid.clone(),
            SCHEME_PBRPCU,
            host.clone(),
            config.port,
        ));
    }

    DiscoveredEndpoints {
        mappings,
        advertised_host: Some(host),
    }
}

/// All addresses worth advertising: every non-loopback interface address,
/// or the loopback addresses when the node has nothing else. IPv6
/// link-local addresses are never advertised.
fn reachable_addresses() -> Result<Vec<IpAddr>> {
    let interfaces = if_addrs::get_if_addrs()?;

    let mut routable = Vec::new();
    let mut loopback = Vec::new();
    for interface in interfaces {
        let ip = interface.ip();
        if let IpAddr::V6(v6) = ip {
            if (v6.segments()[0] & 0xffc0) == 0xfe80 {
                continue;
            }
        }
        if interface.is_loopback() {
            loopback.push(ip);
        } else {
            routable.push(ip);
        }
    }

    Ok(if routable.is_empty() { loopback } else { routable })
}
