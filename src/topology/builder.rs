//! Device construction from the intent document.
//!
//! Normalizes every interface declaration into the canonical [`Interface`]
//! shape, tags provider devices as edge or backbone, and classifies
//! interfaces once addresses exist.

use super::types::{Device, Interface, InterfaceKind, Role, LOOPBACK_INTERFACE};
use super::{Topology, TopologyError};
use crate::intent::{ClientRouter, Intent, ProviderRouter, RawInterface};
use crate::utils::ip_utils::cidr_to_network;
use log::{debug, info, warn};
use std::collections::{BTreeMap, BTreeSet};
use std::net::Ipv4Addr;

impl Topology {
    /// Build normalized, role-tagged devices from an intent document.
    ///
    /// Links are not discovered here; see [`super::discover_links`].
    pub fn from_intent(intent: &Intent) -> Result<Self, TopologyError> {
        let mut provider = BTreeMap::new();
        for (hostname, router) in &intent.provider.routers {
            let device = normalize_provider(hostname, router, intent.provider.bgp_asn)?;
            provider.insert(hostname.clone(), device);
        }

        let mut clients = BTreeMap::new();
        for (client_name, network) in &intent.clients.networks {
            for (hostname, router) in &network.routers {
                let device = normalize_client(client_name, hostname, router)?;
                clients.insert(hostname.clone(), device);
            }
        }

        assign_roles(&mut provider, &intent.route_reflectors())?;

        let edges = provider.values().filter(|d| d.role == Role::Edge).count();
        info!(
            "Normalized {} provider routers ({} edge, {} backbone) and {} client routers",
            provider.len(),
            edges,
            provider.len() - edges,
            clients.len()
        );

        Ok(Topology {
            provider,
            clients,
            links: Vec::new(),
        })
    }
}

/// Rewrite one raw interface declaration into canonical shape
pub fn normalize_interface(
    device: &str,
    name: &str,
    raw: &RawInterface,
) -> Result<Interface, TopologyError> {
    let detached = || TopologyError::DetachedInterface {
        device: device.to_string(),
        interface: name.to_string(),
    };

    let tagged = match raw {
        RawInterface::Peer(peer) => return Ok(Interface::with_neighbors(vec![peer.clone()])),
        RawInterface::Peers(peers) if peers.is_empty() => return Err(detached()),
        RawInterface::Peers(peers) => return Ok(Interface::with_neighbors(peers.clone())),
        RawInterface::Tagged(tagged) => tagged,
    };

    let neighbors = tagged
        .neighbors
        .as_ref()
        .map(|n| n.to_vec())
        .unwrap_or_default();

    if !neighbors.is_empty() {
        if tagged.ip_address.is_some() || tagged.subnet_id.is_some() {
            debug!("{}/{}: declared addressing ignored, link will be allocated", device, name);
        }
        return Ok(Interface::with_neighbors(neighbors));
    }

    match (&tagged.ip_address, &tagged.subnet_mask) {
        (Some(address), Some(mask)) => {
            let address = parse_address(device, name, address)?;
            let mask = parse_address(device, name, mask)?;
            Ok(Interface::unmanaged(address, mask))
        }
        _ => Err(detached()),
    }
}

fn parse_address(device: &str, interface: &str, value: &str) -> Result<Ipv4Addr, TopologyError> {
    value
        .trim()
        .parse::<Ipv4Addr>()
        .map_err(|e| TopologyError::InvalidAddress {
            device: device.to_string(),
            interface: interface.to_string(),
            reason: format!("'{}': {}", value, e),
        })
}

/// Build a provider device. It starts as backbone; [`assign_roles`] promotes edges.
pub fn normalize_provider(
    hostname: &str,
    router: &ProviderRouter,
    provider_asn: u32,
) -> Result<Device, TopologyError> {
    let mut device = Device::new(hostname, Role::Backbone, provider_asn);
    for (name, raw) in &router.interfaces {
        let iface = normalize_interface(hostname, name, raw)?;
        device.interfaces.insert(name.clone(), iface);
    }
    Ok(device)
}

/// Build a client router, tagged with its role and owning client.
///
/// Unmanaged interfaces keep their static CIDR address and take no part in
/// link discovery or allocation.
pub fn normalize_client(
    client_name: &str,
    hostname: &str,
    router: &ClientRouter,
) -> Result<Device, TopologyError> {
    let mut device = Device::new(hostname, Role::Client, router.bgp_asn);
    device.client = Some(client_name.to_string());
    device.advertised_cidrs = router.advertised_networks.clone();

    for (name, raw) in &router.interfaces {
        let iface = normalize_interface(hostname, name, raw)?;
        device.interfaces.insert(name.clone(), iface);
    }

    for (name, cidr) in &router.unmanaged_interfaces {
        let parts = cidr_to_network(cidr).map_err(|reason| TopologyError::InvalidAddress {
            device: hostname.to_string(),
            interface: name.clone(),
            reason,
        })?;
        if device.interfaces.contains_key(name) {
            warn!("{}/{}: unmanaged declaration replaces the peer interface", hostname, name);
        }
        device
            .interfaces
            .insert(name.clone(), Interface::unmanaged(parts.address, parts.mask));
    }

    Ok(device)
}

/// Tag provider devices as edge or backbone and flag route reflectors.
///
/// A device is an edge when any of its neighbors is outside the provider set.
pub fn assign_roles(
    provider: &mut BTreeMap<String, Device>,
    route_reflectors: &BTreeSet<String>,
) -> Result<(), TopologyError> {
    let names: BTreeSet<String> = provider.keys().cloned().collect();

    if let Some(unknown) = route_reflectors.iter().find(|rr| !names.contains(*rr)) {
        return Err(TopologyError::UnknownRouteReflector(unknown.clone()));
    }

    for device in provider.values_mut() {
        let is_edge = device
            .interfaces
            .values()
            .flat_map(|iface| iface.neighbors.iter())
            .any(|neighbor| !names.contains(neighbor));

        device.role = if is_edge { Role::Edge } else { Role::Backbone };
        device.is_route_reflector = route_reflectors.contains(&device.hostname);

        debug!(
            "{} tagged {}{}",
            device.hostname,
            device.role,
            if device.is_route_reflector { " (route reflector)" } else { "" }
        );
    }

    Ok(())
}

/// Set the kind of every interface.
///
/// Provider interfaces are `backbone` when every neighbor is a provider
/// device, `client` otherwise, and `unmanaged` when statically addressed
/// with no neighbors. Client interfaces are always `provider`.
/// Running it again on a classified topology changes nothing.
pub fn classify_interfaces(topology: &mut Topology) {
    let Topology {
        provider, clients, ..
    } = topology;

    let provider_names: BTreeSet<String> = provider.keys().cloned().collect();
    let owners: BTreeMap<String, String> = clients
        .values()
        .filter_map(|d| d.client.clone().map(|c| (d.hostname.clone(), c)))
        .collect();

    for device in provider.values_mut() {
        for (name, iface) in device.interfaces.iter_mut() {
            if name == LOOPBACK_INTERFACE {
                iface.kind = Some(InterfaceKind::Loopback);
                iface.client = None;
            } else if iface.neighbors.is_empty() {
                iface.kind = Some(InterfaceKind::Unmanaged);
                iface.client = None;
            } else if iface.neighbors.iter().all(|n| provider_names.contains(n)) {
                iface.kind = Some(InterfaceKind::Backbone);
                iface.client = None;
            } else {
                iface.kind = Some(InterfaceKind::Client);
                iface.client = iface.neighbors.iter().find_map(|n| owners.get(n)).cloned();
            }
        }
    }

    for device in clients.values_mut() {
        for (name, iface) in device.interfaces.iter_mut() {
            iface.kind = Some(if name == LOOPBACK_INTERFACE {
                InterfaceKind::Loopback
            } else {
                InterfaceKind::Provider
            });
        }
    }
}
