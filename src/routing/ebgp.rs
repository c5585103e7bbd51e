//! eBGP between provider edges and client routers.
//!
//! On the edge side every client-facing interface resolves its client
//! router, gets bound to that client's VRF and yields one eBGP neighbor.
//! On the client side each router records its single provider peer and the
//! networks it announces.

use super::{EbgpNeighbor, EbgpPeer, RdScope, VrfEntry};
use crate::topology::{
    interface_order_key, Device, InterfaceKind, Link, Role, SubnetBinding, Topology, TopologyError,
};
use crate::utils::ip_utils::{parse_cidr, CidrParts};
use log::{debug, info};
use std::collections::BTreeMap;

/// VRF name used for a client on every edge
pub fn vrf_name(client: &str) -> String {
    format!("CLIENT_{}_VRF", client)
}

/// Derive VRFs and eBGP sessions on edges, then peers and announcements on
/// client routers. Returns `(vrfs created, edge-side eBGP sessions)`.
///
/// Edges are visited by hostname. On each edge, client-facing interfaces are
/// visited in [`interface_order_key`] order (port numbers compared as
/// numbers), which fixes the RD handed to each new VRF.
pub fn derive_ebgp(
    topology: &mut Topology,
    provider_asn: u32,
    rd_scope: RdScope,
) -> Result<(usize, usize), TopologyError> {
    let Topology {
        provider,
        clients,
        links,
    } = topology;

    let mut global_rd = 1;
    let mut vrf_count = 0;
    let mut session_count = 0;

    for edge in provider.values_mut().filter(|d| d.role == Role::Edge) {
        let mut rd = match rd_scope {
            RdScope::PerEdge => 1,
            RdScope::Global => global_rd,
        };
        let mut vrfs: Vec<VrfEntry> = Vec::new();
        let mut neighbors = Vec::new();

        let mut client_ports: Vec<String> = edge
            .interfaces
            .iter()
            .filter(|(_, iface)| iface.kind == Some(InterfaceKind::Client))
            .map(|(name, _)| name.clone())
            .collect();
        client_ports.sort_by_cached_key(|name| interface_order_key(name));

        for if_name in client_ports {
            let Some(iface) = edge.interfaces.get_mut(&if_name) else {
                continue;
            };

            let peers: Vec<&String> = iface
                .neighbors
                .iter()
                .filter(|n| clients.contains_key(*n))
                .collect();
            let [peer] = peers.as_slice() else {
                return Err(TopologyError::AmbiguousClientPeer {
                    device: edge.hostname.clone(),
                    interface: if_name.clone(),
                    found: peers.len(),
                });
            };
            let Some(client_dev) = clients.get(*peer) else {
                continue;
            };

            let address = client_side_address(client_dev, iface.subnet_id, links.as_slice())?;
            let client = client_dev
                .client
                .clone()
                .unwrap_or_else(|| client_dev.hostname.clone());
            let name = vrf_name(&client);

            if !vrfs.iter().any(|v| v.name == name) {
                debug!("{}: VRF {} rd {}", edge.hostname, name, rd);
                vrfs.push(VrfEntry {
                    name: name.clone(),
                    rd,
                    client: client.clone(),
                    remote_as: client_dev.bgp_asn,
                });
                rd += 1;
            }

            neighbors.push(EbgpNeighbor {
                address,
                remote_as: client_dev.bgp_asn,
                vrf: name.clone(),
                hostname: client_dev.hostname.clone(),
                interface: if_name,
            });
            iface.vrf = Some(name);
        }

        if rd_scope == RdScope::Global {
            global_rd = rd;
        }
        vrf_count += vrfs.len();
        session_count += neighbors.len();
        edge.routing.vrfs = vrfs;
        edge.routing.ebgp_neighbors = neighbors;
    }

    for router in clients.values_mut() {
        router.routing.advertised_networks = advertised_networks(router)?;
        router.routing.ebgp_peer = Some(provider_peer(router, provider, provider_asn)?);
    }

    info!(
        "eBGP: {} VRFs, {} edge sessions, {} client peers",
        vrf_count,
        session_count,
        clients.len()
    );
    Ok((vrf_count, session_count))
}

/// Address of the client interface sitting on the same link as the edge interface
fn client_side_address(
    client: &Device,
    binding: Option<SubnetBinding>,
    links: &[Link],
) -> Result<std::net::Ipv4Addr, TopologyError> {
    let link_label = |id: usize| {
        links
            .iter()
            .find(|l| l.id == id)
            .map(Link::label)
            .unwrap_or_else(|| id.to_string())
    };

    let Some(SubnetBinding::Link(link_id)) = binding else {
        return Err(TopologyError::ClientInterfaceMissing {
            router: client.hostname.clone(),
            link: "unaddressed".to_string(),
        });
    };

    let (if_name, iface) = client
        .interfaces
        .iter()
        .find(|(_, i)| i.subnet_id == binding)
        .ok_or_else(|| TopologyError::ClientInterfaceMissing {
            router: client.hostname.clone(),
            link: link_label(link_id),
        })?;

    iface
        .ip_address
        .ok_or_else(|| TopologyError::UnaddressedInterface {
            device: client.hostname.clone(),
            interface: if_name.clone(),
        })
}

/// Announced networks as network address plus dotted mask
fn advertised_networks(router: &Device) -> Result<Vec<CidrParts>, TopologyError> {
    router
        .advertised_cidrs
        .iter()
        .map(|cidr| {
            let network = parse_cidr(cidr).map_err(|reason| TopologyError::InvalidAddress {
                device: router.hostname.clone(),
                interface: "eBGP_advertized_networks".to_string(),
                reason,
            })?;
            Ok(CidrParts {
                address: network.network(),
                mask: network.mask(),
                cidr: cidr.trim().to_string(),
            })
        })
        .collect()
}

/// The one provider interface that lists this client router as a neighbor
fn provider_peer(
    router: &Device,
    provider: &BTreeMap<String, Device>,
    provider_asn: u32,
) -> Result<EbgpPeer, TopologyError> {
    let attachments: Vec<(&Device, &String)> = provider
        .values()
        .flat_map(|device| {
            device
                .interfaces
                .iter()
                .filter(|(_, iface)| iface.neighbors.contains(&router.hostname))
                .map(move |(name, _)| (device, name))
        })
        .collect();

    let [(device, if_name)] = attachments.as_slice() else {
        return Err(TopologyError::ClientAttachment {
            router: router.hostname.clone(),
            found: attachments.len(),
        });
    };

    let address = device
        .interfaces
        .get(*if_name)
        .and_then(|iface| iface.ip_address)
        .ok_or_else(|| TopologyError::UnaddressedInterface {
            device: device.hostname.clone(),
            interface: (*if_name).clone(),
        })?;

    Ok(EbgpPeer {
        address,
        remote_as: provider_asn,
        hostname: device.hostname.clone(),
        interface: (*if_name).clone(),
    })
}
