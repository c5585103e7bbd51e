//! iBGP session layout inside the provider AS.
//!
//! Without route reflectors every edge peers with every other edge. With
//! reflectors configured, a non-reflector edge peers with the reflectors
//! only, and each reflector peers with every other edge. Two reflectors only
//! meet when both are edges. Sessions always run between loopbacks.

use super::{IbgpNeighbor, IBGP_UPDATE_SOURCE};
use crate::topology::{Role, Topology, TopologyError};
use log::debug;
use std::collections::{BTreeMap, BTreeSet};
use std::net::Ipv4Addr;

/// Fill `ibgp_neighbors` on every provider device; returns the session count
pub fn derive_ibgp(topology: &mut Topology, provider_asn: u32) -> Result<usize, TopologyError> {
    let mut loopbacks: BTreeMap<String, Ipv4Addr> = BTreeMap::new();
    let mut edges = BTreeSet::new();
    let mut reflectors = BTreeSet::new();

    for device in topology.provider.values() {
        if device.role != Role::Edge && !device.is_route_reflector {
            continue;
        }
        let loopback = device
            .loopback_address()
            .ok_or_else(|| TopologyError::MissingLoopback(device.hostname.clone()))?;
        loopbacks.insert(device.hostname.clone(), loopback);
        if device.role == Role::Edge {
            edges.insert(device.hostname.clone());
        }
        if device.is_route_reflector {
            reflectors.insert(device.hostname.clone());
        }
    }

    let mut sessions = 0;
    for device in topology.provider.values_mut() {
        let peers: Vec<&String> = if device.is_route_reflector {
            edges
                .iter()
                .filter(|peer| **peer != device.hostname)
                .collect()
        } else if device.role == Role::Edge {
            let candidates = if reflectors.is_empty() { &edges } else { &reflectors };
            candidates
                .iter()
                .filter(|peer| **peer != device.hostname)
                .collect()
        } else {
            Vec::new()
        };

        let neighbors: Vec<IbgpNeighbor> = peers
            .into_iter()
            .filter_map(|peer| {
                loopbacks.get(peer).map(|address| IbgpNeighbor {
                    hostname: peer.clone(),
                    address: *address,
                    remote_as: provider_asn,
                    update_source: IBGP_UPDATE_SOURCE.to_string(),
                    route_reflector_client: device.is_route_reflector
                        && !reflectors.contains(peer),
                })
            })
            .collect();

        if !neighbors.is_empty() {
            debug!(
                "{}: iBGP with {:?}",
                device.hostname,
                neighbors.iter().map(|n| n.hostname.as_str()).collect::<Vec<_>>()
            );
        }
        sessions += neighbors.len();
        device.routing.ibgp_neighbors = neighbors;
    }

    Ok(sessions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::{Device, Interface, InterfaceKind, LOOPBACK_INTERFACE};

    fn router(name: &str, role: Role, rr: bool, loopback: u8) -> Device {
        let mut device = Device::new(name, role, 100);
        device.is_route_reflector = rr;
        device.interfaces.insert(
            LOOPBACK_INTERFACE.to_string(),
            Interface {
                ip_address: Some(Ipv4Addr::new(1, 1, 1, loopback)),
                subnet_mask: Some(Ipv4Addr::BROADCAST),
                kind: Some(InterfaceKind::Loopback),
                ..Default::default()
            },
        );
        device
    }

    fn topology(devices: Vec<Device>) -> Topology {
        let mut topology = Topology::default();
        for d in devices {
            topology.provider.insert(d.hostname.clone(), d);
        }
        topology
    }

    fn peer_names(topology: &Topology, name: &str) -> Vec<String> {
        topology.provider[name]
            .routing
            .ibgp_neighbors
            .iter()
            .map(|n| n.hostname.clone())
            .collect()
    }

    #[test]
    fn test_full_mesh_between_edges() {
        let mut topo = topology(vec![
            router("PE1", Role::Edge, false, 1),
            router("PE2", Role::Edge, false, 2),
            router("PE3", Role::Edge, false, 3),
            router("P1", Role::Backbone, false, 4),
        ]);
        assert_eq!(derive_ibgp(&mut topo, 100).unwrap(), 6);
        assert_eq!(peer_names(&topo, "PE1"), vec!["PE2", "PE3"]);
        assert_eq!(peer_names(&topo, "PE3"), vec!["PE1", "PE2"]);
        assert!(peer_names(&topo, "P1").is_empty());

        let session = &topo.provider["PE1"].routing.ibgp_neighbors[0];
        assert_eq!(session.address, Ipv4Addr::new(1, 1, 1, 2));
        assert_eq!(session.remote_as, 100);
        assert_eq!(session.update_source, "Loopback0");
        assert!(!session.route_reflector_client);
    }

    #[test]
    fn test_route_reflector_hub() {
        let mut topo = topology(vec![
            router("RR1", Role::Edge, true, 1),
            router("PE1", Role::Edge, false, 2),
            router("PE2", Role::Edge, false, 3),
        ]);
        derive_ibgp(&mut topo, 100).unwrap();

        assert_eq!(peer_names(&topo, "PE1"), vec!["RR1"]);
        assert_eq!(peer_names(&topo, "PE2"), vec!["RR1"]);
        assert_eq!(peer_names(&topo, "RR1"), vec!["PE1", "PE2"]);

        let rr = &topo.provider["RR1"].routing.ibgp_neighbors;
        assert!(rr.iter().all(|n| n.route_reflector_client));
        assert_eq!(topo.provider["PE1"].routing.ibgp_neighbors[0].address, Ipv4Addr::new(1, 1, 1, 1));
    }

    #[test]
    fn test_backbone_reflectors_only_peer_with_edges() {
        let mut topo = topology(vec![
            router("RR1", Role::Backbone, true, 1),
            router("RR2", Role::Backbone, true, 2),
            router("PE1", Role::Edge, false, 3),
        ]);
        assert_eq!(derive_ibgp(&mut topo, 100).unwrap(), 4);

        assert_eq!(peer_names(&topo, "RR1"), vec!["PE1"]);
        assert_eq!(peer_names(&topo, "RR2"), vec!["PE1"]);
        assert_eq!(peer_names(&topo, "PE1"), vec!["RR1", "RR2"]);
        assert!(topo.provider["RR1"].routing.ibgp_neighbors[0].route_reflector_client);
    }

    #[test]
    fn test_edge_reflectors_peer_without_client_flag() {
        let mut topo = topology(vec![
            router("RR1", Role::Edge, true, 1),
            router("RR2", Role::Edge, true, 2),
            router("PE1", Role::Edge, false, 3),
        ]);
        derive_ibgp(&mut topo, 100).unwrap();

        assert_eq!(peer_names(&topo, "RR1"), vec!["PE1", "RR2"]);
        let towards_rr2 = &topo.provider["RR1"].routing.ibgp_neighbors[1];
        assert!(!towards_rr2.route_reflector_client);
    }

    #[test]
    fn test_edge_without_loopback_is_an_error() {
        let mut pe1 = Device::new("PE1", Role::Edge, 100);
        pe1.interfaces.clear();
        let mut topo = topology(vec![pe1]);
        let err = derive_ibgp(&mut topo, 100).unwrap_err();
        assert!(matches!(err, TopologyError::MissingLoopback(name) if name == "PE1"));
    }
}
