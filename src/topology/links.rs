//! L2 link discovery.
//!
//! Every interface with neighbors describes a segment whose members are the
//! owning device plus those neighbors. Two declarations with the same member
//! set are the same link, whatever order or shape they were written in.

use super::types::{Device, Link, LinkZone};
use super::Topology;
use log::{debug, info};
use std::collections::BTreeSet;

/// Discover the deduplicated set of links across all devices.
///
/// Devices are scanned provider first, then clients, each by hostname, and
/// interfaces by name; link ids follow that order. Neighbor names that match
/// no device are kept as members and reported later, when the link is
/// addressed.
pub fn discover_links(topology: &Topology) -> Vec<Link> {
    let mut seen: BTreeSet<Vec<String>> = BTreeSet::new();
    let mut links = Vec::new();

    for device in topology.devices() {
        for (if_name, iface) in &device.interfaces {
            let members = member_set(device, &iface.neighbors);
            if members.len() < 2 || seen.contains(&members) {
                continue;
            }
            seen.insert(members.clone());

            let zone = if members.iter().all(|m| topology.is_provider(m)) {
                LinkZone::Provider
            } else {
                LinkZone::Client
            };

            let link = Link {
                id: links.len(),
                members,
                zone,
                declared_by: (device.hostname.clone(), if_name.clone()),
            };
            debug!("Link {} ({:?}): {}", link.id, link.zone, link.label());
            links.push(link);
        }
    }

    info!("Discovered {} L2 links", links.len());
    links
}

/// Interface of `device` that sits on `link`, if any
pub fn interface_on_link<'a>(device: &'a Device, link: &Link) -> Option<&'a str> {
    device
        .interfaces
        .iter()
        .find(|(_, iface)| {
            !iface.neighbors.is_empty() && member_set(device, &iface.neighbors) == link.members
        })
        .map(|(name, _)| name.as_str())
}

fn member_set(device: &Device, neighbors: &[String]) -> Vec<String> {
    let mut members: BTreeSet<&str> = neighbors.iter().map(String::as_str).collect();
    if members.is_empty() {
        return Vec::new();
    }
    members.insert(device.hostname.as_str());
    members.into_iter().map(str::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::{Interface, Role};

    fn device(name: &str, role: Role, interfaces: &[(&str, &[&str])]) -> Device {
        let mut device = Device::new(name, role, 100);
        for (if_name, neighbors) in interfaces {
            let neighbors = neighbors.iter().map(|n| n.to_string()).collect();
            device
                .interfaces
                .insert(if_name.to_string(), Interface::with_neighbors(neighbors));
        }
        device
    }

    fn topology(devices: Vec<Device>) -> Topology {
        let mut topology = Topology::default();
        for d in devices {
            if d.role == Role::Client {
                topology.clients.insert(d.hostname.clone(), d);
            } else {
                topology.provider.insert(d.hostname.clone(), d);
            }
        }
        topology
    }

    #[test]
    fn test_point_to_point_deduplicated() {
        let topo = topology(vec![
            device("P1", Role::Backbone, &[("g1", &["P2"])]),
            device("P2", Role::Backbone, &[("g1", &["P1"])]),
        ]);
        let links = discover_links(&topo);
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].members, vec!["P1", "P2"]);
        assert_eq!(links[0].zone, LinkZone::Provider);
        assert_eq!(links[0].declared_by, ("P1".to_string(), "g1".to_string()));
    }

    #[test]
    fn test_shared_segment_is_one_link() {
        let topo = topology(vec![
            device("P1", Role::Backbone, &[("g1", &["P2", "P3"])]),
            device("P2", Role::Backbone, &[("g1", &["P3", "P1"])]),
            device("P3", Role::Backbone, &[("g1", &["P1", "P2"])]),
        ]);
        let links = discover_links(&topo);
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].members, vec!["P1", "P2", "P3"]);

        let p2 = &topo.provider["P2"];
        assert_eq!(interface_on_link(p2, &links[0]), Some("g1"));
    }

    #[test]
    fn test_client_zone_and_ids() {
        let topo = topology(vec![
            device("PE1", Role::Edge, &[("g1", &["P1"]), ("g2", &["CE1"])]),
            device("P1", Role::Backbone, &[("g1", &["PE1"])]),
            device("CE1", Role::Client, &[("g1", &["PE1"])]),
        ]);
        let links = discover_links(&topo);
        assert_eq!(links.len(), 2);
        // P1 sorts before PE1, so its declaration comes first
        assert_eq!(links[0].members, vec!["P1", "PE1"]);
        assert_eq!(links[0].zone, LinkZone::Provider);
        assert_eq!(links[1].members, vec!["CE1", "PE1"]);
        assert_eq!(links[1].zone, LinkZone::Client);
        assert_eq!(links[1].id, 1);
    }

    #[test]
    fn test_dangling_neighbor_is_kept() {
        let topo = topology(vec![device("P1", Role::Edge, &[("g1", &["GHOST"])])]);
        let links = discover_links(&topo);
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].members, vec!["GHOST", "P1"]);
        assert_eq!(links[0].zone, LinkZone::Client);
    }
}
