//! Finalized per-device records.
//!
//! A [`DeviceRecord`] is the exact structure handed to the renderer: device
//! identity, interfaces in name order and every routing annotation. Records
//! are built once after the routing pass and never modified afterwards.

use crate::routing::RoutingAnnotations;
use crate::topology::{Device, InterfaceKind, Role, Topology};
use serde::Serialize;
use std::net::Ipv4Addr;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InterfaceRecord {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: Option<InterfaceKind>,
    pub ip_address: Option<Ipv4Addr>,
    pub subnet_mask: Option<Ipv4Addr>,
    pub neighbors: Vec<String>,
    pub client: Option<String>,
    pub vrf: Option<String>,
    /// Runs MPLS (backbone interfaces of provider devices)
    pub mpls: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceRecord {
    pub hostname: String,
    pub role: Role,
    pub client: Option<String>,
    #[serde(rename = "BGP_asn")]
    pub bgp_asn: u32,
    pub is_route_reflector: bool,
    /// Loopback address on provider devices
    pub router_id: Option<Ipv4Addr>,
    pub interfaces: Vec<InterfaceRecord>,
    #[serde(flatten)]
    pub routing: RoutingAnnotations,
}

impl DeviceRecord {
    pub fn from_device(device: &Device) -> Self {
        let interfaces = device
            .interfaces
            .iter()
            .map(|(name, iface)| InterfaceRecord {
                name: name.clone(),
                kind: iface.kind,
                ip_address: iface.ip_address,
                subnet_mask: iface.subnet_mask,
                neighbors: iface.neighbors.clone(),
                client: iface.client.clone(),
                vrf: iface.vrf.clone(),
                mpls: device.routing.mpls_interfaces.contains(name),
            })
            .collect();

        DeviceRecord {
            hostname: device.hostname.clone(),
            role: device.role,
            client: device.client.clone(),
            bgp_asn: device.bgp_asn,
            is_route_reflector: device.is_route_reflector,
            router_id: device.loopback_address(),
            interfaces,
            routing: device.routing.clone(),
        }
    }
}

/// One record per device, provider devices first, each group by hostname
pub fn finalize(topology: &Topology) -> Vec<DeviceRecord> {
    topology.devices().map(DeviceRecord::from_device).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::{Interface, LOOPBACK_INTERFACE};

    #[test]
    fn test_record_merges_identity_and_annotations() {
        let mut pe1 = Device::new("PE1", Role::Edge, 100);
        pe1.interfaces.insert(
            LOOPBACK_INTERFACE.to_string(),
            Interface {
                ip_address: Some(Ipv4Addr::new(1, 1, 1, 1)),
                subnet_mask: Some(Ipv4Addr::BROADCAST),
                kind: Some(InterfaceKind::Loopback),
                ..Default::default()
            },
        );
        pe1.interfaces.insert(
            "g1/0".to_string(),
            Interface {
                kind: Some(InterfaceKind::Backbone),
                ..Interface::with_neighbors(vec!["P1".to_string()])
            },
        );
        pe1.routing.mpls_interfaces = vec!["g1/0".to_string()];

        let mut topology = Topology::default();
        topology.provider.insert("PE1".to_string(), pe1);
        topology
            .clients
            .insert("CE1".to_string(), Device::new("CE1", Role::Client, 65001));

        let records = finalize(&topology);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].hostname, "PE1");
        assert_eq!(records[0].router_id, Some(Ipv4Addr::new(1, 1, 1, 1)));
        assert_eq!(records[0].interfaces[0].name, "g1/0");
        assert!(records[0].interfaces[0].mpls);
        assert!(!records[0].interfaces[1].mpls);
        assert_eq!(records[1].router_id, None);

        let value = serde_json::to_value(&records[0]).unwrap();
        assert_eq!(value["role"], "edge");
        assert_eq!(value["BGP_asn"], 100);
        assert_eq!(value["interfaces"][0]["type"], "backbone");
        assert_eq!(value["mpls_interfaces"][0], "g1/0");
    }
}
