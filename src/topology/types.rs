//! Topology type definitions.
//!
//! Devices, interfaces and links in their canonical (normalized) shape.
//! Every structure here serializes into the diagnostic model dump.

use crate::routing::RoutingAnnotations;
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::net::Ipv4Addr;

/// Name of the loopback interface created on every provider device
pub const LOOPBACK_INTERFACE: &str = "loopback0";

/// Piece of an interface name, see [`interface_order_key`]
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum NameSegment {
    Number(u64),
    Text(String),
}

/// Sort key for interface names with port numbers compared as numbers.
///
/// `GigabitEthernet2/0` orders before `GigabitEthernet10/0`.
pub fn interface_order_key(name: &str) -> Vec<NameSegment> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut in_digits = false;

    let mut flush = |current: &mut String, digits: bool| {
        if current.is_empty() {
            return;
        }
        let segment = match current.parse::<u64>() {
            Ok(n) if digits => NameSegment::Number(n),
            _ => NameSegment::Text(current.clone()),
        };
        segments.push(segment);
        current.clear();
    };

    for c in name.chars() {
        let digit = c.is_ascii_digit();
        if digit != in_digits {
            flush(&mut current, in_digits);
            in_digits = digit;
        }
        current.push(c);
    }
    flush(&mut current, in_digits);

    segments
}

/// Role of a device in the network
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Provider router with only provider-facing interfaces
    Backbone,
    /// Provider router with at least one interface facing outside the backbone
    Edge,
    /// Router owned by a client network
    Client,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Role::Backbone => "backbone",
            Role::Edge => "edge",
            Role::Client => "client",
        };
        f.write_str(name)
    }
}

/// Classification of an interface after addressing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InterfaceKind {
    Loopback,
    /// Provider interface whose neighbors are all provider devices
    Backbone,
    /// Provider interface facing a client router
    Client,
    /// Client interface (faces the provider)
    Provider,
    /// Provider interface with a static address and no neighbors
    Unmanaged,
}

/// Which subnet an interface address comes from.
///
/// `Unmanaged` marks a statically addressed interface that takes no part in
/// allocation. It is written as `-1` in the model dump.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubnetBinding {
    Link(usize),
    Unmanaged,
}

impl Serialize for SubnetBinding {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            SubnetBinding::Link(id) => serializer.serialize_u64(*id as u64),
            SubnetBinding::Unmanaged => serializer.serialize_i64(-1),
        }
    }
}

/// Interface in canonical shape
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Interface {
    /// Neighbor hostnames, declaration order, no duplicates
    pub neighbors: Vec<String>,
    pub subnet_id: Option<SubnetBinding>,
    pub ip_address: Option<Ipv4Addr>,
    pub subnet_mask: Option<Ipv4Addr>,
    #[serde(rename = "type")]
    pub kind: Option<InterfaceKind>,
    /// Owning client of the peer, provider interfaces facing a client only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client: Option<String>,
    /// VRF the interface is bound to, edge interfaces facing a client only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vrf: Option<String>,
}

impl Interface {
    /// Interface with a neighbor set and no address yet
    pub fn with_neighbors(neighbors: Vec<String>) -> Self {
        let mut unique: Vec<String> = Vec::with_capacity(neighbors.len());
        for name in neighbors {
            if !unique.contains(&name) {
                unique.push(name);
            }
        }
        Interface {
            neighbors: unique,
            ..Default::default()
        }
    }

    /// Statically addressed interface outside allocation
    pub fn unmanaged(address: Ipv4Addr, mask: Ipv4Addr) -> Self {
        Interface {
            subnet_id: Some(SubnetBinding::Unmanaged),
            ip_address: Some(address),
            subnet_mask: Some(mask),
            ..Default::default()
        }
    }

    pub fn is_addressed(&self) -> bool {
        self.ip_address.is_some() && self.subnet_mask.is_some()
    }
}

/// A router in the provider backbone or in a client network
#[derive(Debug, Clone, Serialize)]
pub struct Device {
    pub hostname: String,
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client: Option<String>,
    #[serde(rename = "BGP_asn")]
    pub bgp_asn: u32,
    pub is_route_reflector: bool,
    pub interfaces: BTreeMap<String, Interface>,
    /// Networks a client router announces, as written in the intent
    #[serde(rename = "eBGP_advertized_networks", skip_serializing_if = "Vec::is_empty")]
    pub advertised_cidrs: Vec<String>,
    #[serde(flatten)]
    pub routing: RoutingAnnotations,
}

impl Device {
    pub fn new(hostname: &str, role: Role, bgp_asn: u32) -> Self {
        Device {
            hostname: hostname.to_string(),
            role,
            client: None,
            bgp_asn,
            is_route_reflector: false,
            interfaces: BTreeMap::new(),
            advertised_cidrs: Vec::new(),
            routing: RoutingAnnotations::default(),
        }
    }

    /// Address of `loopback0`, once allocated
    pub fn loopback_address(&self) -> Option<Ipv4Addr> {
        self.interfaces
            .get(LOOPBACK_INTERFACE)
            .and_then(|iface| iface.ip_address)
    }
}

/// Which pool a link draws its subnet from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkZone {
    /// Every member is a provider device
    Provider,
    /// The link crosses the provider/client boundary
    Client,
}

/// An L2 segment shared by two or more devices
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Link {
    pub id: usize,
    /// Member hostnames, ascending
    pub members: Vec<String>,
    pub zone: LinkZone,
    /// Device and interface on which the link was first seen
    pub declared_by: (String, String),
}

impl Link {
    pub fn label(&self) -> String {
        self.members.join("<->")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interface_order_is_numeric() {
        let mut names = vec![
            "GigabitEthernet10/0",
            "GigabitEthernet2/0",
            "GigabitEthernet2/10",
            "GigabitEthernet2/2",
            "FastEthernet0/0",
        ];
        names.sort_by_key(|n| interface_order_key(n));
        assert_eq!(
            names,
            vec![
                "FastEthernet0/0",
                "GigabitEthernet2/0",
                "GigabitEthernet2/2",
                "GigabitEthernet2/10",
                "GigabitEthernet10/0",
            ]
        );
    }
}
