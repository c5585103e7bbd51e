//! OSPF advertisements and MPLS interfaces for provider devices.

use super::OspfNetwork;
use crate::topology::{InterfaceKind, Topology, TopologyError};
use crate::utils::ip_utils::{network_address, wildcard_mask};
use log::debug;
use std::net::Ipv4Addr;

/// Fill `ospf_networks` and `mpls_interfaces` on every provider device.
///
/// The loopback is advertised as a host route; each backbone interface
/// advertises its link subnet and runs MPLS. Client-facing and statically
/// addressed interfaces take part in neither. Returns the number of advertisements produced.
pub fn derive_ospf(topology: &mut Topology) -> Result<usize, TopologyError> {
    let mut total = 0;

    for device in topology.provider.values_mut() {
        let mut networks = Vec::new();
        let mut mpls = Vec::new();

        for (name, iface) in &device.interfaces {
            match iface.kind {
                Some(InterfaceKind::Loopback) => {
                    let address = iface
                        .ip_address
                        .ok_or_else(|| TopologyError::MissingLoopback(device.hostname.clone()))?;
                    networks.push(OspfNetwork {
                        address,
                        wildcard_mask: Ipv4Addr::UNSPECIFIED,
                    });
                }
                Some(InterfaceKind::Backbone) => {
                    let (address, mask) = iface.ip_address.zip(iface.subnet_mask).ok_or_else(|| {
                        TopologyError::UnaddressedInterface {
                            device: device.hostname.clone(),
                            interface: name.clone(),
                        }
                    })?;
                    networks.push(OspfNetwork {
                        address: network_address(address, mask),
                        wildcard_mask: wildcard_mask(mask),
                    });
                    mpls.push(name.clone());
                }
                _ => {}
            }
        }

        debug!(
            "{}: {} OSPF networks, MPLS on {:?}",
            device.hostname,
            networks.len(),
            mpls
        );
        total += networks.len();
        device.routing.ospf_networks = networks;
        device.routing.mpls_interfaces = mpls;
    }

    Ok(total)
}
