//! Link and loopback addressing.
//!
//! Draws one subnet per discovered link from the pool of its zone, maps the
//! link members onto host addresses, then writes those addresses back onto
//! the member interfaces.

use super::allocator::{AllocationError, SubnetAllocator, SubnetRequest};
use crate::topology::{
    interface_on_link, Interface, InterfaceKind, Link, LinkZone, SubnetBinding, Topology,
    TopologyError, LOOPBACK_INTERFACE,
};
use crate::utils::ip_utils::usable_hosts;
use ipnetwork::Ipv4Network;
use log::{debug, info, warn};
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::net::Ipv4Addr;

/// A subnet reserved for one link
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Subnet {
    /// Id of the link this subnet addresses
    pub id: usize,
    pub zone: LinkZone,
    #[serde(serialize_with = "serialize_network")]
    pub network: Ipv4Network,
    pub mask: Ipv4Addr,
    /// Member hostname to host address
    pub hosts: BTreeMap<String, Ipv4Addr>,
}

fn serialize_network<S: Serializer>(network: &Ipv4Network, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(network)
}

/// Outcome of link allocation across both pools
#[derive(Debug, Clone, Default)]
pub struct AddressPlan {
    /// Reserved subnets, by link id
    pub subnets: Vec<Subnet>,
    /// Links that could not be addressed, by link id
    pub failures: BTreeMap<usize, AllocationError>,
}

impl AddressPlan {
    pub fn subnet(&self, link_id: usize) -> Option<&Subnet> {
        self.subnets.iter().find(|s| s.id == link_id)
    }
}

/// Give every provider device a `loopback0` /32, in hostname order
pub fn allocate_loopbacks(
    topology: &mut Topology,
    pool: &Ipv4Network,
) -> Result<usize, AllocationError> {
    let mut hosts = usable_hosts(pool);
    let mut assigned = 0;

    for device in topology.provider.values_mut() {
        let address = hosts
            .next()
            .ok_or(AllocationError::LoopbackPoolExhausted {
                pool: *pool,
                assigned,
            })?;

        let loopback = Interface {
            ip_address: Some(address),
            subnet_mask: Some(Ipv4Addr::BROADCAST),
            kind: Some(InterfaceKind::Loopback),
            ..Default::default()
        };
        debug!("{}: {} = {}/32", device.hostname, LOOPBACK_INTERFACE, address);
        device
            .interfaces
            .insert(LOOPBACK_INTERFACE.to_string(), loopback);
        assigned += 1;
    }

    info!("Assigned {} loopback addresses from {}", assigned, pool);
    Ok(assigned)
}

/// Map members onto the usable hosts of `network`, ascending, in the order given
pub fn assign_addresses(
    network: &Ipv4Network,
    members: &[String],
) -> Result<BTreeMap<String, Ipv4Addr>, AllocationError> {
    let available = usable_hosts(network).count();
    if available < members.len() {
        return Err(AllocationError::SubnetTooSmall {
            subnet: *network,
            available,
            needed: members.len(),
        });
    }

    Ok(members
        .iter()
        .cloned()
        .zip(usable_hosts(network))
        .collect())
}

/// Reserve a subnet for every link from the pool matching its zone.
///
/// A link that cannot be served is recorded in [`AddressPlan::failures`] and
/// left unaddressed; the other links are unaffected.
pub fn allocate_link_subnets(
    links: &[Link],
    provider_pool: &mut SubnetAllocator,
    client_pool: &mut SubnetAllocator,
) -> AddressPlan {
    let requests = |zone: LinkZone| -> Vec<SubnetRequest> {
        links
            .iter()
            .filter(|l| l.zone == zone)
            .map(|l| SubnetRequest {
                link_id: l.id,
                hosts: l.members.len(),
            })
            .collect()
    };

    let mut reserved = provider_pool.reserve(&requests(LinkZone::Provider));
    reserved.extend(client_pool.reserve(&requests(LinkZone::Client)));

    let mut plan = AddressPlan::default();
    for link in links {
        let Some(result) = reserved.remove(&link.id) else {
            continue;
        };
        let subnet = result.and_then(|network| {
            let hosts = assign_addresses(&network, &link.members)?;
            Ok(Subnet {
                id: link.id,
                zone: link.zone,
                network,
                mask: network.mask(),
                hosts,
            })
        });

        match subnet {
            Ok(subnet) => {
                debug!("Link {} ({}) -> {}", link.id, link.label(), subnet.network);
                plan.subnets.push(subnet);
            }
            Err(e) => {
                warn!("Link {} ({}) left unaddressed: {}", link.id, link.label(), e);
                plan.failures.insert(link.id, e);
            }
        }
    }

    info!(
        "Reserved {} link subnets ({} failed)",
        plan.subnets.len(),
        plan.failures.len()
    );
    plan
}

/// Write the planned addresses onto the member interfaces of every link.
///
/// Every link member must be a known device with an interface on that link.
/// Links without a subnet are skipped here and caught by [`verify_addressing`].
pub fn apply_addresses(topology: &mut Topology, plan: &AddressPlan) -> Result<(), TopologyError> {
    let links = topology.links.clone();

    for link in &links {
        if let Some(missing) = link.members.iter().find(|m| !topology.is_known(m)) {
            return Err(TopologyError::UnknownNeighbor {
                device: link.declared_by.0.clone(),
                interface: link.declared_by.1.clone(),
                neighbor: missing.clone(),
            });
        }

        let Some(subnet) = plan.subnet(link.id) else {
            continue;
        };

        for (member, address) in &subnet.hosts {
            let device = topology
                .device_mut(member)
                .ok_or_else(|| TopologyError::MissingLinkInterface {
                    link: link.label(),
                    device: member.clone(),
                })?;
            let if_name = interface_on_link(device, link)
                .map(str::to_string)
                .ok_or_else(|| TopologyError::MissingLinkInterface {
                    link: link.label(),
                    device: member.clone(),
                })?;

            if let Some(iface) = device.interfaces.get_mut(&if_name) {
                iface.subnet_id = Some(SubnetBinding::Link(link.id));
                iface.ip_address = Some(*address);
                iface.subnet_mask = Some(subnet.mask);
            }
        }
    }

    Ok(())
}

/// Every interface that faces a neighbor must carry an address by now
pub fn verify_addressing(topology: &Topology) -> Result<(), TopologyError> {
    for device in topology.devices() {
        for (name, iface) in &device.interfaces {
            if !iface.neighbors.is_empty() && !iface.is_addressed() {
                return Err(TopologyError::UnaddressedInterface {
                    device: device.hostname.clone(),
                    interface: name.clone(),
                });
            }
        }
    }
    Ok(())
}
