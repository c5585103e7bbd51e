//! Routing derivation module.
//!
//! Annotation pass over the fully addressed topology. Computes OSPF
//! advertisements and MPLS interfaces for the backbone, the iBGP session
//! layout between provider edges, and eBGP sessions with VRF bookkeeping
//! between edges and client routers. No device or interface is created here.

pub mod ebgp;
pub mod ibgp;
pub mod ospf;

use crate::topology::{Topology, TopologyError};
use crate::utils::ip_utils::CidrParts;
use log::info;
use serde::Serialize;
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

pub use ebgp::derive_ebgp;
pub use ibgp::derive_ibgp;
pub use ospf::derive_ospf;

/// Update source used for every iBGP session
pub const IBGP_UPDATE_SOURCE: &str = "Loopback0";

/// One OSPF `network` statement
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OspfNetwork {
    pub address: Ipv4Addr,
    pub wildcard_mask: Ipv4Addr,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IbgpNeighbor {
    pub hostname: String,
    /// Loopback address of the peer
    pub address: Ipv4Addr,
    pub remote_as: u32,
    pub update_source: String,
    /// Set on a reflector's sessions towards its clients
    pub route_reflector_client: bool,
}

/// eBGP session from an edge towards a client router
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EbgpNeighbor {
    pub address: Ipv4Addr,
    pub remote_as: u32,
    pub vrf: String,
    pub hostname: String,
    /// Local interface facing the client
    pub interface: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VrfEntry {
    pub name: String,
    pub rd: u32,
    pub client: String,
    pub remote_as: u32,
}

/// The single provider-side peer of a client router
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EbgpPeer {
    pub address: Ipv4Addr,
    pub remote_as: u32,
    pub hostname: String,
    pub interface: String,
}

/// Fields attached to a device by the routing pass.
///
/// Empty until [`derive_routing`] has run. Lists stay present (possibly
/// empty) in serialized output so templates can loop without guards.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RoutingAnnotations {
    pub ospf_networks: Vec<OspfNetwork>,
    pub mpls_interfaces: Vec<String>,
    #[serde(rename = "iBGP_neighbors")]
    pub ibgp_neighbors: Vec<IbgpNeighbor>,
    #[serde(rename = "eBGP_neighbors")]
    pub ebgp_neighbors: Vec<EbgpNeighbor>,
    pub vrfs: Vec<VrfEntry>,
    #[serde(rename = "bgp_advertise")]
    pub advertised_networks: Vec<CidrParts>,
    #[serde(rename = "eBGP_peer")]
    pub ebgp_peer: Option<EbgpPeer>,
}

/// Scope of the route-distinguisher counter
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RdScope {
    /// Every edge numbers its VRFs from 1
    #[default]
    PerEdge,
    /// One counter shared by all edges, in hostname order
    Global,
}

impl FromStr for RdScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "per-edge" | "per_edge" | "edge" => Ok(RdScope::PerEdge),
            "global" => Ok(RdScope::Global),
            other => Err(format!(
                "Unknown RD scope '{}', expected 'per-edge' or 'global'",
                other
            )),
        }
    }
}

impl fmt::Display for RdScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RdScope::PerEdge => f.write_str("per-edge"),
            RdScope::Global => f.write_str("global"),
        }
    }
}

/// Counts reported after the routing pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RoutingSummary {
    pub ospf_networks: usize,
    pub ibgp_sessions: usize,
    pub vrfs: usize,
    pub ebgp_sessions: usize,
}

/// Run every routing pass over an addressed, classified topology
pub fn derive_routing(
    topology: &mut Topology,
    provider_asn: u32,
    rd_scope: RdScope,
) -> Result<RoutingSummary, TopologyError> {
    let ospf_networks = derive_ospf(topology)?;
    let ibgp_sessions = derive_ibgp(topology, provider_asn)?;
    let (vrfs, ebgp_sessions) = derive_ebgp(topology, provider_asn, rd_scope)?;

    let summary = RoutingSummary {
        ospf_networks,
        ibgp_sessions,
        vrfs,
        ebgp_sessions,
    };
    info!(
        "Routing derived: {} OSPF networks, {} iBGP sessions, {} VRFs ({} RD scope), {} eBGP sessions",
        summary.ospf_networks, summary.ibgp_sessions, summary.vrfs, rd_scope, summary.ebgp_sessions
    );
    Ok(summary)
}
