//! Network topology module.
//!
//! Turns the intent document into canonical device records: interface
//! normalization, role tagging, interface classification and L2 link
//! discovery. Device and interface identity is fixed here; later phases only
//! attach addresses and routing annotations.

pub mod builder;
pub mod links;
pub mod types;

pub use builder::{assign_roles, classify_interfaces, normalize_client, normalize_provider};
pub use links::{discover_links, interface_on_link};
pub use types::{
    interface_order_key, Device, Interface, InterfaceKind, Link, LinkZone, NameSegment, Role,
    SubnetBinding, LOOPBACK_INTERFACE,
};

use std::collections::BTreeMap;

/// All devices of the network, split by zone, plus the discovered links
#[derive(Debug, Clone, Default)]
pub struct Topology {
    pub provider: BTreeMap<String, Device>,
    pub clients: BTreeMap<String, Device>,
    pub links: Vec<Link>,
}

impl Topology {
    pub fn device_mut(&mut self, hostname: &str) -> Option<&mut Device> {
        match self.provider.get_mut(hostname) {
            Some(device) => Some(device),
            None => self.clients.get_mut(hostname),
        }
    }

    pub fn is_provider(&self, hostname: &str) -> bool {
        self.provider.contains_key(hostname)
    }

    pub fn is_known(&self, hostname: &str) -> bool {
        self.provider.contains_key(hostname) || self.clients.contains_key(hostname)
    }

    /// Provider devices first, then client devices, each by hostname
    pub fn devices(&self) -> impl Iterator<Item = &Device> {
        self.provider.values().chain(self.clients.values())
    }
}

/// Inconsistencies in the described network.
///
/// All of them are fatal: the derived state would be globally inconsistent.
#[derive(Debug, thiserror::Error)]
pub enum TopologyError {
    #[error("Interface {device}/{interface} references unknown device '{neighbor}'")]
    UnknownNeighbor {
        device: String,
        interface: String,
        neighbor: String,
    },

    #[error("Interface {device}/{interface} has neither neighbors nor a static address")]
    DetachedInterface { device: String, interface: String },

    #[error("Route reflector '{0}' is not a provider router")]
    UnknownRouteReflector(String),

    #[error("Link {link} has no matching interface on device '{device}'")]
    MissingLinkInterface { link: String, device: String },

    #[error("Interface {device}/{interface} has no address (its link could not be allocated)")]
    UnaddressedInterface { device: String, interface: String },

    #[error("Provider device '{0}' has no loopback address")]
    MissingLoopback(String),

    #[error("Interface {device}/{interface} has an invalid static address: {reason}")]
    InvalidAddress {
        device: String,
        interface: String,
        reason: String,
    },

    #[error("Edge interface {device}/{interface} must face exactly one client router, found {found}")]
    AmbiguousClientPeer {
        device: String,
        interface: String,
        found: usize,
    },

    #[error("Client router '{router}' has no interface on link {link}")]
    ClientInterfaceMissing { router: String, link: String },

    #[error("Client router '{router}' must attach to exactly one provider interface, found {found}")]
    ClientAttachment { router: String, found: usize },
}
