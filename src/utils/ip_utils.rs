//! IPv4 helpers shared by the allocator, the routing deriver and the intent validator.

use ipnetwork::Ipv4Network;
use serde::Serialize;
use std::net::Ipv4Addr;

/// An address written in CIDR notation, split the way router configuration expects it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CidrParts {
    /// Address as written (host bits preserved)
    pub address: Ipv4Addr,
    /// Dotted-decimal subnet mask
    pub mask: Ipv4Addr,
    /// Original CIDR text
    pub cidr: String,
}

/// Parse an IPv4 CIDR string such as `10.0.0.0/24`.
///
/// A bare address is accepted and treated as a `/32`.
pub fn parse_cidr(cidr: &str) -> Result<Ipv4Network, String> {
    cidr.trim()
        .parse::<Ipv4Network>()
        .map_err(|e| format!("Invalid CIDR notation '{}': {}", cidr, e))
}

/// Split a CIDR string into address and dotted mask, keeping the host bits.
///
/// # Examples
/// ```
/// use netintent::utils::ip_utils::cidr_to_network;
///
/// let parts = cidr_to_network("192.168.1.1/24").unwrap();
/// assert_eq!(parts.address.to_string(), "192.168.1.1");
/// assert_eq!(parts.mask.to_string(), "255.255.255.0");
/// assert!(cidr_to_network("192.168.1.1/33").is_err());
/// ```
pub fn cidr_to_network(cidr: &str) -> Result<CidrParts, String> {
    let network = parse_cidr(cidr)?;
    Ok(CidrParts {
        address: network.ip(),
        mask: network.mask(),
        cidr: cidr.trim().to_string(),
    })
}

/// Wildcard (inverse) mask, as used in OSPF `network` statements
pub fn wildcard_mask(mask: Ipv4Addr) -> Ipv4Addr {
    Ipv4Addr::from(!u32::from(mask))
}

/// Network address of `address` under `mask`
pub fn network_address(address: Ipv4Addr, mask: Ipv4Addr) -> Ipv4Addr {
    Ipv4Addr::from(u32::from(address) & u32::from(mask))
}

/// Number of addresses covered by a prefix length, before any network exists.
///
/// u64 so that /0 fits.
pub fn block_size(prefix: u8) -> u64 {
    1u64 << (32 - u32::from(prefix.min(32)))
}

/// Usable host addresses of a network in ascending order.
///
/// Network and broadcast addresses are excluded except for `/31` and `/32`,
/// where every address is usable.
pub fn usable_hosts(network: &Ipv4Network) -> impl Iterator<Item = Ipv4Addr> {
    let all_usable = network.prefix() >= 31;
    let (first, last) = (network.network(), network.broadcast());
    network
        .iter()
        .filter(move |address| all_usable || (*address != first && *address != last))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wildcard_and_network() {
        let mask = Ipv4Addr::new(255, 255, 255, 252);
        assert_eq!(wildcard_mask(mask), Ipv4Addr::new(0, 0, 0, 3));
        assert_eq!(wildcard_mask(Ipv4Addr::BROADCAST), Ipv4Addr::new(0, 0, 0, 0));
        assert_eq!(
            network_address(Ipv4Addr::new(10, 0, 0, 6), mask),
            Ipv4Addr::new(10, 0, 0, 4)
        );
    }

    #[test]
    fn test_usable_hosts() {
        let net = parse_cidr("10.0.0.0/30").unwrap();
        let hosts: Vec<_> = usable_hosts(&net).collect();
        assert_eq!(hosts, vec![Ipv4Addr::new(10, 0, 0, 1), Ipv4Addr::new(10, 0, 0, 2)]);

        let single = parse_cidr("1.1.1.1/32").unwrap();
        assert_eq!(usable_hosts(&single).count(), 1);

        let pair = parse_cidr("10.0.0.4/31").unwrap();
        assert_eq!(usable_hosts(&pair).count(), 2);
        assert_eq!(usable_hosts(&parse_cidr("10.0.0.0/29").unwrap()).count(), 6);
    }

    #[test]
    fn test_cidr_to_network_rejects_garbage() {
        assert!(cidr_to_network("not-a-network").is_err());
        assert!(cidr_to_network("10.0.0.0/24").is_ok());
    }
}
