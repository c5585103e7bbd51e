//! Subnet allocation from an address pool.
//!
//! One [`SubnetAllocator`] exists per pool. It carves the smallest subnet
//! that fits each request out of its base block, first fit in address
//! order, never overlapping anything it reserved before.

use crate::utils::ip_utils::{block_size, parse_cidr};
use ipnetwork::Ipv4Network;
use log::{debug, warn};
use std::collections::BTreeMap;
use std::net::Ipv4Addr;

/// Smallest prefix ever handed out for a link
const MAX_LINK_PREFIX: u8 = 30;

/// Errors raised while reserving addresses
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AllocationError {
    #[error("Address pool {pool} exhausted: no free /{prefix} left for {hosts} hosts")]
    PoolExhausted {
        pool: Ipv4Network,
        prefix: u8,
        hosts: usize,
    },

    #[error("No IPv4 subnet can hold {0} hosts")]
    HostCountTooLarge(usize),

    #[error("Subnet {subnet} has {available} usable addresses, {needed} members")]
    SubnetTooSmall {
        subnet: Ipv4Network,
        available: usize,
        needed: usize,
    },

    #[error("Loopback pool {pool} exhausted after {assigned} devices")]
    LoopbackPoolExhausted { pool: Ipv4Network, assigned: usize },

    #[error("Invalid address pool '{cidr}': {reason}")]
    InvalidPool { cidr: String, reason: String },
}

/// A request for one subnet, keyed by link id
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubnetRequest {
    pub link_id: usize,
    pub hosts: usize,
}

/// Allocator state for one address pool
#[derive(Debug, Clone)]
pub struct SubnetAllocator {
    base: Ipv4Network,
    reserved: Vec<Ipv4Network>,
}

impl SubnetAllocator {
    pub fn new(base: Ipv4Network) -> Self {
        // Host bits in the configured pool are ignored
        let base = Ipv4Network::new(base.network(), base.prefix()).unwrap_or(base);
        SubnetAllocator {
            base,
            reserved: Vec::new(),
        }
    }

    pub fn from_cidr(cidr: &str) -> Result<Self, AllocationError> {
        let base = parse_cidr(cidr).map_err(|reason| AllocationError::InvalidPool {
            cidr: cidr.to_string(),
            reason,
        })?;
        Ok(Self::new(base))
    }

    pub fn base(&self) -> Ipv4Network {
        self.base
    }

    /// Smallest prefix whose usable host count covers `hosts`.
    ///
    /// Counts below two are clamped to two, so a link never gets less than a /30.
    ///
    /// # Examples
    /// ```
    /// use netintent::ip::SubnetAllocator;
    ///
    /// assert_eq!(SubnetAllocator::prefix_for_hosts(2).unwrap(), 30);
    /// assert_eq!(SubnetAllocator::prefix_for_hosts(3).unwrap(), 29);
    /// assert_eq!(SubnetAllocator::prefix_for_hosts(0).unwrap(), 30);
    /// assert_eq!(SubnetAllocator::prefix_for_hosts(254).unwrap(), 24);
    /// ```
    pub fn prefix_for_hosts(hosts: usize) -> Result<u8, AllocationError> {
        let needed = hosts.max(2) as u64;
        let mut prefix = MAX_LINK_PREFIX;
        while block_size(prefix) - 2 < needed {
            if prefix == 0 {
                return Err(AllocationError::HostCountTooLarge(hosts));
            }
            prefix -= 1;
        }
        Ok(prefix)
    }

    /// Reserve the first free subnet that can hold `hosts` usable addresses
    pub fn reserve_one(&mut self, hosts: usize) -> Result<Ipv4Network, AllocationError> {
        let prefix = Self::prefix_for_hosts(hosts)?;
        let exhausted = AllocationError::PoolExhausted {
            pool: self.base,
            prefix,
            hosts,
        };

        if prefix < self.base.prefix() {
            return Err(exhausted);
        }

        let step = block_size(prefix);
        let end = u64::from(u32::from(self.base.broadcast()));
        let mut start = u64::from(u32::from(self.base.network()));

        while start + step - 1 <= end {
            let candidate = Ipv4Network::new(Ipv4Addr::from(start as u32), prefix)
                .map_err(|_| exhausted.clone())?;

            match self.reserved.iter().find(|r| r.overlaps(candidate)) {
                None => {
                    debug!("Reserved {} from pool {}", candidate, self.base);
                    self.reserved.push(candidate);
                    return Ok(candidate);
                }
                Some(taken) => {
                    // Skip past the block that is in the way, staying aligned
                    let past = u64::from(u32::from(taken.broadcast())) + 1;
                    let aligned = past.div_ceil(step) * step;
                    start = aligned.max(start + step);
                }
            }
        }

        Err(exhausted)
    }

    /// Reserve a subnet for every request, largest first.
    ///
    /// Requests are handled in `(hosts desc, link id asc)` order to limit
    /// fragmentation. A failed request is reported in the result and does
    /// not stop the others.
    pub fn reserve(
        &mut self,
        requests: &[SubnetRequest],
    ) -> BTreeMap<usize, Result<Ipv4Network, AllocationError>> {
        let mut ordered = requests.to_vec();
        ordered.sort_by(|a, b| b.hosts.cmp(&a.hosts).then(a.link_id.cmp(&b.link_id)));

        let mut results = BTreeMap::new();
        for request in ordered {
            let result = self.reserve_one(request.hosts);
            if let Err(e) = &result {
                warn!("Link {}: {}", request.link_id, e);
            }
            results.insert(request.link_id, result);
        }
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn net(cidr: &str) -> Ipv4Network {
        parse_cidr(cidr).unwrap()
    }

    #[test]
    fn test_prefix_sizing() {
        assert_eq!(SubnetAllocator::prefix_for_hosts(1).unwrap(), 30);
        assert_eq!(SubnetAllocator::prefix_for_hosts(2).unwrap(), 30);
        assert_eq!(SubnetAllocator::prefix_for_hosts(6).unwrap(), 29);
        assert_eq!(SubnetAllocator::prefix_for_hosts(7).unwrap(), 28);
        assert_eq!(SubnetAllocator::prefix_for_hosts(9).unwrap(), 28);
        assert!(SubnetAllocator::prefix_for_hosts(usize::MAX).is_err());
    }

    #[test]
    fn test_first_fit_in_address_order() {
        let mut allocator = SubnetAllocator::from_cidr("10.0.0.0/24").unwrap();
        assert_eq!(allocator.reserve_one(2).unwrap(), net("10.0.0.0/30"));
        assert_eq!(allocator.reserve_one(2).unwrap(), net("10.0.0.4/30"));
        assert_eq!(allocator.reserve_one(3).unwrap(), net("10.0.0.8/29"));
        assert_eq!(allocator.reserve_one(2).unwrap(), net("10.0.0.16/30"));
    }

    #[test]
    fn test_largest_request_first() {
        let mut allocator = SubnetAllocator::from_cidr("10.0.0.0/24").unwrap();
        let requests = [
            SubnetRequest { link_id: 0, hosts: 2 },
            SubnetRequest { link_id: 1, hosts: 3 },
            SubnetRequest { link_id: 2, hosts: 9 },
            SubnetRequest { link_id: 3, hosts: 2 },
        ];
        let results = allocator.reserve(&requests);

        assert_eq!(results[&2].as_ref().unwrap(), &net("10.0.0.0/28"));
        assert_eq!(results[&1].as_ref().unwrap(), &net("10.0.0.16/29"));
        assert_eq!(results[&0].as_ref().unwrap(), &net("10.0.0.24/30"));
        assert_eq!(results[&3].as_ref().unwrap(), &net("10.0.0.28/30"));
    }

    #[test]
    fn test_no_overlap_and_enough_hosts() {
        let mut allocator = SubnetAllocator::from_cidr("10.1.0.0/22").unwrap();
        let requests: Vec<SubnetRequest> = (0..40)
            .map(|i| SubnetRequest { link_id: i, hosts: 2 + (i * 7) % 20 })
            .collect();
        let results = allocator.reserve(&requests);

        let subnets: Vec<Ipv4Network> = results.values().map(|r| *r.as_ref().unwrap()).collect();
        for (i, a) in subnets.iter().enumerate() {
            for b in subnets.iter().skip(i + 1) {
                assert!(!a.overlaps(*b), "{} overlaps {}", a, b);
            }
        }
        for request in &requests {
            let subnet = results[&request.link_id].as_ref().unwrap();
            assert!(u64::from(subnet.size()) - 2 >= request.hosts as u64);
            assert!(allocator.base().contains(subnet.network()));
        }
    }

    #[test]
    fn test_pool_exhaustion_is_per_request() {
        let mut allocator = SubnetAllocator::from_cidr("10.0.0.0/29").unwrap();
        let requests = [
            SubnetRequest { link_id: 0, hosts: 2 },
            SubnetRequest { link_id: 1, hosts: 2 },
            SubnetRequest { link_id: 2, hosts: 2 },
        ];
        let results = allocator.reserve(&requests);
        assert!(results[&0].is_ok());
        assert!(results[&1].is_ok());
        assert!(matches!(
            results[&2],
            Err(AllocationError::PoolExhausted { prefix: 30, hosts: 2, .. })
        ));
    }

    #[test]
    fn test_request_larger_than_pool() {
        let mut allocator = SubnetAllocator::from_cidr("10.0.0.0/30").unwrap();
        assert!(allocator.reserve_one(3).is_err());
        assert!(allocator.reserve_one(2).is_ok());
    }

    #[test]
    fn test_pool_host_bits_ignored() {
        let mut allocator = SubnetAllocator::from_cidr("10.0.0.77/24").unwrap();
        assert_eq!(allocator.base(), net("10.0.0.0/24"));
        assert_eq!(allocator.reserve_one(2).unwrap(), net("10.0.0.0/30"));
    }
}
