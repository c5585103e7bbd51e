//! IP address allocation module.
//!
//! Handles subnet reservation per address pool (provider links, client
//! links), the mapping of link members onto host addresses, and loopback
//! assignment for provider devices.

pub mod addressing;
pub mod allocator;

pub use addressing::{
    allocate_link_subnets, allocate_loopbacks, apply_addresses, assign_addresses,
    verify_addressing, AddressPlan, Subnet,
};
pub use allocator::{AllocationError, SubnetAllocator, SubnetRequest};
