//! Shared utilities: IPv4 prefix and mask helpers.

pub mod ip_utils;

pub use ip_utils::{cidr_to_network, parse_cidr, CidrParts};
