//! # Netintent - Network-intent compiler for MPLS provider backbones
//!
//! This library turns a declarative description of a provider backbone and
//! the client networks attached to it into one vendor-syntax configuration
//! file per router.
//!
//! ## Overview
//!
//! The intent document only says which router interface faces which
//! neighbor. Everything else is derived: link subnets and loopbacks, OSPF
//! and MPLS on the backbone, the iBGP layout between edges (full mesh or
//! route reflectors), and eBGP sessions towards clients with one VRF per
//! client on every edge.
//!
//! ## Architecture
//!
//! The library is organized into several modules, in pipeline order:
//!
//! - `intent`: Intent document types, loading and validation
//! - `topology`: Interface normalization, role tagging, link discovery
//! - `ip`: Subnet and loopback allocation from the configured pools
//! - `routing`: OSPF/MPLS, iBGP and eBGP/VRF derivation
//! - `render`: Finalized device records and parallel template rendering
//! - `orchestrator`: High-level orchestration of a compile run
//! - `utils`: IPv4 helpers
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use netintent::orchestrator::{compile_file, load_renderer, CompileOptions};
//! use std::path::Path;
//!
//! let options = CompileOptions::default();
//! let renderer = load_renderer(&options)?;
//! let report = compile_file(Path::new("intent.yaml"), &options, &renderer)?;
//!
//! // configs/ now contains:
//! // - devices.json: the fully resolved model
//! // - <hostname>.cfg: one configuration per router
//! assert!(report.is_success());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Intent Format
//!
//! ```yaml
//! provider:
//!   ip_range: "10.0.0.0/24"
//!   loopback_range: "1.1.1.0/24"
//!   BGP_asn: 100
//!   route_reflectors: [PE1]      # optional, single name or list
//!   routers:
//!     PE1:
//!       interfaces:
//!         GigabitEthernet1/0: P1          # bare hostname
//!         GigabitEthernet2/0: [CE1]       # list (shared segment)
//!     P1:
//!       interfaces:
//!         GigabitEthernet1/0: { neighbors: PE1 }
//! clients:
//!   global:
//!     ip_range: "172.16.0.0/24"
//!   ACME:
//!     routers:
//!       CE1:
//!         eBGP_asn: 65001
//!         eBGP_advertized_networks: ["192.168.1.0/24"]
//!         interfaces:
//!           GigabitEthernet1/0: PE1
//!         unmanaged_interfaces:
//!           GigabitEthernet2/0: "192.168.1.1/24"
//! ```
//!
//! ## Error Handling
//!
//! Each module reports failures through its own `thiserror` enum. Schema,
//! topology and allocation errors abort the run before anything is written;
//! render and write errors are collected per device in the
//! [`render::RenderReport`]. The binary wraps everything in `color_eyre`.

pub mod intent;
pub mod ip;
pub mod orchestrator;
pub mod render;
pub mod routing;
pub mod topology;
pub mod utils;
