//! Compile orchestrator.
//!
//! Coordinates the whole run: intent in, addressed and annotated topology
//! in the middle, model dump and per-device configuration files out. The
//! derivation phases run strictly in order on one thread; only rendering
//! fans out.

use crate::intent::{load_intent, Intent, SchemaError};
use crate::ip::{
    allocate_link_subnets, allocate_loopbacks, apply_addresses, verify_addressing,
    AllocationError, Subnet, SubnetAllocator,
};
use crate::render::{
    finalize, render_all, RenderError, RenderReport, Renderer, TemplateMap, TeraRenderer,
};
use crate::routing::{derive_routing, RdScope};
use crate::topology::{classify_interfaces, discover_links, Device, Topology, TopologyError};
use crate::utils::ip_utils::parse_cidr;
use log::{info, warn};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// File name of the resolved model dump inside the output directory
pub const MODEL_DUMP_FILE: &str = "devices.json";

/// Default number of render workers
pub const DEFAULT_WORKERS: usize = 4;

/// Options for one compile run
#[derive(Debug, Clone)]
pub struct CompileOptions {
    pub output_dir: PathBuf,
    /// Directory of `*.tera` files replacing the built-in templates
    pub templates_dir: Option<PathBuf>,
    pub workers: usize,
    pub rd_scope: RdScope,
    pub templates: TemplateMap,
}

impl Default for CompileOptions {
    fn default() -> Self {
        CompileOptions {
            output_dir: PathBuf::from("configs"),
            templates_dir: None,
            workers: DEFAULT_WORKERS,
            rd_scope: RdScope::default(),
            templates: TemplateMap::default(),
        }
    }
}

/// Errors that abort a compile run
#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Topology(#[from] TopologyError),

    #[error(transparent)]
    Allocation(#[from] AllocationError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize the model dump: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Fully derived network, ready to be finalized and rendered
#[derive(Debug, Clone)]
pub struct CompiledNetwork {
    pub topology: Topology,
    pub subnets: Vec<Subnet>,
}

#[derive(Serialize)]
struct ModelDump<'a> {
    provider: &'a BTreeMap<String, Device>,
    clients: &'a BTreeMap<String, Device>,
    subnets: &'a [Subnet],
}

/// Run every derivation phase over an intent document. Performs no I/O.
pub fn build_network(intent: &Intent, rd_scope: RdScope) -> Result<CompiledNetwork, CompileError> {
    let mut topology = Topology::from_intent(intent)?;

    let loopback_pool =
        parse_cidr(&intent.provider.loopback_range).map_err(|reason| AllocationError::InvalidPool {
            cidr: intent.provider.loopback_range.clone(),
            reason,
        })?;
    allocate_loopbacks(&mut topology, &loopback_pool)?;
    classify_interfaces(&mut topology);

    topology.links = discover_links(&topology);

    let mut provider_pool = SubnetAllocator::from_cidr(&intent.provider.ip_range)?;
    let mut client_pool = SubnetAllocator::from_cidr(&intent.clients.global.ip_range)?;
    let plan = allocate_link_subnets(&topology.links, &mut provider_pool, &mut client_pool);
    for (link_id, e) in &plan.failures {
        warn!("Link {} could not be allocated: {}", link_id, e);
    }

    apply_addresses(&mut topology, &plan)?;
    verify_addressing(&topology)?;

    derive_routing(&mut topology, intent.provider.bgp_asn, rd_scope)?;

    Ok(CompiledNetwork {
        topology,
        subnets: plan.subnets,
    })
}

/// Write the resolved model as pretty JSON keyed `provider`/`clients`/`subnets`
pub fn write_model_dump(network: &CompiledNetwork, path: &Path) -> Result<(), CompileError> {
    let dump = ModelDump {
        provider: &network.topology.provider,
        clients: &network.topology.clients,
        subnets: &network.subnets,
    };
    let json = serde_json::to_string_pretty(&dump)?;
    fs::write(path, json).map_err(|source| CompileError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    info!("Wrote model dump to {:?}", path);
    Ok(())
}

/// Compile an intent document into per-device configuration files.
///
/// Nothing is written unless every derivation phase succeeds. Per-device
/// render or write failures are returned in the report, not as an error.
pub fn generate_configs<R: Renderer>(
    intent: &Intent,
    options: &CompileOptions,
    renderer: &R,
) -> Result<RenderReport, CompileError> {
    let network = build_network(intent, options.rd_scope)?;

    fs::create_dir_all(&options.output_dir).map_err(|source| CompileError::Io {
        path: options.output_dir.clone(),
        source,
    })?;
    write_model_dump(&network, &options.output_dir.join(MODEL_DUMP_FILE))?;

    let records = finalize(&network.topology);
    Ok(render_all(
        &records,
        renderer,
        &options.templates,
        &options.output_dir,
        options.workers,
    ))
}

/// Built-in renderer, with the override directory applied when one is set
pub fn load_renderer(options: &CompileOptions) -> Result<TeraRenderer, CompileError> {
    let renderer = match &options.templates_dir {
        Some(dir) => TeraRenderer::with_overrides(dir)?,
        None => TeraRenderer::builtin()?,
    };
    Ok(renderer)
}

/// Load an intent file and compile it
pub fn compile_file<R: Renderer>(
    intent_path: &Path,
    options: &CompileOptions,
    renderer: &R,
) -> Result<RenderReport, CompileError> {
    let intent = load_intent(intent_path)?;
    generate_configs(&intent, options, renderer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::Role;
    use std::net::Ipv4Addr;

    const NETWORK: &str = r#"
provider:
  ip_range: "10.0.0.0/24"
  loopback_range: "1.1.1.0/24"
  BGP_asn: 100
  routers:
    PE1:
      interfaces:
        g1/0: P1
        g2/0: CE1
    P1:
      interfaces:
        g1/0: PE1
        g2/0: PE2
    PE2:
      interfaces:
        g1/0: P1
        g2/0: CE2
clients:
  global:
    ip_range: "172.16.0.0/24"
  ACME:
    routers:
      CE1:
        eBGP_asn: 65001
        eBGP_advertized_networks: ["192.168.1.0/24"]
        interfaces:
          g1/0: PE1
  BETA:
    routers:
      CE2:
        eBGP_asn: 65002
        interfaces:
          g1/0: PE2
"#;

    #[test]
    fn test_build_network_end_to_end() {
        let intent = Intent::from_yaml_str(NETWORK).unwrap();
        let network = build_network(&intent, RdScope::PerEdge).unwrap();
        let topo = &network.topology;

        assert_eq!(topo.provider["PE1"].role, Role::Edge);
        assert_eq!(topo.provider["PE2"].role, Role::Edge);
        assert_eq!(topo.provider["P1"].role, Role::Backbone);
        assert_eq!(topo.links.len(), 4);
        assert_eq!(network.subnets.len(), 4);

        let pe1 = &topo.provider["PE1"];
        assert_eq!(pe1.interfaces["g1/0"].ip_address, Some(Ipv4Addr::new(10, 0, 0, 2)));
        assert_eq!(pe1.routing.ibgp_neighbors.len(), 1);
        assert_eq!(pe1.routing.ibgp_neighbors[0].hostname, "PE2");
        assert_eq!(pe1.routing.vrfs[0].name, "CLIENT_ACME_VRF");

        let peer = topo.clients["CE2"].routing.ebgp_peer.as_ref().unwrap();
        assert_eq!(peer.hostname, "PE2");
        assert_eq!(peer.address, Ipv4Addr::new(172, 16, 0, 6));
    }

    #[test]
    fn test_model_dump_shape() {
        let intent = Intent::from_yaml_str(NETWORK).unwrap();
        let network = build_network(&intent, RdScope::PerEdge).unwrap();
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join(MODEL_DUMP_FILE);
        write_model_dump(&network, &path).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["provider"]["PE1"]["role"], "edge");
        assert_eq!(value["clients"]["CE1"]["client"], "ACME");
        assert_eq!(value["subnets"][0]["network"], "10.0.0.0/30");
        assert_eq!(value["provider"]["P1"]["interfaces"]["loopback0"]["type"], "loopback");
    }
}
