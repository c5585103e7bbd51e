//! Intent document model and loader.
//!
//! The intent document describes the provider backbone and the client
//! networks attached to it. It is parsed with serde from YAML or JSON and
//! validated before any derivation runs. Nothing in here performs topology
//! logic: interfaces are kept in the raw shapes the author wrote them in,
//! and the topology builder normalizes them.

use crate::utils::ip_utils::parse_cidr;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

/// A value written either as a single string or as a list of strings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    pub fn to_vec(&self) -> Vec<String> {
        match self {
            OneOrMany::One(name) => vec![name.clone()],
            OneOrMany::Many(names) => names.clone(),
        }
    }
}

/// Interface declaration exactly as written in the intent document.
///
/// The same neighbor relation may be written as a bare hostname, a list of
/// hostnames (shared segment), or an explicit record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawInterface {
    Peer(String),
    Peers(Vec<String>),
    Tagged(TaggedInterface),
}

/// Explicit interface record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaggedInterface {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub neighbors: Option<OneOrMany>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subnet_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subnet_mask: Option<String>,
}

/// Root of the intent document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Intent {
    pub provider: ProviderIntent,
    pub clients: ClientsIntent,
}

/// Provider backbone section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderIntent {
    /// Pool for provider-internal links
    pub ip_range: String,
    /// Pool for per-device loopbacks
    pub loopback_range: String,
    #[serde(rename = "BGP_asn")]
    pub bgp_asn: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route_reflectors: Option<OneOrMany>,
    pub routers: BTreeMap<String, ProviderRouter>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderRouter {
    #[serde(default)]
    pub interfaces: BTreeMap<String, RawInterface>,
}

/// Clients section: one shared `global` entry plus one entry per client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientsIntent {
    pub global: ClientGlobal,
    #[serde(flatten)]
    pub networks: BTreeMap<String, ClientNetwork>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientGlobal {
    /// Pool for provider/client links
    pub ip_range: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientNetwork {
    #[serde(default)]
    pub routers: BTreeMap<String, ClientRouter>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientRouter {
    #[serde(default)]
    pub interfaces: BTreeMap<String, RawInterface>,
    #[serde(rename = "eBGP_asn", alias = "BGP_asn")]
    pub bgp_asn: u32,
    #[serde(
        rename = "eBGP_advertized_networks",
        alias = "BGP_advertized_networks",
        default
    )]
    pub advertised_networks: Vec<String>,
    #[serde(default)]
    pub unmanaged_interfaces: BTreeMap<String, String>,
}

/// Errors raised while reading or validating the intent document.
///
/// All of them are fatal: nothing is derived from a document that fails here.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("Failed to read intent file '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed intent document: {0}")]
    Parse(String),

    #[error("Invalid value for '{field}': {reason}")]
    InvalidField { field: String, reason: String },

    #[error("Router name '{0}' is declared more than once")]
    DuplicateRouter(String),

    #[error("The provider section declares no routers")]
    NoProviderRouters,
}

impl Intent {
    /// Parse an intent document from YAML text (plain JSON is valid YAML too)
    pub fn from_yaml_str(text: &str) -> Result<Self, SchemaError> {
        let intent: Intent =
            serde_yaml::from_str(text).map_err(|e| SchemaError::Parse(e.to_string()))?;
        intent.validate()?;
        Ok(intent)
    }

    /// Parse an intent document from JSON text
    pub fn from_json_str(text: &str) -> Result<Self, SchemaError> {
        let intent: Intent =
            serde_json::from_str(text).map_err(|e| SchemaError::Parse(e.to_string()))?;
        intent.validate()?;
        Ok(intent)
    }

    /// Validate the document beyond what the serde shape enforces
    pub fn validate(&self) -> Result<(), SchemaError> {
        check_cidr("provider.ip_range", &self.provider.ip_range)?;
        check_cidr("provider.loopback_range", &self.provider.loopback_range)?;
        check_cidr("clients.global.ip_range", &self.clients.global.ip_range)?;

        if self.provider.bgp_asn == 0 {
            return Err(SchemaError::InvalidField {
                field: "provider.BGP_asn".to_string(),
                reason: "ASN must be non-zero".to_string(),
            });
        }

        if self.provider.routers.is_empty() {
            return Err(SchemaError::NoProviderRouters);
        }

        let mut seen: BTreeSet<&str> = self.provider.routers.keys().map(String::as_str).collect();

        for (client_name, network) in &self.clients.networks {
            for (router_name, router) in &network.routers {
                if !seen.insert(router_name.as_str()) {
                    return Err(SchemaError::DuplicateRouter(router_name.clone()));
                }

                let prefix = format!("clients.{}.routers.{}", client_name, router_name);

                if router.bgp_asn == 0 {
                    return Err(SchemaError::InvalidField {
                        field: format!("{}.eBGP_asn", prefix),
                        reason: "ASN must be non-zero".to_string(),
                    });
                }
                for network in &router.advertised_networks {
                    check_cidr(&format!("{}.eBGP_advertized_networks", prefix), network)?;
                }
                for (iface, cidr) in &router.unmanaged_interfaces {
                    check_cidr(&format!("{}.unmanaged_interfaces.{}", prefix, iface), cidr)?;
                }
            }
        }

        Ok(())
    }

    /// Route reflector names, normalized to a set
    pub fn route_reflectors(&self) -> BTreeSet<String> {
        self.provider
            .route_reflectors
            .as_ref()
            .map(|rr| rr.to_vec().into_iter().collect())
            .unwrap_or_default()
    }
}

fn check_cidr(field: &str, value: &str) -> Result<(), SchemaError> {
    parse_cidr(value)
        .map(|_| ())
        .map_err(|reason| SchemaError::InvalidField {
            field: field.to_string(),
            reason,
        })
}

/// Load and validate an intent document from disk.
///
/// Files ending in `.json` go through serde_json, anything else through serde_yaml.
pub fn load_intent(path: &Path) -> Result<Intent, SchemaError> {
    info!("Loading intent from: {:?}", path);

    let text = fs::read_to_string(path).map_err(|source| SchemaError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let is_json = path
        .extension()
        .map_or(false, |ext| ext.eq_ignore_ascii_case("json"));

    let intent = if is_json {
        Intent::from_json_str(&text)?
    } else {
        Intent::from_yaml_str(&text)?
    };

    debug!(
        "Intent declares {} provider routers and {} client networks",
        intent.provider.routers.len(),
        intent.clients.networks.len()
    );

    Ok(intent)
}
