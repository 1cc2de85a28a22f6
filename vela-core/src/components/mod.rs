//! Components - Compositions that expand a small configuration into resources
//!
//! Components never talk to a provider. They only declare resources whose
//! attributes reference each other by binding name.

pub mod application;
pub mod database;
pub mod network;
pub mod peering;

use std::collections::{BTreeMap, HashMap};

use serde::Deserialize;
use thiserror::Error;

use crate::cidr::{AddressBlock, CidrError};
use crate::plan::COMPONENT_ATTRIBUTE;
use crate::resource::{Resource, Value};

/// Tag attached to every declared resource
pub const MANAGED_BY_TAG: &str = "managed_by";
pub const MANAGED_BY_VALUE: &str = "vela";

/// Errors raised while expanding a component
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TopologyError {
    #[error("component name must not be empty")]
    EmptyName,

    #[error("{name}: az_count must be at least 1")]
    ZeroZones { name: String },

    #[error("{name}: az_count {requested} exceeds the {available} configured availability zones")]
    NotEnoughZones {
        name: String,
        requested: usize,
        available: usize,
    },

    #[error("{name}: address block {block} must have a prefix shorter than /{subnet_prefix}")]
    PrefixTooLong {
        name: String,
        block: AddressBlock,
        subnet_prefix: u8,
    },

    #[error("{name}: address block {block} yields {available} subnets, {needed} needed")]
    AddressSpaceExhausted {
        name: String,
        block: AddressBlock,
        needed: usize,
        available: u64,
    },

    #[error("cannot peer network '{0}' with itself")]
    SelfPeering(String),

    #[error("cannot peer '{source_name}' ({source_block}) with '{destination}' ({destination_block}): address blocks overlap")]
    OverlappingPeers {
        source_name: String,
        source_block: AddressBlock,
        destination: String,
        destination_block: AddressBlock,
    },

    #[error("{name}: {message}")]
    InvalidDatabase { name: String, message: String },

    #[error("{name}: {message}")]
    InvalidApplication { name: String, message: String },

    #[error(transparent)]
    Cidr(#[from] CidrError),
}

/// Settings shared by every component of a stack
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Environment {
    pub region: String,
    /// Zone names in the order the region reports them
    pub availability_zones: Vec<String>,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

impl Environment {
    pub fn new(region: impl Into<String>, availability_zones: &[&str]) -> Self {
        Self {
            region: region.into(),
            availability_zones: availability_zones.iter().map(|z| z.to_string()).collect(),
            tags: BTreeMap::new(),
        }
    }

    /// Tag map for a resource named `name`
    ///
    /// Component tags override environment tags; `Name` always wins.
    pub fn tags_for(&self, name: &str, component_tags: &BTreeMap<String, String>) -> Value {
        let mut tags: HashMap<String, Value> = HashMap::new();
        tags.insert(MANAGED_BY_TAG.to_string(), Value::string(MANAGED_BY_VALUE));
        for (k, v) in self.tags.iter().chain(component_tags) {
            tags.insert(k.clone(), Value::string(v.as_str()));
        }
        tags.insert("Name".to_string(), Value::string(name));
        Value::Map(tags)
    }
}

/// Mark a resource with the component that declared it
pub(crate) fn owned_by(resource: Resource, kind: &str, name: &str) -> Resource {
    log::debug!("declared {}", resource.id);
    resource.with_attribute(COMPONENT_ATTRIBUTE, format!("{}.{}", kind, name))
}

/// Security group rule for `protocol` on ports `from_port..=to_port`
pub(crate) fn rule(protocol: &str, from_port: i64, to_port: i64, cidrs: &[String]) -> Value {
    let mut rule = HashMap::new();
    rule.insert("protocol".to_string(), Value::string(protocol));
    rule.insert("from_port".to_string(), Value::Int(from_port));
    rule.insert("to_port".to_string(), Value::Int(to_port));
    rule.insert(
        "cidr_blocks".to_string(),
        Value::List(cidrs.iter().map(|c| Value::string(c.as_str())).collect()),
    );
    Value::Map(rule)
}
