//! Stack - One configuration file, its components and their outputs
//!
//! A stack file declares networks, peerings between them, databases and
//! applications.
//! Building a stack expands every component, checks the result against the
//! resource schemas and orders it by dependency.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use crate::components::application::{self, ApplicationConfig};
use crate::components::database::{self, DatabaseConfig, Placement};
use crate::components::network::{self, Network, NetworkConfig};
use crate::components::peering::{self, PeeringConfig};
use crate::components::{Environment, TopologyError};
use crate::graph::{DependencyGraph, GraphError};
use crate::providers::validate_resources;
use crate::resource::{Resource, Value};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid stack file: {0}")]
    Parse(String),

    #[error("stack name must not be empty")]
    EmptyStackName,

    #[error("duplicate {kind} name '{name}'")]
    Duplicate { kind: &'static str, name: String },

    #[error("peering '{peering}' references unknown network '{network}'")]
    UnknownNetwork { peering: String, network: String },

    #[error("stack '{stack}' has no output '{output}'")]
    UnknownOutput { stack: String, output: String },

    #[error("cannot read outputs of stack '{stack}': {message}")]
    OutputsUnavailable { stack: String, message: String },

    #[error("invalid resources:\n{}", .0.join("\n"))]
    Schema(Vec<String>),

    #[error(transparent)]
    Topology(#[from] TopologyError),

    #[error(transparent)]
    Graph(#[from] GraphError),
}

/// A configuration value that is either written literally or read from the
/// published outputs of a stack
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum InputValue {
    Literal(String),
    List(Vec<String>),
    StackOutput { stack: String, output: String },
}

/// Published outputs of other stacks
pub trait OutputSource {
    fn output(&self, stack: &str, key: &str) -> Result<Value, ConfigError>;
}

/// Source for stacks that reference no other stack
pub struct NoOutputs;

impl OutputSource for NoOutputs {
    fn output(&self, stack: &str, key: &str) -> Result<Value, ConfigError> {
        Err(ConfigError::UnknownOutput {
            stack: stack.to_string(),
            output: key.to_string(),
        })
    }
}

/// stack name -> output key -> value
impl OutputSource for BTreeMap<String, BTreeMap<String, Value>> {
    fn output(&self, stack: &str, key: &str) -> Result<Value, ConfigError> {
        self.get(stack)
            .and_then(|outputs| outputs.get(key))
            .cloned()
            .ok_or_else(|| ConfigError::UnknownOutput {
                stack: stack.to_string(),
                output: key.to_string(),
            })
    }
}

fn default_backend_type() -> String {
    "local".to_string()
}

fn default_state_path() -> String {
    ".vela".to_string()
}

/// Where the stack's state is kept
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BackendSection {
    #[serde(rename = "type", default = "default_backend_type")]
    pub backend_type: String,
    #[serde(default = "default_state_path")]
    pub path: String,
}

impl Default for BackendSection {
    fn default() -> Self {
        Self {
            backend_type: default_backend_type(),
            path: default_state_path(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StackConfig {
    pub name: String,
    pub region: String,
    pub availability_zones: Vec<String>,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
    #[serde(default)]
    pub backend: BackendSection,
    #[serde(default)]
    pub networks: Vec<NetworkConfig>,
    #[serde(default)]
    pub peerings: Vec<PeeringConfig>,
    #[serde(default)]
    pub databases: Vec<DatabaseConfig>,
    #[serde(default)]
    pub applications: Vec<ApplicationConfig>,
}

impl StackConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn environment(&self) -> Environment {
        Environment {
            region: self.region.clone(),
            availability_zones: self.availability_zones.clone(),
            tags: self.tags.clone(),
        }
    }

    /// Stacks whose outputs this stack reads
    pub fn referenced_stacks(&self) -> Vec<String> {
        let database_inputs = self
            .databases
            .iter()
            .flat_map(|db| [&db.vpc_id, &db.subnet_group_name]);
        let application_inputs = self.applications.iter().flat_map(ApplicationConfig::inputs);
        let mut stacks: Vec<String> = database_inputs
            .chain(application_inputs)
            .filter_map(|input| match input {
                InputValue::StackOutput { stack, .. } if stack != &self.name => Some(stack.clone()),
                _ => None,
            })
            .collect();
        stacks.sort();
        stacks.dedup();
        stacks
    }

    fn check_names(&self) -> Result<(), ConfigError> {
        if self.name.is_empty() {
            return Err(ConfigError::EmptyStackName);
        }
        unique("network", self.networks.iter().map(|n| n.name.clone()))?;
        unique("peering", self.peerings.iter().map(PeeringConfig::name))?;
        unique("database", self.databases.iter().map(|d| d.instance_name.clone()))?;
        unique("application", self.applications.iter().map(|a| a.name.clone()))?;
        Ok(())
    }
}

fn unique(kind: &'static str, names: impl Iterator<Item = String>) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();
    for name in names {
        if !seen.insert(name.clone()) {
            return Err(ConfigError::Duplicate { kind, name });
        }
    }
    Ok(())
}

/// Expanded stack: resources in dependency order plus unresolved outputs
#[derive(Debug, Clone)]
pub struct Stack {
    pub name: String,
    pub resources: Vec<Resource>,
    /// `{component}.{key}` -> value, usually a reference into `resources`
    pub outputs: BTreeMap<String, Value>,
}

/// Expand every component declared by `config`
pub fn build(config: &StackConfig, sources: &dyn OutputSource) -> Result<Stack, ConfigError> {
    config.check_names()?;
    let env = config.environment();

    let mut resources = Vec::new();
    let mut outputs = BTreeMap::new();
    let mut networks: Vec<Network> = Vec::with_capacity(config.networks.len());

    for network_config in &config.networks {
        let network = network::build(network_config, &env)?;
        for (key, value) in network.outputs() {
            outputs.insert(format!("{}.{}", network.name(), key), value);
        }
        resources.extend(network.resources().iter().cloned());
        networks.push(network);
    }

    for peering_config in &config.peerings {
        let name = peering_config.name();
        let find = |network: &str| {
            networks
                .iter()
                .find(|n| n.name() == network)
                .ok_or_else(|| ConfigError::UnknownNetwork {
                    peering: name.clone(),
                    network: network.to_string(),
                })
        };
        let source = find(&peering_config.source)?;
        let destination = find(&peering_config.destination)?;
        let peering = peering::connect(&name, source, destination, &env)?;
        outputs.insert(format!("{}.peering_connection_id", name), peering.id());
        resources.extend(peering.into_resources());
    }

    for db_config in &config.databases {
        let placement = Placement {
            vpc_id: resolve_input(&db_config.vpc_id, config, &outputs, sources)?,
            subnet_group_name: resolve_input(
                &db_config.subnet_group_name,
                config,
                &outputs,
                sources,
            )?,
        };
        let db = database::build(db_config, &placement, &env)?;
        for (key, value) in db.outputs() {
            outputs.insert(format!("{}.{}", db.name(), key), value);
        }
        resources.extend(db.into_resources());
    }

    for app_config in &config.applications {
        let resolve = |input: &InputValue| resolve_input(input, config, &outputs, sources);
        let placement = application::Placement {
            vpc_id: resolve(&app_config.vpc_id)?,
            public_subnet_ids: resolve(&app_config.public_subnet_ids)?,
            private_subnet_ids: resolve(&app_config.private_subnet_ids)?,
        };
        let app = application::build(app_config, &placement, &env)?;
        for (key, value) in app.outputs() {
            outputs.insert(format!("{}.{}", app.name(), key), value);
        }
        resources.extend(app.into_resources());
    }

    if let Err(errors) = validate_resources(&resources) {
        return Err(ConfigError::Schema(
            errors
                .into_iter()
                .map(|(id, e)| format!("  {}: {}", id, e))
                .collect(),
        ));
    }

    let resources = DependencyGraph::new(&resources)?.topological_order()?;
    log::debug!("stack {}: {} resources", config.name, resources.len());

    Ok(Stack {
        name: config.name.clone(),
        resources,
        outputs,
    })
}

fn resolve_input(
    input: &InputValue,
    config: &StackConfig,
    local: &BTreeMap<String, Value>,
    sources: &dyn OutputSource,
) -> Result<Value, ConfigError> {
    match input {
        InputValue::Literal(s) => Ok(Value::string(s.as_str())),
        InputValue::List(items) => Ok(Value::List(
            items.iter().map(|s| Value::string(s.as_str())).collect(),
        )),
        InputValue::StackOutput { stack, output } if stack == &config.name => local
            .get(output)
            .cloned()
            .ok_or_else(|| ConfigError::UnknownOutput {
                stack: stack.clone(),
                output: output.clone(),
            }),
        InputValue::StackOutput { stack, output } => sources.output(stack, output),
    }
}
