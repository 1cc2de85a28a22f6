//! State file structures for persisting stack state

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use vela_core::resource::{ResourceId, State, Value};

use crate::convert::{json_to_value, value_to_json};

/// The main state file structure that persists to the backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateFile {
    /// State file format version
    pub version: u32,
    /// Monotonically increasing number for each state modification
    pub serial: u64,
    /// Unique identifier for this state lineage (prevents accidental overwrites)
    pub lineage: String,
    /// Version of Vela that last modified this state
    pub vela_version: String,
    /// Stack this state belongs to
    pub stack: String,
    /// All managed resources, in creation order
    pub resources: Vec<ResourceState>,
    /// Published outputs, resolved to concrete values
    #[serde(default)]
    pub outputs: BTreeMap<String, serde_json::Value>,
}

impl StateFile {
    /// Current state file format version
    pub const CURRENT_VERSION: u32 = 1;

    /// Empty state of a stack that was never applied, with a fresh lineage
    pub fn new(stack: impl Into<String>) -> Self {
        Self {
            version: Self::CURRENT_VERSION,
            serial: 0,
            lineage: uuid::Uuid::new_v4().to_string(),
            vela_version: env!("CARGO_PKG_VERSION").to_string(),
            stack: stack.into(),
            resources: Vec::new(),
            outputs: BTreeMap::new(),
        }
    }

    /// Increment serial and update vela version for a new state write
    pub fn increment_serial(&mut self) {
        self.serial += 1;
        self.vela_version = env!("CARGO_PKG_VERSION").to_string();
    }

    /// Recorded resources as provider states, in creation order
    pub fn states(&self) -> Vec<State> {
        self.resources.iter().map(ResourceState::to_state).collect()
    }

    /// Replace the recorded resources with `states`, keeping their order
    pub fn replace_resources(&mut self, provider: &str, states: &[State]) {
        self.resources = states
            .iter()
            .filter(|s| s.exists)
            .map(|s| ResourceState::from_state(provider, s))
            .collect();
    }

    /// Replace the published outputs
    pub fn set_outputs(&mut self, outputs: &BTreeMap<String, Value>) {
        self.outputs = outputs
            .iter()
            .map(|(k, v)| (k.clone(), value_to_json(v)))
            .collect();
    }

    /// Look up one published output
    pub fn output(&self, key: &str) -> Option<Value> {
        self.outputs.get(key).and_then(json_to_value)
    }
}

/// State of a single managed resource
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceState {
    /// Resource type (e.g., "vpc", "nat_gateway")
    pub resource_type: String,
    /// Resource name (e.g., "educate-app-natgw-eu-west-2a")
    pub name: String,
    /// Provider name (e.g., "local")
    pub provider: String,
    /// Provider identifier (e.g., vpc-0a1b2c3d)
    #[serde(default)]
    pub identifier: Option<String>,
    /// All attributes of the resource as JSON values
    pub attributes: HashMap<String, serde_json::Value>,
}

impl ResourceState {
    pub fn from_state(provider: &str, state: &State) -> Self {
        Self {
            resource_type: state.id.resource_type.clone(),
            name: state.id.name.clone(),
            provider: provider.to_string(),
            identifier: state.identifier.clone(),
            attributes: state
                .attributes
                .iter()
                .map(|(k, v)| (k.clone(), value_to_json(v)))
                .collect(),
        }
    }

    pub fn to_state(&self) -> State {
        let attributes = self
            .attributes
            .iter()
            .filter_map(|(k, v)| json_to_value(v).map(|v| (k.clone(), v)))
            .collect();
        let state = State::existing(
            ResourceId::new(self.resource_type.as_str(), self.name.as_str()),
            attributes,
        );
        match &self.identifier {
            Some(identifier) => state.with_identifier(identifier.as_str()),
            None => state,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_file_new() {
        let state = StateFile::new("networking");
        assert_eq!(state.version, StateFile::CURRENT_VERSION);
        assert_eq!(state.serial, 0);
        assert_eq!(state.stack, "networking");
        assert!(!state.lineage.is_empty());
        assert!(state.resources.is_empty());
        assert!(state.outputs.is_empty());
    }

    #[test]
    fn test_state_file_increment_serial() {
        let mut state = StateFile::new("networking");
        state.increment_serial();
        assert_eq!(state.serial, 1);
        state.increment_serial();
        assert_eq!(state.serial, 2);
    }

    #[test]
    fn replacing_resources_drops_the_old_ones() {
        let vpc = |cidr: &str| {
            let mut attrs = HashMap::new();
            attrs.insert("cidr_block".to_string(), Value::string(cidr));
            State::existing(ResourceId::new("vpc", "educate-app-vpc"), attrs)
                .with_identifier("vpc-1")
        };

        let mut file = StateFile::new("networking");
        file.replace_resources("local", &[vpc("172.255.0.0/16")]);
        file.replace_resources("local", &[vpc("172.254.0.0/16")]);
        assert_eq!(file.resources.len(), 1);
        assert_eq!(file.resources[0].provider, "local");
        assert_eq!(
            file.resources[0].attributes.get("cidr_block"),
            Some(&serde_json::json!("172.254.0.0/16"))
        );

        file.replace_resources("local", &[]);
        assert!(file.resources.is_empty());
    }

    #[test]
    fn states_keep_order_and_identifiers() {
        let mut attrs = HashMap::new();
        attrs.insert("cidr_block".to_string(), Value::string("10.0.0.0/16"));
        let states = vec![
            State::existing(ResourceId::new("vpc", "a-vpc"), attrs).with_identifier("vpc-1"),
            State::not_found(ResourceId::new("subnet", "gone")),
            State::existing(ResourceId::new("internet_gateway", "a-igw"), HashMap::new())
                .with_identifier("igw-1"),
        ];

        let mut file = StateFile::new("networking");
        file.replace_resources("local", &states);
        assert_eq!(file.resources.len(), 2);

        let restored = file.states();
        assert_eq!(restored[0], states[0]);
        assert_eq!(restored[1], states[2]);
    }

    #[test]
    fn outputs_are_stored_as_json() {
        let mut outputs = BTreeMap::new();
        outputs.insert("a.vpc_id".to_string(), Value::string("vpc-1"));
        outputs.insert(
            "a.private_subnet_ids".to_string(),
            Value::List(vec![Value::string("subnet-1"), Value::string("subnet-2")]),
        );

        let mut file = StateFile::new("networking");
        file.set_outputs(&outputs);
        assert_eq!(
            file.outputs.get("a.private_subnet_ids"),
            Some(&serde_json::json!(["subnet-1", "subnet-2"]))
        );
        assert_eq!(file.output("a.vpc_id"), Some(Value::string("vpc-1")));
        assert_eq!(file.output("missing"), None);
    }

    #[test]
    fn test_state_file_serialization() {
        let mut attrs = HashMap::new();
        attrs.insert("map_public_ip_on_launch".to_string(), Value::Bool(true));
        let subnet = State::existing(ResourceId::new("subnet", "a-public-subnet-eu-west-2a"), attrs)
            .with_identifier("subnet-1");
        let mut state = StateFile::new("networking");
        state.replace_resources("local", &[subnet]);

        let json = serde_json::to_string_pretty(&state).unwrap();
        let deserialized: StateFile = serde_json::from_str(&json).unwrap();

        assert_eq!(deserialized.serial, state.serial);
        assert_eq!(deserialized.lineage, state.lineage);
        assert_eq!(deserialized.stack, "networking");
        assert_eq!(
            deserialized.resources[0].identifier.as_deref(),
            Some("subnet-1")
        );
    }
}
