//! Peering connector
//!
//! Links two planned networks with one auto-accepted peering connection and
//! a route in each direction.

use serde::Deserialize;

use super::network::Network;
use super::{Environment, TopologyError, owned_by};
use crate::resource::{Resource, Value};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PeeringConfig {
    /// Requester network
    pub source: String,
    /// Accepter network
    pub destination: String,
    #[serde(default)]
    pub name: Option<String>,
}

impl PeeringConfig {
    pub fn name(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| format!("{}-to-{}", self.source, self.destination))
    }
}

#[derive(Debug, Clone)]
pub struct Peering {
    name: String,
    connection: String,
    resources: Vec<Resource>,
}

impl Peering {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn id(&self) -> Value {
        Value::id_of(self.connection.as_str())
    }

    pub fn resources(&self) -> &[Resource] {
        &self.resources
    }

    pub fn into_resources(self) -> Vec<Resource> {
        self.resources
    }
}

/// Peer `source` with `destination`
pub fn connect(
    name: &str,
    source: &Network,
    destination: &Network,
    env: &Environment,
) -> Result<Peering, TopologyError> {
    if name.is_empty() {
        return Err(TopologyError::EmptyName);
    }
    if source.name() == destination.name() {
        return Err(TopologyError::SelfPeering(source.name().to_string()));
    }
    if source.cidr_block().overlaps(&destination.cidr_block()) {
        return Err(TopologyError::OverlappingPeers {
            source_name: source.name().to_string(),
            source_block: source.cidr_block(),
            destination: destination.name().to_string(),
            destination_block: destination.cidr_block(),
        });
    }

    let mut resources = Vec::new();
    let connection_name = format!("{}-to-{}-vpc-peer", source.name(), destination.name());
    let connection = Resource::new("vpc_peering_connection", connection_name.as_str())
        .with_attribute("vpc_id", source.id())
        .with_attribute("peer_vpc_id", destination.id())
        .with_attribute("auto_accept", true)
        .with_attribute("tags", env.tags_for(&connection_name, &Default::default()));
    resources.push(owned_by(connection, "peering", name));

    for (from, to) in [(source, destination), (destination, source)] {
        for (route_name, route_table) in route_targets(from, to) {
            let route = Resource::new("route", route_name)
                .with_attribute("route_table_id", Value::id_of(route_table))
                .with_attribute("destination_cidr_block", to.cidr_block().to_string())
                .with_attribute("vpc_peering_connection_id", Value::id_of(connection_name.as_str()));
            resources.push(owned_by(route, "peering", name));
        }
    }

    log::info!("{} planned", connection_name);

    Ok(Peering {
        name: name.to_string(),
        connection: connection_name,
        resources,
    })
}

/// (route name, route table binding) pairs receiving the route from `from` to `to`
///
/// Networks without a public route table get the route in every private one.
fn route_targets(from: &Network, to: &Network) -> Vec<(String, String)> {
    let base = format!("{}-to-{}-route", from.name(), to.name());
    match from.public_route_table() {
        Some(rt) => vec![(base, rt.to_string())],
        None => from
            .private_route_tables()
            .iter()
            .map(|(zone, rt)| (format!("{}-{}", base, zone), rt.clone()))
            .collect(),
    }
}
