//! Network topology builder
//!
//! Expands a [`NetworkConfig`] into a VPC with per-zone public and private
//! subnets, an internet gateway, NAT gateways and route tables. Subnet blocks
//! are handed out sequentially: the Nth /24 of the parent block always goes
//! to the Nth subnet, so the same inputs always produce the same topology.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde::Deserialize;

use super::{Environment, TopologyError, owned_by};
use crate::cidr::AddressBlock;
use crate::resource::{Resource, Value};

/// Prefix length of every subnet carved from a network's address block
pub const SUBNET_PREFIX_V4: u8 = 24;

const DEFAULT_ROUTE: &str = "0.0.0.0/0";

fn default_az_count() -> usize {
    2
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NetworkConfig {
    pub name: String,
    pub cidr_block: AddressBlock,
    #[serde(default = "default_az_count")]
    pub az_count: usize,
    /// Database-only shape: private subnets and a subnet group, no NAT
    #[serde(default)]
    pub rds_network: bool,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

impl NetworkConfig {
    pub fn new(name: impl Into<String>, cidr_block: AddressBlock) -> Self {
        Self {
            name: name.into(),
            cidr_block,
            az_count: default_az_count(),
            rds_network: false,
            tags: BTreeMap::new(),
        }
    }

    pub fn with_az_count(mut self, az_count: usize) -> Self {
        self.az_count = az_count;
        self
    }

    pub fn database_only(mut self) -> Self {
        self.rds_network = true;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubnetTier {
    Public,
    Private,
}

impl fmt::Display for SubnetTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubnetTier::Public => write!(f, "public"),
            SubnetTier::Private => write!(f, "private"),
        }
    }
}

/// Placement of one subnet
#[derive(Debug, Clone, PartialEq)]
pub struct SubnetPlan {
    pub name: String,
    pub zone: String,
    pub cidr_block: AddressBlock,
    pub tier: SubnetTier,
}

/// A planned network and the resources it expands to
#[derive(Debug, Clone)]
pub struct Network {
    name: String,
    cidr_block: AddressBlock,
    subnets: Vec<SubnetPlan>,
    resources: Vec<Resource>,
    public_route_table: Option<String>,
    private_route_tables: Vec<(String, String)>,
    db_subnet_group: Option<String>,
}

impl Network {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn cidr_block(&self) -> AddressBlock {
        self.cidr_block
    }

    pub fn vpc_binding(&self) -> String {
        format!("{}-vpc", self.name)
    }

    pub fn id(&self) -> Value {
        Value::id_of(self.vpc_binding())
    }

    pub fn public_subnet_ids(&self) -> Value {
        self.subnet_ids(SubnetTier::Public)
    }

    pub fn private_subnet_ids(&self) -> Value {
        self.subnet_ids(SubnetTier::Private)
    }

    fn subnet_ids(&self, tier: SubnetTier) -> Value {
        Value::List(
            self.subnets
                .iter()
                .filter(|s| s.tier == tier)
                .map(|s| Value::id_of(s.name.as_str()))
                .collect(),
        )
    }

    /// Name of the database subnet group, for database-only networks
    pub fn db_subnet_group_name(&self) -> Option<Value> {
        self.db_subnet_group
            .as_ref()
            .map(|binding| Value::ResourceRef(binding.clone(), "name".to_string()))
    }

    /// Binding of the shared public route table, if the network has one
    pub fn public_route_table(&self) -> Option<&str> {
        self.public_route_table.as_deref()
    }

    /// (zone, binding) of every private route table, in zone order
    pub fn private_route_tables(&self) -> &[(String, String)] {
        &self.private_route_tables
    }

    pub fn subnets(&self) -> &[SubnetPlan] {
        &self.subnets
    }

    pub fn resources(&self) -> &[Resource] {
        &self.resources
    }

    pub fn into_resources(self) -> Vec<Resource> {
        self.resources
    }

    /// Values published for other stacks, keyed by output name
    pub fn outputs(&self) -> Vec<(String, Value)> {
        let mut outputs = vec![
            ("vpc_id".to_string(), self.id()),
            ("public_subnet_ids".to_string(), self.public_subnet_ids()),
            ("private_subnet_ids".to_string(), self.private_subnet_ids()),
        ];
        if let Some(group) = self.db_subnet_group_name() {
            outputs.push(("db_subnet_group_name".to_string(), group));
        }
        outputs
    }
}

/// Plan subnet placement without declaring any resources
///
/// Standard networks get `az_count` public then `az_count` private blocks;
/// database-only networks get `az_count` private blocks. Zones are taken
/// from the front of the environment's list and never reused.
pub fn plan_subnets(
    config: &NetworkConfig,
    env: &Environment,
) -> Result<Vec<SubnetPlan>, TopologyError> {
    let name = &config.name;
    if name.is_empty() {
        return Err(TopologyError::EmptyName);
    }
    if config.az_count == 0 {
        return Err(TopologyError::ZeroZones { name: name.clone() });
    }
    if config.az_count > env.availability_zones.len() {
        return Err(TopologyError::NotEnoughZones {
            name: name.clone(),
            requested: config.az_count,
            available: env.availability_zones.len(),
        });
    }
    if config.cidr_block.prefix_len() >= SUBNET_PREFIX_V4 {
        return Err(TopologyError::PrefixTooLong {
            name: name.clone(),
            block: config.cidr_block,
            subnet_prefix: SUBNET_PREFIX_V4,
        });
    }

    let zones = &env.availability_zones[..config.az_count];
    let tiers: Vec<SubnetTier> = if config.rds_network {
        vec![SubnetTier::Private; config.az_count]
    } else {
        let mut tiers = vec![SubnetTier::Public; config.az_count];
        tiers.extend(vec![SubnetTier::Private; config.az_count]);
        tiers
    };

    let blocks = config.cidr_block.subnets(SUBNET_PREFIX_V4)?;
    if blocks.len() < tiers.len() {
        return Err(TopologyError::AddressSpaceExhausted {
            name: name.clone(),
            block: config.cidr_block,
            needed: tiers.len(),
            available: blocks.len() as u64,
        });
    }

    Ok(tiers
        .into_iter()
        .zip(zones.iter().cycle())
        .zip(blocks)
        .map(|((tier, zone), cidr_block)| SubnetPlan {
            name: format!("{}-{}-subnet-{}", name, tier, zone),
            zone: zone.clone(),
            cidr_block,
            tier,
        })
        .collect())
}

/// Build the complete topology of one network
pub fn build(config: &NetworkConfig, env: &Environment) -> Result<Network, TopologyError> {
    let subnets = plan_subnets(config, env)?;
    let mut builder = Builder {
        config,
        env,
        resources: Vec::new(),
    };

    let vpc = builder.vpc();
    let igw = builder.internet_gateway(&vpc);

    let has_public = subnets.iter().any(|s| s.tier == SubnetTier::Public);
    let public_rt = has_public.then(|| builder.public_route_table(&vpc, &igw));

    let mut nat_gateways: HashMap<&str, String> = HashMap::new();
    let mut route_tables: Vec<String> = public_rt.iter().cloned().collect();
    let mut private_route_tables = Vec::new();
    let mut private_subnets = Vec::new();

    for subnet in &subnets {
        let subnet_binding = builder.subnet(&vpc, subnet);
        match subnet.tier {
            SubnetTier::Public => {
                if let Some(rt) = &public_rt {
                    builder.association(subnet, &subnet_binding, rt);
                }
                let nat = builder.nat_gateway(subnet, &subnet_binding);
                nat_gateways.insert(subnet.zone.as_str(), nat);
            }
            SubnetTier::Private => {
                let target = match nat_gateways.get(subnet.zone.as_str()) {
                    Some(nat) => ("nat_gateway_id", nat.as_str()),
                    None => ("gateway_id", igw.as_str()),
                };
                let rt = builder.private_route_table(&vpc, subnet, target);
                builder.association(subnet, &subnet_binding, &rt);
                route_tables.push(rt.clone());
                private_route_tables.push((subnet.zone.clone(), rt));
                private_subnets.push(subnet_binding);
            }
        }
    }

    let db_subnet_group = config
        .rds_network
        .then(|| builder.db_subnet_group(&private_subnets));

    builder.s3_endpoint(&vpc, &route_tables);

    log::info!("{} planned", vpc);

    Ok(Network {
        name: config.name.clone(),
        cidr_block: config.cidr_block,
        subnets,
        resources: builder.resources,
        public_route_table: public_rt,
        private_route_tables,
        db_subnet_group,
    })
}

struct Builder<'a> {
    config: &'a NetworkConfig,
    env: &'a Environment,
    resources: Vec<Resource>,
}

impl Builder<'_> {
    fn name(&self, suffix: &str) -> String {
        format!("{}-{}", self.config.name, suffix)
    }

    fn tags(&self, name: &str) -> Value {
        self.env.tags_for(name, &self.config.tags)
    }

    fn push(&mut self, resource: Resource) -> String {
        let binding = resource.binding().to_string();
        self.resources
            .push(owned_by(resource, "network", &self.config.name));
        binding
    }

    fn vpc(&mut self) -> String {
        let name = self.name("vpc");
        let resource = Resource::new("vpc", name.as_str())
            .with_attribute("cidr_block", self.config.cidr_block.to_string())
            .with_attribute("enable_dns_support", true)
            .with_attribute("enable_dns_hostnames", true)
            .with_attribute("assign_generated_ipv6_cidr_block", true)
            .with_attribute("tags", self.tags(&name));
        self.push(resource)
    }

    fn internet_gateway(&mut self, vpc: &str) -> String {
        let name = self.name("igw");
        let resource = Resource::new("internet_gateway", name.as_str())
            .with_attribute("vpc_id", Value::id_of(vpc))
            .with_attribute("tags", self.tags(&name));
        self.push(resource)
    }

    fn public_route_table(&mut self, vpc: &str, igw: &str) -> String {
        let name = self.name("public-rt");
        let resource = Resource::new("route_table", name.as_str())
            .with_attribute("vpc_id", Value::id_of(vpc))
            .with_attribute("routes", default_route("gateway_id", igw))
            .with_attribute("tags", self.tags(&name));
        self.push(resource)
    }

    fn subnet(&mut self, vpc: &str, subnet: &SubnetPlan) -> String {
        let resource = Resource::new("subnet", subnet.name.as_str())
            .with_attribute("vpc_id", Value::id_of(vpc))
            .with_attribute("cidr_block", subnet.cidr_block.to_string())
            .with_attribute("availability_zone", subnet.zone.as_str())
            .with_attribute("map_public_ip_on_launch", subnet.tier == SubnetTier::Public)
            .with_attribute("assign_ipv6_address_on_creation", false)
            .with_attribute("tags", self.tags(&subnet.name));
        self.push(resource)
    }

    fn association(&mut self, subnet: &SubnetPlan, subnet_binding: &str, route_table: &str) {
        let name = self.name(&format!("{}-rta-{}", subnet.tier, subnet.zone));
        let resource = Resource::new("route_table_association", name)
            .with_attribute("subnet_id", Value::id_of(subnet_binding))
            .with_attribute("route_table_id", Value::id_of(route_table));
        self.push(resource);
    }

    fn nat_gateway(&mut self, subnet: &SubnetPlan, subnet_binding: &str) -> String {
        let eip_name = self.name(&format!("eip-{}", subnet.zone));
        let eip = Resource::new("eip", eip_name.as_str())
            .with_attribute("domain", "vpc")
            .with_attribute("tags", self.tags(&eip_name));
        let eip = self.push(eip);

        let nat_name = self.name(&format!("natgw-{}", subnet.zone));
        let nat = Resource::new("nat_gateway", nat_name.as_str())
            .with_attribute("allocation_id", Value::id_of(eip))
            .with_attribute("subnet_id", Value::id_of(subnet_binding))
            .with_attribute("tags", self.tags(&nat_name));
        self.push(nat)
    }

    fn private_route_table(
        &mut self,
        vpc: &str,
        subnet: &SubnetPlan,
        (target_key, target): (&str, &str),
    ) -> String {
        let name = self.name(&format!("private-rt-{}", subnet.zone));
        let resource = Resource::new("route_table", name.as_str())
            .with_attribute("vpc_id", Value::id_of(vpc))
            .with_attribute("routes", default_route(target_key, target))
            .with_attribute("tags", self.tags(&name));
        self.push(resource)
    }

    fn db_subnet_group(&mut self, private_subnets: &[String]) -> String {
        let name = self.name("db-subnet-group");
        let resource = Resource::new("db_subnet_group", name.as_str())
            .with_attribute("name", name.as_str())
            .with_attribute(
                "description",
                format!("Database subnet group for {}", self.config.name),
            )
            .with_attribute(
                "subnet_ids",
                Value::List(private_subnets.iter().map(|s| Value::id_of(s.as_str())).collect()),
            )
            .with_attribute("tags", self.tags(&name));
        self.push(resource)
    }

    fn s3_endpoint(&mut self, vpc: &str, route_tables: &[String]) {
        let name = self.name("s3-gateway-endpoint");
        let resource = Resource::new("vpc_endpoint", name.as_str())
            .with_attribute("vpc_id", Value::id_of(vpc))
            .with_attribute("service_name", format!("com.amazonaws.{}.s3", self.env.region))
            .with_attribute("vpc_endpoint_type", "Gateway")
            .with_attribute(
                "route_table_ids",
                Value::List(route_tables.iter().map(|rt| Value::id_of(rt.as_str())).collect()),
            )
            .with_attribute("tags", self.tags(&name));
        self.push(resource);
    }
}

fn default_route(target_key: &str, target: &str) -> Value {
    let mut route = HashMap::new();
    route.insert("destination".to_string(), Value::string(DEFAULT_ROUTE));
    route.insert(target_key.to_string(), Value::id_of(target));
    Value::List(vec![Value::Map(route)])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::DependencyGraph;
    use crate::providers::validate_resources;

    fn env() -> Environment {
        Environment::new("eu-west-2", &["eu-west-2a", "eu-west-2b", "eu-west-2c"])
    }

    fn block(s: &str) -> AddressBlock {
        s.parse().unwrap()
    }

    fn of_type<'a>(network: &'a Network, resource_type: &str) -> Vec<&'a Resource> {
        network
            .resources()
            .iter()
            .filter(|r| r.id.resource_type == resource_type)
            .collect()
    }

    fn find<'a>(network: &'a Network, name: &str) -> &'a Resource {
        network
            .resources()
            .iter()
            .find(|r| r.binding() == name)
            .unwrap_or_else(|| panic!("no resource named {}", name))
    }

    /// (target key, target binding) of the single default route of a route table
    fn default_target(route_table: &Resource) -> (String, String) {
        let Some(Value::List(routes)) = route_table.attributes.get("routes") else {
            panic!("route table without routes");
        };
        assert_eq!(routes.len(), 1);
        let Value::Map(route) = &routes[0] else {
            panic!("route is not a map");
        };
        assert_eq!(route.get("destination"), Some(&Value::string("0.0.0.0/0")));
        let (key, value) = route
            .iter()
            .find(|(k, _)| k.as_str() != "destination")
            .unwrap();
        let Value::ResourceRef(binding, _) = value else {
            panic!("route target is not a reference");
        };
        (key.clone(), binding.clone())
    }

    fn attr<'a>(resource: &'a Resource, key: &str) -> &'a Value {
        resource.attributes.get(key).unwrap()
    }

    #[test]
    fn standard_network_example() {
        let config = NetworkConfig::new("educate-app", block("172.255.0.0/16"));
        let network = build(&config, &env()).unwrap();

        let cidrs: Vec<String> = network
            .subnets()
            .iter()
            .map(|s| s.cidr_block.to_string())
            .collect();
        assert_eq!(
            cidrs,
            vec![
                "172.255.0.0/24",
                "172.255.1.0/24",
                "172.255.2.0/24",
                "172.255.3.0/24"
            ]
        );
        let tiers: Vec<SubnetTier> = network.subnets().iter().map(|s| s.tier).collect();
        assert_eq!(
            tiers,
            vec![
                SubnetTier::Public,
                SubnetTier::Public,
                SubnetTier::Private,
                SubnetTier::Private
            ]
        );

        assert_eq!(of_type(&network, "vpc").len(), 1);
        assert_eq!(of_type(&network, "internet_gateway").len(), 1);
        assert_eq!(of_type(&network, "nat_gateway").len(), 2);
        assert_eq!(of_type(&network, "eip").len(), 2);
        assert_eq!(of_type(&network, "route_table").len(), 3);
        assert_eq!(of_type(&network, "route_table_association").len(), 4);
        assert_eq!(of_type(&network, "db_subnet_group").len(), 0);
        assert!(network.db_subnet_group_name().is_none());
    }

    #[test]
    fn subnets_are_disjoint_and_contained() {
        for (cidr, az_count) in [("10.0.0.0/16", 1), ("10.0.0.0/22", 2), ("192.168.0.0/23", 1), ("10.8.0.0/20", 3)] {
            let parent = block(cidr);
            let config = NetworkConfig::new("net", parent).with_az_count(az_count);
            let subnets = plan_subnets(&config, &env()).unwrap();

            assert_eq!(subnets.len(), 2 * az_count);
            let public = subnets.iter().filter(|s| s.tier == SubnetTier::Public).count();
            assert_eq!(public, az_count);
            for (i, a) in subnets.iter().enumerate() {
                assert_eq!(a.cidr_block.prefix_len(), 24);
                assert!(parent.contains(&a.cidr_block));
                for b in &subnets[i + 1..] {
                    assert!(!a.cidr_block.overlaps(&b.cidr_block));
                }
            }
        }
    }

    #[test]
    fn database_only_network_example() {
        let config = NetworkConfig::new("educate-db", block("172.255.0.0/16"))
            .with_az_count(1)
            .database_only();
        let network = build(&config, &env()).unwrap();

        assert_eq!(network.subnets().len(), 1);
        assert_eq!(network.subnets()[0].tier, SubnetTier::Private);
        assert_eq!(network.subnets()[0].cidr_block, block("172.255.0.0/24"));
        assert!(of_type(&network, "nat_gateway").is_empty());
        assert!(of_type(&network, "eip").is_empty());
        assert!(network.public_route_table().is_none());
        assert_eq!(network.public_subnet_ids(), Value::List(vec![]));

        let groups = of_type(&network, "db_subnet_group");
        assert_eq!(groups.len(), 1);
        assert_eq!(
            attr(groups[0], "subnet_ids"),
            &network.private_subnet_ids()
        );
        assert_eq!(
            attr(groups[0], "description"),
            &Value::string("Database subnet group for educate-db")
        );
        assert_eq!(
            network.db_subnet_group_name(),
            Some(Value::ResourceRef(
                "educate-db-db-subnet-group".to_string(),
                "name".to_string()
            ))
        );
    }

    #[test]
    fn database_only_private_routes_use_internet_gateway() {
        let config = NetworkConfig::new("db", block("10.1.0.0/16")).database_only();
        let network = build(&config, &env()).unwrap();

        for (zone, rt) in network.private_route_tables() {
            let (key, target) = default_target(find(&network, rt));
            assert_eq!(key, "gateway_id", "zone {}", zone);
            assert_eq!(target, "db-igw");
        }
        assert_eq!(network.private_route_tables().len(), 2);
    }

    #[test]
    fn public_route_targets_internet_gateway() {
        let config = NetworkConfig::new("app", block("10.0.0.0/16"));
        let network = build(&config, &env()).unwrap();

        let rt = find(&network, "app-public-rt");
        assert_eq!(
            default_target(rt),
            ("gateway_id".to_string(), "app-igw".to_string())
        );
        for zone in ["eu-west-2a", "eu-west-2b"] {
            let assoc = find(&network, &format!("app-public-rta-{}", zone));
            assert_eq!(attr(assoc, "route_table_id"), &Value::id_of("app-public-rt"));
        }
    }

    #[test]
    fn private_routes_use_same_zone_nat_gateway() {
        let config = NetworkConfig::new("app", block("10.0.0.0/16")).with_az_count(3);
        let network = build(&config, &env()).unwrap();

        for subnet in network.subnets().iter().filter(|s| s.tier == SubnetTier::Private) {
            let rt = find(&network, &format!("app-private-rt-{}", subnet.zone));
            let (key, target) = default_target(rt);
            assert_eq!(key, "nat_gateway_id");
            assert_eq!(target, format!("app-natgw-{}", subnet.zone));

            let nat = find(&network, &target);
            let public_subnet = format!("app-public-subnet-{}", subnet.zone);
            assert_eq!(attr(nat, "subnet_id"), &Value::id_of(public_subnet));

            let assoc = find(&network, &format!("app-private-rta-{}", subnet.zone));
            assert_eq!(attr(assoc, "subnet_id"), &Value::id_of(subnet.name.as_str()));
            assert_eq!(
                attr(assoc, "route_table_id"),
                &Value::id_of(format!("app-private-rt-{}", subnet.zone))
            );
        }
    }

    #[test]
    fn nat_gateways_follow_public_subnets() {
        let standard = build(
            &NetworkConfig::new("app", block("10.0.0.0/16")).with_az_count(3),
            &env(),
        )
        .unwrap();
        let public: Vec<&str> = standard
            .subnets()
            .iter()
            .filter(|s| s.tier == SubnetTier::Public)
            .map(|s| s.zone.as_str())
            .collect();
        let nats: Vec<&Resource> = of_type(&standard, "nat_gateway");
        assert_eq!(nats.len(), public.len());
        assert_eq!(of_type(&standard, "eip").len(), public.len());
        for zone in public {
            find(&standard, &format!("app-natgw-{}", zone));
        }

        let database_only = build(
            &NetworkConfig::new("db", block("10.1.0.0/16"))
                .with_az_count(3)
                .database_only(),
            &env(),
        )
        .unwrap();
        assert!(of_type(&database_only, "nat_gateway").is_empty());
        assert!(of_type(&database_only, "eip").is_empty());
    }

    #[test]
    fn building_twice_is_identical() {
        let config = NetworkConfig::new("app", block("10.0.0.0/16")).with_az_count(3);
        let first = build(&config, &env()).unwrap();
        let second = build(&config, &env()).unwrap();
        assert_eq!(first.subnets(), second.subnets());
        assert_eq!(first.resources(), second.resources());
    }

    #[test]
    fn zones_are_not_cycled() {
        let config = NetworkConfig::new("app", block("10.0.0.0/16")).with_az_count(4);
        assert_eq!(
            build(&config, &env()).unwrap_err(),
            TopologyError::NotEnoughZones {
                name: "app".to_string(),
                requested: 4,
                available: 3,
            }
        );
    }

    #[test]
    fn zero_zones_rejected() {
        let config = NetworkConfig::new("app", block("10.0.0.0/16")).with_az_count(0);
        assert!(matches!(
            build(&config, &env()),
            Err(TopologyError::ZeroZones { .. })
        ));
    }

    #[test]
    fn block_too_small() {
        let config = NetworkConfig::new("app", block("10.0.0.0/24")).with_az_count(1);
        assert!(matches!(
            build(&config, &env()),
            Err(TopologyError::PrefixTooLong { .. })
        ));

        // a /23 holds two /24s: enough for one zone, not for two
        let config = NetworkConfig::new("app", block("10.0.0.0/23")).with_az_count(2);
        assert_eq!(
            build(&config, &env()).unwrap_err(),
            TopologyError::AddressSpaceExhausted {
                name: "app".to_string(),
                block: block("10.0.0.0/23"),
                needed: 4,
                available: 2,
            }
        );

        let config = NetworkConfig::new("app", block("10.0.0.0/23"))
            .with_az_count(2)
            .database_only();
        assert!(build(&config, &env()).is_ok());
    }

    #[test]
    fn empty_name_rejected() {
        let config = NetworkConfig::new("", block("10.0.0.0/16"));
        assert_eq!(build(&config, &env()).unwrap_err(), TopologyError::EmptyName);
    }

    #[test]
    fn s3_endpoint_uses_configured_region() {
        let config = NetworkConfig::new("app", block("10.0.0.0/16"));
        let network = build(&config, &Environment::new("us-east-1", &["us-east-1a", "us-east-1b"]))
            .unwrap();

        let endpoint = find(&network, "app-s3-gateway-endpoint");
        assert_eq!(
            attr(endpoint, "service_name"),
            &Value::string("com.amazonaws.us-east-1.s3")
        );
        let Value::List(tables) = attr(endpoint, "route_table_ids") else {
            panic!("expected list");
        };
        assert_eq!(tables.len(), 3);
    }

    #[test]
    fn subnet_flags() {
        let config = NetworkConfig::new("app", block("10.0.0.0/16")).with_az_count(1);
        let network = build(&config, &env()).unwrap();

        let public = find(&network, "app-public-subnet-eu-west-2a");
        let private = find(&network, "app-private-subnet-eu-west-2a");
        assert_eq!(attr(public, "map_public_ip_on_launch"), &Value::Bool(true));
        assert_eq!(attr(private, "map_public_ip_on_launch"), &Value::Bool(false));
        assert_eq!(
            attr(private, "assign_ipv6_address_on_creation"),
            &Value::Bool(false)
        );
        assert_eq!(attr(private, "availability_zone"), &Value::string("eu-west-2a"));
    }

    #[test]
    fn resources_pass_schema_validation_and_order() {
        for config in [
            NetworkConfig::new("app", block("10.0.0.0/16")),
            NetworkConfig::new("db", block("10.1.0.0/16")).database_only(),
        ] {
            let network = build(&config, &env()).unwrap();
            validate_resources(network.resources()).unwrap();

            let graph = DependencyGraph::new(network.resources()).unwrap();
            let sorted = graph.topological_order().unwrap();
            assert_eq!(sorted[0].id.resource_type, "vpc");
            assert_eq!(
                graph.dependents_of(&network.vpc_binding()).len(),
                of_type(&network, "subnet").len()
                    + of_type(&network, "route_table").len()
                    + 2
            );
        }
    }

    #[test]
    fn outputs_are_references() {
        let config = NetworkConfig::new("db", block("10.1.0.0/16")).database_only();
        let network = build(&config, &env()).unwrap();
        let keys: Vec<String> = network.outputs().into_iter().map(|(k, _)| k).collect();
        assert_eq!(
            keys,
            vec![
                "vpc_id",
                "public_subnet_ids",
                "private_subnet_ids",
                "db_subnet_group_name"
            ]
        );
        assert_eq!(network.id(), Value::id_of("db-vpc"));
    }

    #[test]
    fn config_from_toml_applies_defaults() {
        let config: NetworkConfig = toml::from_str(
            r#"
            name = "educate-app"
            cidr_block = "172.255.0.0/16"
            "#,
        )
        .unwrap();
        assert_eq!(config.az_count, 2);
        assert!(!config.rds_network);

        let err = toml::from_str::<NetworkConfig>(
            r#"
            name = "x"
            cidr_block = "172.255.0.0/33"
            "#,
        );
        assert!(err.is_err());
    }
}
