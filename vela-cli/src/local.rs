//! Local provider
//!
//! Keeps resources in memory, seeded from the stack's recorded state, and
//! issues identifiers shaped like the real ones (`vpc-…`, `subnet-…`, load
//! balancer ARNs). The state file written after each apply is the only
//! persistence.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use vela_core::provider::{BoxFuture, Provider, ProviderError, ProviderResult};
use vela_core::resource::{Resource, ResourceId, State, Value};

/// Account number used in every ARN the local provider issues
const ACCOUNT: &str = "000000000000";

pub struct LocalProvider {
    region: String,
    resources: Mutex<HashMap<ResourceId, State>>,
}

impl LocalProvider {
    pub fn new(region: impl Into<String>, recorded: &[State]) -> Self {
        let resources = recorded
            .iter()
            .filter(|s| s.exists)
            .map(|s| (s.id.clone(), s.clone()))
            .collect();
        Self {
            region: region.into(),
            resources: Mutex::new(resources),
        }
    }

    fn lock(&self) -> ProviderResult<MutexGuard<'_, HashMap<ResourceId, State>>> {
        self.resources
            .lock()
            .map_err(|_| ProviderError::Unavailable("local resource table is poisoned".to_string()))
    }

    fn new_identifier(&self, resource: &Resource) -> String {
        let kind = resource.id.resource_type.as_str();
        if let Some(prefix) = identifier_prefix(kind) {
            return format!("{}-{}", prefix, &random_hex()[..17]);
        }
        if let Some(path) = elb_arn_path(kind) {
            return format!(
                "arn:aws:elasticloadbalancing:{}:{}:{}/{}/{}",
                self.region,
                ACCOUNT,
                path,
                declared_name(resource),
                &random_hex()[..16]
            );
        }
        declared_name(resource).to_string()
    }

    /// Materialize `resource` under `identifier`, adding computed attributes
    fn materialize(&self, resource: &Resource, identifier: &str) -> State {
        let mut attributes = resource.attributes.clone();
        attributes.retain(|k, _| !k.starts_with('_'));
        attributes.insert("id".to_string(), Value::string(identifier));

        let port = match attributes.get("port") {
            Some(Value::Int(port)) => *port,
            _ => 5432,
        };
        match resource.id.resource_type.as_str() {
            "db_instance" => {
                let endpoint = format!(
                    "{}.local.{}.rds.amazonaws.com:{}",
                    identifier, self.region, port
                );
                attributes.insert("endpoint".to_string(), Value::string(endpoint));
            }
            "rds_cluster" => {
                let endpoint = format!(
                    "{}.cluster-local.{}.rds.amazonaws.com:{}",
                    identifier, self.region, port
                );
                attributes.insert("endpoint".to_string(), Value::string(endpoint));
            }
            "load_balancer" => {
                let dns_name = format!(
                    "{}-{}.{}.elb.amazonaws.com",
                    declared_name(resource),
                    &random_hex()[..10],
                    self.region
                );
                attributes.insert("arn".to_string(), Value::string(identifier));
                attributes.insert("dns_name".to_string(), Value::string(dns_name));
            }
            "target_group" | "listener" => {
                attributes.insert("arn".to_string(), Value::string(identifier));
            }
            "iam_role" | "iam_instance_profile" => {
                let path = if resource.id.resource_type == "iam_role" {
                    "role"
                } else {
                    "instance-profile"
                };
                let arn = format!("arn:aws:iam::{}:{}/{}", ACCOUNT, path, identifier);
                attributes.insert("arn".to_string(), Value::string(arn));
            }
            _ => {}
        }

        State::existing(resource.id.clone(), attributes).with_identifier(identifier)
    }
}

/// Identifier prefix used by the provisioning engine for each resource type
fn identifier_prefix(resource_type: &str) -> Option<&'static str> {
    Some(match resource_type {
        "vpc" => "vpc",
        "subnet" => "subnet",
        "internet_gateway" => "igw",
        "route_table" => "rtb",
        "route_table_association" => "rtbassoc",
        "eip" => "eipalloc",
        "nat_gateway" => "nat",
        "vpc_endpoint" => "vpce",
        "vpc_peering_connection" => "pcx",
        "route" => "r",
        "security_group" => "sg",
        "instance" => "i",
        _ => return None,
    })
}

/// ARN resource path of load balancing types
fn elb_arn_path(resource_type: &str) -> Option<&'static str> {
    match resource_type {
        "load_balancer" => Some("loadbalancer/app"),
        "target_group" => Some("targetgroup"),
        "listener" => Some("listener/app"),
        _ => None,
    }
}

/// Name the resource is addressed by when the engine does not issue an ID
fn declared_name(resource: &Resource) -> &str {
    ["identifier", "cluster_identifier", "name"]
        .iter()
        .find_map(|key| resource.attributes.get(*key).and_then(Value::as_str))
        .unwrap_or(&resource.id.name)
}

fn random_hex() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

impl Provider for LocalProvider {
    fn name(&self) -> &'static str {
        "local"
    }

    fn create(&self, resource: &Resource) -> BoxFuture<'_, ProviderResult<State>> {
        let resource = resource.clone();
        Box::pin(async move {
            let mut resources = self.lock()?;
            if resources.contains_key(&resource.id) {
                return Err(ProviderError::AlreadyExists(resource.id));
            }

            let identifier = self.new_identifier(&resource);
            let state = self.materialize(&resource, &identifier);
            log::debug!("created {} as {}", resource.id, identifier);
            resources.insert(resource.id.clone(), state.clone());
            Ok(state)
        })
    }

    fn update(
        &self,
        identifier: &str,
        _from: &State,
        to: &Resource,
    ) -> BoxFuture<'_, ProviderResult<State>> {
        let identifier = identifier.to_string();
        let to = to.clone();
        Box::pin(async move {
            let mut resources = self.lock()?;
            if !resources.contains_key(&to.id) {
                return Err(ProviderError::NotFound {
                    id: to.id,
                    identifier,
                });
            }

            let state = self.materialize(&to, &identifier);
            resources.insert(to.id.clone(), state.clone());
            Ok(state)
        })
    }

    fn delete(&self, id: &ResourceId, identifier: &str) -> BoxFuture<'_, ProviderResult<()>> {
        let id = id.clone();
        let identifier = identifier.to_string();
        Box::pin(async move {
            let mut resources = self.lock()?;
            match resources.remove(&id) {
                Some(_) => Ok(()),
                None => Err(ProviderError::NotFound { id, identifier }),
            }
        })
    }
}
