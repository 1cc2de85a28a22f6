//! Web application host
//!
//! One EC2 instance in a private subnet, reachable through an application
//! load balancer in the public subnets. The instance runs under its own role
//! so that managed policies can be granted to it.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::Deserialize;

use super::{Environment, TopologyError, owned_by, rule};
use crate::cidr::AddressBlock;
use crate::resource::{Resource, Value};
use crate::stack::InputValue;

/// Ports the instance serves the platform's services on
pub const SERVICE_PORTS: (i64, i64) = (18000, 18999);

const ASSUME_ROLE_POLICY: &str = r#"{"Version":"2012-10-17","Statement":[{"Effect":"Allow","Action":"sts:AssumeRole","Principal":{"Service":"ec2.amazonaws.com"}}]}"#;

fn default_instance_type() -> String {
    "t3a.large".to_string()
}

fn default_ami() -> String {
    "ami-08616bba875264c0b".to_string()
}

fn default_volume_size() -> u32 {
    50
}

fn default_ssl_policy() -> String {
    "ELBSecurityPolicy-2016-08".to_string()
}

fn default_policies() -> Vec<String> {
    vec![
        "arn:aws:iam::aws:policy/AmazonSSMManagedInstanceCore".to_string(),
        "arn:aws:iam::aws:policy/AmazonS3FullAccess".to_string(),
    ]
}

fn yes() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ApplicationConfig {
    pub name: String,
    #[serde(default = "default_instance_type")]
    pub instance_type: String,
    #[serde(default = "default_ami")]
    pub ami: String,
    /// Root volume size in GiB
    #[serde(default = "default_volume_size")]
    pub volume_size: u32,
    /// Protects both the instance and the load balancer from deletion
    #[serde(default = "yes")]
    pub prevent_delete: bool,
    /// With a certificate, HTTP is redirected to an HTTPS listener
    #[serde(default)]
    pub certificate_arn: Option<String>,
    #[serde(default = "default_ssl_policy")]
    pub ssl_policy: String,
    #[serde(default = "default_policies")]
    pub managed_policies: Vec<String>,
    /// Sources allowed in; anywhere when empty
    #[serde(default)]
    pub ingress_cidrs: Vec<AddressBlock>,
    pub vpc_id: InputValue,
    pub public_subnet_ids: InputValue,
    pub private_subnet_ids: InputValue,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

impl ApplicationConfig {
    pub fn new(
        name: impl Into<String>,
        vpc_id: InputValue,
        public_subnet_ids: InputValue,
        private_subnet_ids: InputValue,
    ) -> Self {
        Self {
            name: name.into(),
            instance_type: default_instance_type(),
            ami: default_ami(),
            volume_size: default_volume_size(),
            prevent_delete: true,
            certificate_arn: None,
            ssl_policy: default_ssl_policy(),
            managed_policies: default_policies(),
            ingress_cidrs: Vec::new(),
            vpc_id,
            public_subnet_ids,
            private_subnet_ids,
            tags: BTreeMap::new(),
        }
    }

    pub fn inputs(&self) -> [&InputValue; 3] {
        [&self.vpc_id, &self.public_subnet_ids, &self.private_subnet_ids]
    }

    fn invalid(&self, message: impl Into<String>) -> TopologyError {
        TopologyError::InvalidApplication {
            name: self.name.clone(),
            message: message.into(),
        }
    }

    pub fn validate(&self) -> Result<(), TopologyError> {
        if self.name.is_empty() {
            return Err(TopologyError::EmptyName);
        }
        if self.volume_size == 0 {
            return Err(self.invalid("volume_size must be at least 1 GiB"));
        }
        let mut seen = HashSet::new();
        for policy in &self.managed_policies {
            if !seen.insert(policy_name(policy)) {
                return Err(self.invalid(format!("policy {} is attached twice", policy)));
            }
        }
        Ok(())
    }

    fn cidrs(&self) -> Vec<String> {
        if self.ingress_cidrs.is_empty() {
            return vec!["0.0.0.0/0".to_string()];
        }
        self.ingress_cidrs.iter().map(|c| c.to_string()).collect()
    }
}

/// Last path segment of a policy ARN
fn policy_name(arn: &str) -> &str {
    arn.rsplit('/').next().unwrap_or(arn)
}

/// Network the application is placed into, resolved from configuration inputs
#[derive(Debug, Clone, PartialEq)]
pub struct Placement {
    pub vpc_id: Value,
    pub public_subnet_ids: Value,
    pub private_subnet_ids: Value,
}

#[derive(Debug, Clone)]
pub struct Application {
    name: String,
    instance: String,
    load_balancer: String,
    resources: Vec<Resource>,
}

impl Application {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn resources(&self) -> &[Resource] {
        &self.resources
    }

    pub fn into_resources(self) -> Vec<Resource> {
        self.resources
    }

    pub fn outputs(&self) -> Vec<(String, Value)> {
        vec![
            ("instance_id".to_string(), Value::id_of(self.instance.as_str())),
            (
                "load_balancer_dns_name".to_string(),
                Value::ResourceRef(self.load_balancer.clone(), "dns_name".to_string()),
            ),
        ]
    }
}

/// Subnet IDs given either as a list or as a single ID
fn subnet_list(value: &Value) -> Vec<Value> {
    match value {
        Value::List(items) => items.clone(),
        other => vec![other.clone()],
    }
}

pub fn build(
    config: &ApplicationConfig,
    placement: &Placement,
    env: &Environment,
) -> Result<Application, TopologyError> {
    config.validate()?;

    let public_subnets = subnet_list(&placement.public_subnet_ids);
    if public_subnets.len() < 2 {
        return Err(config.invalid(format!(
            "load balancer needs public subnets in at least two zones, got {}",
            public_subnets.len()
        )));
    }
    let Some(instance_subnet) = subnet_list(&placement.private_subnet_ids).into_iter().next()
    else {
        return Err(config.invalid("no private subnet to place the instance in"));
    };

    let name = config.name.as_str();
    let tags = |binding: &str| env.tags_for(binding, &config.tags);
    let mut resources = Vec::new();

    let role = format!("{}-role", name);
    resources.push(
        Resource::new("iam_role", role.as_str())
            .with_attribute("name", role.as_str())
            .with_attribute("assume_role_policy", ASSUME_ROLE_POLICY)
            .with_attribute("tags", tags(&role)),
    );
    let role_name = Value::ResourceRef(role.clone(), "name".to_string());

    for policy in &config.managed_policies {
        let attachment = format!("{}-{}-policy-attach", name, policy_name(policy));
        resources.push(
            Resource::new("iam_role_policy_attachment", attachment.as_str())
                .with_attribute("role", role_name.clone())
                .with_attribute("policy_arn", policy.as_str()),
        );
    }

    let profile = format!("{}-profile", name);
    resources.push(
        Resource::new("iam_instance_profile", profile.as_str())
            .with_attribute("name", profile.as_str())
            .with_attribute("role", role_name)
            .with_attribute("tags", tags(&profile)),
    );

    let cidrs = config.cidrs();
    let security_group = format!("{}-sg", name);
    resources.push(
        Resource::new("security_group", security_group.as_str())
            .with_attribute("vpc_id", placement.vpc_id.clone())
            .with_attribute("name", security_group.as_str())
            .with_attribute("description", "Enable HTTP and HTTPS access")
            .with_attribute(
                "ingress",
                Value::List(vec![
                    rule("tcp", 80, 80, &cidrs),
                    rule("tcp", 443, 443, &cidrs),
                    rule("tcp", SERVICE_PORTS.0, SERVICE_PORTS.1, &cidrs),
                ]),
            )
            .with_attribute(
                "egress",
                Value::List(vec![rule("-1", 0, 0, &["0.0.0.0/0".to_string()])]),
            )
            .with_attribute("tags", tags(&security_group)),
    );
    let security_groups = Value::List(vec![Value::id_of(security_group.as_str())]);

    let mut root_volume = HashMap::new();
    root_volume.insert("volume_size".to_string(), Value::Int(i64::from(config.volume_size)));
    root_volume.insert("encrypted".to_string(), Value::Bool(true));
    root_volume.insert("delete_on_termination".to_string(), Value::Bool(true));

    let instance = format!("{}-instance", name);
    resources.push(
        Resource::new("instance", instance.as_str())
            .with_attribute("instance_type", config.instance_type.as_str())
            .with_attribute("ami", config.ami.as_str())
            .with_attribute("subnet_id", instance_subnet)
            .with_attribute("vpc_security_group_ids", security_groups.clone())
            .with_attribute("iam_instance_profile", Value::id_of(profile.as_str()))
            .with_attribute("root_block_device", Value::Map(root_volume))
            .with_attribute("disable_api_termination", config.prevent_delete)
            .with_attribute("tags", tags(name)),
    );

    let load_balancer = format!("{}-alb", name);
    resources.push(
        Resource::new("load_balancer", load_balancer.as_str())
            .with_attribute("name", load_balancer.as_str())
            .with_attribute("load_balancer_type", "application")
            .with_attribute("internal", false)
            .with_attribute("security_groups", security_groups)
            .with_attribute("subnets", Value::List(public_subnets))
            .with_attribute("enable_deletion_protection", config.prevent_delete)
            .with_attribute("tags", tags(&load_balancer)),
    );
    let load_balancer_arn = Value::ResourceRef(load_balancer.clone(), "arn".to_string());

    let target_group = format!("{}-tg", name);
    resources.push(
        Resource::new("target_group", target_group.as_str())
            .with_attribute("name", target_group.as_str())
            .with_attribute("port", 80i64)
            .with_attribute("protocol", "HTTP")
            .with_attribute("vpc_id", placement.vpc_id.clone())
            .with_attribute("tags", tags(&target_group)),
    );
    let target_group_arn = Value::ResourceRef(target_group.clone(), "arn".to_string());

    let http = format!("{}-http-listener", name);
    let http_action = match &config.certificate_arn {
        Some(_) => redirect_to_https(),
        None => forward(&target_group_arn),
    };
    resources.push(
        Resource::new("listener", http.as_str())
            .with_attribute("load_balancer_arn", load_balancer_arn.clone())
            .with_attribute("port", 80i64)
            .with_attribute("protocol", "HTTP")
            .with_attribute("default_actions", Value::List(vec![http_action])),
    );

    if let Some(certificate) = &config.certificate_arn {
        let https = format!("{}-https-listener", name);
        resources.push(
            Resource::new("listener", https.as_str())
                .with_attribute("load_balancer_arn", load_balancer_arn)
                .with_attribute("port", 443i64)
                .with_attribute("protocol", "HTTPS")
                .with_attribute("ssl_policy", config.ssl_policy.as_str())
                .with_attribute("certificate_arn", certificate.as_str())
                .with_attribute(
                    "default_actions",
                    Value::List(vec![forward(&target_group_arn)]),
                ),
        );
    }

    let attachment = format!("{}-tg-attachment", name);
    resources.push(
        Resource::new("target_group_attachment", attachment.as_str())
            .with_attribute("target_group_arn", target_group_arn)
            .with_attribute("target_id", Value::id_of(instance.as_str()))
            .with_attribute("port", 80i64),
    );

    log::info!("{} planned behind {}", instance, load_balancer);

    Ok(Application {
        name: config.name.clone(),
        instance,
        load_balancer,
        resources: resources
            .into_iter()
            .map(|r| owned_by(r, "application", name))
            .collect(),
    })
}

fn forward(target_group_arn: &Value) -> Value {
    let mut action = HashMap::new();
    action.insert("type".to_string(), Value::string("forward"));
    action.insert("target_group_arn".to_string(), target_group_arn.clone());
    Value::Map(action)
}

fn redirect_to_https() -> Value {
    let mut redirect = HashMap::new();
    redirect.insert("port".to_string(), Value::string("443"));
    redirect.insert("protocol".to_string(), Value::string("HTTPS"));
    redirect.insert("status_code".to_string(), Value::string("HTTP_301"));
    let mut action = HashMap::new();
    action.insert("type".to_string(), Value::string("redirect"));
    action.insert("redirect".to_string(), Value::Map(redirect));
    Value::Map(action)
}
