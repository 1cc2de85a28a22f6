//! Managed database placed into a network's database subnet group
//!
//! Either a single instance with its own parameter group, or an Aurora
//! cluster with one writer instance.

use std::collections::BTreeMap;

use serde::Deserialize;

use super::{Environment, TopologyError, owned_by, rule};
use crate::cidr::AddressBlock;
use crate::resource::{Resource, Value};
use crate::stack::InputValue;

/// Longest automated backup retention accepted by the provider
pub const MAX_BACKUP_DAYS: u8 = 35;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageType {
    Standard,
    #[default]
    Gp2,
    Io1,
}

impl StorageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageType::Standard => "standard",
            StorageType::Gp2 => "gp2",
            StorageType::Io1 => "io1",
        }
    }
}

fn default_engine() -> String {
    "mysql".to_string()
}

fn default_engine_version() -> String {
    "5.7".to_string()
}

fn default_family() -> String {
    "mysql5.7".to_string()
}

fn default_port() -> u16 {
    3306
}

fn default_instance_class() -> String {
    "db.t3.large".to_string()
}

fn default_storage() -> u32 {
    50
}

fn default_backup_days() -> u8 {
    30
}

fn default_username() -> String {
    "admin".to_string()
}

fn yes() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatabaseConfig {
    pub instance_name: String,
    #[serde(default = "default_engine")]
    pub engine: String,
    #[serde(default = "default_engine_version")]
    pub engine_version: String,
    /// Parameter group family (e.g., mysql5.7)
    #[serde(default = "default_family")]
    pub family: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_instance_class")]
    pub instance_class: String,
    /// Allocated storage in GiB
    #[serde(default = "default_storage")]
    pub storage: u32,
    /// Upper bound for storage autoscaling
    #[serde(default)]
    pub max_storage: Option<u32>,
    #[serde(default)]
    pub storage_type: StorageType,
    #[serde(default = "default_backup_days")]
    pub backup_days: u8,
    #[serde(default = "yes")]
    pub multi_az: bool,
    #[serde(default = "yes")]
    pub prevent_delete: bool,
    #[serde(default = "yes")]
    pub take_final_snapshot: bool,
    #[serde(default)]
    pub publicly_accessible: bool,
    /// Build an Aurora cluster instead of a single instance
    #[serde(default)]
    pub cluster: bool,
    /// Schema created with the instance
    #[serde(default)]
    pub db_name: Option<String>,
    #[serde(default = "default_username")]
    pub username: String,
    pub vpc_id: InputValue,
    pub subnet_group_name: InputValue,
    /// Address blocks allowed to reach the database port
    #[serde(default)]
    pub allowed_cidrs: Vec<AddressBlock>,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

impl DatabaseConfig {
    pub fn new(
        instance_name: impl Into<String>,
        vpc_id: InputValue,
        subnet_group_name: InputValue,
    ) -> Self {
        Self {
            instance_name: instance_name.into(),
            engine: default_engine(),
            engine_version: default_engine_version(),
            family: default_family(),
            port: default_port(),
            instance_class: default_instance_class(),
            storage: default_storage(),
            max_storage: None,
            storage_type: StorageType::default(),
            backup_days: default_backup_days(),
            multi_az: true,
            prevent_delete: true,
            take_final_snapshot: true,
            publicly_accessible: false,
            cluster: false,
            db_name: None,
            username: default_username(),
            vpc_id,
            subnet_group_name,
            allowed_cidrs: Vec::new(),
            tags: BTreeMap::new(),
        }
    }

    pub fn validate(&self) -> Result<(), TopologyError> {
        let invalid = |message: String| TopologyError::InvalidDatabase {
            name: self.instance_name.clone(),
            message,
        };

        if self.instance_name.is_empty() {
            return Err(TopologyError::EmptyName);
        }
        if self.storage == 0 {
            return Err(invalid("storage must be at least 1 GiB".to_string()));
        }
        if let Some(max) = self.max_storage
            && max < self.storage
        {
            return Err(invalid(format!(
                "max_storage {} is smaller than storage {}",
                max, self.storage
            )));
        }
        if self.backup_days > MAX_BACKUP_DAYS {
            return Err(invalid(format!(
                "backup_days must be at most {}",
                MAX_BACKUP_DAYS
            )));
        }
        if self.port == 0 {
            return Err(invalid("port must not be 0".to_string()));
        }
        if self.cluster {
            if !matches!(self.engine.as_str(), "aurora-mysql" | "aurora-postgresql") {
                return Err(invalid(format!(
                    "engine '{}' cannot run as a cluster; use aurora-mysql or aurora-postgresql",
                    self.engine
                )));
            }
            if self.max_storage.is_some() {
                return Err(invalid("clusters grow their storage without max_storage".to_string()));
            }
        }
        Ok(())
    }

    fn prefix(&self) -> String {
        format!("{}-{}", self.instance_name, self.engine)
    }
}

/// Where the instance is placed, resolved from configuration inputs
#[derive(Debug, Clone, PartialEq)]
pub struct Placement {
    pub vpc_id: Value,
    pub subnet_group_name: Value,
}

#[derive(Debug, Clone)]
pub struct Database {
    name: String,
    /// Binding of the instance or cluster that owns the endpoint
    primary: String,
    resources: Vec<Resource>,
}

impl Database {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn endpoint(&self) -> Value {
        Value::ResourceRef(self.primary.clone(), "endpoint".to_string())
    }

    pub fn resources(&self) -> &[Resource] {
        &self.resources
    }

    pub fn into_resources(self) -> Vec<Resource> {
        self.resources
    }

    pub fn outputs(&self) -> Vec<(String, Value)> {
        vec![("endpoint".to_string(), self.endpoint())]
    }
}

pub fn build(
    config: &DatabaseConfig,
    placement: &Placement,
    env: &Environment,
) -> Result<Database, TopologyError> {
    config.validate()?;

    let prefix = config.prefix();
    let tags = |name: &str| env.tags_for(name, &config.tags);
    let mut resources = Vec::new();

    let security_group = format!("{}-sg", prefix);
    resources.push(
        Resource::new("security_group", security_group.as_str())
            .with_attribute("vpc_id", placement.vpc_id.clone())
            .with_attribute("name", security_group.as_str())
            .with_attribute(
                "description",
                format!("Access to the {} database", config.instance_name),
            )
            .with_attribute("ingress", ingress_rules(config))
            .with_attribute(
                "egress",
                Value::List(vec![rule("-1", 0, 0, &["0.0.0.0/0".to_string()])]),
            )
            .with_attribute("tags", tags(&security_group)),
    );
    let security_groups = Value::List(vec![Value::id_of(security_group.as_str())]);

    let final_snapshot = config
        .take_final_snapshot
        .then(|| format!("{}-final-snapshot", prefix));

    let primary = if config.cluster {
        let cluster = format!("{}-cluster", prefix);
        let mut db = Resource::new("rds_cluster", cluster.as_str())
            .with_attribute("cluster_identifier", config.instance_name.as_str())
            .with_attribute("engine", config.engine.as_str())
            .with_attribute("engine_version", config.engine_version.as_str())
            .with_attribute("port", i64::from(config.port))
            .with_attribute("backup_retention_period", i64::from(config.backup_days))
            .with_attribute("copy_tags_to_snapshot", true)
            .with_attribute("storage_encrypted", true)
            .with_attribute("deletion_protection", config.prevent_delete)
            .with_attribute("skip_final_snapshot", !config.take_final_snapshot)
            .with_attribute("master_username", config.username.as_str())
            .with_attribute("manage_master_user_password", true)
            .with_attribute("db_subnet_group_name", placement.subnet_group_name.clone())
            .with_attribute("vpc_security_group_ids", security_groups)
            .with_attribute("tags", tags(&cluster));
        if let Some(snapshot) = final_snapshot {
            db = db.with_attribute("final_snapshot_identifier", snapshot);
        }
        if let Some(db_name) = &config.db_name {
            db = db.with_attribute("database_name", db_name.as_str());
        }
        resources.push(db);

        let writer = format!("{}-instance-0", prefix);
        resources.push(
            Resource::new("rds_cluster_instance", writer.as_str())
                .with_attribute("identifier", format!("{}-0", config.instance_name))
                .with_attribute("cluster_identifier", Value::id_of(cluster.as_str()))
                .with_attribute("engine", config.engine.as_str())
                .with_attribute("engine_version", config.engine_version.as_str())
                .with_attribute("instance_class", config.instance_class.as_str())
                .with_attribute("publicly_accessible", config.publicly_accessible)
                .with_attribute("tags", tags(&writer)),
        );
        cluster
    } else {
        let parameter_group = format!("{}-parameter-group", prefix);
        resources.push(
            Resource::new("db_parameter_group", parameter_group.as_str())
                .with_attribute("name", parameter_group.as_str())
                .with_attribute("family", config.family.as_str())
                .with_attribute(
                    "description",
                    format!("Parameters for {}", config.instance_name),
                )
                .with_attribute("tags", tags(&parameter_group)),
        );

        let instance = format!("{}-instance", prefix);
        let mut db = Resource::new("db_instance", instance.as_str())
            .with_attribute("identifier", config.instance_name.as_str())
            .with_attribute("engine", config.engine.as_str())
            .with_attribute("engine_version", config.engine_version.as_str())
            .with_attribute("instance_class", config.instance_class.as_str())
            .with_attribute("allocated_storage", i64::from(config.storage))
            .with_attribute("storage_type", config.storage_type.as_str())
            .with_attribute("storage_encrypted", true)
            .with_attribute("backup_retention_period", i64::from(config.backup_days))
            .with_attribute("multi_az", config.multi_az)
            .with_attribute("deletion_protection", config.prevent_delete)
            .with_attribute("skip_final_snapshot", !config.take_final_snapshot)
            .with_attribute("publicly_accessible", config.publicly_accessible)
            .with_attribute("username", config.username.as_str())
            .with_attribute("manage_master_user_password", true)
            .with_attribute("port", i64::from(config.port))
            .with_attribute("db_subnet_group_name", placement.subnet_group_name.clone())
            .with_attribute(
                "parameter_group_name",
                Value::ResourceRef(parameter_group.clone(), "name".to_string()),
            )
            .with_attribute("vpc_security_group_ids", security_groups)
            .with_attribute("tags", tags(&instance));
        if let Some(max) = config.max_storage {
            db = db.with_attribute("max_allocated_storage", i64::from(max));
        }
        if let Some(snapshot) = final_snapshot {
            db = db.with_attribute("final_snapshot_identifier", snapshot);
        }
        if let Some(db_name) = &config.db_name {
            db = db.with_attribute("db_name", db_name.as_str());
        }
        resources.push(db);
        instance
    };

    log::info!("{} planned", primary);

    Ok(Database {
        name: config.instance_name.clone(),
        primary,
        resources: resources
            .into_iter()
            .map(|r| owned_by(r, "database", &config.instance_name))
            .collect(),
    })
}

fn ingress_rules(config: &DatabaseConfig) -> Value {
    if config.allowed_cidrs.is_empty() {
        return Value::List(Vec::new());
    }
    let cidrs: Vec<String> = config.allowed_cidrs.iter().map(|c| c.to_string()).collect();
    let port = i64::from(config.port);
    Value::List(vec![rule("tcp", port, port, &cidrs)])
}
