//! RDS resource schema definitions

use crate::resource::Value;
use crate::schema::{AttributeSchema, AttributeType, ResourceSchema, types};

/// Storage types accepted for a database instance
pub fn storage_type() -> AttributeType {
    AttributeType::Enum(vec![
        "standard".to_string(),
        "gp2".to_string(),
        "io1".to_string(),
    ])
}

/// Backup retention in days (0 disables automated backups)
pub fn backup_retention() -> AttributeType {
    AttributeType::Custom {
        name: "BackupRetention".to_string(),
        base: Box::new(AttributeType::Int),
        validate: |value| match value {
            Value::Int(n) if (0..=35).contains(n) => Ok(()),
            Value::Int(_) => Err("Backup retention must be between 0 and 35 days".to_string()),
            _ => Err("Expected integer".to_string()),
        },
    }
}

pub fn db_subnet_group_schema() -> ResourceSchema {
    ResourceSchema::new("db_subnet_group")
        .with_description("A named set of subnets a database may be placed into")
        .attribute(AttributeSchema::new("name", AttributeType::String).required())
        .attribute(AttributeSchema::new("description", AttributeType::String))
        .attribute(
            AttributeSchema::new(
                "subnet_ids",
                AttributeType::List(Box::new(types::resource_id())),
            )
            .required(),
        )
        .attribute(AttributeSchema::new("tags", types::tags()))
}

pub fn db_parameter_group_schema() -> ResourceSchema {
    ResourceSchema::new("db_parameter_group")
        .with_description("Engine parameters applied to a database instance")
        .attribute(AttributeSchema::new("name", AttributeType::String).required())
        .attribute(
            AttributeSchema::new("family", AttributeType::String)
                .required()
                .with_description("Parameter group family (e.g., mysql5.7)"),
        )
        .attribute(AttributeSchema::new("description", AttributeType::String))
        .attribute(AttributeSchema::new("tags", types::tags()))
}

pub fn db_instance_schema() -> ResourceSchema {
    ResourceSchema::new("db_instance")
        .with_description("A managed relational database instance")
        .attribute(AttributeSchema::new("identifier", AttributeType::String).required())
        .attribute(AttributeSchema::new("engine", AttributeType::String).required())
        .attribute(AttributeSchema::new("engine_version", AttributeType::String))
        .attribute(AttributeSchema::new("instance_class", AttributeType::String).required())
        .attribute(AttributeSchema::new("allocated_storage", types::positive_int()).required())
        .attribute(AttributeSchema::new(
            "max_allocated_storage",
            types::positive_int(),
        ))
        .attribute(AttributeSchema::new("storage_type", storage_type()))
        .attribute(AttributeSchema::new("storage_encrypted", AttributeType::Bool))
        .attribute(AttributeSchema::new(
            "backup_retention_period",
            backup_retention(),
        ))
        .attribute(AttributeSchema::new("multi_az", AttributeType::Bool))
        .attribute(AttributeSchema::new("deletion_protection", AttributeType::Bool))
        .attribute(AttributeSchema::new("skip_final_snapshot", AttributeType::Bool))
        .attribute(AttributeSchema::new(
            "final_snapshot_identifier",
            AttributeType::String,
        ))
        .attribute(AttributeSchema::new("publicly_accessible", AttributeType::Bool))
        .attribute(AttributeSchema::new("db_name", AttributeType::String))
        .attribute(AttributeSchema::new("username", AttributeType::String).required())
        .attribute(
            AttributeSchema::new("manage_master_user_password", AttributeType::Bool)
                .with_description("Let the provider generate and store the master password"),
        )
        .attribute(AttributeSchema::new("port", super::ec2::port_number()))
        .attribute(
            AttributeSchema::new("db_subnet_group_name", types::resource_id()).required(),
        )
        .attribute(AttributeSchema::new(
            "parameter_group_name",
            types::resource_id(),
        ))
        .attribute(AttributeSchema::new(
            "vpc_security_group_ids",
            AttributeType::List(Box::new(types::resource_id())),
        ))
        .attribute(AttributeSchema::new("tags", types::tags()))
}

pub fn rds_cluster_schema() -> ResourceSchema {
    ResourceSchema::new("rds_cluster")
        .with_description("An Aurora cluster; storage is shared by its instances")
        .attribute(AttributeSchema::new("cluster_identifier", AttributeType::String).required())
        .attribute(AttributeSchema::new("engine", aurora_engine()).required())
        .attribute(AttributeSchema::new("engine_version", AttributeType::String))
        .attribute(AttributeSchema::new("port", super::ec2::port_number()))
        .attribute(AttributeSchema::new(
            "backup_retention_period",
            backup_retention(),
        ))
        .attribute(AttributeSchema::new("copy_tags_to_snapshot", AttributeType::Bool))
        .attribute(AttributeSchema::new("storage_encrypted", AttributeType::Bool))
        .attribute(AttributeSchema::new("deletion_protection", AttributeType::Bool))
        .attribute(AttributeSchema::new("skip_final_snapshot", AttributeType::Bool))
        .attribute(AttributeSchema::new(
            "final_snapshot_identifier",
            AttributeType::String,
        ))
        .attribute(AttributeSchema::new("database_name", AttributeType::String))
        .attribute(AttributeSchema::new("master_username", AttributeType::String).required())
        .attribute(AttributeSchema::new(
            "manage_master_user_password",
            AttributeType::Bool,
        ))
        .attribute(
            AttributeSchema::new("db_subnet_group_name", types::resource_id()).required(),
        )
        .attribute(AttributeSchema::new(
            "vpc_security_group_ids",
            AttributeType::List(Box::new(types::resource_id())),
        ))
        .attribute(AttributeSchema::new("tags", types::tags()))
}

pub fn rds_cluster_instance_schema() -> ResourceSchema {
    ResourceSchema::new("rds_cluster_instance")
        .with_description("A compute instance attached to an Aurora cluster")
        .attribute(AttributeSchema::new("identifier", AttributeType::String).required())
        .attribute(
            AttributeSchema::new("cluster_identifier", types::resource_id())
                .required()
                .with_description("Cluster the instance serves"),
        )
        .attribute(AttributeSchema::new("engine", aurora_engine()).required())
        .attribute(AttributeSchema::new("engine_version", AttributeType::String))
        .attribute(AttributeSchema::new("instance_class", AttributeType::String).required())
        .attribute(AttributeSchema::new("publicly_accessible", AttributeType::Bool))
        .attribute(AttributeSchema::new("tags", types::tags()))
}

/// Engines a cluster can run
pub fn aurora_engine() -> AttributeType {
    AttributeType::Enum(vec![
        "aurora-mysql".to_string(),
        "aurora-postgresql".to_string(),
    ])
}

/// Returns all RDS-related schemas
pub fn schemas() -> Vec<ResourceSchema> {
    vec![
        db_subnet_group_schema(),
        db_parameter_group_schema(),
        db_instance_schema(),
        rds_cluster_schema(),
        rds_cluster_instance_schema(),
    ]
}
