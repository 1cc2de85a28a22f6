//! EC2 resource schema definitions

use crate::resource::Value;
use crate::schema::{AttributeSchema, AttributeType, ResourceSchema, types};

/// Port number type (with validation)
pub fn port_number() -> AttributeType {
    AttributeType::Custom {
        name: "PortNumber".to_string(),
        base: Box::new(AttributeType::Int),
        validate: |value| {
            if let Value::Int(n) = value {
                if *n >= 0 && *n <= 65535 {
                    Ok(())
                } else {
                    Err("Port number must be between 0 and 65535".to_string())
                }
            } else {
                Err("Expected integer".to_string())
            }
        },
    }
}

/// Protocol type for security group rules
pub fn protocol() -> AttributeType {
    AttributeType::Enum(vec![
        "tcp".to_string(),
        "udp".to_string(),
        "icmp".to_string(),
        "-1".to_string(), // All traffic
    ])
}

fn tags() -> AttributeSchema {
    AttributeSchema::new("tags", types::tags()).with_description("Resource tags")
}

fn vpc_id() -> AttributeSchema {
    AttributeSchema::new("vpc_id", types::resource_id())
        .required()
        .with_description("VPC the resource belongs to")
}

fn id_list() -> AttributeType {
    AttributeType::List(Box::new(types::resource_id()))
}

/// Returns the schema for VPC
pub fn vpc_schema() -> ResourceSchema {
    ResourceSchema::new("vpc")
        .with_description("An AWS VPC (Virtual Private Cloud)")
        .attribute(
            AttributeSchema::new("cidr_block", types::cidr())
                .required()
                .with_description("The IPv4 CIDR block for the VPC"),
        )
        .attribute(
            AttributeSchema::new("enable_dns_support", AttributeType::Bool)
                .with_description("Enable DNS resolution support"),
        )
        .attribute(
            AttributeSchema::new("enable_dns_hostnames", AttributeType::Bool)
                .with_description("Enable DNS hostnames"),
        )
        .attribute(
            AttributeSchema::new("assign_generated_ipv6_cidr_block", AttributeType::Bool)
                .with_description("Request an Amazon-provided IPv6 CIDR block"),
        )
        .attribute(tags())
}

/// Returns the schema for Subnet
pub fn subnet_schema() -> ResourceSchema {
    ResourceSchema::new("subnet")
        .with_description("An AWS VPC Subnet")
        .attribute(vpc_id())
        .attribute(
            AttributeSchema::new("cidr_block", types::cidr())
                .required()
                .with_description("The IPv4 CIDR block for the subnet"),
        )
        .attribute(
            AttributeSchema::new("availability_zone", AttributeType::String)
                .required()
                .with_description("The availability zone for the subnet"),
        )
        .attribute(
            AttributeSchema::new("map_public_ip_on_launch", AttributeType::Bool)
                .with_default(Value::Bool(false))
                .with_description("Assign public IPs to instances launched in the subnet"),
        )
        .attribute(
            AttributeSchema::new("assign_ipv6_address_on_creation", AttributeType::Bool)
                .with_default(Value::Bool(false)),
        )
        .attribute(tags())
}

pub fn internet_gateway_schema() -> ResourceSchema {
    ResourceSchema::new("internet_gateway")
        .with_description("An AWS Internet Gateway attached to a VPC")
        .attribute(vpc_id())
        .attribute(tags())
}

/// A single inline route entry
fn route_entry() -> AttributeType {
    AttributeType::Struct(vec![
        AttributeSchema::new("destination", types::cidr()).required(),
        AttributeSchema::new("gateway_id", types::resource_id()),
        AttributeSchema::new("nat_gateway_id", types::resource_id()),
        AttributeSchema::new("vpc_peering_connection_id", types::resource_id()),
    ])
}

pub fn route_table_schema() -> ResourceSchema {
    ResourceSchema::new("route_table")
        .with_description("An AWS VPC Route Table")
        .attribute(vpc_id())
        .attribute(
            AttributeSchema::new("routes", AttributeType::List(Box::new(route_entry())))
                .with_description("Inline routes"),
        )
        .attribute(tags())
}

/// Returns the schema for a standalone route
pub fn route_schema() -> ResourceSchema {
    ResourceSchema::new("route")
        .with_description("A route added to an existing route table")
        .attribute(
            AttributeSchema::new("route_table_id", types::resource_id())
                .required()
                .with_description("Route table receiving the route"),
        )
        .attribute(
            AttributeSchema::new("destination_cidr_block", types::cidr())
                .required()
                .with_description("Destination address block"),
        )
        .attribute(AttributeSchema::new("gateway_id", types::resource_id()))
        .attribute(AttributeSchema::new("nat_gateway_id", types::resource_id()))
        .attribute(AttributeSchema::new(
            "vpc_peering_connection_id",
            types::resource_id(),
        ))
}

pub fn route_table_association_schema() -> ResourceSchema {
    ResourceSchema::new("route_table_association")
        .with_description("Association between a subnet and a route table")
        .attribute(AttributeSchema::new("subnet_id", types::resource_id()).required())
        .attribute(AttributeSchema::new("route_table_id", types::resource_id()).required())
}

pub fn eip_schema() -> ResourceSchema {
    ResourceSchema::new("eip")
        .with_description("An Elastic IP address")
        .attribute(
            AttributeSchema::new("domain", AttributeType::Enum(vec!["vpc".to_string()]))
                .with_default(Value::string("vpc")),
        )
        .attribute(tags())
}

pub fn nat_gateway_schema() -> ResourceSchema {
    ResourceSchema::new("nat_gateway")
        .with_description("A NAT Gateway placed in a public subnet")
        .attribute(
            AttributeSchema::new("allocation_id", types::resource_id())
                .required()
                .with_description("Elastic IP allocation"),
        )
        .attribute(
            AttributeSchema::new("subnet_id", types::resource_id())
                .required()
                .with_description("Public subnet hosting the gateway"),
        )
        .attribute(tags())
}

pub fn vpc_endpoint_schema() -> ResourceSchema {
    ResourceSchema::new("vpc_endpoint")
        .with_description("A VPC endpoint for an AWS service")
        .attribute(vpc_id())
        .attribute(AttributeSchema::new("service_name", AttributeType::String).required())
        .attribute(AttributeSchema::new(
            "vpc_endpoint_type",
            AttributeType::Enum(vec!["Gateway".to_string(), "Interface".to_string()]),
        ))
        .attribute(
            AttributeSchema::new("route_table_ids", id_list())
                .with_description("Route tables receiving the gateway endpoint routes"),
        )
        .attribute(tags())
}

pub fn vpc_peering_connection_schema() -> ResourceSchema {
    ResourceSchema::new("vpc_peering_connection")
        .with_description("A peering connection between two VPCs")
        .attribute(vpc_id())
        .attribute(
            AttributeSchema::new("peer_vpc_id", types::resource_id())
                .required()
                .with_description("Accepter VPC"),
        )
        .attribute(AttributeSchema::new("auto_accept", AttributeType::Bool))
        .attribute(tags())
}

/// A single security group rule
fn security_group_rule() -> AttributeType {
    AttributeType::Struct(vec![
        AttributeSchema::new("protocol", protocol()).required(),
        AttributeSchema::new("from_port", port_number()).required(),
        AttributeSchema::new("to_port", port_number()).required(),
        AttributeSchema::new("cidr_blocks", AttributeType::List(Box::new(types::cidr())))
            .required(),
    ])
}

pub fn security_group_schema() -> ResourceSchema {
    ResourceSchema::new("security_group")
        .with_description("An AWS VPC Security Group")
        .attribute(vpc_id())
        .attribute(
            AttributeSchema::new("name", AttributeType::String)
                .required()
                .with_description("Security group name"),
        )
        .attribute(AttributeSchema::new("description", AttributeType::String))
        .attribute(AttributeSchema::new(
            "ingress",
            AttributeType::List(Box::new(security_group_rule())),
        ))
        .attribute(AttributeSchema::new(
            "egress",
            AttributeType::List(Box::new(security_group_rule())),
        ))
        .attribute(tags())
}

/// Root volume of an instance
fn root_block_device() -> AttributeType {
    AttributeType::Struct(vec![
        AttributeSchema::new("volume_size", types::positive_int())
            .required()
            .with_description("Size in GiB"),
        AttributeSchema::new("encrypted", AttributeType::Bool),
        AttributeSchema::new("delete_on_termination", AttributeType::Bool),
    ])
}

pub fn instance_schema() -> ResourceSchema {
    ResourceSchema::new("instance")
        .with_description("An EC2 instance")
        .attribute(AttributeSchema::new("instance_type", AttributeType::String).required())
        .attribute(
            AttributeSchema::new("ami", AttributeType::String)
                .required()
                .with_description("Machine image the instance boots from"),
        )
        .attribute(AttributeSchema::new("subnet_id", types::resource_id()).required())
        .attribute(AttributeSchema::new("vpc_security_group_ids", id_list()))
        .attribute(AttributeSchema::new(
            "iam_instance_profile",
            types::resource_id(),
        ))
        .attribute(AttributeSchema::new("root_block_device", root_block_device()))
        .attribute(
            AttributeSchema::new("disable_api_termination", AttributeType::Bool)
                .with_description("Refuse termination until the flag is cleared"),
        )
        .attribute(tags())
}

/// Returns all EC2-related schemas
pub fn schemas() -> Vec<ResourceSchema> {
    vec![
        vpc_schema(),
        subnet_schema(),
        internet_gateway_schema(),
        route_table_schema(),
        route_schema(),
        route_table_association_schema(),
        eip_schema(),
        nat_gateway_schema(),
        vpc_endpoint_schema(),
        vpc_peering_connection_schema(),
        security_group_schema(),
        instance_schema(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn valid_vpc() {
        let schema = vpc_schema();
        let mut attrs = HashMap::new();
        attrs.insert("cidr_block".to_string(), Value::string("10.0.0.0/16"));
        attrs.insert("enable_dns_support".to_string(), Value::Bool(true));
        attrs.insert("enable_dns_hostnames".to_string(), Value::Bool(true));

        assert!(schema.validate(&attrs).is_ok());
    }

    #[test]
    fn vpc_missing_required() {
        let schema = vpc_schema();
        let mut attrs = HashMap::new();
        attrs.insert("enable_dns_support".to_string(), Value::Bool(true));

        assert!(schema.validate(&attrs).is_err());
    }

    #[test]
    fn valid_subnet() {
        let schema = subnet_schema();
        let mut attrs = HashMap::new();
        attrs.insert("vpc_id".to_string(), Value::id_of("main-vpc"));
        attrs.insert("cidr_block".to_string(), Value::string("10.0.1.0/24"));
        attrs.insert(
            "availability_zone".to_string(),
            Value::string("eu-west-2a"),
        );

        assert!(schema.validate(&attrs).is_ok());
    }

    #[test]
    fn route_table_routes_are_checked() {
        let schema = route_table_schema();
        let mut route = HashMap::new();
        route.insert("destination".to_string(), Value::string("0.0.0.0/0"));
        route.insert("gateway_id".to_string(), Value::id_of("main-igw"));

        let mut attrs = HashMap::new();
        attrs.insert("vpc_id".to_string(), Value::string("vpc-1"));
        attrs.insert("routes".to_string(), Value::List(vec![Value::Map(route)]));
        assert!(schema.validate(&attrs).is_ok());

        let mut bad = HashMap::new();
        bad.insert("destination".to_string(), Value::string("0.0.0.0"));
        attrs.insert("routes".to_string(), Value::List(vec![Value::Map(bad)]));
        assert!(schema.validate(&attrs).is_err());
    }

    #[test]
    fn security_group_rule_ports_are_checked() {
        let schema = security_group_schema();
        let mut rule = HashMap::new();
        rule.insert("protocol".to_string(), Value::string("tcp"));
        rule.insert("from_port".to_string(), Value::Int(3306));
        rule.insert("to_port".to_string(), Value::Int(70000));
        rule.insert(
            "cidr_blocks".to_string(),
            Value::List(vec![Value::string("10.0.0.0/16")]),
        );

        let mut attrs = HashMap::new();
        attrs.insert("vpc_id".to_string(), Value::string("vpc-1"));
        attrs.insert("name".to_string(), Value::string("db-sg"));
        attrs.insert("ingress".to_string(), Value::List(vec![Value::Map(rule)]));

        assert!(schema.validate(&attrs).is_err());
    }

    #[test]
    fn instance_root_volume_needs_a_size() {
        let schema = instance_schema();
        let mut attrs = HashMap::new();
        attrs.insert("instance_type".to_string(), Value::string("t3a.large"));
        attrs.insert("ami".to_string(), Value::string("ami-08616bba875264c0b"));
        attrs.insert(
            "subnet_id".to_string(),
            Value::ResourceRef("educate-app-private-subnet-eu-west-2a".to_string(), "id".to_string()),
        );
        let mut volume = HashMap::new();
        volume.insert("encrypted".to_string(), Value::Bool(true));
        attrs.insert("root_block_device".to_string(), Value::Map(volume.clone()));
        assert!(schema.validate(&attrs).is_err());

        volume.insert("volume_size".to_string(), Value::Int(50));
        attrs.insert("root_block_device".to_string(), Value::Map(volume));
        assert!(schema.validate(&attrs).is_ok());
    }

    #[test]
    fn port_number_range() {
        let t = port_number();
        assert!(t.validate(&Value::Int(0)).is_ok());
        assert!(t.validate(&Value::Int(65535)).is_ok());
        assert!(t.validate(&Value::Int(65536)).is_err());
        assert!(t.validate(&Value::string("80")).is_err());
    }
}
