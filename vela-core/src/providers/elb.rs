//! Load balancing resource schema definitions

use crate::schema::{AttributeSchema, AttributeType, ResourceSchema, types};

use super::ec2::port_number;

fn web_protocol() -> AttributeType {
    AttributeType::Enum(vec!["HTTP".to_string(), "HTTPS".to_string()])
}

fn id_list() -> AttributeType {
    AttributeType::List(Box::new(types::resource_id()))
}

/// Where a listener sends the requests it receives
fn listener_action() -> AttributeType {
    AttributeType::Struct(vec![
        AttributeSchema::new(
            "type",
            AttributeType::Enum(vec!["forward".to_string(), "redirect".to_string()]),
        )
        .required(),
        AttributeSchema::new("target_group_arn", types::resource_id()),
        AttributeSchema::new(
            "redirect",
            AttributeType::Struct(vec![
                AttributeSchema::new("port", AttributeType::String).required(),
                AttributeSchema::new("protocol", web_protocol()).required(),
                AttributeSchema::new(
                    "status_code",
                    AttributeType::Enum(vec!["HTTP_301".to_string(), "HTTP_302".to_string()]),
                )
                .required(),
            ]),
        ),
    ])
}

pub fn load_balancer_schema() -> ResourceSchema {
    ResourceSchema::new("load_balancer")
        .with_description("An application or network load balancer")
        .attribute(AttributeSchema::new("name", AttributeType::String).required())
        .attribute(AttributeSchema::new(
            "load_balancer_type",
            AttributeType::Enum(vec!["application".to_string(), "network".to_string()]),
        ))
        .attribute(AttributeSchema::new("internal", AttributeType::Bool))
        .attribute(AttributeSchema::new("security_groups", id_list()))
        .attribute(
            AttributeSchema::new("subnets", id_list())
                .required()
                .with_description("Public subnets the load balancer listens in"),
        )
        .attribute(AttributeSchema::new(
            "enable_deletion_protection",
            AttributeType::Bool,
        ))
        .attribute(AttributeSchema::new("tags", types::tags()))
}

pub fn target_group_schema() -> ResourceSchema {
    ResourceSchema::new("target_group")
        .with_description("Targets a load balancer forwards requests to")
        .attribute(AttributeSchema::new("name", AttributeType::String).required())
        .attribute(AttributeSchema::new("port", port_number()).required())
        .attribute(AttributeSchema::new("protocol", web_protocol()).required())
        .attribute(AttributeSchema::new("vpc_id", types::resource_id()).required())
        .attribute(AttributeSchema::new("tags", types::tags()))
}

pub fn listener_schema() -> ResourceSchema {
    ResourceSchema::new("listener")
        .with_description("A port a load balancer accepts connections on")
        .attribute(AttributeSchema::new("load_balancer_arn", types::resource_id()).required())
        .attribute(AttributeSchema::new("port", port_number()).required())
        .attribute(AttributeSchema::new("protocol", web_protocol()).required())
        .attribute(AttributeSchema::new("ssl_policy", AttributeType::String))
        .attribute(AttributeSchema::new("certificate_arn", AttributeType::String))
        .attribute(
            AttributeSchema::new(
                "default_actions",
                AttributeType::List(Box::new(listener_action())),
            )
            .required(),
        )
}

pub fn target_group_attachment_schema() -> ResourceSchema {
    ResourceSchema::new("target_group_attachment")
        .with_description("Registers one target with a target group")
        .attribute(AttributeSchema::new("target_group_arn", types::resource_id()).required())
        .attribute(AttributeSchema::new("target_id", types::resource_id()).required())
        .attribute(AttributeSchema::new("port", port_number()))
}

pub fn schemas() -> Vec<ResourceSchema> {
    vec![
        load_balancer_schema(),
        target_group_schema(),
        listener_schema(),
        target_group_attachment_schema(),
    ]
}
