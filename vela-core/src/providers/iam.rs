//! IAM resource schema definitions

use crate::resource::Value;
use crate::schema::{AttributeSchema, AttributeType, ResourceSchema, types};

/// Amazon resource name of a policy
pub fn policy_arn() -> AttributeType {
    AttributeType::Custom {
        name: "PolicyArn".to_string(),
        base: Box::new(AttributeType::String),
        validate: |value| match value {
            Value::String(s) if s.starts_with("arn:aws:iam::") && s.contains(":policy/") => Ok(()),
            Value::String(s) => Err(format!("'{}' is not a policy ARN", s)),
            _ => Err("Expected string".to_string()),
        },
    }
}

/// Policy document as JSON text
fn policy_document() -> AttributeType {
    AttributeType::Custom {
        name: "PolicyDocument".to_string(),
        base: Box::new(AttributeType::String),
        validate: |value| match value {
            Value::String(s) if s.trim_start().starts_with('{') => Ok(()),
            Value::String(_) => Err("Policy document must be a JSON object".to_string()),
            _ => Err("Expected string".to_string()),
        },
    }
}

pub fn iam_role_schema() -> ResourceSchema {
    ResourceSchema::new("iam_role")
        .with_description("An IAM role assumed by a service")
        .attribute(AttributeSchema::new("name", AttributeType::String).required())
        .attribute(
            AttributeSchema::new("assume_role_policy", policy_document())
                .required()
                .with_description("Who may assume the role"),
        )
        .attribute(AttributeSchema::new("tags", types::tags()))
}

pub fn iam_role_policy_attachment_schema() -> ResourceSchema {
    ResourceSchema::new("iam_role_policy_attachment")
        .with_description("A managed policy attached to a role")
        .attribute(AttributeSchema::new("role", types::resource_id()).required())
        .attribute(AttributeSchema::new("policy_arn", policy_arn()).required())
}

pub fn iam_instance_profile_schema() -> ResourceSchema {
    ResourceSchema::new("iam_instance_profile")
        .with_description("Hands a role to the instances launched with it")
        .attribute(AttributeSchema::new("name", AttributeType::String).required())
        .attribute(AttributeSchema::new("role", types::resource_id()).required())
        .attribute(AttributeSchema::new("tags", types::tags()))
}

pub fn schemas() -> Vec<ResourceSchema> {
    vec![
        iam_role_schema(),
        iam_role_policy_attachment_schema(),
        iam_instance_profile_schema(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn policy_arns_are_checked() {
        let t = policy_arn();
        assert!(
            t.validate(&Value::string(
                "arn:aws:iam::aws:policy/AmazonSSMManagedInstanceCore"
            ))
            .is_ok()
        );
        assert!(t.validate(&Value::string("AmazonS3FullAccess")).is_err());
    }

    #[test]
    fn role_needs_a_policy_document() {
        let schema = iam_role_schema();
        let mut attrs = HashMap::new();
        attrs.insert("name".to_string(), Value::string("educate-role"));
        attrs.insert("assume_role_policy".to_string(), Value::string("ec2"));
        assert!(schema.validate(&attrs).is_err());

        attrs.insert(
            "assume_role_policy".to_string(),
            Value::string(r#"{"Version": "2012-10-17", "Statement": []}"#),
        );
        assert!(schema.validate(&attrs).is_ok());
    }
}
