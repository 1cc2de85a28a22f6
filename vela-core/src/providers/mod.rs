//! Schemas for every resource type the components emit

pub mod ec2;
pub mod elb;
pub mod iam;
pub mod rds;

use std::collections::HashMap;

use crate::resource::{Resource, ResourceId};
use crate::schema::{ResourceSchema, TypeError};

/// All known schemas keyed by resource type
pub fn all_schemas() -> HashMap<String, ResourceSchema> {
    ec2::schemas()
        .into_iter()
        .chain(rds::schemas())
        .chain(iam::schemas())
        .chain(elb::schemas())
        .map(|s| (s.resource_type.clone(), s))
        .collect()
}

/// Type check resources, collecting every error
pub fn validate_resources(resources: &[Resource]) -> Result<(), Vec<(ResourceId, TypeError)>> {
    let schemas = all_schemas();
    let mut errors = Vec::new();

    for resource in resources {
        match schemas.get(&resource.id.resource_type) {
            Some(schema) => {
                if let Err(errs) = schema.validate(&resource.attributes) {
                    errors.extend(errs.into_iter().map(|e| (resource.id.clone(), e)));
                }
            }
            None => errors.push((
                resource.id.clone(),
                TypeError::UnknownResourceType {
                    name: resource.id.resource_type.clone(),
                },
            )),
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
