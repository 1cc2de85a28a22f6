//! Effect - One planned change to one resource
//!
//! Effects are plain values produced by the differ. Nothing touches
//! infrastructure until the interpreter hands them to a provider.

use crate::resource::{Resource, ResourceId, State};

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Declared but not recorded
    Create(Resource),
    /// Recorded with attributes that differ from the declaration
    Update {
        id: ResourceId,
        from: State,
        to: Resource,
    },
    /// Recorded but no longer declared, addressed by provider identifier
    Delete { id: ResourceId, identifier: String },
}

impl Effect {
    pub fn resource_id(&self) -> &ResourceId {
        match self {
            Effect::Create(r) => &r.id,
            Effect::Update { id, .. } | Effect::Delete { id, .. } => id,
        }
    }
}

impl std::fmt::Display for Effect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Effect::Create(r) => write!(f, "create {}", r.id),
            Effect::Update { id, .. } => write!(f, "update {}", id),
            Effect::Delete { id, identifier } => write!(f, "delete {} ({})", id, identifier),
        }
    }
}
