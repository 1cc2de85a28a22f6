//! Plan - Collection of Effects
//!
//! A Plan is an ordered list of Effects to be executed.
//! No side effects occur until the Plan is applied.

use std::collections::BTreeMap;

use crate::effect::Effect;
use crate::resource::Value;

/// Attribute recording which component declared a resource
pub const COMPONENT_ATTRIBUTE: &str = "_component";

/// Plan containing Effects to be executed
#[derive(Debug, Clone, Default)]
pub struct Plan {
    effects: Vec<Effect>,
}

impl Plan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, effect: Effect) {
        self.effects.push(effect);
    }

    pub fn effects(&self) -> &[Effect] {
        &self.effects
    }

    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }

    /// Generate a summary of the Plan for display
    pub fn summary(&self) -> PlanSummary {
        let mut summary = PlanSummary::default();
        for effect in &self.effects {
            match effect {
                Effect::Create(_) => summary.create += 1,
                Effect::Update { .. } => summary.update += 1,
                Effect::Delete { .. } => summary.delete += 1,
            }
        }
        summary
    }

    /// Effect indices grouped by the component that declared them
    ///
    /// Deletions carry no attributes and are grouped under `None`.
    pub fn group_by_component(&self) -> BTreeMap<Option<String>, Vec<usize>> {
        let mut groups: BTreeMap<Option<String>, Vec<usize>> = BTreeMap::new();
        for (idx, effect) in self.effects.iter().enumerate() {
            let attributes = match effect {
                Effect::Create(r) => Some(&r.attributes),
                Effect::Update { to, .. } => Some(&to.attributes),
                Effect::Delete { .. } => None,
            };
            let component = attributes
                .and_then(|attrs| attrs.get(COMPONENT_ATTRIBUTE))
                .and_then(Value::as_str)
                .map(str::to_string);
            groups.entry(component).or_default().push(idx);
        }
        groups
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct PlanSummary {
    pub create: usize,
    pub update: usize,
    pub delete: usize,
}

impl std::fmt::Display for PlanSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Plan: {} to create, {} to update, {} to delete",
            self.create, self.update, self.delete
        )
    }
}
