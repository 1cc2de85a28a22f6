//! Differ - Compare desired state with current state to generate a Plan
//!
//! Compares the "desired state" declared by components with the "current
//! state" recorded for the stack, and generates the required Effects (Plan).

use std::collections::{HashMap, HashSet};

use crate::effect::Effect;
use crate::plan::Plan;
use crate::resource::{Resource, ResourceId, State, Value};

/// Result of a diff operation
#[derive(Debug, Clone, PartialEq)]
pub enum Diff {
    /// Resource does not exist -> needs creation
    Create(Resource),
    /// Resource exists with differences -> needs update
    Update {
        id: ResourceId,
        from: State,
        to: Resource,
        changed_attributes: Vec<String>,
    },
    /// Resource exists with no differences -> no action needed
    NoChange(ResourceId),
}

impl Diff {
    /// Returns whether this Diff involves a change
    pub fn is_change(&self) -> bool {
        !matches!(self, Diff::NoChange(_))
    }
}

/// Compare desired state with current state to compute a Diff
pub fn diff(desired: &Resource, current: &State) -> Diff {
    if !current.exists {
        return Diff::Create(desired.clone());
    }

    let changed = find_changed_attributes(&desired.attributes, &current.attributes);

    if changed.is_empty() {
        Diff::NoChange(desired.id.clone())
    } else {
        Diff::Update {
            id: desired.id.clone(),
            from: current.clone(),
            to: desired.clone(),
            changed_attributes: changed,
        }
    }
}

/// Find changed attributes between desired and current state
fn find_changed_attributes(
    desired: &HashMap<String, Value>,
    current: &HashMap<String, Value>,
) -> Vec<String> {
    let mut changed = Vec::new();

    for (key, desired_value) in desired {
        // Skip internal attributes (starting with _)
        if key.starts_with('_') {
            continue;
        }

        match current.get(key) {
            Some(current_value) if current_value == desired_value => {}
            _ => changed.push(key.clone()),
        }
    }

    changed.sort();
    changed
}

/// Compute Diffs for all declared resources and generate a Plan
///
/// `desired` must already be in dependency order. `current` is the recorded
/// state in creation order; recorded resources that are no longer declared
/// are deleted last, newest first.
pub fn create_plan(desired: &[Resource], current: &[State]) -> Plan {
    let mut plan = Plan::new();
    let by_id: HashMap<&ResourceId, &State> = current.iter().map(|s| (&s.id, s)).collect();

    for resource in desired {
        let state = by_id
            .get(&resource.id)
            .map(|s| (*s).clone())
            .unwrap_or_else(|| State::not_found(resource.id.clone()));

        match diff(resource, &state) {
            Diff::Create(r) => plan.add(Effect::Create(r)),
            Diff::Update { id, from, to, .. } => plan.add(Effect::Update { id, from, to }),
            Diff::NoChange(_) => {}
        }
    }

    let declared: HashSet<&ResourceId> = desired.iter().map(|r| &r.id).collect();
    for state in current.iter().rev() {
        if state.exists && !declared.contains(&state.id) {
            plan.add(delete_effect(state));
        }
    }

    plan
}

/// Plan the removal of every existing resource, in reverse creation order
pub fn destroy_plan(current: &[State]) -> Plan {
    let mut plan = Plan::new();
    for state in current.iter().rev().filter(|s| s.exists) {
        plan.add(delete_effect(state));
    }
    plan
}

fn delete_effect(state: &State) -> Effect {
    Effect::Delete {
        id: state.id.clone(),
        identifier: state
            .identifier
            .clone()
            .unwrap_or_else(|| state.id.name.clone()),
    }
}
