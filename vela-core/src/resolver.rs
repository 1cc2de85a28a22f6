//! Resolver - Substitute resource references with known values
//!
//! References are resolved against a binding map built from declared
//! resources merged with their current state. Unknown references are kept
//! as-is so that a plan can show them as "known after apply".

use std::collections::HashMap;

use crate::resource::{Resource, State, Value};

/// binding name -> attributes
pub type BindingMap = HashMap<String, HashMap<String, Value>>;

/// Build a binding map from declared resources and their current states
///
/// State attributes (such as `id`) fill in what the declaration does not set.
pub fn binding_map(resources: &[Resource], states: &[State]) -> BindingMap {
    let by_id: HashMap<_, _> = states.iter().map(|s| (&s.id, s)).collect();
    let mut map = BindingMap::new();

    for resource in resources {
        let mut attrs = resource.attributes.clone();
        if let Some(state) = by_id.get(&resource.id)
            && state.exists
        {
            merge_state(&mut attrs, state);
        }
        map.insert(resource.binding().to_string(), attrs);
    }

    map
}

/// Record a state's attributes under its binding, overriding declared values
pub fn bind_state(map: &mut BindingMap, resource: &Resource, state: &State) {
    let attrs = map.entry(resource.binding().to_string()).or_default();
    for (k, v) in &state.attributes {
        attrs.insert(k.clone(), v.clone());
    }
    if let Some(identifier) = &state.identifier {
        attrs.insert("id".to_string(), Value::String(identifier.clone()));
    }
}

fn merge_state(attrs: &mut HashMap<String, Value>, state: &State) {
    for (k, v) in &state.attributes {
        attrs.entry(k.clone()).or_insert_with(|| v.clone());
    }
    if let Some(identifier) = &state.identifier {
        attrs
            .entry("id".to_string())
            .or_insert_with(|| Value::String(identifier.clone()));
    }
}

pub fn resolve_value(value: &Value, bindings: &BindingMap) -> Value {
    match value {
        Value::ResourceRef(binding_name, attr_name) => {
            if let Some(attrs) = bindings.get(binding_name)
                && let Some(attr_value) = attrs.get(attr_name)
                && attr_value != value
            {
                return resolve_value(attr_value, bindings);
            }
            value.clone()
        }
        Value::List(items) => Value::List(items.iter().map(|v| resolve_value(v, bindings)).collect()),
        Value::Map(map) => Value::Map(
            map.iter()
                .map(|(k, v)| (k.clone(), resolve_value(v, bindings)))
                .collect(),
        ),
        _ => value.clone(),
    }
}

pub fn resolve_resource(resource: &Resource, bindings: &BindingMap) -> Resource {
    let mut resolved = resource.clone();
    for (key, value) in &resource.attributes {
        resolved
            .attributes
            .insert(key.clone(), resolve_value(value, bindings));
    }
    resolved
}

/// Resolve references in all resources against their current states
pub fn resolve_with_state(resources: &[Resource], states: &[State]) -> Vec<Resource> {
    let bindings = binding_map(resources, states);
    resources
        .iter()
        .map(|r| resolve_resource(r, &bindings))
        .collect()
}
