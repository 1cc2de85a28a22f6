//! Interpreter - Apply a plan through a provider
//!
//! Effects run one at a time in plan order and the first failure stops the
//! run; nothing is retried or rolled back. Before each effect its references
//! are resolved again so that identifiers issued by earlier creations reach
//! the resources that depend on them.

use crate::effect::Effect;
use crate::plan::Plan;
use crate::provider::{Provider, ProviderError, ProviderResult};
use crate::resolver::{self, BindingMap};
use crate::resource::{Resource, ResourceId, State};

#[derive(Debug)]
pub enum EffectOutcome {
    Created(State),
    Updated(State),
    Deleted,
}

/// Result of applying a plan
///
/// `outcomes` holds one entry per attempted effect, so it is shorter than
/// the plan when a failure stopped the run.
#[derive(Debug)]
pub struct ApplyResult {
    pub outcomes: Vec<ProviderResult<EffectOutcome>>,
    /// Every existing resource after the run, in creation order
    pub states: Vec<State>,
}

impl ApplyResult {
    pub fn success_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_ok()).count()
    }

    pub fn failure(&self) -> Option<&ProviderError> {
        self.outcomes.iter().find_map(|o| o.as_ref().err())
    }

    pub fn is_success(&self) -> bool {
        self.failure().is_none()
    }
}

pub struct Interpreter<P: Provider> {
    provider: P,
}

impl<P: Provider> Interpreter<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    /// Apply `plan` on top of the recorded `current` states
    ///
    /// `bindings` must cover every declared resource so that references in
    /// later effects resolve once the resources they name exist.
    pub async fn apply(
        &self,
        plan: &Plan,
        current: &[State],
        mut bindings: BindingMap,
    ) -> ApplyResult {
        let mut outcomes = Vec::new();
        let mut states: Vec<State> = current.iter().filter(|s| s.exists).cloned().collect();

        for effect in plan.effects() {
            log::debug!("{} via {}", effect, self.provider.name());
            let outcome = self.execute(effect, &bindings).await;
            match &outcome {
                Ok(done) => record(&mut states, &mut bindings, effect, done),
                Err(e) => log::error!("{}: {}", effect, e),
            }
            let failed = outcome.is_err();
            outcomes.push(outcome);
            if failed {
                break;
            }
        }

        ApplyResult { outcomes, states }
    }

    async fn execute(&self, effect: &Effect, bindings: &BindingMap) -> ProviderResult<EffectOutcome> {
        match effect {
            Effect::Create(resource) => {
                let resolved = resolve_fully(resource, bindings)?;
                self.provider
                    .create(&resolved)
                    .await
                    .map(EffectOutcome::Created)
            }
            Effect::Update { id, from, to } => {
                let resolved = resolve_fully(to, bindings)?;
                let identifier = from.identifier.as_deref().unwrap_or(&id.name);
                self.provider
                    .update(identifier, from, &resolved)
                    .await
                    .map(EffectOutcome::Updated)
            }
            Effect::Delete { id, identifier } => {
                self.provider.delete(id, identifier).await?;
                Ok(EffectOutcome::Deleted)
            }
        }
    }
}

fn resolve_fully(resource: &Resource, bindings: &BindingMap) -> ProviderResult<Resource> {
    let resolved = resolver::resolve_resource(resource, bindings);
    if let Some((key, _)) = resolved
        .attributes
        .iter()
        .find(|(_, v)| v.has_unresolved_ref())
    {
        return Err(ProviderError::UnresolvedReference {
            id: resource.id.clone(),
            attribute: key.clone(),
        });
    }
    Ok(resolved)
}

fn record(states: &mut Vec<State>, bindings: &mut BindingMap, effect: &Effect, outcome: &EffectOutcome) {
    match (effect, outcome) {
        (Effect::Create(resource), EffectOutcome::Created(state)) => {
            resolver::bind_state(bindings, resource, state);
            states.push(state.clone());
        }
        (Effect::Update { to, .. }, EffectOutcome::Updated(state)) => {
            resolver::bind_state(bindings, to, state);
            replace(states, &to.id, state.clone());
        }
        (Effect::Delete { id, .. }, EffectOutcome::Deleted) => {
            states.retain(|s| &s.id != id);
        }
        _ => {}
    }
}

fn replace(states: &mut Vec<State>, id: &ResourceId, mut state: State) {
    if let Some(slot) = states.iter_mut().find(|s| &s.id == id) {
        if state.identifier.is_none() {
            state.identifier = slot.identifier.clone();
        }
        *slot = state;
    } else {
        states.push(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::BoxFuture;
    use crate::resource::Value;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Numbers identifiers per type and refuses the binding named in `full`
    #[derive(Default)]
    struct CountingProvider {
        counter: AtomicUsize,
        full: Option<&'static str>,
    }

    impl Provider for CountingProvider {
        fn name(&self) -> &'static str {
            "counting"
        }

        fn create(&self, resource: &Resource) -> BoxFuture<'_, ProviderResult<State>> {
            let result = if Some(resource.binding()) == self.full {
                Err(ProviderError::Unavailable("address limit exceeded".to_string()))
            } else {
                let n = self.counter.fetch_add(1, Ordering::SeqCst);
                Ok(State::existing(resource.id.clone(), resource.attributes.clone())
                    .with_identifier(format!("{}-{}", resource.id.resource_type, n)))
            };
            Box::pin(async move { result })
        }

        fn update(
            &self,
            _identifier: &str,
            _from: &State,
            to: &Resource,
        ) -> BoxFuture<'_, ProviderResult<State>> {
            let state = State::existing(to.id.clone(), to.attributes.clone());
            Box::pin(async move { Ok(state) })
        }

        fn delete(&self, id: &ResourceId, identifier: &str) -> BoxFuture<'_, ProviderResult<()>> {
            let result = if identifier.is_empty() {
                Err(ProviderError::NotFound {
                    id: id.clone(),
                    identifier: identifier.to_string(),
                })
            } else {
                Ok(())
            };
            Box::pin(async move { result })
        }
    }

    fn vpc_and_igw() -> Vec<Resource> {
        vec![
            Resource::new("vpc", "educate-app-vpc").with_attribute("cidr_block", "172.255.0.0/16"),
            Resource::new("internet_gateway", "educate-app-igw")
                .with_attribute("vpc_id", Value::id_of("educate-app-vpc")),
        ]
    }

    fn create_all(resources: &[Resource]) -> Plan {
        let mut plan = Plan::new();
        for r in resources {
            plan.add(Effect::Create(r.clone()));
        }
        plan
    }

    fn recorded(name: &str, identifier: &str) -> State {
        State::existing(ResourceId::new("vpc", name), Default::default()).with_identifier(identifier)
    }

    #[tokio::test]
    async fn empty_plan_changes_nothing() {
        let current = vec![recorded("educate-app-vpc", "vpc-1")];
        let interpreter = Interpreter::new(CountingProvider::default());
        let result = interpreter.apply(&Plan::new(), &current, BindingMap::new()).await;

        assert!(result.is_success());
        assert_eq!(result.success_count(), 0);
        assert_eq!(result.states, current);
    }

    #[tokio::test]
    async fn created_identifiers_flow_into_later_effects() {
        let resources = vpc_and_igw();
        let interpreter = Interpreter::new(CountingProvider::default());
        let bindings = resolver::binding_map(&resources, &[]);
        let result = interpreter.apply(&create_all(&resources), &[], bindings).await;

        assert!(result.is_success());
        assert_eq!(result.success_count(), 2);
        assert_eq!(
            result.states[1].attributes.get("vpc_id"),
            Some(&Value::string("vpc-0"))
        );
    }

    #[tokio::test]
    async fn first_failure_stops_the_run() {
        let resources = vpc_and_igw();
        let provider = CountingProvider {
            full: Some("educate-app-vpc"),
            ..Default::default()
        };
        let interpreter = Interpreter::new(provider);
        let bindings = resolver::binding_map(&resources, &[]);
        let result = interpreter.apply(&create_all(&resources), &[], bindings).await;

        assert!(!result.is_success());
        assert_eq!(result.outcomes.len(), 1);
        assert!(matches!(result.failure(), Some(ProviderError::Unavailable(_))));
        assert!(result.states.is_empty());
    }

    #[tokio::test]
    async fn unresolved_reference_fails_before_the_provider_is_called() {
        let igw = vpc_and_igw().remove(1);
        let interpreter = Interpreter::new(CountingProvider::default());
        let result = interpreter
            .apply(&create_all(&[igw]), &[], BindingMap::new())
            .await;

        match result.failure() {
            Some(ProviderError::UnresolvedReference { id, attribute }) => {
                assert_eq!(id.name, "educate-app-igw");
                assert_eq!(attribute, "vpc_id");
            }
            other => panic!("expected UnresolvedReference, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn deletes_keep_the_remaining_order() {
        let current = vec![
            recorded("a", "vpc-1"),
            recorded("b", "vpc-2"),
            recorded("c", "vpc-3"),
        ];
        let mut plan = Plan::new();
        plan.add(Effect::Delete {
            id: ResourceId::new("vpc", "b"),
            identifier: "vpc-2".to_string(),
        });

        let interpreter = Interpreter::new(CountingProvider::default());
        let result = interpreter.apply(&plan, &current, BindingMap::new()).await;

        let names: Vec<&str> = result.states.iter().map(|s| s.id.name.as_str()).collect();
        assert_eq!(names, vec!["a", "c"]);
    }

    #[tokio::test]
    async fn failed_delete_keeps_the_recorded_state() {
        let current = vec![recorded("a", "vpc-1")];
        let mut plan = Plan::new();
        plan.add(Effect::Delete {
            id: ResourceId::new("vpc", "a"),
            identifier: String::new(),
        });

        let interpreter = Interpreter::new(CountingProvider::default());
        let result = interpreter.apply(&plan, &current, BindingMap::new()).await;

        assert!(matches!(result.failure(), Some(ProviderError::NotFound { .. })));
        assert_eq!(result.states, current);
    }

    #[tokio::test]
    async fn update_keeps_identifier() {
        let current = vec![recorded("a", "vpc-1")];
        let desired = Resource::new("vpc", "a").with_attribute("enable_dns_hostnames", true);
        let mut plan = Plan::new();
        plan.add(Effect::Update {
            id: desired.id.clone(),
            from: current[0].clone(),
            to: desired.clone(),
        });

        let interpreter = Interpreter::new(CountingProvider::default());
        let result = interpreter.apply(&plan, &current, BindingMap::new()).await;

        assert_eq!(result.states[0].identifier.as_deref(), Some("vpc-1"));
        assert_eq!(
            result.states[0].attributes.get("enable_dns_hostnames"),
            Some(&Value::Bool(true))
        );
    }
}
