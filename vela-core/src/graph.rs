//! Dependency ordering of declared resources

use std::collections::{HashMap, HashSet};

use thiserror::Error;

use crate::resource::Resource;

#[derive(Debug, Error, PartialEq)]
pub enum GraphError {
    #[error("circular dependency involving '{0}'")]
    Cycle(String),

    #[error("'{from}' references unknown resource '{to}'")]
    UnknownReference { from: String, to: String },

    #[error("duplicate resource name '{0}'")]
    DuplicateBinding(String),
}

/// Resources indexed by binding name, with their outgoing references
pub struct DependencyGraph<'a> {
    resources: &'a [Resource],
    index: HashMap<&'a str, usize>,
}

impl<'a> DependencyGraph<'a> {
    pub fn new(resources: &'a [Resource]) -> Result<Self, GraphError> {
        let mut index = HashMap::new();
        for (i, resource) in resources.iter().enumerate() {
            if index.insert(resource.binding(), i).is_some() {
                return Err(GraphError::DuplicateBinding(resource.binding().to_string()));
            }
        }

        for resource in resources {
            for dep in resource.dependencies() {
                if !index.contains_key(dep.as_str()) {
                    return Err(GraphError::UnknownReference {
                        from: resource.binding().to_string(),
                        to: dep,
                    });
                }
            }
        }

        Ok(Self { resources, index })
    }

    /// Resources ordered so that every resource follows its dependencies
    ///
    /// Declaration order is kept wherever dependencies allow it.
    pub fn topological_order(&self) -> Result<Vec<Resource>, GraphError> {
        let mut sorted = Vec::with_capacity(self.resources.len());
        let mut visited = HashSet::new();
        let mut visiting = HashSet::new();

        for i in 0..self.resources.len() {
            self.visit(i, &mut visited, &mut visiting, &mut sorted)?;
        }

        Ok(sorted)
    }

    fn visit(
        &self,
        i: usize,
        visited: &mut HashSet<usize>,
        visiting: &mut HashSet<usize>,
        sorted: &mut Vec<Resource>,
    ) -> Result<(), GraphError> {
        if visited.contains(&i) {
            return Ok(());
        }
        let resource = &self.resources[i];
        if !visiting.insert(i) {
            return Err(GraphError::Cycle(resource.binding().to_string()));
        }

        for dep in resource.dependencies() {
            if let Some(&j) = self.index.get(dep.as_str()) {
                self.visit(j, visited, visiting, sorted)?;
            }
        }

        visiting.remove(&i);
        visited.insert(i);
        sorted.push(resource.clone());
        Ok(())
    }

    /// Bindings of resources that reference `binding` directly
    pub fn dependents_of(&self, binding: &str) -> Vec<&'a str> {
        self.resources
            .iter()
            .filter(|r| r.dependencies().iter().any(|d| d == binding))
            .map(|r| r.binding())
            .collect()
    }
}
