//! Provider - The seam to whatever actually provisions resources
//!
//! The interpreter asks a provider to create, update or delete one resource
//! at a time. A provider answers with the state the resource is left in,
//! including the identifier it was issued.

use std::future::Future;
use std::pin::Pin;

use thiserror::Error;

use crate::resource::{Resource, ResourceId, State};

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("{0} already exists")]
    AlreadyExists(ResourceId),

    #[error("{id}: {identifier} does not exist")]
    NotFound { id: ResourceId, identifier: String },

    #[error("{id}: attribute '{attribute}' references a resource that has not been created")]
    UnresolvedReference { id: ResourceId, attribute: String },

    #[error("provider unavailable: {0}")]
    Unavailable(String),
}

pub type ProviderResult<T> = Result<T, ProviderError>;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub trait Provider: Send + Sync {
    /// Recorded in state next to every resource this provider manages
    fn name(&self) -> &'static str;

    /// Create `resource`, whose references are already resolved
    ///
    /// The returned state carries the issued identifier both as
    /// `State::identifier` and as the `id` attribute.
    fn create(&self, resource: &Resource) -> BoxFuture<'_, ProviderResult<State>>;

    /// Bring the resource recorded as `from` to the declaration `to`
    fn update(
        &self,
        identifier: &str,
        from: &State,
        to: &Resource,
    ) -> BoxFuture<'_, ProviderResult<State>>;

    fn delete(&self, id: &ResourceId, identifier: &str) -> BoxFuture<'_, ProviderResult<()>>;
}
