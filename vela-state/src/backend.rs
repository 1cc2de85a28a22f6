//! Where a stack's state file and lock are kept

use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;

use crate::lock::LockInfo;
use crate::state::StateFile;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("stack is locked by {} for {} since {} (lock ID: {})", .0.who, .0.operation, .0.created, .0.id)]
    Locked(LockInfo),

    #[error("no lock with ID {0} is held")]
    LockNotFound(String),

    #[error("lock {held} is held, not {requested}")]
    LockMismatch { requested: String, held: String },

    #[error("unsupported backend type '{0}'")]
    UnsupportedBackend(String),

    #[error("state lineage {found} does not match the stored {expected}; refusing to overwrite")]
    LineageMismatch { expected: String, found: String },

    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{}: {source}", .path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

pub type BackendResult<T> = Result<T, BackendError>;

/// Storage for one stack's state file and its lock
#[async_trait]
pub trait StateBackend: Send + Sync {
    /// `None` until the stack is applied for the first time
    async fn read_state(&self) -> BackendResult<Option<StateFile>>;

    /// Refuses a state whose lineage differs from the stored one
    async fn write_state(&self, state: &StateFile) -> BackendResult<()>;

    /// Fails with `Locked` while another unexpired lock is held
    async fn acquire_lock(&self, operation: &str) -> BackendResult<LockInfo>;

    async fn release_lock(&self, lock: &LockInfo) -> BackendResult<()>;

    /// Remove the lock `lock_id` whoever holds it
    async fn force_unlock(&self, lock_id: &str) -> BackendResult<()>;
}

/// The backend holding the state of `stack`
#[derive(Debug, Clone, PartialEq)]
pub struct BackendConfig {
    /// Only "local" is supported
    pub backend_type: String,
    /// State directory, already resolved against the stack file
    pub dir: PathBuf,
    pub stack: String,
}

impl BackendConfig {
    pub fn new(
        backend_type: impl Into<String>,
        dir: impl Into<PathBuf>,
        stack: impl Into<String>,
    ) -> Self {
        Self {
            backend_type: backend_type.into(),
            dir: dir.into(),
            stack: stack.into(),
        }
    }
}
