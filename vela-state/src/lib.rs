//! Vela State Management
//!
//! Persists what each stack has created, one state file per stack, with
//! locking so two operations never modify the same stack at once.
//!
//! - **StateFile**: managed resources in creation order plus published outputs
//! - **StateBackend**: storage for one stack's state file and its lock
//! - **StackReferences**: outputs of other stacks, read from their state files
//!
//! # Example
//!
//! ```ignore
//! use vela_state::{create_backend, BackendConfig};
//!
//! let backend = create_backend(&BackendConfig::new("local", ".vela", "networking"))?;
//! let lock = backend.acquire_lock("apply").await?;
//! let state = backend.read_state().await?;
//! // ... apply changes ...
//! backend.write_state(&state).await?;
//! backend.release_lock(&lock).await?;
//! ```

pub mod backend;
pub mod backends;
pub mod convert;
pub mod lock;
pub mod reference;
pub mod state;

// Re-export main types for convenience
pub use backend::{BackendConfig, BackendError, BackendResult, StateBackend};
pub use backends::create_backend;
pub use lock::LockInfo;
pub use reference::StackReferences;
pub use state::{ResourceState, StateFile};
