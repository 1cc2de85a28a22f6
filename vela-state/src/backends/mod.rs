//! State backends

mod local;

pub use local::{LocalBackend, state_file_path};

use crate::backend::{BackendConfig, BackendError, BackendResult, StateBackend};

pub fn create_backend(config: &BackendConfig) -> BackendResult<Box<dyn StateBackend>> {
    match config.backend_type.as_str() {
        "local" => Ok(Box::new(LocalBackend::new(config))),
        other => Err(BackendError::UnsupportedBackend(other.to_string())),
    }
}
