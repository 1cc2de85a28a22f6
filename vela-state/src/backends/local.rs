//! Local file backend
//!
//! Each stack's state lives in `<dir>/<stack>.state.json`. While an
//! operation runs, `<dir>/<stack>.lock` exists next to it; the lock file is
//! created exclusively so that two runs can never both hold it.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

use crate::backend::{BackendConfig, BackendError, BackendResult, StateBackend};
use crate::lock::LockInfo;
use crate::state::StateFile;

pub struct LocalBackend {
    state_path: PathBuf,
    lock_path: PathBuf,
}

/// Path of the state file for `stack` inside `dir`
pub fn state_file_path(dir: &Path, stack: &str) -> PathBuf {
    dir.join(format!("{}.state.json", stack))
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> BackendError + '_ {
    move |source| BackendError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn json_error(path: &Path) -> impl FnOnce(serde_json::Error) -> BackendError + '_ {
    move |source| BackendError::Json {
        path: path.to_path_buf(),
        source,
    }
}

/// Contents of `path`, or `None` if it does not exist
async fn read_if_present(path: &Path) -> BackendResult<Option<String>> {
    match tokio::fs::read_to_string(path).await {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(io_error(path)(e)),
    }
}

impl LocalBackend {
    pub fn new(config: &BackendConfig) -> Self {
        Self {
            state_path: state_file_path(&config.dir, &config.stack),
            lock_path: config.dir.join(format!("{}.lock", config.stack)),
        }
    }

    async fn ensure_dir(&self) -> BackendResult<()> {
        match self.state_path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => tokio::fs::create_dir_all(dir)
                .await
                .map_err(io_error(dir)),
            _ => Ok(()),
        }
    }

    async fn read_lock(&self) -> BackendResult<Option<LockInfo>> {
        match read_if_present(&self.lock_path).await? {
            Some(content) => serde_json::from_str(&content)
                .map(Some)
                .map_err(json_error(&self.lock_path)),
            None => Ok(None),
        }
    }

    /// Create the lock file, failing if it already exists
    async fn create_lock(&self, lock: &LockInfo) -> BackendResult<bool> {
        let content = serde_json::to_vec_pretty(lock).map_err(json_error(&self.lock_path))?;
        let mut file = match tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.lock_path)
            .await
        {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => return Ok(false),
            Err(e) => return Err(io_error(&self.lock_path)(e)),
        };
        file.write_all(&content)
            .await
            .map_err(io_error(&self.lock_path))?;
        file.flush().await.map_err(io_error(&self.lock_path))?;
        Ok(true)
    }

    async fn remove_lock(&self) -> BackendResult<()> {
        match tokio::fs::remove_file(&self.lock_path).await {
            Ok(()) => Ok(()),
            // Someone else removed it first
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_error(&self.lock_path)(e)),
        }
    }
}

#[async_trait]
impl StateBackend for LocalBackend {
    async fn read_state(&self) -> BackendResult<Option<StateFile>> {
        match read_if_present(&self.state_path).await? {
            Some(content) => serde_json::from_str(&content)
                .map(Some)
                .map_err(json_error(&self.state_path)),
            None => Ok(None),
        }
    }

    async fn write_state(&self, state: &StateFile) -> BackendResult<()> {
        if let Some(stored) = self.read_state().await?
            && stored.lineage != state.lineage
        {
            return Err(BackendError::LineageMismatch {
                expected: stored.lineage,
                found: state.lineage.clone(),
            });
        }

        let content = serde_json::to_string_pretty(state).map_err(json_error(&self.state_path))?;
        self.ensure_dir().await?;
        tokio::fs::write(&self.state_path, content)
            .await
            .map_err(io_error(&self.state_path))?;

        log::debug!("wrote {} (serial {})", self.state_path.display(), state.serial);
        Ok(())
    }

    async fn acquire_lock(&self, operation: &str) -> BackendResult<LockInfo> {
        self.ensure_dir().await?;
        let lock = LockInfo::new(operation);
        let mut may_take_over = true;

        loop {
            if self.create_lock(&lock).await? {
                return Ok(lock);
            }
            let Some(held) = self.read_lock().await? else {
                // Released between the two calls
                continue;
            };
            if held.is_expired() && may_take_over {
                log::warn!("taking over expired lock {} held by {}", held.id, held.who);
                self.remove_lock().await?;
                may_take_over = false;
                continue;
            }
            return Err(BackendError::Locked(held));
        }
    }

    async fn release_lock(&self, lock: &LockInfo) -> BackendResult<()> {
        let held = self
            .read_lock()
            .await?
            .ok_or_else(|| BackendError::LockNotFound(lock.id.clone()))?;
        if held.id != lock.id {
            return Err(BackendError::LockMismatch {
                requested: lock.id.clone(),
                held: held.id,
            });
        }
        self.remove_lock().await
    }

    async fn force_unlock(&self, lock_id: &str) -> BackendResult<()> {
        match self.read_lock().await {
            Ok(None) => Err(BackendError::LockNotFound(lock_id.to_string())),
            Ok(Some(held)) if held.id != lock_id => Err(BackendError::LockMismatch {
                requested: lock_id.to_string(),
                held: held.id,
            }),
            Ok(Some(_)) => self.remove_lock().await,
            Err(BackendError::Json { path, source }) => {
                log::warn!("removing unreadable lock {}: {}", path.display(), source);
                self.remove_lock().await
            }
            Err(e) => Err(e),
        }
    }
}
