//! Outputs published by other stacks
//!
//! A stack may place resources into networks owned by another stack. The
//! referenced stacks' state files are read once, before the stack is built.

use std::collections::BTreeMap;
use std::path::Path;

use vela_core::resource::Value;
use vela_core::stack::{ConfigError, OutputSource};

use crate::backends::state_file_path;
use crate::state::StateFile;

/// Published outputs of the stacks one stack depends on
#[derive(Debug, Default)]
pub struct StackReferences {
    stacks: BTreeMap<String, Result<StateFile, String>>,
}

impl StackReferences {
    /// Read the state of every stack in `stacks` from the state directory `dir`
    pub async fn load(dir: impl AsRef<Path>, stacks: &[String]) -> Self {
        let dir = dir.as_ref();
        let mut loaded = BTreeMap::new();
        for stack in stacks {
            let path = state_file_path(dir, stack);
            let state = match tokio::fs::read_to_string(&path).await {
                Ok(content) => serde_json::from_str::<StateFile>(&content)
                    .map_err(|e| format!("{}: {}", path.display(), e)),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    Err(format!("no state at {}; apply it first", path.display()))
                }
                Err(e) => Err(format!("{}: {}", path.display(), e)),
            };
            if let Err(message) = &state {
                log::debug!("stack {} unavailable: {}", stack, message);
            }
            loaded.insert(stack.clone(), state);
        }
        Self { stacks: loaded }
    }
}

impl OutputSource for StackReferences {
    fn output(&self, stack: &str, key: &str) -> Result<Value, ConfigError> {
        let state = match self.stacks.get(stack) {
            Some(Ok(state)) => state,
            Some(Err(message)) => {
                return Err(ConfigError::OutputsUnavailable {
                    stack: stack.to_string(),
                    message: message.clone(),
                });
            }
            None => {
                return Err(ConfigError::OutputsUnavailable {
                    stack: stack.to_string(),
                    message: "stack was not loaded".to_string(),
                });
            }
        };

        state.output(key).ok_or_else(|| ConfigError::UnknownOutput {
            stack: stack.to_string(),
            output: key.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn networking_state() -> StateFile {
        let mut outputs = BTreeMap::new();
        outputs.insert("educate-db.vpc_id".to_string(), Value::string("vpc-00000002"));
        let mut state = StateFile::new("networking");
        state.set_outputs(&outputs);
        state
    }

    fn write_networking_state(dir: &Path) {
        let content = serde_json::to_string(&networking_state()).unwrap();
        std::fs::write(dir.join("networking.state.json"), content).unwrap();
    }

    #[tokio::test]
    async fn reads_outputs_from_state_dir() {
        let dir = tempdir().unwrap();
        write_networking_state(dir.path());

        let refs = StackReferences::load(dir.path(), &["networking".to_string()]).await;
        assert_eq!(
            refs.output("networking", "educate-db.vpc_id").unwrap(),
            Value::string("vpc-00000002")
        );
        assert!(matches!(
            refs.output("networking", "educate-db.missing"),
            Err(ConfigError::UnknownOutput { .. })
        ));
    }

    #[tokio::test]
    async fn missing_state_is_unavailable() {
        let dir = tempdir().unwrap();
        let refs = StackReferences::load(dir.path(), &["networking".to_string()]).await;
        match refs.output("networking", "educate-db.vpc_id") {
            Err(ConfigError::OutputsUnavailable { stack, message }) => {
                assert_eq!(stack, "networking");
                assert!(message.contains("apply it first"));
            }
            other => panic!("expected OutputsUnavailable, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn unloaded_stack_is_unavailable() {
        let dir = tempdir().unwrap();
        write_networking_state(dir.path());
        let refs = StackReferences::load(dir.path(), &["networking".to_string()]).await;
        assert!(refs.output("networking", "educate-db.vpc_id").is_ok());
        assert!(matches!(
            refs.output("other", "x"),
            Err(ConfigError::OutputsUnavailable { .. })
        ));
    }
}
