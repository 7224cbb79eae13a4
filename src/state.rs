// Checkpoint persistence
//
// The state file holds a single cursor: the first mainnet block that has not
// been scanned yet. A missing or unreadable file is a normal condition on
// first start and falls back to the configured block. Writes go through a
// temp file + rename so a crash never leaves a truncated record behind.

use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

use crate::error::{AppResult, StateError};

/// Persisted distributor state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct State {
    #[serde(alias = "fromBlock")]
    pub from_block: u64,
}

impl State {
    pub fn new(from_block: u64) -> Self {
        Self { from_block }
    }
}

/// Loads and saves [`State`] to a JSON file
#[derive(Debug, Clone)]
pub struct StateManager {
    state_file: PathBuf,
}

impl StateManager {
    pub fn new(state_file: impl Into<PathBuf>) -> Self {
        Self {
            state_file: state_file.into(),
        }
    }

    pub fn state_file(&self) -> &Path {
        &self.state_file
    }

    /// Load the persisted state, or start from `initial_from_block`
    ///
    /// Never fails: read and parse errors are logged and replaced by the
    /// initial value.
    pub fn load(&self, initial_from_block: u64) -> State {
        if self.state_file.exists() {
            match self.read() {
                Ok(state) => {
                    info!(
                        "📂 Loaded state from {:?}: from_block={}",
                        self.state_file, state.from_block
                    );
                    return state;
                }
                Err(e) => {
                    warn!(
                        "⚠️ Failed to load state from {:?}: {}. Using initial value.",
                        self.state_file, e
                    );
                }
            }
        }

        info!("Creating new state with from_block={}", initial_from_block);
        State::new(initial_from_block)
    }

    /// Atomically replace the state file
    pub fn save(&self, state: &State) -> AppResult<()> {
        if let Err(e) = self.write_atomic(state) {
            error!("❌ Failed to save state to {:?}: {}", self.state_file, e);
            return Err(e.into());
        }

        debug!(
            "Saved state to {:?}: from_block={}",
            self.state_file, state.from_block
        );
        Ok(())
    }

    fn read(&self) -> Result<State, StateError> {
        let raw = std::fs::read_to_string(&self.state_file).map_err(|source| StateError::Read {
            path: self.state_file.clone(),
            source,
        })?;

        serde_json::from_str(&raw).map_err(|source| StateError::Parse {
            path: self.state_file.clone(),
            source,
        })
    }

    fn write_atomic(&self, state: &State) -> Result<(), StateError> {
        let json = serde_json::to_string_pretty(state).map_err(StateError::Serialize)?;
        let write_err = |source| StateError::Write {
            path: self.state_file.clone(),
            source,
        };

        if let Some(parent) = self.state_file.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(write_err)?;
            }
        }

        // Write atomically via temp file
        let temp_path = self.temp_path();
        let mut file = std::fs::File::create(&temp_path).map_err(write_err)?;
        file.write_all(json.as_bytes()).map_err(write_err)?;
        file.sync_all().map_err(write_err)?;

        if let Err(e) = std::fs::rename(&temp_path, &self.state_file) {
            let _ = std::fs::remove_file(&temp_path);
            return Err(write_err(e));
        }

        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .state_file
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "state.json".into());
        name.push(".tmp");
        self.state_file.with_file_name(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn manager_in(dir: &TempDir) -> StateManager {
        StateManager::new(dir.path().join("state.json"))
    }

    #[test]
    fn test_load_missing_file_uses_initial_block() {
        let dir = TempDir::new().unwrap();
        let manager = manager_in(&dir);

        assert_eq!(manager.load(42), State::new(42));
        // Loading must not create the file
        assert!(!manager.state_file().exists());
    }

    #[test]
    fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        let manager = manager_in(&dir);

        manager.save(&State::new(1234)).unwrap();
        assert_eq!(manager.load(0), State::new(1234));

        // Overwrite with a newer cursor
        manager.save(&State::new(1300)).unwrap();
        assert_eq!(manager.load(0), State::new(1300));
    }

    #[test]
    fn test_save_leaves_no_temp_file() {
        let dir = TempDir::new().unwrap();
        let manager = manager_in(&dir);

        manager.save(&State::new(7)).unwrap();

        let entries: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(entries, vec![std::ffi::OsString::from("state.json")]);
    }

    #[test]
    fn test_saved_file_is_human_readable_json() {
        let dir = TempDir::new().unwrap();
        let manager = manager_in(&dir);

        manager.save(&State::new(99)).unwrap();

        let raw = std::fs::read_to_string(manager.state_file()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value, serde_json::json!({ "from_block": 99 }));
    }

    #[test]
    fn test_corrupt_file_falls_back_to_initial_block() {
        let dir = TempDir::new().unwrap();
        let manager = manager_in(&dir);

        std::fs::write(manager.state_file(), "{ not json").unwrap();
        assert_eq!(manager.load(500), State::new(500));

        std::fs::write(manager.state_file(), r#"{"from_block": -3}"#).unwrap();
        assert_eq!(manager.load(500), State::new(500));

        std::fs::write(manager.state_file(), r#"{"something_else": 1}"#).unwrap();
        assert_eq!(manager.load(500), State::new(500));
    }

    #[test]
    fn test_unknown_fields_and_camel_case_are_accepted() {
        let dir = TempDir::new().unwrap();
        let manager = manager_in(&dir);

        std::fs::write(
            manager.state_file(),
            r#"{"from_block": 77, "written_by": "v2"}"#,
        )
        .unwrap();
        assert_eq!(manager.load(0), State::new(77));

        std::fs::write(manager.state_file(), r#"{"fromBlock": 88}"#).unwrap();
        assert_eq!(manager.load(0), State::new(88));
    }

    #[test]
    fn test_save_creates_parent_directories() {
        let dir = TempDir::new().unwrap();
        let manager = StateManager::new(dir.path().join("nested/deeper/state.json"));

        manager.save(&State::new(5)).unwrap();
        assert_eq!(manager.load(0), State::new(5));
    }

    #[test]
    fn test_save_failure_is_reported() {
        let dir = TempDir::new().unwrap();
        // The state path is an existing directory, so the rename must fail
        let state_path = dir.path().join("state.json");
        std::fs::create_dir(&state_path).unwrap();
        std::fs::write(state_path.join("occupied"), "x").unwrap();
        let manager = StateManager::new(&state_path);

        let err = manager.save(&State::new(1)).unwrap_err();
        assert!(matches!(
            err,
            crate::error::AppError::State(StateError::Write { .. })
        ));
    }

    #[test]
    fn test_failed_rename_removes_temp_file() {
        let dir = TempDir::new().unwrap();
        let state_path = dir.path().join("state.json");
        std::fs::create_dir(&state_path).unwrap();
        std::fs::write(state_path.join("occupied"), "x").unwrap();
        let manager = StateManager::new(&state_path);

        assert!(manager.save(&State::new(1)).is_err());

        assert!(!dir.path().join("state.json.tmp").exists());
        // The blocking directory itself is left alone
        assert!(state_path.join("occupied").exists());
    }
}
