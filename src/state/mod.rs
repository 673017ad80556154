//! Persisted setting-value state.
//!
//! The state file is a YAML document mirroring the `application` shape of the
//! config, recording one `value` per setting plus any pass-through keys:
//!
//! ```yaml
//! application:
//!   components:
//!     web:
//!       settings:
//!         cpu:
//!           value: 512
//! ```
//!
//! Loading is deliberately lenient: a missing, unreadable, or corrupt file is
//! an expected first-run condition and collapses to the empty state rather
//! than failing. [`StateLoad`] keeps the three non-success cases apart for
//! diagnosability; [`StateLoad::into_state`] applies the fallback.
//!
//! No locking is provided. Concurrent writers to the same path may race;
//! callers are expected to serialize their own load-mutate-save cycles
//! (one process per invocation in the originating driver pattern).

use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use tempfile::NamedTempFile;

use crate::Result;

/// Conventional state file location when the caller does not choose one.
pub const DEFAULT_STATE_PATH: &str = "./state.yaml";

/// Persisted record of previously chosen setting values.
///
/// Every level is optional or defaulted: state is never required to cover
/// every configured component or setting, and unknown keys are ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct State {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub application: Option<ApplicationState>,
}

/// The `application` section of the state document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApplicationState {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub components: BTreeMap<String, ComponentState>,
    /// Pass-through application keys recorded alongside component values.
    #[serde(flatten)]
    pub passthrough: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComponentState {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub settings: BTreeMap<String, SettingState>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SettingState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

impl State {
    /// True when nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.application.is_none()
    }

    /// Recorded override for a pass-through application key, if any.
    pub fn passthrough(&self, key: &str) -> Option<&Value> {
        self.application.as_ref()?.passthrough.get(key)
    }

    /// Recorded value for a setting, if one exists at that exact path.
    pub fn setting_value(&self, component: &str, setting: &str) -> Option<&Value> {
        self.application
            .as_ref()?
            .components
            .get(component)?
            .settings
            .get(setting)?
            .value
            .as_ref()
    }

    /// Record a value for a setting, creating intermediate levels as needed.
    ///
    /// This is how adjust drivers write back what they applied before a
    /// [`StateStore::save`].
    pub fn set_setting_value(&mut self, component: &str, setting: &str, value: Value) {
        self.application
            .get_or_insert_with(ApplicationState::default)
            .components
            .entry(component.to_string())
            .or_default()
            .settings
            .entry(setting.to_string())
            .or_default()
            .value = Some(value);
    }
}

/// Outcome of a [`StateStore::load`].
///
/// All non-[`Loaded`](StateLoad::Loaded) cases resolve to the empty state,
/// but they are kept apart so callers (and logs) can tell a fresh system
/// from a broken file.
#[derive(Debug)]
pub enum StateLoad {
    /// The file existed and parsed as a state document.
    Loaded(State),
    /// No file at the path; the normal first-run case.
    Absent,
    /// The file exists but could not be read.
    Unreadable(io::Error),
    /// The file was read but is not a valid state document.
    Corrupt(serde_yaml::Error),
}

impl StateLoad {
    /// Collapse to a usable state: whatever was loaded, else empty.
    pub fn into_state(self) -> State {
        match self {
            StateLoad::Loaded(state) => state,
            StateLoad::Absent | StateLoad::Unreadable(_) | StateLoad::Corrupt(_) => {
                State::default()
            }
        }
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self, StateLoad::Loaded(_))
    }
}

/// Loads and persists [`State`] documents at a fixed path.
///
/// The path is chosen at construction so reconciliations in one process can
/// target different state files without sharing any global.
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the state file, distinguishing why nothing was loaded.
    ///
    /// Never fails: use [`StateLoad::into_state`] for the lenient fallback.
    pub fn load(&self) -> StateLoad {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "no state file, starting empty");
                return StateLoad::Absent;
            }
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "state file unreadable, starting empty");
                return StateLoad::Unreadable(e);
            }
        };

        match serde_yaml::from_str(&raw) {
            Ok(state) => StateLoad::Loaded(state),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "state file corrupt, starting empty");
                StateLoad::Corrupt(e)
            }
        }
    }

    /// Load and collapse straight to a usable state.
    pub fn load_state(&self) -> State {
        self.load().into_state()
    }

    /// Persist the full state, replacing the file atomically.
    ///
    /// The document is written to a temp file in the target directory and
    /// renamed over the path, so readers never observe a partial write.
    /// Failures are logged and returned; callers needing durability must
    /// check the result.
    pub fn save(&self, state: &State) -> Result<()> {
        match self.write_atomic(state) {
            Ok(()) => Ok(()),
            Err(e) => {
                tracing::error!(path = %self.path.display(), error = %e, "failed to save state");
                Err(e)
            }
        }
    }

    fn write_atomic(&self, state: &State) -> Result<()> {
        let doc = serde_yaml::to_string(state)?;

        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(doc.as_bytes())?;
        tmp.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new(DEFAULT_STATE_PATH)
    }
}
