//! State handed from the setup process to the later cleanup process.
//!
//! Each captured git value is stored under its own stable name as a JSON
//! encoded optional string: `"value"` when the key was set (even to `""`),
//! `null` when it was captured as unset. A name with nothing stored was never
//! captured at all, and cleanup leaves that key alone.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::config::StateBackend;
use crate::config_keys::ManagedKey;
use crate::error::{Error, Result};
use crate::git::{ConfigScope, ConfigStore};
use crate::host::{append_file_command, Host};

pub const KEY_PATH: &str = "sshKeyPath";
pub const CONFIG_SCOPE: &str = "gitConfigScope";
pub const NPM_SIGN_GIT_TAG: &str = "npmSignGitTag";

/// A string key/value store whose contents outlive the current process.
pub trait StateStore {
    fn save(&mut self, name: &str, value: &str) -> Result<()>;

    /// `None` when nothing (or an empty string) was saved under `name`.
    fn get(&self, name: &str) -> Option<String>;

    /// Forget everything; called once cleanup has consumed the state.
    fn clear(&mut self) -> Result<()> {
        Ok(())
    }
}

/// State carried by the automation runtime: writes go to the `GITHUB_STATE`
/// command file, and the runtime hands them back to the post step as
/// `STATE_<name>` environment variables.
#[derive(Debug)]
pub struct ActionsState {
    file: Option<PathBuf>,
    values: HashMap<String, String>,
}

impl ActionsState {
    pub fn new(file: Option<PathBuf>, values: HashMap<String, String>) -> Self {
        Self { file, values }
    }

    pub fn from_env(file: Option<PathBuf>) -> Self {
        let values = std::env::vars()
            .filter_map(|(k, v)| k.strip_prefix("STATE_").map(|name| (name.to_string(), v)))
            .collect();
        Self::new(file, values)
    }
}

impl StateStore for ActionsState {
    fn save(&mut self, name: &str, value: &str) -> Result<()> {
        let file = self
            .file
            .as_deref()
            .ok_or_else(|| Error::State("GITHUB_STATE is not set".into()))?;
        append_file_command(file, name, value)?;
        self.values.insert(name.to_string(), value.to_string());
        Ok(())
    }

    fn get(&self, name: &str) -> Option<String> {
        self.values.get(name).filter(|v| !v.is_empty()).cloned()
    }
}

/// State kept in a JSON file, for running both phases outside a runtime.
#[derive(Debug)]
pub struct FileState {
    path: PathBuf,
    values: BTreeMap<String, String>,
}

impl FileState {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let values = match fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content).map_err(|e| {
                Error::State(format!("Failed to parse {}: {e}", path.display()))
            })?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(Error::io("Failed to read", path, e)),
        };
        Ok(Self { path, values })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| Error::io("Failed to create directory", parent, e))?;
        }
        let content = serde_json::to_string_pretty(&self.values)
            .map_err(|e| Error::State(e.to_string()))?;
        fs::write(&self.path, content).map_err(|e| Error::io("Failed to write", &self.path, e))
    }
}

impl StateStore for FileState {
    fn save(&mut self, name: &str, value: &str) -> Result<()> {
        self.values.insert(name.to_string(), value.to_string());
        self.flush()
    }

    fn get(&self, name: &str) -> Option<String> {
        self.values.get(name).filter(|v| !v.is_empty()).cloned()
    }

    fn clear(&mut self) -> Result<()> {
        self.values.clear();
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::io("Failed to remove", &self.path, e)),
        }
    }
}

#[derive(Debug, Default)]
pub struct MemoryState {
    values: HashMap<String, String>,
}

impl StateStore for MemoryState {
    fn save(&mut self, name: &str, value: &str) -> Result<()> {
        self.values.insert(name.to_string(), value.to_string());
        Ok(())
    }

    fn get(&self, name: &str) -> Option<String> {
        self.values.get(name).filter(|v| !v.is_empty()).cloned()
    }

    fn clear(&mut self) -> Result<()> {
        self.values.clear();
        Ok(())
    }
}

/// Pick the store for this run. `Auto` prefers the runtime when it offers
/// a state file.
pub fn open_store(
    backend: StateBackend,
    host: &Host,
    state_file: &Path,
) -> Result<Box<dyn StateStore>> {
    let runtime = || -> Box<dyn StateStore> {
        Box::new(ActionsState::from_env(host.state_file().map(Path::to_path_buf)))
    };
    match backend {
        StateBackend::Actions => Ok(runtime()),
        StateBackend::Auto if host.state_file().is_some() || host.is_actions() => Ok(runtime()),
        StateBackend::Auto | StateBackend::File => {
            let store = FileState::open(state_file)?;
            debug!("Using state file {}", store.path().display());
            Ok(Box::new(store))
        }
    }
}

/// The value (or absence) of each managed key before setup touched it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigSnapshot {
    entries: BTreeMap<ManagedKey, Option<String>>,
}

impl ConfigSnapshot {
    pub fn capture<C: ConfigStore + ?Sized>(store: &C, scope: ConfigScope) -> Result<Self> {
        let mut snapshot = Self::default();
        for key in ManagedKey::ALL {
            snapshot.insert(key, store.get(key.git_key(), scope)?);
        }
        Ok(snapshot)
    }

    pub fn insert(&mut self, key: ManagedKey, value: Option<String>) {
        self.entries.insert(key, value);
    }

    /// `None` if `key` was never captured, `Some(None)` if it was captured
    /// as unset.
    pub fn entry(&self, key: ManagedKey) -> Option<Option<&str>> {
        self.entries.get(&key).map(Option::as_deref)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ManagedKey, Option<&str>)> {
        self.entries.iter().map(|(k, v)| (*k, v.as_deref()))
    }

    pub fn save(&self, state: &mut dyn StateStore) -> Result<()> {
        for (key, value) in &self.entries {
            let encoded =
                serde_json::to_string(value).map_err(|e| Error::State(e.to_string()))?;
            state.save(key.state_name(), &encoded)?;
        }
        Ok(())
    }

    pub fn load(state: &dyn StateStore) -> Self {
        let mut snapshot = Self::default();
        for key in ManagedKey::ALL {
            let Some(raw) = state.get(key.state_name()) else {
                continue;
            };
            match serde_json::from_str::<Option<String>>(&raw) {
                Ok(value) => snapshot.insert(key, value),
                Err(e) => warn!(
                    "Ignoring unreadable saved value for {}: {}",
                    key.git_key(),
                    e
                ),
            }
        }
        snapshot
    }
}

pub fn save_scope(state: &mut dyn StateStore, scope: ConfigScope) -> Result<()> {
    state.save(CONFIG_SCOPE, scope.as_str())
}

pub fn load_scope(state: &dyn StateStore) -> Option<ConfigScope> {
    let raw = state.get(CONFIG_SCOPE)?;
    match raw.parse() {
        Ok(scope) => Some(scope),
        Err(_) => {
            warn!("Ignoring unknown saved git config scope {:?}", raw);
            None
        }
    }
}
