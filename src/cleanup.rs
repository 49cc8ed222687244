// Runs in a later process than setup and learns everything from the state
// store. No failure in here may fail the run.

use std::path::Path;

use tracing::{debug, info, warn};

use crate::error::Result;
use crate::git::{ConfigScope, ConfigStore};
use crate::side_effects::NpmTagSigning;
use crate::ssh::KeyManager;
use crate::state::{self, ConfigSnapshot, StateStore};

pub struct Cleanup<'a> {
    pub config: &'a dyn ConfigStore,
    pub keys: &'a KeyManager,
    pub state: &'a mut dyn StateStore,
    pub npm: &'a NpmTagSigning,
}

impl Cleanup<'_> {
    /// Returns the warning that was emitted, if anything went wrong.
    pub fn run(&mut self) -> Option<String> {
        match self.try_run() {
            Ok(()) => {
                info!("✅ SSH signing cleanup complete");
                None
            }
            Err(e) => {
                let message = format!("Cleanup encountered errors: {e}");
                warn!("{}", message);
                Some(message)
            }
        }
    }

    fn try_run(&mut self) -> Result<()> {
        match self.state.get(state::KEY_PATH) {
            Some(key_path) => {
                let key_path = Path::new(&key_path);
                self.keys.deregister_from_agent(key_path);
                self.keys.remove(key_path);
            }
            None => debug!("No SSH key recorded, skipping key removal"),
        }

        self.restore_git_configuration();
        self.clear_npm_configuration();

        self.state.clear()
    }

    fn restore_git_configuration(&self) {
        let snapshot = ConfigSnapshot::load(&*self.state);
        if snapshot.is_empty() {
            info!("No saved git configuration, nothing to restore");
            return;
        }

        info!("Restoring git configuration...");
        let scope = state::load_scope(&*self.state).unwrap_or_else(|| {
            warn!(
                "Git config scope not found in state, falling back to 'local'. \
                 This may indicate setup was not properly initialized."
            );
            ConfigScope::Local
        });

        for (key, original) in snapshot.iter() {
            let key = key.git_key();
            match original {
                Some(value) => match self.config.set(key, value, scope) {
                    Ok(()) => debug!("Restored {} to original value", key),
                    Err(e) => debug!("Failed to restore {}: {}", key, e),
                },
                None => match self.config.unset(key, scope) {
                    Ok(true) => debug!("Unset {} (was not previously set)", key),
                    Ok(false) => {}
                    Err(e) => debug!("Failed to unset {}: {}", key, e),
                },
            }
        }
    }

    fn clear_npm_configuration(&self) {
        if self.state.get(state::NPM_SIGN_GIT_TAG).is_none() {
            return;
        }
        match self.npm.clear() {
            Ok(()) => debug!("Cleared npm signing configuration"),
            Err(failure) => debug!("npm configuration cleanup skipped ({})", failure),
        }
    }
}
