use std::path::PathBuf;

use tracing::{debug, info};

use crate::config_keys::ManagedKey;
use crate::context::Context;
use crate::error::{Error, Result};
use crate::git::{display_config, ConfigScope, ConfigStore};
use crate::host::Outputs;
use crate::side_effects::NpmTagSigning;
use crate::ssh::KeyManager;
use crate::state::{self, ConfigSnapshot, StateStore};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetupOutcome {
    pub key_path: PathBuf,
    pub public_key: String,
    pub fingerprint: String,
}

pub struct Setup<'a> {
    pub config: &'a dyn ConfigStore,
    pub keys: &'a KeyManager,
    pub state: &'a mut dyn StateStore,
    pub npm: &'a NpmTagSigning,
}

impl Setup<'_> {
    pub fn run(&mut self, ctx: &Context, outputs: &mut dyn Outputs) -> Result<SetupOutcome> {
        let scope = ctx.scope;

        // Writing somewhere other than what was asked would make cleanup
        // restore the wrong file, so there is no fallback to global.
        if scope == ConfigScope::Local && !self.config.in_repository() {
            return Err(Error::RepositoryContext);
        }

        debug!("Saving original git configuration");
        let snapshot = ConfigSnapshot::capture(self.config, scope)?;
        snapshot.save(self.state)?;
        state::save_scope(self.state, scope)?;

        let material = self.keys.install(&ctx.signing_key, &ctx.key_path)?;
        info!("✓ SSH key installed ({})", material.info);
        self.state
            .save(state::KEY_PATH, &ctx.key_path.to_string_lossy())?;

        self.keys.register_with_agent(&ctx.key_path);

        self.configure_git(ctx)?;
        self.configure_npm()?;

        if ctx.create_allowed_signers {
            let path = self.keys.create_trust_file(
                &ctx.user_email,
                &material.public_key,
                &ctx.key_path,
            )?;
            self.set(ManagedKey::AllowedSignersFile, &path.to_string_lossy(), scope)?;
            info!("✓ Allowed signers file created");
        }

        let keys: Vec<&str> = ManagedKey::git_keys().collect();
        display_config(self.config, &keys, scope)?;

        let outcome = SetupOutcome {
            key_path: ctx.key_path.clone(),
            public_key: material.public_key,
            fingerprint: material.info.fingerprint,
        };
        outputs.set_output("ssh-key-path", &outcome.key_path.to_string_lossy())?;
        outputs.set_output("public-key", &outcome.public_key)?;
        outputs.set_output("key-fingerprint", &outcome.fingerprint)?;

        Ok(outcome)
    }

    fn configure_git(&self, ctx: &Context) -> Result<()> {
        info!("Configuring Git for SSH signing...");
        let scope = ctx.scope;

        self.set(ManagedKey::UserName, &ctx.user_name, scope)?;
        self.set(ManagedKey::UserEmail, &ctx.user_email, scope)?;
        self.set(ManagedKey::GpgFormat, "ssh", scope)?;
        self.set(
            ManagedKey::SigningKey,
            &ctx.public_key_path.to_string_lossy(),
            scope,
        )?;

        if ctx.commit_gpgsign {
            self.set(ManagedKey::CommitGpgSign, "true", scope)?;
        }
        if ctx.tag_gpgsign {
            self.set(ManagedKey::TagGpgSign, "true", scope)?;
        }
        // if-asked leaves push.gpgsign to git's own negotiation
        if let Some(value) = ctx.push_gpgsign.config_value() {
            self.set(ManagedKey::PushGpgSign, value, scope)?;
        }

        info!("✓ Git configured for SSH signing");
        Ok(())
    }

    fn configure_npm(&mut self) -> Result<()> {
        if !self.npm.is_enabled() {
            return Ok(());
        }
        match self.npm.apply() {
            Ok(()) => {
                debug!("npm configured for git tag signing");
                self.state.save(state::NPM_SIGN_GIT_TAG, "true")
            }
            Err(failure) => {
                debug!("npm not available, skipping npm configuration ({})", failure);
                Ok(())
            }
        }
    }

    fn set(&self, key: ManagedKey, value: &str, scope: ConfigScope) -> Result<()> {
        self.config.set(key.git_key(), value, scope)
    }
}
