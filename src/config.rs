use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

pub const DEFAULT_KEY_PATH: &str = "~/.ssh/signing_key";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct Tools {
    pub git: String,
    pub ssh_keygen: String,
    pub ssh_add: String,
    pub icacls: String,
    pub npm: String,
}

impl Default for Tools {
    fn default() -> Self {
        Tools {
            git: "git".to_string(),
            ssh_keygen: "ssh-keygen".to_string(),
            ssh_add: "ssh-add".to_string(),
            icacls: "icacls".to_string(),
            npm: "npm".to_string(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StateBackend {
    /// The runtime's state channel when present, else a local file.
    #[default]
    Auto,
    Actions,
    File,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct StateConfig {
    pub backend: StateBackend,
    pub file: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct SideEffects {
    /// Ask npm to sign the tags it creates while the key is installed.
    pub npm_sign_git_tag: bool,
}

impl Default for SideEffects {
    fn default() -> Self {
        SideEffects {
            npm_sign_git_tag: true,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct SigningConfig {
    pub default_key_path: String,
    pub tools: Tools,
    pub state: StateConfig,
    pub side_effects: SideEffects,
}

impl Default for SigningConfig {
    fn default() -> Self {
        SigningConfig {
            default_key_path: DEFAULT_KEY_PATH.to_string(),
            tools: Tools::default(),
            state: StateConfig::default(),
            side_effects: SideEffects::default(),
        }
    }
}

impl SigningConfig {
    /// Where the local state file lives when no runtime state channel exists.
    pub fn state_file(&self) -> Result<PathBuf> {
        if let Some(file) = &self.state.file {
            return Ok(crate::utils::expand_path(file)?);
        }
        let base = dirs::state_dir()
            .or_else(dirs::data_local_dir)
            .ok_or_else(|| anyhow::anyhow!("Could not find a state directory"))?;
        Ok(base.join("git-ssh-signing").join("state.json"))
    }
}

pub fn get_config_root() -> Result<PathBuf> {
    if let Ok(path) = std::env::var("GIT_SSH_SIGNING_CONFIG") {
        return Ok(PathBuf::from(path));
    }
    let config_dir =
        dirs::config_dir().ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
    Ok(config_dir.join("git-ssh-signing"))
}

/// Load `config.toml` from the config root. A missing file means defaults.
pub fn load_config() -> Result<SigningConfig> {
    let config_path = get_config_root()?.join("config.toml");

    if !config_path.exists() {
        return Ok(SigningConfig::default());
    }

    let content = fs::read_to_string(&config_path)
        .with_context(|| format!("Failed to read config file {}", config_path.display()))?;
    parse_config(&content)
        .with_context(|| format!("Failed to parse config file {}", config_path.display()))
}

pub fn parse_config(content: &str) -> Result<SigningConfig> {
    Ok(toml::from_str(content)?)
}
