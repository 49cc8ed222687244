//! Scope-aware access to `git config`.
//!
//! Every operation names its scope explicitly. There is no default scope at
//! this layer: the scope chosen by setup is persisted and handed back to
//! cleanup, and nothing in between may substitute another one.

use std::fmt;
use std::path::PathBuf;
use std::process::{Command, Output, Stdio};
use std::str::FromStr;

use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::utils::mask_path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigScope {
    /// `.git/config` of the repository in the working directory.
    Local,
    /// The user-wide configuration file.
    Global,
}

impl ConfigScope {
    pub const fn as_str(self) -> &'static str {
        match self {
            ConfigScope::Local => "local",
            ConfigScope::Global => "global",
        }
    }

    const fn flag(self) -> &'static str {
        match self {
            ConfigScope::Local => "--local",
            ConfigScope::Global => "--global",
        }
    }
}

impl fmt::Display for ConfigScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConfigScope {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "local" => Ok(ConfigScope::Local),
            "global" => Ok(ConfigScope::Global),
            other => Err(Error::InputValidation(format!(
                "Invalid git-config-scope value: {other}. Must be \"local\" or \"global\""
            ))),
        }
    }
}

pub trait ConfigStore {
    /// `Ok(None)` when the key is not set at `scope`. Errors only when the
    /// underlying tool could not be run.
    fn get(&self, key: &str, scope: ConfigScope) -> Result<Option<String>>;

    fn set(&self, key: &str, value: &str, scope: ConfigScope) -> Result<()>;

    /// Whether the key existed and was removed.
    fn unset(&self, key: &str, scope: ConfigScope) -> Result<bool>;

    fn exists(&self, key: &str, scope: ConfigScope) -> Result<bool> {
        Ok(self.get(key, scope)?.is_some())
    }

    /// Whether there is a repository for `ConfigScope::Local` to write to.
    fn in_repository(&self) -> bool;
}

/// [`ConfigStore`] backed by the `git` executable.
#[derive(Debug, Clone)]
pub struct GitConfig {
    program: String,
    work_dir: Option<PathBuf>,
    global_file: Option<PathBuf>,
}

impl GitConfig {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            work_dir: None,
            global_file: None,
        }
    }

    /// Run git from `dir` instead of the process working directory.
    pub fn in_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.work_dir = Some(dir.into());
        self
    }

    /// Redirect `--global` reads and writes to `path`.
    pub fn with_global_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.global_file = Some(path.into());
        self
    }

    fn run(&self, args: &[&str]) -> Result<Output> {
        let mut cmd = Command::new(&self.program);
        cmd.args(args).stdin(Stdio::null());
        if let Some(dir) = &self.work_dir {
            cmd.current_dir(dir);
        }
        if let Some(file) = &self.global_file {
            cmd.env("GIT_CONFIG_GLOBAL", file);
        }
        cmd.output()
            .map_err(|e| Error::transport(self.program.clone(), e))
    }
}

impl ConfigStore for GitConfig {
    fn get(&self, key: &str, scope: ConfigScope) -> Result<Option<String>> {
        let output = self.run(&["config", scope.flag(), "--get", key])?;

        if !output.status.success() {
            // Exit code 1 is "key not set"; anything else (e.g. no repository
            // for --local) still means there is no value to read.
            if output.status.code() != Some(1) {
                debug!(
                    "git config {} --get {} exited with {}: {}",
                    scope.flag(),
                    key,
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                );
            }
            return Ok(None);
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let value = stdout
            .strip_suffix('\n')
            .map(|v| v.strip_suffix('\r').unwrap_or(v))
            .unwrap_or(&stdout);
        Ok(Some(value.to_string()))
    }

    fn set(&self, key: &str, value: &str, scope: ConfigScope) -> Result<()> {
        let output = self.run(&["config", scope.flag(), key, value])?;

        if !output.status.success() {
            return Err(Error::ConfigWrite {
                key: key.to_string(),
                reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(())
    }

    fn unset(&self, key: &str, scope: ConfigScope) -> Result<bool> {
        let output = self.run(&["config", scope.flag(), "--unset-all", key])?;
        Ok(output.status.success())
    }

    fn in_repository(&self) -> bool {
        self.run(&["rev-parse", "--git-dir"])
            .map(|o| o.status.success())
            .unwrap_or(false)
    }
}

/// Log the current values of `keys` at `scope`, masking path-like values so
/// key file names stay out of the log. Returns the lines that were logged.
pub fn display_config<S: ConfigStore + ?Sized>(
    store: &S,
    keys: &[&str],
    scope: ConfigScope,
) -> Result<Vec<String>> {
    let mut lines = Vec::new();
    for key in keys {
        if let Some(value) = store.get(key, scope)? {
            let shown = if value.contains(['/', '\\']) {
                mask_path(&value)
            } else {
                value
            };
            let line = format!("{key} = {shown}");
            info!("{}", line);
            lines.push(line);
        }
    }
    Ok(lines)
}
