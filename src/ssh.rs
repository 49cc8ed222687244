//! SSH signing key lifecycle: install, verify, derive, agent, remove.
//!
//! `install` either succeeds or leaves no file it wrote behind.

use std::ffi::{OsStr, OsString};
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, info};

use crate::error::{BestEffortFailure, Error, Result};
use crate::platform::{Permissions, Platform};
use crate::utils::with_suffix;

pub const ALLOWED_SIGNERS_FILE: &str = "allowed_signers";

static KEY_INFO_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d+)\s+(SHA256:\S+)\s+(.*?)\s+\(([^)]+)\)$").expect("static regex")
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyInfo {
    pub bits: u32,
    pub fingerprint: String,
    pub comment: Option<String>,
    pub key_type: String,
}

impl fmt::Display for KeyInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}-bit, {}", self.key_type, self.bits, self.fingerprint)
    }
}

/// Parse a `ssh-keygen -l` line: `<bits> SHA256:<hash> <comment> (<TYPE>)`.
/// An empty comment field (`"4096 SHA256:x  (RSA)"`) yields `comment: None`.
pub fn parse_key_info(line: &str) -> Result<KeyInfo> {
    let line = line.trim();
    let caps = KEY_INFO_LINE
        .captures(line)
        .ok_or_else(|| Error::Parse(line.to_string()))?;

    let bits = caps[1]
        .parse()
        .map_err(|_| Error::Parse(line.to_string()))?;
    let comment = caps
        .get(3)
        .map(|m| m.as_str().trim())
        .filter(|c| !c.is_empty())
        .map(str::to_string);

    Ok(KeyInfo {
        bits,
        fingerprint: caps[2].to_string(),
        comment,
        key_type: caps[4].to_string(),
    })
}

/// Trim surrounding whitespace and end with exactly one newline; the OpenSSH
/// key parser rejects keys without a trailing newline.
pub fn normalize_key_text(raw: &str) -> String {
    format!("{}\n", raw.trim())
}

/// The external programs that understand key files.
pub trait KeyTool {
    /// Raw metadata line for the key at `key`.
    fn key_info_line(&self, key: &Path) -> Result<String>;

    /// Public key line derived from the private key at `key`.
    fn derive_public_key(&self, key: &Path) -> Result<String>;

    fn agent_add(&self, key: &Path) -> std::result::Result<(), BestEffortFailure>;

    fn agent_remove(&self, key: &Path) -> std::result::Result<(), BestEffortFailure>;
}

/// [`KeyTool`] backed by `ssh-keygen` and `ssh-add`.
#[derive(Debug, Clone)]
pub struct OpenSsh {
    ssh_keygen: String,
    ssh_add: String,
}

impl OpenSsh {
    pub fn new(ssh_keygen: impl Into<String>, ssh_add: impl Into<String>) -> Self {
        Self {
            ssh_keygen: ssh_keygen.into(),
            ssh_add: ssh_add.into(),
        }
    }

    fn keygen(&self, args: &[&OsStr]) -> Result<String> {
        let output = Command::new(&self.ssh_keygen)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| Error::transport(self.ssh_keygen.clone(), e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(Error::Command {
                program: self.ssh_keygen.clone(),
                message: if stderr.is_empty() {
                    format!("exited with {}", output.status)
                } else {
                    stderr
                },
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    fn add(&self, args: &[&OsStr]) -> std::result::Result<(), String> {
        let status = Command::new(&self.ssh_add)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map_err(|e| format!("failed to execute {}: {e}", self.ssh_add))?;
        if !status.success() {
            return Err(format!("{} exited with {}", self.ssh_add, status));
        }
        Ok(())
    }
}

impl KeyTool for OpenSsh {
    fn key_info_line(&self, key: &Path) -> Result<String> {
        self.keygen(&[OsStr::new("-l"), OsStr::new("-f"), key.as_os_str()])
    }

    fn derive_public_key(&self, key: &Path) -> Result<String> {
        self.keygen(&[OsStr::new("-y"), OsStr::new("-f"), key.as_os_str()])
    }

    fn agent_add(&self, key: &Path) -> std::result::Result<(), BestEffortFailure> {
        self.add(&[key.as_os_str()])
            .map_err(|e| BestEffortFailure::new("add key to SSH agent", e))
    }

    fn agent_remove(&self, key: &Path) -> std::result::Result<(), BestEffortFailure> {
        self.add(&[OsStr::new("-d"), key.as_os_str()])
            .map_err(|e| BestEffortFailure::new("remove key from SSH agent", e))
    }
}

/// What `install` leaves behind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyMaterial {
    pub private_key_path: PathBuf,
    pub public_key_path: PathBuf,
    pub public_key: String,
    pub info: KeyInfo,
}

pub struct KeyManager {
    tool: Box<dyn KeyTool>,
    permissions: Permissions,
    platform: Platform,
    agent_socket: Option<OsString>,
}

impl KeyManager {
    pub fn new(tool: Box<dyn KeyTool>, permissions: Permissions, platform: Platform) -> Self {
        Self {
            tool,
            permissions,
            platform,
            agent_socket: std::env::var_os("SSH_AUTH_SOCK").filter(|s| !s.is_empty()),
        }
    }

    /// Override the agent socket picked up from `SSH_AUTH_SOCK`.
    pub fn with_agent_socket(mut self, socket: Option<OsString>) -> Self {
        self.agent_socket = socket;
        self
    }

    pub fn public_key_path(private_key: &Path) -> PathBuf {
        with_suffix(private_key, ".pub")
    }

    pub fn allowed_signers_path(private_key: &Path) -> PathBuf {
        private_key
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join(ALLOWED_SIGNERS_FILE)
    }

    pub fn install(&self, raw_key: &str, destination: &Path) -> Result<KeyMaterial> {
        let ssh_dir = destination.parent().unwrap_or_else(|| Path::new("."));
        debug!("Creating SSH directory: {}", ssh_dir.display());
        self.permissions.create_private_dir(ssh_dir)?;

        debug!("Installing SSH signing key at: {}", destination.display());
        if let Err(e) = self
            .permissions
            .write_private(destination, &normalize_key_text(raw_key))
        {
            let _ = fs::remove_file(destination);
            return Err(e);
        }

        let info = match self.verify(destination) {
            Ok(info) => info,
            Err(e) => {
                if let Err(rm) = fs::remove_file(destination) {
                    debug!("Failed to remove invalid key {}: {}", destination.display(), rm);
                }
                return Err(Error::InvalidKey(format!(
                    "{e}{}",
                    self.platform
                        .hint(" (Windows file system or SSH tool compatibility issue)")
                )));
            }
        };
        debug!("SSH key verified: {}", info);

        let (public_key, public_key_path) = match self.publish(destination) {
            Ok(published) => published,
            Err(e) => {
                if let Err(rm) = fs::remove_file(destination) {
                    debug!("Failed to remove key {}: {}", destination.display(), rm);
                }
                return Err(e);
            }
        };

        Ok(KeyMaterial {
            private_key_path: destination.to_path_buf(),
            public_key_path,
            public_key,
            info,
        })
    }

    fn publish(&self, private_key: &Path) -> Result<(String, PathBuf)> {
        debug!("Generating public key from private key");
        let public_key = self.tool.derive_public_key(private_key)?;
        let public_key_path = Self::public_key_path(private_key);
        if let Err(e) = self
            .permissions
            .write_public(&public_key_path, &format!("{public_key}\n"))
        {
            let _ = fs::remove_file(&public_key_path);
            return Err(e);
        }
        Ok((public_key, public_key_path))
    }

    fn verify(&self, key: &Path) -> Result<KeyInfo> {
        if let Some(delay) = self.platform.settle_delay() {
            std::thread::sleep(delay);
        }
        self.get_info(key)
    }

    pub fn get_info(&self, key: &Path) -> Result<KeyInfo> {
        let line = self.tool.key_info_line(key).map_err(|e| match e {
            Error::Command { program, message } => Error::Command {
                program,
                message: format!(
                    "Failed to get SSH key fingerprint{}. {message}",
                    self.platform.hint(
                        " (Windows: ensure Git for Windows is available and key file is accessible)"
                    )
                ),
            },
            other => other,
        })?;
        parse_key_info(&line)
    }

    /// Returns whether the key is now held by the agent. Never fails.
    pub fn register_with_agent(&self, key: &Path) -> bool {
        if self.agent_socket.is_none() {
            debug!(
                "SSH agent not available{}",
                self.platform.hint(" (Windows SSH agent compatibility varies)")
            );
            return false;
        }

        match self.tool.agent_add(key) {
            Ok(()) => {
                info!("✓ SSH key added to agent");
                true
            }
            Err(failure) => {
                debug!(
                    "{}{}",
                    failure,
                    self.platform.hint(
                        " (Windows has known SSH agent compatibility issues between OpenSSH and Git for Windows)"
                    )
                );
                false
            }
        }
    }

    pub fn deregister_from_agent(&self, key: &Path) {
        if self.agent_socket.is_none() {
            return;
        }
        if let Err(failure) = self.tool.agent_remove(key) {
            debug!(
                "{}{}",
                failure,
                self.platform.hint(" (Windows SSH agent cleanup - this is not critical)")
            );
        }
    }

    /// Write `<identity> <public key>` to `allowed_signers` next to the key.
    pub fn create_trust_file(
        &self,
        identity: &str,
        public_key: &str,
        private_key: &Path,
    ) -> Result<PathBuf> {
        let path = Self::allowed_signers_path(private_key);
        self.permissions
            .write_public(&path, &format!("{identity} {public_key}\n"))?;
        Ok(path)
    }

    /// Delete the private key, public key, and trust file. Each removal is
    /// independent and a missing file is fine.
    pub fn remove(&self, private_key: &Path) {
        info!("Removing SSH keys and related files...");
        for file in [
            private_key.to_path_buf(),
            Self::public_key_path(private_key),
            Self::allowed_signers_path(private_key),
        ] {
            match fs::remove_file(&file) {
                Ok(()) => debug!("Removed file: {}", file.display()),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => debug!("File removal skipped ({}): {}", file.display(), e),
            }
        }
    }
}
