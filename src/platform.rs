//! Owner-only file permissions.
//!
//! On POSIX systems the mode is passed when a file or directory is created,
//! so restricting afterwards is a no-op. Windows has no mode bits: inherited
//! ACL entries are stripped with `icacls` and the current user is granted
//! access explicitly. Failures on that path are never fatal.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::{BestEffortFailure, Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Posix,
    Windows,
}

impl Platform {
    pub fn current() -> Self {
        if cfg!(windows) {
            Platform::Windows
        } else {
            Platform::Posix
        }
    }

    /// Pause before reading back a freshly written file. Windows sometimes
    /// hands a file to the next process before the write is visible.
    pub fn settle_delay(self) -> Option<Duration> {
        match self {
            Platform::Windows => Some(Duration::from_millis(100)),
            Platform::Posix => None,
        }
    }

    /// Extra context appended to user-facing messages.
    pub fn hint(self, windows: &'static str) -> &'static str {
        match self {
            Platform::Windows => windows,
            Platform::Posix => "",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
}

impl EntryKind {
    fn describe(self) -> &'static str {
        match self {
            EntryKind::File => "file",
            EntryKind::Directory => "directory",
        }
    }
}

trait OwnerOnly {
    fn restrict(&self, path: &Path, kind: EntryKind) -> std::result::Result<(), BestEffortFailure>;
}

struct ModeBits;

impl OwnerOnly for ModeBits {
    fn restrict(&self, path: &Path, kind: EntryKind) -> std::result::Result<(), BestEffortFailure> {
        debug!(
            "Unix permissions handled at creation for {}: {}",
            kind.describe(),
            path.display()
        );
        Ok(())
    }
}

struct Icacls {
    program: String,
    user: String,
}

impl Icacls {
    fn run(&self, args: &[&str]) -> std::result::Result<(), String> {
        let output = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| format!("failed to execute {}: {e}", self.program))?;
        if !output.status.success() {
            return Err(String::from_utf8_lossy(&output.stderr).trim().to_string());
        }
        Ok(())
    }
}

impl OwnerOnly for Icacls {
    fn restrict(&self, path: &Path, kind: EntryKind) -> std::result::Result<(), BestEffortFailure> {
        let target = path.to_string_lossy();
        debug!("Setting Windows permissions for {}: {}", kind.describe(), target);

        self.run(&[&*target, "/inheritance:r"]).map_err(|e| {
            BestEffortFailure::new("remove inherited permissions", format!("{target}: {e}"))
        })?;

        // (F) for directories matches 0700, (R,W) for files matches 0600
        let grant = match kind {
            EntryKind::Directory => "(F)",
            EntryKind::File => "(R,W)",
        };
        let rule = format!("{}:{}", self.user, grant);
        self.run(&[&*target, "/grant:r", rule.as_str()]).map_err(|e| {
            BestEffortFailure::new("grant owner permissions", format!("{target}: {e}"))
        })?;

        debug!("Windows permissions set for {} {}", target, grant);
        Ok(())
    }
}

/// Creates key material with owner-only access, using whichever strategy the
/// platform supports.
pub struct Permissions {
    backend: Box<dyn OwnerOnly>,
}

impl Permissions {
    pub fn for_platform(platform: Platform, icacls: &str) -> Self {
        let backend: Box<dyn OwnerOnly> = match platform {
            Platform::Posix => Box::new(ModeBits),
            Platform::Windows => Box::new(Icacls {
                program: icacls.to_string(),
                user: std::env::var("USERNAME")
                    .or_else(|_| std::env::var("USER"))
                    .unwrap_or_else(|_| "Unknown".to_string()),
            }),
        };
        Self { backend }
    }

    /// Restrict `path` to its owner. Problems are reported as warnings only.
    pub fn restrict_to_owner(&self, path: &Path, kind: EntryKind) {
        if let Err(failure) = self.backend.restrict(path, kind) {
            warn!("{}", failure);
        }
    }

    /// `mkdir -p` with mode 0700 on the directories it creates.
    pub fn create_private_dir(&self, dir: &Path) -> Result<()> {
        let mut builder = fs::DirBuilder::new();
        builder.recursive(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::DirBuilderExt;
            builder.mode(0o700);
        }
        builder
            .create(dir)
            .map_err(|e| Error::io("Failed to create directory", dir, e))?;
        self.restrict_to_owner(dir, EntryKind::Directory);
        Ok(())
    }

    /// Write a file readable only by its owner (0600).
    pub fn write_private(&self, path: &Path, contents: &str) -> Result<()> {
        write_with_mode(path, contents, 0o600)?;
        self.restrict_to_owner(path, EntryKind::File);
        Ok(())
    }

    /// Write a world-readable, owner-writable file (0644).
    pub fn write_public(&self, path: &Path, contents: &str) -> Result<()> {
        write_with_mode(path, contents, 0o644)
    }
}

fn write_with_mode(path: &Path, contents: &str, mode: u32) -> Result<()> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(mode);
    }

    let mut file = options
        .open(path)
        .map_err(|e| Error::io("Failed to open", path, e))?;
    file.write_all(contents.as_bytes())
        .map_err(|e| Error::io("Failed to write", path, e))?;

    // The creation mode is ignored when the file already existed.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(mode))
            .map_err(|e| Error::io("Failed to set permissions on", path, e))?;
    }
    #[cfg(not(unix))]
    let _ = mode;

    Ok(())
}
