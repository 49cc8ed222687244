//! Error types shared by the setup and cleanup phases.
//!
//! Two categories are kept apart on purpose: [`Error`] is fatal and travels
//! with `?`, while [`BestEffortFailure`] can only be logged. There is no
//! conversion from the latter into the former.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// A required input is missing or an enumerated input is out of range.
    #[error("{0}")]
    InputValidation(String),

    /// Local scope was requested but the working directory is not a repository.
    #[error(
        "Not in a git repository. When using local git config (default), run this after the \
         repository has been checked out, or use git-config-scope: global to configure git \
         before checkout."
    )]
    RepositoryContext,

    /// The key text could not be verified; nothing was left on disk.
    #[error("Invalid SSH key: {0}")]
    InvalidKey(String),

    /// `ssh-keygen -l` printed something we do not understand.
    #[error("Failed to parse SSH key info: {0:?}")]
    Parse(String),

    #[error("Failed to set git config {key}: {reason}")]
    ConfigWrite { key: String, reason: String },

    /// An external program could not be started at all.
    #[error("Failed to execute {program}: {source}")]
    Transport {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// An external program ran but reported failure.
    #[error("{program} failed: {message}")]
    Command { program: String, message: String },

    #[error("{action} {}: {source}", path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The state substrate shared between setup and cleanup misbehaved.
    #[error("state: {0}")]
    State(String),
}

impl Error {
    pub fn io(action: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            action,
            path: path.into(),
            source,
        }
    }

    pub fn transport(program: impl Into<String>, source: std::io::Error) -> Self {
        Self::Transport {
            program: program.into(),
            source,
        }
    }
}

/// A failure in an operation whose outcome never decides the phase result:
/// agent registration, permission hardening, external side configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BestEffortFailure {
    pub operation: &'static str,
    pub reason: String,
}

impl BestEffortFailure {
    pub fn new(operation: &'static str, reason: impl Into<String>) -> Self {
        Self {
            operation,
            reason: reason.into(),
        }
    }
}

impl fmt::Display for BestEffortFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.operation, self.reason)
    }
}
