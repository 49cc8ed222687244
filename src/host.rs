use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::{Error, Result};

pub trait Outputs {
    fn set_output(&mut self, name: &str, value: &str) -> Result<()>;
}

#[derive(Debug, Clone, Default)]
pub struct Host {
    actions: bool,
    output_file: Option<PathBuf>,
    state_file: Option<PathBuf>,
}

impl Host {
    pub fn from_env() -> Self {
        let non_empty = |name: &str| {
            std::env::var_os(name)
                .filter(|v| !v.is_empty())
                .map(PathBuf::from)
        };
        Self {
            actions: std::env::var("GITHUB_ACTIONS").is_ok_and(|v| v == "true"),
            output_file: non_empty("GITHUB_OUTPUT"),
            state_file: non_empty("GITHUB_STATE"),
        }
    }

    pub fn is_actions(&self) -> bool {
        self.actions
    }

    pub fn state_file(&self) -> Option<&Path> {
        self.state_file.as_deref()
    }

    /// Open a collapsible log group; it closes when the guard is dropped.
    pub fn group(&self, title: &str) -> Group {
        if self.actions {
            println!("::group::{title}");
        } else {
            info!("{}", title);
        }
        Group {
            actions: self.actions,
        }
    }
}

impl Outputs for Host {
    fn set_output(&mut self, name: &str, value: &str) -> Result<()> {
        match &self.output_file {
            Some(path) => append_file_command(path, name, value),
            None => {
                println!("{name}={value}");
                Ok(())
            }
        }
    }
}

#[must_use]
pub struct Group {
    actions: bool,
}

impl Drop for Group {
    fn drop(&mut self) {
        if self.actions {
            println!("::endgroup::");
        }
    }
}

/// Append `name<<DELIM\nvalue\nDELIM\n` to a runtime command file. The
/// delimiter is picked so it cannot occur in the value.
pub fn append_file_command(path: &Path, name: &str, value: &str) -> Result<()> {
    let mut n = 0u32;
    let delimiter = loop {
        let candidate = format!("ghadelimiter_{n}");
        if !value.contains(&candidate) && !name.contains(&candidate) {
            break candidate;
        }
        n += 1;
    };

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| Error::io("Failed to open", path, e))?;
    write!(file, "{name}<<{delimiter}\n{value}\n{delimiter}\n")
        .map_err(|e| Error::io("Failed to write", path, e))
}
