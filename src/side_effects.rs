use std::process::{Command, Stdio};

use crate::error::BestEffortFailure;

/// `npm config set sign-git-tag true`, so `npm version` creates signed tags.
#[derive(Debug, Clone)]
pub struct NpmTagSigning {
    program: Option<String>,
}

impl NpmTagSigning {
    pub fn new(program: impl Into<String>, enabled: bool) -> Self {
        Self {
            program: enabled.then(|| program.into()),
        }
    }

    pub fn disabled() -> Self {
        Self { program: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.program.is_some()
    }

    pub fn apply(&self) -> Result<(), BestEffortFailure> {
        self.npm(&["--version"])?;
        self.npm(&["config", "set", "sign-git-tag", "true"])
    }

    pub fn clear(&self) -> Result<(), BestEffortFailure> {
        self.npm(&["config", "delete", "sign-git-tag"])
    }

    fn npm(&self, args: &[&str]) -> Result<(), BestEffortFailure> {
        let program = self
            .program
            .as_deref()
            .ok_or_else(|| BestEffortFailure::new("npm configuration", "disabled"))?;
        let status = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map_err(|e| BestEffortFailure::new("npm configuration", format!("{program}: {e}")))?;
        if !status.success() {
            return Err(BestEffortFailure::new(
                "npm configuration",
                format!("{program} {} exited with {status}", args.join(" ")),
            ));
        }
        Ok(())
    }
}
