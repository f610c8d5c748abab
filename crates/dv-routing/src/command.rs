//! `CommandRouting` — runs an external program as the routing algorithm.
//!
//! Each epoch the snapshot is written to `<dir>/state.json`, the program is
//! run with the state and decision paths as its two last arguments, and the
//! decision is read back from `<dir>/decision.json`.

use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};
use std::{fs, io};

use dv_core::BoxError;
use thiserror::Error;
use tracing::debug;

use crate::{RawDecision, RoutingAlgorithm, State};

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("routing command `{program}` exited with {status}")]
    Failed { program: String, status: ExitStatus },
}

#[derive(Clone, Debug)]
pub struct CommandRouting {
    program: PathBuf,
    args:    Vec<String>,
    dir:     PathBuf,
}

impl CommandRouting {
    /// Exchange files in `dir`, which must exist.
    pub fn new(program: impl Into<PathBuf>, dir: impl Into<PathBuf>) -> Self {
        Self { program: program.into(), args: Vec::new(), dir: dir.into() }
    }

    /// Arguments placed before the two file paths.
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn state_path(&self) -> PathBuf {
        self.dir.join("state.json")
    }

    pub fn decision_path(&self) -> PathBuf {
        self.dir.join("decision.json")
    }

    fn exchange(&self, state: &State) -> Result<RawDecision, CommandError> {
        let state_path = self.state_path();
        let decision_path = self.decision_path();
        fs::write(&state_path, state.to_json()?)?;
        remove_stale(&decision_path)?;

        debug!(target: "dvrp", program = %self.program.display(), epoch = state.epoch, "running routing command");
        let status = Command::new(&self.program)
            .args(&self.args)
            .arg(&state_path)
            .arg(&decision_path)
            .status()?;
        if !status.success() {
            return Err(CommandError::Failed { program: self.program.display().to_string(), status });
        }

        let text = fs::read_to_string(&decision_path)?;
        Ok(serde_json::from_str(&text)?)
    }
}

fn remove_stale(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

impl RoutingAlgorithm for CommandRouting {
    fn decide(&mut self, state: &State) -> Result<RawDecision, BoxError> {
        Ok(self.exchange(state)?)
    }
}
