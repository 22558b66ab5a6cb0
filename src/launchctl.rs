//! Access to launchd through `launchctl`.
//!
//! [`ServiceManager`] is the seam the controller and status reporter talk to; the
//! production [`Launchctl`] shells out, tests substitute an in-memory registry.
use std::{path::Path, process::Command};

use tracing::debug;

use crate::{constants::LAUNCHCTL, error::LaunchctlError};

/// Exit status and diagnostic text of a finished launchctl invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, `None` when the process was terminated by a signal.
    pub code: Option<i32>,
    /// Captured stdout.
    pub stdout: String,
    /// Captured stderr.
    pub stderr: String,
}

impl CommandOutput {
    /// A successful invocation with no output.
    pub fn success() -> Self {
        Self {
            code: Some(0),
            stdout: String::new(),
            stderr: String::new(),
        }
    }

    /// A failed invocation with the given exit code and stderr.
    pub fn failure(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    /// Whether the command exited with status 0.
    pub fn succeeded(&self) -> bool {
        self.code == Some(0)
    }

    /// The most useful diagnostic text: stderr, falling back to stdout.
    pub fn diagnostic(&self) -> String {
        let stderr = self.stderr.trim();
        if stderr.is_empty() {
            self.stdout.trim().to_string()
        } else {
            stderr.to_string()
        }
    }
}

/// How a load/unload result should be read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    /// The command changed state.
    Success,
    /// The command failed only because the service was already in the requested state.
    BenignNoop,
    /// The command failed; carries the diagnostic verbatim.
    Failure(String),
}

/// Classifies a launchctl result. A non-zero exit whose diagnostic contains
/// `benign_marker` (case-insensitively) means the service was already where we
/// wanted it.
pub fn classify(output: &CommandOutput, benign_marker: &str) -> Disposition {
    if output.succeeded() {
        return Disposition::Success;
    }

    let diagnostic = output.diagnostic();
    if diagnostic
        .to_lowercase()
        .contains(&benign_marker.to_lowercase())
    {
        Disposition::BenignNoop
    } else {
        Disposition::Failure(diagnostic)
    }
}

/// Operations the agent needs from the OS service manager.
pub trait ServiceManager {
    /// Registers the descriptor at `descriptor` (`launchctl load`).
    fn load(&self, descriptor: &Path) -> Result<CommandOutput, LaunchctlError>;

    /// Unregisters the descriptor at `descriptor` (`launchctl unload`).
    fn unload(&self, descriptor: &Path) -> Result<CommandOutput, LaunchctlError>;

    /// Unregisters a label without needing its descriptor (`launchctl remove`).
    fn remove(&self, label: &str) -> Result<CommandOutput, LaunchctlError>;

    /// Labels currently registered with the service manager.
    fn list(&self) -> Result<Vec<String>, LaunchctlError>;
}

/// [`ServiceManager`] backed by the `launchctl` binary.
#[derive(Debug, Clone)]
pub struct Launchctl {
    program: String,
}

impl Default for Launchctl {
    fn default() -> Self {
        Self {
            program: LAUNCHCTL.to_string(),
        }
    }
}

impl Launchctl {
    /// Uses `program` instead of `launchctl` from `PATH`.
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn run(&self, args: &[&str]) -> Result<CommandOutput, LaunchctlError> {
        debug!("running {} {}", self.program, args.join(" "));
        let output = Command::new(&self.program).args(args).output().map_err(|source| {
            LaunchctlError::Spawn {
                program: self.program.clone(),
                source,
            }
        })?;

        let result = CommandOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };
        debug!("{} {} exited with {:?}", self.program, args[0], result.code);
        Ok(result)
    }
}

impl ServiceManager for Launchctl {
    fn load(&self, descriptor: &Path) -> Result<CommandOutput, LaunchctlError> {
        self.run(&["load", &descriptor.to_string_lossy()])
    }

    fn unload(&self, descriptor: &Path) -> Result<CommandOutput, LaunchctlError> {
        self.run(&["unload", &descriptor.to_string_lossy()])
    }

    fn remove(&self, label: &str) -> Result<CommandOutput, LaunchctlError> {
        self.run(&["remove", label])
    }

    fn list(&self) -> Result<Vec<String>, LaunchctlError> {
        let output = self.run(&["list"])?;
        if !output.succeeded() {
            return Err(LaunchctlError::Failed {
                program: self.program.clone(),
                action: "list".to_string(),
                code: output.code,
                diagnostic: output.diagnostic(),
            });
        }

        Ok(parse_list(&output.stdout))
    }
}

/// Extracts labels from `launchctl list` output (`PID\tStatus\tLabel` rows under a
/// header line).
pub fn parse_list(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .filter_map(|line| {
            let mut columns = line.split_whitespace();
            let pid = columns.next()?;
            let _status = columns.next()?;
            let label = columns.next()?;
            if pid == "PID" && label == "Label" {
                return None;
            }
            Some(label.to_string())
        })
        .collect()
}
