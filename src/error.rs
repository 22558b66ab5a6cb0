//! Error handling for the LocalRun agent.
use std::{io, path::PathBuf, time::Duration};

use thiserror::Error;

/// Errors surfaced by agent commands. Every variant is terminal to the command
/// that produced it; nothing is retried.
#[derive(Debug, Error)]
pub enum AgentError {
    /// The agent executable could not be found on the search path.
    #[error("executable '{name}' not found on the search path")]
    ExecutableNotFound {
        /// Name that was searched for.
        name: String,
    },

    /// Installing the launch agent failed. Wraps the underlying cause.
    #[error("failed to install launch agent: {0}")]
    Install(#[source] Box<AgentError>),

    /// A lifecycle command was issued before `install`.
    #[error("service not installed (no descriptor at {0}); run `localrun-agent install`")]
    NotInstalled(PathBuf),

    /// `launchctl load` failed for a reason other than the agent already running.
    #[error("failed to start service: {diagnostic}")]
    Start {
        /// Diagnostic text reported by launchctl, verbatim.
        diagnostic: String,
    },

    /// `launchctl unload` failed for a reason other than the agent already being stopped.
    #[error("failed to stop service: {diagnostic}")]
    Stop {
        /// Diagnostic text reported by launchctl, verbatim.
        diagnostic: String,
    },

    /// The launchd registry could not be listed.
    #[error("failed to query launchd registry: {0}")]
    StatusQuery(String),

    /// The log file does not exist yet.
    #[error("no logs available at {0}")]
    NoLogs(PathBuf),

    /// The user's home directory could not be determined.
    #[error("could not determine the home directory")]
    MissingHome,

    /// The agent server failed to bind or serve.
    #[error("server error: {0}")]
    Serve(String),

    /// Error reading or writing a descriptor document.
    #[error("invalid descriptor: {0}")]
    Descriptor(#[from] DescriptorError),

    /// Filesystem error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Errors raised while rendering or parsing a launchd property list.
#[derive(Debug, Error)]
pub enum DescriptorError {
    /// Error reading or writing the descriptor file.
    #[error("failed to access descriptor file: {0}")]
    Io(#[from] io::Error),

    /// The XML could not be written or read.
    #[error("malformed property list: {0}")]
    Malformed(String),

    /// A required key is absent from the property list.
    #[error("property list is missing required key '{0}'")]
    MissingKey(&'static str),
}

/// Errors raised when invoking launchctl itself, before any exit status exists.
#[derive(Debug, Error)]
pub enum LaunchctlError {
    /// The launchctl process could not be spawned.
    #[error("failed to run '{program}': {source}")]
    Spawn {
        /// Program that was invoked.
        program: String,
        /// The underlying error that occurred.
        #[source]
        source: io::Error,
    },

    /// launchctl ran but reported failure.
    #[error("'{program} {action}' exited with status {code:?}: {diagnostic}")]
    Failed {
        /// Program that was invoked.
        program: String,
        /// Sub-command that failed.
        action: String,
        /// Exit code, if the process was not killed by a signal.
        code: Option<i32>,
        /// Diagnostic text on stderr.
        diagnostic: String,
    },
}

/// Errors raised while inspecting the host through external tools.
#[derive(Debug, Error)]
pub enum HostError {
    /// The tool could not be spawned.
    #[error("failed to run '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    /// The tool did not finish in time and was killed.
    #[error("'{program}' did not finish within {timeout:?}")]
    Timeout { program: String, timeout: Duration },

    /// The tool ran but reported failure.
    #[error("'{program}' exited with status {code:?}: {diagnostic}")]
    Failed {
        program: String,
        code: Option<i32>,
        diagnostic: String,
    },
}
