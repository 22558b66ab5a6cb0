//! Status reporting for the launch agent.
//!
//! launchd's registry is the only authority on whether the agent is running. The
//! config record written by the server is advisory display data and may be stale.
use std::{
    fs, io,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::{
    constants::{
        DEFAULT_PORT, GREEN_BOLD, NOT_AVAILABLE, RED_BOLD, RESET, SERVICE_LABEL, YELLOW_BOLD,
    },
    descriptor::ServiceDescriptor,
    error::AgentError,
    launchctl::ServiceManager,
    runtime::AgentPaths,
};

/// Snapshot the running server writes to `~/.localrun/agent.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentConfigRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<String>,
}

impl AgentConfigRecord {
    /// Reads the record at `path`, ignoring anything it cannot make sense of.
    ///
    /// A missing, unreadable or malformed file yields an empty record, and a field
    /// with the wrong type is treated as absent.
    pub fn load_lenient(path: &Path) -> Self {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(err) => {
                if err.kind() != io::ErrorKind::NotFound {
                    debug!("ignoring unreadable config record {}: {err}", path.display());
                }
                return Self::default();
            }
        };

        let value: Value = match serde_json::from_str(&contents) {
            Ok(value) => value,
            Err(err) => {
                debug!("ignoring malformed config record {}: {err}", path.display());
                return Self::default();
            }
        };

        let text = |key: &str| value.get(key).and_then(Value::as_str).map(str::to_string);
        Self {
            port: value
                .get("port")
                .and_then(Value::as_u64)
                .and_then(|port| u16::try_from(port).ok()),
            pid: value
                .get("pid")
                .and_then(Value::as_u64)
                .and_then(|pid| u32::try_from(pid).ok()),
            version: text("version"),
            started_at: text("started_at"),
        }
    }

    /// Writes the record as pretty JSON, creating the parent directory.
    pub fn save(&self, path: &Path) -> Result<(), AgentError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)
            .map_err(|err| AgentError::Io(io::Error::other(err)))?;
        fs::write(path, json)?;
        Ok(())
    }
}

/// Reconciled view of the agent's state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusReport {
    /// launchd label the report is about.
    pub label: String,
    /// Whether launchd currently has the label registered.
    pub registered: bool,
    /// Whether the descriptor file exists.
    pub installed: bool,
    pub port: u16,
    pub pid: Option<u32>,
    pub version: Option<String>,
    pub started_at: Option<String>,
    pub config_file: PathBuf,
    pub descriptor_file: PathBuf,
    pub log_file: PathBuf,
}

impl StatusReport {
    /// Local URL of the agent's HTTP API.
    pub fn url(&self) -> String {
        format!("http://localhost:{}", self.port)
    }

    /// Human-readable report, optionally with ANSI colors.
    pub fn render(&self, color: bool) -> String {
        let paint = |code: &str, text: &str| {
            if color {
                format!("{code}{text}{RESET}")
            } else {
                text.to_string()
            }
        };
        let or_na = |value: Option<String>| value.unwrap_or_else(|| NOT_AVAILABLE.to_string());

        let mut lines = vec!["LocalRun Agent Status".to_string(), "=".repeat(40)];

        if self.registered {
            lines.push(format!("State:       {}", paint(GREEN_BOLD, "● Running")));
            lines.push(format!("Port:        {}", self.port));
            lines.push(format!("PID:         {}", or_na(self.pid.map(|pid| pid.to_string()))));
            lines.push(format!("Version:     {}", or_na(self.version.clone())));
            if let Some(started_at) = &self.started_at {
                lines.push(format!("Started:     {started_at}"));
            }
            lines.push(String::new());
            lines.push(format!("URL:         {}", self.url()));
        } else if self.installed {
            lines.push(format!("State:       {}", paint(RED_BOLD, "● Stopped")));
        } else {
            lines.push(format!(
                "State:       {}",
                paint(YELLOW_BOLD, "● Not installed")
            ));
        }

        lines.push(String::new());
        lines.push(format!("Config:      {}", self.config_file.display()));
        lines.push(format!("LaunchAgent: {}", self.descriptor_file.display()));
        lines.push(format!("Logs:        {}", self.log_file.display()));
        lines.join("\n")
    }
}

/// Builds [`StatusReport`]s from launchd and the config record.
pub struct StatusReporter<M: ServiceManager> {
    paths: AgentPaths,
    manager: M,
}

impl<M: ServiceManager> StatusReporter<M> {
    pub fn new(paths: AgentPaths, manager: M) -> Self {
        Self { paths, manager }
    }

    /// Queries launchd and reads the config record. Has no side effects.
    pub fn report(&self) -> Result<StatusReport, AgentError> {
        let registered = self
            .manager
            .list()
            .map_err(|err| AgentError::StatusQuery(err.to_string()))?
            .iter()
            .any(|label| label == SERVICE_LABEL);

        let installed = self.paths.descriptor_file.exists();
        let record = AgentConfigRecord::load_lenient(&self.paths.config_file);

        let port = record
            .port
            .or_else(|| self.descriptor_port())
            .unwrap_or(DEFAULT_PORT);

        debug!("status: registered={registered} installed={installed} port={port}");
        Ok(StatusReport {
            label: SERVICE_LABEL.to_string(),
            registered,
            installed,
            port,
            pid: record.pid,
            version: record.version,
            started_at: record.started_at,
            config_file: self.paths.config_file.clone(),
            descriptor_file: self.paths.descriptor_file.clone(),
            log_file: self.paths.log_file.clone(),
        })
    }

    fn descriptor_port(&self) -> Option<u16> {
        if !self.paths.descriptor_file.exists() {
            return None;
        }
        match ServiceDescriptor::load(&self.paths.descriptor_file) {
            Ok(descriptor) => descriptor.port(),
            Err(err) => {
                debug!("ignoring unreadable descriptor: {err}");
                None
            }
        }
    }
}
