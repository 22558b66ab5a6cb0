//! Runtime paths for the agent.
//!
//! Every file the agent touches hangs off the user's home directory. The paths are
//! carried around as an explicit [`AgentPaths`] value instead of globals so tests can
//! point a whole controller at a temporary home.
use std::{env, path::PathBuf};

use serde::Serialize;
use tracing::debug;

use crate::{
    constants::{
        CONFIG_DIR_NAME, CONFIG_FILE_NAME, LAUNCH_AGENTS_DIR, LOG_FILE_NAME, LOGS_DIR,
        SERVICE_LABEL,
    },
    error::AgentError,
};

/// Fixed per-user locations used by the agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgentPaths {
    /// The user's home directory; also the agent's working directory.
    pub home: PathBuf,
    /// Directory holding the config record (`~/.localrun`).
    pub config_dir: PathBuf,
    /// Config record written by the running server.
    pub config_file: PathBuf,
    /// launchd descriptor (`~/Library/LaunchAgents/<label>.plist`).
    pub descriptor_file: PathBuf,
    /// Combined stdout/stderr log of the agent.
    pub log_file: PathBuf,
    /// Directories searched when resolving the agent executable.
    #[serde(skip)]
    pub search_path: Vec<PathBuf>,
}

impl AgentPaths {
    /// Paths rooted at the current user's home directory.
    pub fn user() -> Result<Self, AgentError> {
        let home = dirs::home_dir().ok_or(AgentError::MissingHome)?;
        Ok(Self::from_home(home))
    }

    /// Paths rooted at `home`, searching `PATH` for the executable.
    pub fn from_home(home: impl Into<PathBuf>) -> Self {
        let home = home.into();
        let config_dir = home.join(CONFIG_DIR_NAME);
        let search_path = env::var_os("PATH")
            .map(|paths| env::split_paths(&paths).collect())
            .unwrap_or_default();

        Self {
            config_file: config_dir.join(CONFIG_FILE_NAME),
            config_dir,
            descriptor_file: home
                .join(LAUNCH_AGENTS_DIR)
                .join(format!("{SERVICE_LABEL}.plist")),
            log_file: home.join(LOGS_DIR).join(LOG_FILE_NAME),
            search_path,
            home,
        }
    }

    /// Replaces the executable search path.
    pub fn with_search_path(mut self, search_path: Vec<PathBuf>) -> Self {
        self.search_path = search_path;
        self
    }

    /// Locates `name` in the search path, returning the first executable match.
    ///
    /// The match is returned as found on the search path. Symlinks are not
    /// resolved, so a package-manager shim keeps pointing at the current version.
    pub fn find_executable(&self, name: &str) -> Result<PathBuf, AgentError> {
        let not_found = || AgentError::ExecutableNotFound {
            name: name.to_string(),
        };

        let search_path = env::join_paths(&self.search_path).map_err(|err| {
            debug!("unusable search path: {err}");
            not_found()
        })?;
        let resolved = which::which_in(name, Some(search_path), &self.home).map_err(|err| {
            debug!("lookup of {name} failed: {err}");
            not_found()
        })?;

        debug!("resolved {name} to {}", resolved.display());
        Ok(resolved)
    }
}
