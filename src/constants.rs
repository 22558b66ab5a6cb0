//! Constants and fixed values for the LocalRun agent.
//!
//! Everything launchd, the config record and the CLI agree on lives here so the
//! controller, status reporter and server never disagree about names or defaults.

use std::time::Duration;

// ============================================================================
// Service Identity
// ============================================================================

/// Label of the launch agent. Unique within the user's launchd namespace.
pub const SERVICE_LABEL: &str = "com.localrun.agent";

/// Name of the executable the descriptor points launchd at.
pub const EXECUTABLE_NAME: &str = "localrun-agent";

/// Service name reported by the HTTP API.
pub const SERVICE_NAME: &str = "localrun-agent";

/// Version written into the config record and reported by the HTTP API.
pub const AGENT_VERSION: &str = env!("CARGO_PKG_VERSION");

// ============================================================================
// Server Defaults
// ============================================================================

/// Port the launch agent runs the server on.
pub const DEFAULT_PORT: u16 = 47777;

/// Interface the server binds to unless told otherwise.
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Subcommand launchd invokes to run the server.
pub const SERVE_SUBCOMMAND: &str = "serve";

// ============================================================================
// File System Layout (relative to the user's home directory)
// ============================================================================

/// Directory holding the agent's config record.
pub const CONFIG_DIR_NAME: &str = ".localrun";

/// Name of the config record written by the running server.
pub const CONFIG_FILE_NAME: &str = "agent.json";

/// Directory where per-user launch agents live.
pub const LAUNCH_AGENTS_DIR: &str = "Library/LaunchAgents";

/// Directory where the agent's log file lives.
pub const LOGS_DIR: &str = "Library/Logs";

/// Name of the combined stdout/stderr log file.
pub const LOG_FILE_NAME: &str = "localrun-agent.log";

// ============================================================================
// launchctl Interaction
// ============================================================================

/// Program used to talk to launchd.
pub const LAUNCHCTL: &str = "launchctl";

/// Diagnostic fragment `launchctl load` prints when the agent is already registered.
pub const ALREADY_LOADED_MARKER: &str = "already loaded";

/// Diagnostic fragment `launchctl unload` prints when the agent is not registered.
pub const NOT_LOADED_MARKER: &str = "not currently loaded";

// ============================================================================
// Host Inspection
// ============================================================================

/// Lists listening sockets for `/api/host/ports`.
pub const LSOF: &str = "lsof";

/// Lists running containers for `/api/docker/containers`.
pub const DOCKER: &str = "docker";

/// Upper bound on a single `lsof` or `docker` invocation.
pub const HOST_COMMAND_TIMEOUT: Duration = Duration::from_secs(10);

// ============================================================================
// Logs
// ============================================================================

/// Lines shown by `logs` when `--lines` is not given.
pub const DEFAULT_LOG_LINES: usize = 50;

/// How often follow mode checks the log file for new content.
pub const LOG_FOLLOW_POLL_INTERVAL: Duration = Duration::from_millis(200);

// ============================================================================
// Terminal Output
// ============================================================================

/// Placeholder shown for values the config record does not provide.
pub const NOT_AVAILABLE: &str = "N/A";

pub const GREEN_BOLD: &str = "\x1b[1;32m";
pub const RED_BOLD: &str = "\x1b[1;31m";
pub const YELLOW_BOLD: &str = "\x1b[1;33m";
pub const RESET: &str = "\x1b[0m";
