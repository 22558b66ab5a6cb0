//! LocalRun Agent runs a small local HTTP service and manages it as a launchd user
//! agent. It writes the agent's property-list descriptor, loads and unloads it with
//! `launchctl`, and reports status by reconciling launchd's registry with the config
//! record the running server leaves behind.

/// CLI interface.
pub mod cli;

/// Fixed names, defaults and launchctl diagnostics.
pub mod constants;

/// Install, uninstall, start, stop and restart.
pub mod controller;

/// launchd property-list descriptor.
pub mod descriptor;

/// Error handling.
pub mod error;

/// Listening ports and Docker containers on the host.
pub mod host;

/// launchctl access and result classification.
pub mod launchctl;

/// Log tail and follow.
pub mod logs;

/// Per-user paths.
pub mod runtime;

/// The agent's HTTP server.
pub mod server;

/// Status reporting.
pub mod status;

#[cfg(test)]
mod test_utils;
