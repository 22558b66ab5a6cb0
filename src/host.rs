//! Host inspection for the agent's HTTP API.
//!
//! Both queries shell out: `lsof` for listening TCP sockets and `docker ps` for
//! running containers. Parsing is kept separate from spawning so it can be tested
//! against captured output.
use std::process::Output;

use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::debug;

use crate::{
    constants::{DOCKER, HOST_COMMAND_TIMEOUT, LSOF},
    error::HostError,
};

/// A TCP socket in the LISTEN state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListeningPort {
    pub port: u16,
    /// Bound address as lsof prints it, e.g. `*`, `127.0.0.1` or `[::1]`.
    pub address: String,
    pub pid: u32,
    pub process: String,
}

/// One row of `docker ps`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Container {
    #[serde(rename(deserialize = "ID"))]
    pub id: String,
    #[serde(rename(deserialize = "Names"))]
    pub name: String,
    #[serde(rename(deserialize = "Image"))]
    pub image: String,
    #[serde(rename(deserialize = "State"))]
    pub state: String,
    #[serde(rename(deserialize = "Status"))]
    pub status: String,
    #[serde(rename(deserialize = "Ports"))]
    pub ports: String,
}

/// Lists listening TCP sockets, ordered by port.
pub async fn open_ports() -> Result<Vec<ListeningPort>, HostError> {
    let output = run_tool(LSOF, &["-nP", "-iTCP", "-sTCP:LISTEN", "-F", "pcn"]).await?;

    // lsof exits 1 without a diagnostic when nothing matches.
    if !output.status.success() && !output.stderr.is_empty() {
        return Err(failed(LSOF, &output));
    }
    Ok(parse_lsof_listeners(&String::from_utf8_lossy(&output.stdout)))
}

/// Lists running containers. A host without docker has none.
pub async fn docker_containers() -> Result<Vec<Container>, HostError> {
    if let Err(err) = which::which(DOCKER) {
        debug!("{DOCKER} not available: {err}");
        return Ok(Vec::new());
    }

    let output = run_tool(DOCKER, &["ps", "--no-trunc", "--format", "{{json .}}"]).await?;
    if !output.status.success() {
        return Err(failed(DOCKER, &output));
    }
    Ok(parse_docker_ps(&String::from_utf8_lossy(&output.stdout)))
}

/// Parses `lsof -F pcn` field output.
///
/// Each process block starts with a `p<pid>` line followed by `c<command>` and one
/// `n<address>:<port>` line per socket. Duplicate sockets (IPv4 and IPv6 on the same
/// wildcard) are kept once per address.
pub fn parse_lsof_listeners(output: &str) -> Vec<ListeningPort> {
    let mut ports: Vec<ListeningPort> = Vec::new();
    let mut pid: Option<u32> = None;
    let mut process = String::new();

    for line in output.lines() {
        let mut chars = line.chars();
        let Some(tag) = chars.next() else {
            continue;
        };
        let value = chars.as_str();

        match tag {
            'p' => {
                pid = value.parse().ok();
                process.clear();
            }
            'c' => process = value.to_string(),
            'n' => {
                let Some(pid) = pid else { continue };
                let Some((address, port)) = value.rsplit_once(':') else {
                    continue;
                };
                let Ok(port) = port.parse::<u16>() else {
                    continue;
                };

                let entry = ListeningPort {
                    port,
                    address: address.to_string(),
                    pid,
                    process: process.clone(),
                };
                if !ports.contains(&entry) {
                    ports.push(entry);
                }
            }
            _ => {}
        }
    }

    ports.sort_by(|a, b| (a.port, a.pid, &a.address).cmp(&(b.port, b.pid, &b.address)));
    ports
}

/// Parses `docker ps --format '{{json .}}'`, one JSON object per line.
pub fn parse_docker_ps(output: &str) -> Vec<Container> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter_map(|line| match serde_json::from_str::<Container>(line) {
            Ok(container) => Some(container),
            Err(err) => {
                debug!("skipping unparseable docker row: {err}");
                None
            }
        })
        .collect()
}

async fn run_tool(program: &str, args: &[&str]) -> Result<Output, HostError> {
    let child = Command::new(program).args(args).kill_on_drop(true).output();

    match tokio::time::timeout(HOST_COMMAND_TIMEOUT, child).await {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(source)) => Err(HostError::Spawn {
            program: program.to_string(),
            source,
        }),
        Err(_) => Err(HostError::Timeout {
            program: program.to_string(),
            timeout: HOST_COMMAND_TIMEOUT,
        }),
    }
}

fn failed(program: &str, output: &Output) -> HostError {
    HostError::Failed {
        program: program.to_string(),
        code: output.status.code(),
        diagnostic: String::from_utf8_lossy(&output.stderr).trim().to_string(),
    }
}
