#![allow(dead_code)]

use std::{
    fs,
    path::{Path, PathBuf},
    process::{Child, Command as StdCommand, ExitStatus, Stdio},
    thread,
    time::{Duration, Instant},
};

use assert_cmd::Command;
use localrun_agent::runtime::AgentPaths;
use tempfile::{TempDir, tempdir};

/// Isolated home directory plus a `PATH` that holds only the built binary, so
/// commands never see the real launchd or the developer's files.
pub struct Sandbox {
    _temp: TempDir,
    pub home: PathBuf,
    pub paths: AgentPaths,
}

impl Sandbox {
    pub fn new() -> Self {
        let temp = tempdir().expect("failed to create tempdir");
        let home = temp.path().join("home");
        fs::create_dir_all(&home).expect("failed to create home dir");
        let paths = AgentPaths::from_home(&home).with_search_path(vec![bin_dir()]);

        Self {
            _temp: temp,
            home,
            paths,
        }
    }

    /// The agent binary with `HOME` and `PATH` pointed into the sandbox.
    pub fn command(&self) -> Command {
        let mut cmd = Command::new(agent_bin());
        cmd.env("HOME", &self.home).env("PATH", bin_dir());
        cmd
    }

    /// Spawns the agent binary in the background with piped stdout.
    pub fn spawn(&self, args: &[&str]) -> Child {
        StdCommand::new(agent_bin())
            .args(args)
            .env("HOME", &self.home)
            .env("PATH", bin_dir())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .expect("failed to spawn agent binary")
    }

    pub fn write_log(&self, contents: &str) {
        let log = &self.paths.log_file;
        fs::create_dir_all(log.parent().unwrap()).expect("failed to create log dir");
        fs::write(log, contents).expect("failed to write log");
    }

    pub fn write_config_record(&self, contents: &str) {
        let record = &self.paths.config_file;
        fs::create_dir_all(record.parent().unwrap()).expect("failed to create config dir");
        fs::write(record, contents).expect("failed to write config record");
    }
}

pub fn agent_bin() -> &'static Path {
    Path::new(assert_cmd::cargo::cargo_bin!("localrun-agent"))
}

pub fn bin_dir() -> PathBuf {
    agent_bin()
        .parent()
        .expect("binary has a parent directory")
        .to_path_buf()
}

/// Sends SIGINT to `child` and waits up to ten seconds for it to exit.
#[cfg(unix)]
pub fn interrupt(child: &mut Child) -> ExitStatus {
    let pid = libc::pid_t::try_from(child.id()).expect("pid fits in pid_t");
    unsafe {
        libc::kill(pid, libc::SIGINT);
    }

    let deadline = Instant::now() + Duration::from_secs(10);
    loop {
        if let Some(status) = child.try_wait().expect("failed to poll child") {
            return status;
        }
        if Instant::now() > deadline {
            child.kill().ok();
            panic!("process {pid} did not exit after SIGINT");
        }
        thread::sleep(Duration::from_millis(50));
    }
}
