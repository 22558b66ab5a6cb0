#[path = "common/mod.rs"]
mod common;

use std::{
    thread,
    time::{Duration, Instant},
};

use common::Sandbox;
use localrun_agent::status::AgentConfigRecord;

#[cfg(unix)]
#[test]
fn serve_records_itself_and_exits_cleanly_on_interrupt() {
    let sandbox = Sandbox::new();
    let mut child = sandbox.spawn(&["serve", "--port", "0", "--log-level", "warn"]);

    let deadline = Instant::now() + Duration::from_secs(10);
    let record = loop {
        let record = AgentConfigRecord::load_lenient(&sandbox.paths.config_file);
        if record.pid == Some(child.id()) {
            break record;
        }
        if Instant::now() > deadline {
            child.kill().ok();
            panic!("serve never wrote {}", sandbox.paths.config_file.display());
        }
        thread::sleep(Duration::from_millis(50));
    };
    assert!(record.port.is_some_and(|port| port != 0));
    assert_eq!(record.version.as_deref(), Some(env!("CARGO_PKG_VERSION")));

    // The signal listener starts with the server right after the record is written.
    thread::sleep(Duration::from_millis(300));
    let status = common::interrupt(&mut child);
    assert_eq!(status.code(), Some(0));
}

#[cfg(unix)]
#[test]
fn serve_accepts_localhost() {
    let sandbox = Sandbox::new();
    let mut child = sandbox.spawn(&["serve", "--host", "localhost", "--port", "0"]);

    let deadline = Instant::now() + Duration::from_secs(10);
    while AgentConfigRecord::load_lenient(&sandbox.paths.config_file).pid != Some(child.id()) {
        if let Some(status) = child.try_wait().expect("failed to poll child") {
            panic!("serve --host localhost exited early with {status}");
        }
        if Instant::now() > deadline {
            child.kill().ok();
            panic!("serve never bound localhost");
        }
        thread::sleep(Duration::from_millis(50));
    }

    thread::sleep(Duration::from_millis(300));
    assert_eq!(common::interrupt(&mut child).code(), Some(0));
}
