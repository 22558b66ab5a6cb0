#[path = "common/mod.rs"]
mod common;

use common::Sandbox;
use predicates::str::contains;

#[test]
fn help_lists_every_command() {
    let sandbox = Sandbox::new();

    let output = sandbox
        .command()
        .arg("--help")
        .output()
        .expect("failed to run --help");
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    for command in [
        "serve",
        "install",
        "uninstall",
        "start",
        "stop",
        "restart",
        "status",
        "logs",
    ] {
        assert!(stdout.contains(command), "help is missing '{command}'");
    }
}

#[test]
fn version_flag_prints_crate_version() {
    let sandbox = Sandbox::new();

    sandbox
        .command()
        .arg("--version")
        .assert()
        .success()
        .stdout(contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn unknown_command_is_rejected() {
    let sandbox = Sandbox::new();

    sandbox.command().arg("launch").assert().failure();
}

#[test]
fn serve_rejects_invalid_port() {
    let sandbox = Sandbox::new();

    sandbox
        .command()
        .args(["serve", "--port", "70000"])
        .assert()
        .failure()
        .stderr(contains("70000"));
}

#[test]
fn serve_rejects_unknown_log_level() {
    let sandbox = Sandbox::new();

    sandbox
        .command()
        .args(["serve", "--log-level", "loud"])
        .assert()
        .failure()
        .stderr(contains("invalid log level"));
}
