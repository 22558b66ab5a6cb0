#[path = "common/mod.rs"]
mod common;

use std::fs;

use common::Sandbox;
use localrun_agent::descriptor::ServiceDescriptor;
use predicates::str::contains;

#[test]
fn install_writes_descriptor_pointing_at_binary() {
    let sandbox = Sandbox::new();

    sandbox
        .command()
        .arg("install")
        .assert()
        .success()
        .stdout(contains("Launch agent installed"))
        .stdout(contains("localrun-agent start"));

    let descriptor =
        ServiceDescriptor::load(&sandbox.paths.descriptor_file).expect("descriptor written");
    assert_eq!(descriptor.label, "com.localrun.agent");
    assert_eq!(descriptor.arguments, vec!["serve", "--port", "47777"]);
    assert_eq!(descriptor.program, common::agent_bin());
    assert_eq!(descriptor.working_directory, sandbox.home);
    assert!(sandbox.paths.config_dir.is_dir());
}

#[test]
fn install_fails_when_binary_is_not_on_path() {
    let sandbox = Sandbox::new();
    let empty = sandbox.home.join("empty-bin");
    fs::create_dir_all(&empty).unwrap();

    sandbox
        .command()
        .env("PATH", &empty)
        .arg("install")
        .assert()
        .code(1)
        .stderr(contains("failed to install launch agent"))
        .stderr(contains("not found on the search path"));

    assert!(!sandbox.paths.descriptor_file.exists());
}

#[test]
fn install_then_uninstall_removes_everything() {
    let sandbox = Sandbox::new();
    sandbox.command().arg("install").assert().success();
    sandbox.write_config_record(r#"{"port": 47777, "pid": 123, "version": "1.0.0"}"#);

    // launchctl is not on the sandbox PATH; unregistering fails quietly.
    sandbox
        .command()
        .arg("uninstall")
        .assert()
        .success()
        .stdout(contains("Launch agent removed"))
        .stdout(contains("Configuration removed"))
        .stdout(contains("uninstalled"));

    assert!(!sandbox.paths.descriptor_file.exists());
    assert!(!sandbox.paths.config_file.exists());
}

#[test]
fn uninstall_when_not_installed_succeeds() {
    let sandbox = Sandbox::new();

    sandbox
        .command()
        .arg("uninstall")
        .assert()
        .success()
        .stdout(contains("uninstalled"));
}

#[test]
fn start_without_install_fails() {
    let sandbox = Sandbox::new();

    sandbox
        .command()
        .arg("start")
        .assert()
        .code(1)
        .stderr(contains("service not installed"));
}

#[test]
fn stop_without_install_fails() {
    let sandbox = Sandbox::new();

    sandbox
        .command()
        .arg("stop")
        .assert()
        .code(1)
        .stderr(contains("service not installed"));
}

#[test]
fn restart_without_install_fails() {
    let sandbox = Sandbox::new();

    sandbox
        .command()
        .arg("restart")
        .assert()
        .code(1)
        .stderr(contains("service not installed"));
}

#[test]
fn start_reports_launchctl_failure_verbatim() {
    let sandbox = Sandbox::new();
    sandbox.command().arg("install").assert().success();

    // Without launchctl on PATH the load cannot even be spawned.
    sandbox
        .command()
        .arg("start")
        .assert()
        .code(1)
        .stderr(contains("failed to start service"))
        .stderr(contains("launchctl"));
}

#[test]
fn status_fails_when_registry_is_unavailable() {
    let sandbox = Sandbox::new();

    sandbox
        .command()
        .arg("status")
        .assert()
        .code(1)
        .stderr(contains("failed to query launchd registry"));
}
