#[path = "common/mod.rs"]
mod common;

use std::io::{BufRead, BufReader, Read};

use common::Sandbox;
use predicates::{boolean::PredicateBooleanExt, str::contains};

#[test]
fn logs_without_file_fails() {
    let sandbox = Sandbox::new();

    sandbox
        .command()
        .arg("logs")
        .assert()
        .code(1)
        .stderr(contains("no logs available"));
}

#[test]
fn logs_shows_last_lines() {
    let sandbox = Sandbox::new();
    sandbox.write_log("first\nsecond\nthird\n");

    sandbox
        .command()
        .args(["logs", "--lines", "2"])
        .assert()
        .success()
        .stdout(contains("second\nthird\n"))
        .stdout(contains("first").not());
}

#[test]
fn logs_default_shows_whole_short_file() {
    let sandbox = Sandbox::new();
    sandbox.write_log("LocalRun Agent listening on http://127.0.0.1:47777\n");

    sandbox
        .command()
        .arg("logs")
        .assert()
        .success()
        .stdout(contains("listening on"));
}

#[cfg(unix)]
#[test]
fn follow_exits_cleanly_on_interrupt() {
    let sandbox = Sandbox::new();
    sandbox.write_log("ready\n");

    let mut child = sandbox.spawn(&["logs", "--follow"]);
    let mut stdout = BufReader::new(child.stdout.take().expect("piped stdout"));

    // The Ctrl-C handler is installed before the tail is printed.
    let mut first = String::new();
    stdout.read_line(&mut first).expect("read first line");
    assert_eq!(first, "ready\n");

    let status = common::interrupt(&mut child);
    assert_eq!(status.code(), Some(0));

    let mut rest = String::new();
    stdout.read_to_string(&mut rest).expect("read remaining output");
    assert!(!rest.contains("error"));
}
