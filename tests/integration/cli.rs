//! The `ivarpool` binary, run as a child process.

use std::process::{Command, Output};

fn ivarpool(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_ivarpool"))
        .args(args)
        .env("IVARPOOL_LOG", "error")
        .output()
        .unwrap()
}

fn last_line(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout)
        .lines()
        .last()
        .unwrap_or_default()
        .trim()
        .to_string()
}

#[test]
fn test_cli_increment() {
    let output = ivarpool(&["increment", "--value", "5", "--workers", "2"]);
    assert!(output.status.success());
    assert_eq!(last_line(&output), "12");
}

#[test]
fn test_cli_fanout_sum_of_squares() {
    let output = ivarpool(&["fanout", "--tasks", "10", "--workers", "2"]);
    assert!(output.status.success());
    assert_eq!(last_line(&output), "285");
}

#[test]
fn test_cli_fanout_rejects_overflowing_task_count() {
    let output = ivarpool(&["fanout", "--tasks", "5000000000"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("--tasks"));
}

#[test]
fn test_cli_chain() {
    let output = ivarpool(&["chain", "--depth", "200", "--workers", "2"]);
    assert!(output.status.success());
    assert_eq!(last_line(&output), "200");
}
