//! Integration tests: run the parmap binary and check exit codes and output.

use std::io::Write;
use std::process::{Command, Stdio};

fn parmap() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_parmap"));
    for key in ["PARMAP_WORKERS", "PARMAP_BACKEND", "PARMAP_PROGRESS", "PARMAP_IN_FLIGHT", "PARMAP_WORKER"] {
        cmd.env_remove(key);
    }
    cmd
}

/// Run in an empty directory with an empty home, so no stray .parmaprc applies.
fn parmap_in(dir: &std::path::Path) -> Command {
    let mut cmd = parmap();
    cmd.current_dir(dir).env("HOME", dir);
    cmd
}

fn stdout_of(out: &std::process::Output) -> String {
    String::from_utf8_lossy(&out.stdout).trim().to_string()
}

#[test]
fn test_help() {
    let out = parmap().arg("--help").output().unwrap();
    assert!(out.status.success(), "parmap --help should succeed");
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("run"));
    assert!(stdout.contains("list"));
    assert!(!stdout.contains("Serve built-in functions"));
}

#[test]
fn test_version() {
    let out = parmap().arg("--version").output().unwrap();
    assert!(out.status.success());
    assert!(String::from_utf8_lossy(&out.stdout).contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_list() {
    let out = parmap().arg("list").output().unwrap();
    assert!(out.status.success());
    let names: Vec<String> = stdout_of(&out).lines().map(str::to_string).collect();
    assert_eq!(names, vec!["add", "delay", "fail_on", "pid", "square"]);
}

#[test]
fn test_run_threads_in_order() {
    let td = tempfile::tempdir().unwrap();
    let out = parmap_in(td.path())
        .args(["run", "square", "1", "2", "3", "4", "-w", "2"])
        .output()
        .unwrap();
    assert!(out.status.success(), "stderr: {}", String::from_utf8_lossy(&out.stderr));
    assert_eq!(stdout_of(&out), "[1,4,9,16]");
}

#[test]
fn test_run_spreads_array_items() {
    let td = tempfile::tempdir().unwrap();
    let out = parmap_in(td.path())
        .args(["run", "add", "[1,2]", "[3,4]", "[5,6]"])
        .output()
        .unwrap();
    assert!(out.status.success());
    assert_eq!(stdout_of(&out), "[3,7,11]");
}

#[test]
fn test_run_keeps_large_integers_exact() {
    let td = tempfile::tempdir().unwrap();
    let out = parmap_in(td.path())
        .args(["run", "add", "[9007199254740993,0]", "[1,2]"])
        .output()
        .unwrap();
    assert!(out.status.success());
    assert_eq!(stdout_of(&out), "[9007199254740993,3]");

    let out = parmap_in(td.path())
        .args(["run", "square", "94906267", "--backend", "process"])
        .output()
        .unwrap();
    assert!(out.status.success(), "stderr: {}", String::from_utf8_lossy(&out.stderr));
    assert_eq!(stdout_of(&out), "[9007199515875289]");
}

#[test]
fn test_run_no_items() {
    let td = tempfile::tempdir().unwrap();
    let out = parmap_in(td.path()).args(["run", "square"]).output().unwrap();
    assert!(out.status.success());
    assert_eq!(stdout_of(&out), "[]");
}

#[test]
fn test_run_process_backend() {
    let td = tempfile::tempdir().unwrap();
    let out = parmap_in(td.path())
        .args(["run", "add", "[1,2]", "[3,4]", "--backend", "process", "-w", "2"])
        .output()
        .unwrap();
    assert!(out.status.success(), "stderr: {}", String::from_utf8_lossy(&out.stderr));
    assert_eq!(stdout_of(&out), "[3,7]");
}

#[test]
fn test_stream_prints_fast_result_first() {
    let td = tempfile::tempdir().unwrap();
    let out = parmap_in(td.path())
        .args(["run", "delay", r#"[400,"slow"]"#, r#"[0,"fast"]"#, "--stream", "-w", "2"])
        .output()
        .unwrap();
    assert!(out.status.success());
    let lines: Vec<String> = stdout_of(&out).lines().map(str::to_string).collect();
    assert_eq!(lines, vec![r#""fast""#, r#""slow""#]);
}

#[test]
fn test_failure_exits_nonzero() {
    let td = tempfile::tempdir().unwrap();
    let out = parmap_in(td.path())
        .args(["run", "fail_on", "[1,2]", "[2,2]"])
        .output()
        .unwrap();
    assert!(!out.status.success());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("refusing 2"), "stderr: {}", stderr);
}

#[test]
fn test_unknown_function_fails() {
    let td = tempfile::tempdir().unwrap();
    for backend in ["thread", "process"] {
        let out = parmap_in(td.path())
            .args(["run", "cube", "1", "--backend", backend])
            .output()
            .unwrap();
        assert!(!out.status.success(), "{} backend should fail", backend);
        assert!(String::from_utf8_lossy(&out.stderr).contains("cube"));
    }
}

#[test]
fn test_invalid_backend_rejected() {
    let out = parmap().args(["run", "square", "1", "--backend", "gpu"]).output().unwrap();
    assert!(!out.status.success());
}

/// Runs `pid` over a few items and reports whether any task ran in the CLI's own process.
fn ran_in_cli_process(cmd: &mut Command) -> bool {
    let child = cmd
        .args(["run", "pid", "0", "1", "2", "-w", "2"])
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();
    let cli_pid = child.id();
    let out = child.wait_with_output().unwrap();
    assert!(out.status.success(), "stderr: {}", String::from_utf8_lossy(&out.stderr));
    let pids: Vec<u32> = serde_json::from_str(&stdout_of(&out)).unwrap();
    assert_eq!(pids.len(), 3);
    pids.contains(&cli_pid)
}

#[test]
fn test_rc_file_selects_backend() {
    let td = tempfile::tempdir().unwrap();
    assert!(ran_in_cli_process(&mut parmap_in(td.path())));

    std::fs::write(td.path().join(".parmaprc"), r#"{"backend": "process"}"#).unwrap();
    assert!(!ran_in_cli_process(&mut parmap_in(td.path())));

    // Env beats the rc file, flags beat env.
    assert!(ran_in_cli_process(parmap_in(td.path()).env("PARMAP_BACKEND", "thread")));
    let mut cmd = parmap_in(td.path());
    cmd.env("PARMAP_BACKEND", "thread");
    let out = cmd
        .args(["run", "pid", "0", "--backend", "process"])
        .output()
        .unwrap();
    assert!(out.status.success());
}

#[test]
fn test_worker_subcommand_speaks_protocol() {
    let mut child = parmap()
        .arg("worker")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .spawn()
        .unwrap();
    {
        let mut stdin = child.stdin.take().unwrap();
        writeln!(stdin, r#"{{"id":0,"func":"square","args":[4]}}"#).unwrap();
        writeln!(stdin, r#"{{"id":1,"func":"fail_on","args":[3,3]}}"#).unwrap();
    }
    let out = child.wait_with_output().unwrap();
    assert!(out.status.success());
    let lines: Vec<serde_json::Value> = String::from_utf8_lossy(&out.stdout)
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0]["id"], 0);
    assert_eq!(lines[0]["result"], 16);
    assert_eq!(lines[1]["error"], "refusing 3");
}
