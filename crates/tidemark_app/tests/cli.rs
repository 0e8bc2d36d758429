use std::path::Path;
use std::process::{Command, Output};

use tempfile::TempDir;

fn tidemark(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_tidemark"))
        .current_dir(dir)
        .args(args)
        .output()
        .expect("spawn tidemark")
}

fn write_config(dir: &Path) {
    std::fs::write(
        dir.join("tidemark.ron"),
        r#"(
            output: (artifact_dir: "out", state_path: "state.json"),
            log: (level: "warn"),
        )"#,
    )
    .unwrap();
}

#[test]
fn status_without_state_fails() {
    let temp = TempDir::new().unwrap();
    write_config(temp.path());

    let output = tidemark(temp.path(), &["status"]);

    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("error"));
}

#[test]
fn init_then_status_reports_the_baseline() {
    let temp = TempDir::new().unwrap();
    write_config(temp.path());

    let init = tidemark(temp.path(), &["init", "--baseline", "9256"]);
    assert_eq!(init.status.code(), Some(0));
    assert!(temp.path().join("state.json").exists());

    let status = tidemark(temp.path(), &["status"]);
    assert_eq!(status.status.code(), Some(0));
    let stdout = String::from_utf8_lossy(&status.stdout);
    assert!(stdout.contains("last_processed_id: 9256"), "{stdout}");
    assert!(stdout.contains("next_mode: INCREMENTAL"), "{stdout}");
}

#[test]
fn init_refuses_to_rewind() {
    let temp = TempDir::new().unwrap();
    write_config(temp.path());

    assert_eq!(
        tidemark(temp.path(), &["init", "--baseline", "9256"]).status.code(),
        Some(0)
    );
    let rewind = tidemark(temp.path(), &["init", "--baseline", "9000"]);
    assert_eq!(rewind.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&rewind.stderr).contains("below"));
}

#[test]
fn init_can_write_a_default_config() {
    let temp = TempDir::new().unwrap();

    let output = tidemark(
        temp.path(),
        &["--config", "fresh.ron", "init", "--baseline", "5", "--write-config"],
    );

    assert_eq!(output.status.code(), Some(0));
    let written = std::fs::read_to_string(temp.path().join("fresh.ron")).unwrap();
    assert!(written.contains("item_url_template"));
}

#[test]
fn corrupt_state_makes_run_exit_with_failure() {
    let temp = TempDir::new().unwrap();
    write_config(temp.path());
    std::fs::write(temp.path().join("state.json"), "{ not json").unwrap();

    let output = tidemark(temp.path(), &["run", "--no-publish"]);

    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("corrupt"));
}

#[test]
fn invalid_config_is_reported() {
    let temp = TempDir::new().unwrap();
    std::fs::write(
        temp.path().join("tidemark.ron"),
        r#"(discovery: (probe_window: 0))"#,
    )
    .unwrap();

    let output = tidemark(temp.path(), &["status"]);

    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("probe_window"));
}
