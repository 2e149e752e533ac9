//! Integration tests for the command-line interface
//!
//! Drives the `preview` and `apply` commands against a temp tree.

use std::fs;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

/// Helper to create a small tree with one rename and one rewrite
fn setup_test_tree() -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("colour.txt"), "The colour of the sky.\n").unwrap();
    fs::write(dir.path().join("plain.txt"), "nothing here\n").unwrap();
    dir
}

fn run(args: &[&str]) -> Output {
    command(args).output().unwrap()
}

fn run_in(dir: &Path, args: &[&str]) -> Output {
    command(args).current_dir(dir).output().unwrap()
}

fn command(args: &[&str]) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_bulk-replace"));
    cmd.args(args).env_remove("RUST_LOG");
    cmd
}

fn path_arg(path: &Path) -> &str {
    path.to_str().unwrap()
}

#[test]
fn test_apply_help() {
    let output = run(&["apply", "--help"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Apply the replacement"));
    assert!(stdout.contains("--whole-word"));
}

#[test]
fn test_preview_does_not_modify() {
    let dir = setup_test_tree();
    let output = run(&[
        "preview",
        path_arg(dir.path()),
        "--find",
        "colour",
        "--replace",
        "color",
    ]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Renames:"));
    assert!(stdout.contains("color.txt"));
    assert!(stdout.contains("Summary:"));

    assert!(dir.path().join("colour.txt").exists());
    assert!(!dir.path().join("color.txt").exists());
}

#[test]
fn test_apply_basic() {
    let dir = setup_test_tree();
    let output = run(&[
        "apply",
        path_arg(dir.path()),
        "--find",
        "colour",
        "--replace",
        "color",
    ]);

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success(), "stdout: {stdout}");
    assert!(stdout.contains("Committed"));
    assert_eq!(
        fs::read_to_string(dir.path().join("color.txt")).unwrap(),
        "The color of the sky.\n"
    );
}

#[test]
fn test_apply_dry_run() {
    let dir = setup_test_tree();
    let output = run(&[
        "apply",
        path_arg(dir.path()),
        "-f",
        "colour",
        "--replace",
        "color",
        "--dry-run",
    ]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("DRY RUN"));
    assert!(dir.path().join("colour.txt").exists());
}

#[test]
fn test_preview_json() {
    let dir = setup_test_tree();
    let output = run(&[
        "preview",
        path_arg(dir.path()),
        "--find",
        "colour",
        "--replace",
        "color",
        "--no-names",
        "--json",
    ]);

    assert!(output.status.success());
    let plan: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let actions = plan["actions"].as_array().unwrap();
    assert_eq!(actions.len(), 1);
    assert_eq!(actions[0]["action"]["kind"], "rewrite_content");
    assert_eq!(actions[0]["action"]["match_count"], 1);
}

#[test]
fn test_missing_find_fails() {
    let dir = setup_test_tree();
    let output = run(&["preview", path_arg(dir.path())]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("find"));
}

#[test]
fn test_job_file() {
    let dir = setup_test_tree();
    let job = dir.path().join("job.toml");
    fs::write(
        &job,
        r#"root = "."
find = "colour"
replace = "color"

[options]
include_names = false

[filters]
ignored_extensions = ["toml"]
"#,
    )
    .unwrap();

    let output = run(&["apply", "--config", path_arg(&job)]);
    assert!(output.status.success());

    assert!(dir.path().join("colour.txt").exists());
    assert_eq!(
        fs::read_to_string(dir.path().join("colour.txt")).unwrap(),
        "The color of the sky.\n"
    );
    assert!(fs::read_to_string(&job).unwrap().contains("colour"));
}

#[test]
fn test_ignore_path_is_relative_to_cwd() {
    let dir = TempDir::new().unwrap();
    fs::create_dir_all(dir.path().join("proj/vendor")).unwrap();
    fs::write(dir.path().join("proj/main.txt"), "colour").unwrap();
    fs::write(dir.path().join("proj/vendor/lib.txt"), "colour").unwrap();

    let output = run_in(
        dir.path(),
        &[
            "apply",
            "proj",
            "--find",
            "colour",
            "--replace",
            "color",
            "--ignore-path",
            "proj/vendor",
        ],
    );

    assert!(output.status.success());
    assert_eq!(
        fs::read_to_string(dir.path().join("proj/main.txt")).unwrap(),
        "color"
    );
    assert_eq!(
        fs::read_to_string(dir.path().join("proj/vendor/lib.txt")).unwrap(),
        "colour"
    );
}
