use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

use tempfile::TempDir;

fn bin_path() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_tally"))
}

fn run_cmd(data_dir: &Path, args: &[&str], input: Option<&str>) -> Output {
    let mut cmd = Command::new(bin_path());
    cmd.arg("--data-dir").arg(data_dir);
    cmd.args(args);
    cmd.env_remove("TALLY_DATA_DIR");
    cmd.env("TALLY_LOG", "off");
    if input.is_some() {
        cmd.stdin(Stdio::piped());
    }
    cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
    let mut child = cmd.spawn().expect("spawn command");
    if let Some(input) = input {
        child
            .stdin
            .as_mut()
            .expect("stdin")
            .write_all(input.as_bytes())
            .expect("write stdin");
    }
    child.wait_with_output().expect("wait output")
}

fn output_stdout(output: Output) -> String {
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8(output.stdout).expect("stdout utf8")
}

fn run_ok(dir: &TempDir, args: &[&str]) -> String {
    output_stdout(run_cmd(dir.path(), args, None))
}

fn parse_task_id(stdout: &str) -> String {
    let rest = stdout
        .trim()
        .strip_prefix("Added task ")
        .expect("add output");
    rest.split_whitespace().next().expect("task id").to_string()
}

fn add_task(dir: &TempDir, text: &str, category: Option<&str>) -> String {
    let mut args = vec!["add", text];
    if let Some(category) = category {
        args.extend(["--category", category]);
    }
    parse_task_id(&run_ok(dir, &args))
}

#[test]
fn add_and_list_tasks() {
    let dir = TempDir::new().expect("tempdir");
    let id = add_task(&dir, "Buy milk", None);
    add_task(&dir, "Call mom", Some("Personal"));

    let all = run_ok(&dir, &["list"]);
    assert!(all.contains(&format!("[ ] {}: Buy milk (Work)", id)));
    assert!(all.contains("Call mom (Personal)"));

    let personal = run_ok(&dir, &["list", "--category", "Personal"]);
    assert!(personal.contains("Call mom"));
    assert!(!personal.contains("Buy milk"));
    assert!(dir.path().join("tasks.yml").exists());
}

#[test]
fn blank_task_text_is_ignored() {
    let dir = TempDir::new().expect("tempdir");
    let stdout = run_ok(&dir, &["add", "   "]);
    assert!(stdout.contains("Nothing to add"));
    assert!(run_ok(&dir, &["list"]).contains("(empty)"));
}

#[test]
fn unknown_category_is_rejected() {
    let dir = TempDir::new().expect("tempdir");
    let output = run_cmd(dir.path(), &["add", "x", "--category", "Nope"], None);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("unknown category"));
}

#[test]
fn toggle_records_completion_on_calendar() {
    let dir = TempDir::new().expect("tempdir");
    let id = add_task(&dir, "Buy milk", None);
    let stdout = run_ok(&dir, &["toggle", &id]);
    assert!(stdout.contains("Completed"));
    assert!(run_ok(&dir, &["calendar"]).contains("Work: 1 completed"));
    assert!(run_ok(&dir, &["list"]).contains("[x]"));

    let stdout = run_ok(&dir, &["toggle", &id]);
    assert!(stdout.contains("Reopened"));
    assert!(!run_ok(&dir, &["calendar"]).contains("completed"));
}

#[test]
fn edit_and_delete_by_id() {
    let dir = TempDir::new().expect("tempdir");
    let id = add_task(&dir, "Draft", None);
    run_ok(&dir, &["edit", &id, "Final"]);
    assert!(run_ok(&dir, &["list"]).contains("Final"));

    run_ok(&dir, &["delete", &id]);
    assert!(run_ok(&dir, &["list"]).contains("(empty)"));

    let output = run_cmd(dir.path(), &["edit", &id, "Again"], None);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("task not found"));
}

#[test]
fn rename_category_carries_tasks_and_completions() {
    let dir = TempDir::new().expect("tempdir");
    let id = add_task(&dir, "Buy milk", Some("Work"));
    run_ok(&dir, &["toggle", &id]);
    run_ok(&dir, &["category", "rename", "Work", "Job"]);

    assert!(run_ok(&dir, &["list"]).contains("Buy milk (Job)"));
    let calendar = run_ok(&dir, &["calendar"]);
    assert!(calendar.contains("Job: 1 completed"));
    assert!(!calendar.contains("Work:"));
    let categories = run_ok(&dir, &["category", "list"]);
    assert!(categories.contains("#3b82f6 Job (1)"));
}

#[test]
fn duplicate_category_is_ignored() {
    let dir = TempDir::new().expect("tempdir");
    let stdout = run_ok(&dir, &["category", "add", "work", "--color", "#000000"]);
    assert!(stdout.contains("Nothing changed"));
    let stdout = run_ok(&dir, &["category", "add", "Errands", "--color", "#F59E0B"]);
    assert!(stdout.contains("Added category Errands"));
    assert!(run_ok(&dir, &["category", "list"]).contains("#f59e0b Errands (0)"));

    let output = run_cmd(dir.path(), &["category", "add", "Bad", "--color", "red"], None);
    assert!(!output.status.success());
}

#[test]
fn category_delete_needs_terminal_or_yes_and_leaves_orphans() {
    let dir = TempDir::new().expect("tempdir");
    add_task(&dir, "Buy milk", Some("Work"));

    let refused = run_cmd(dir.path(), &["category", "delete", "Work"], Some("y\n"));
    assert!(!refused.status.success());
    assert!(String::from_utf8_lossy(&refused.stderr).contains("--yes"));
    assert!(run_ok(&dir, &["category", "list"]).contains(" Work "));

    let deleted = run_ok(&dir, &["category", "delete", "Work", "--yes"]);
    assert!(deleted.contains("Deleted category Work"));
    assert!(!run_ok(&dir, &["category", "list"]).contains(" Work "));
    assert!(run_ok(&dir, &["list"]).contains("Buy milk (Work)"));

    let stdout = run_ok(&dir, &["category", "delete", "Personal", "-y"]);
    assert!(stdout.contains("Deleted category Personal"));
}

#[test]
fn calendar_for_explicit_month() {
    let dir = TempDir::new().expect("tempdir");
    let stdout = run_ok(&dir, &["calendar", "--month", "2024-05"]);
    assert!(stdout.starts_with("May 2024"));
    assert!(stdout.contains("#3b82f6 Work"));

    let output = run_cmd(dir.path(), &["calendar", "--month", "May"], None);
    assert!(!output.status.success());
}

#[test]
fn theme_defaults_to_dark_and_persists() {
    let dir = TempDir::new().expect("tempdir");
    assert_eq!(run_ok(&dir, &["theme"]).trim(), "dark");
    run_ok(&dir, &["theme", "light"]);
    assert_eq!(run_ok(&dir, &["theme"]).trim(), "light");
    assert!(dir.path().join("theme.yml").exists());
}

#[test]
fn legacy_task_file_is_upgraded() {
    let dir = TempDir::new().expect("tempdir");
    std::fs::write(
        dir.path().join("tasks.yml"),
        r#"[{"text": "Old task", "category": "Work", "completed": false}]"#,
    )
    .expect("write legacy tasks");
    let listing = run_ok(&dir, &["list"]);
    assert!(listing.contains("Old task (Work)"));
    let stored = std::fs::read_to_string(dir.path().join("tasks.yml")).expect("read tasks");
    assert!(stored.contains("id:"));
}
