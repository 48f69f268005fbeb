// CLI integration tests for the manifest runner and demo flows.
use std::io::Write;
use std::process::Command;

use serde_json::{json, Value};

fn cmd() -> Command {
    let exe = env!("CARGO_BIN_EXE_slicekit");
    Command::new(exe)
}

fn parse_json(value: &str) -> Value {
    serde_json::from_str(value).expect("valid json")
}

fn parse_json_lines(output: &[u8]) -> Vec<Value> {
    let text = String::from_utf8_lossy(output);
    text.lines().map(parse_json).collect()
}

fn write_manifest(dir: &std::path::Path, manifest: &Value) -> std::path::PathBuf {
    let path = dir.join("steps.json");
    let mut file = std::fs::File::create(&path).expect("create manifest");
    file.write_all(manifest.to_string().as_bytes())
        .expect("write manifest");
    path
}

#[test]
fn demo_walks_through_the_aliasing_contract() {
    let demo = cmd().arg("demo").output().expect("demo");
    assert!(demo.status.success());

    let lines = parse_json_lines(&demo.stdout);
    assert_eq!(lines.len(), 4);
    assert_eq!(lines[0]["step"], "allocate");
    assert_eq!(lines[0]["elems"], json!(["a", "b", "c"]));

    assert_eq!(lines[1]["step"], "subrange");
    assert_eq!(lines[1]["elems"], json!(["c"]));
    assert_eq!(lines[1]["shares_backing"], json!(true));

    // The write through the subrange is visible through the parent.
    assert_eq!(lines[2]["parent_elems"], json!(["a", "b", "abc"]));

    // The capacity-exceeding append decouples and leaves the parent alone.
    assert_eq!(lines[3]["shares_backing"], json!(false));
    assert_eq!(lines[3]["elems"], json!(["abc", "d"]));
    assert_eq!(lines[3]["parent_elems"], json!(["a", "b", "abc"]));
}

#[test]
fn run_executes_a_manifest() {
    let temp = tempfile::tempdir().expect("tempdir");
    let manifest = json!({
        "script_version": 0,
        "steps": [
            {"op": "allocate", "view": "v", "input": {"len": 2}},
            {"op": "set", "view": "v", "input": {"index": 0, "value": 10}},
            {"op": "subrange", "view": "w", "input": {"from": "v", "start": 1}},
            {"op": "set", "view": "w", "input": {"index": 0, "value": 20}},
            {"op": "expect_view", "view": "v", "expect": {"elems": [10, 20]}},
            {"op": "expect_shared", "input": {"views": ["v", "w"]}}
        ]
    });
    let path = write_manifest(temp.path(), &manifest);

    let run = cmd().arg("run").arg(&path).output().expect("run");
    assert!(run.status.success());
    let summary = parse_json(std::str::from_utf8(&run.stdout).expect("utf8"));
    assert_eq!(summary, json!({"ok": true, "steps": 6}));
}

#[test]
fn failed_expectations_exit_with_usage_code() {
    let temp = tempfile::tempdir().expect("tempdir");
    let manifest = json!({
        "script_version": 0,
        "steps": [
            {"op": "allocate", "view": "v", "input": {"len": 1}},
            {"id": "wrong", "op": "expect_view", "view": "v", "expect": {"elems": [7]}}
        ]
    });
    let path = write_manifest(temp.path(), &manifest);

    let run = cmd().arg("run").arg(&path).output().expect("run");
    assert_eq!(run.status.code().unwrap(), 2);

    let error = parse_json_lines(&run.stderr).remove(0);
    assert_eq!(error["error"]["kind"], json!("Usage"));
    let message = error["error"]["message"].as_str().expect("message");
    assert!(message.contains("step 1 (wrong)"));
}

#[test]
fn missing_manifest_exits_with_io_code() {
    let temp = tempfile::tempdir().expect("tempdir");
    let path = temp.path().join("absent.json");

    let run = cmd().arg("run").arg(&path).output().expect("run");
    assert_eq!(run.status.code().unwrap(), 5);

    let error = parse_json_lines(&run.stderr).remove(0);
    assert_eq!(error["error"]["kind"], json!("Io"));
}

#[test]
fn no_arguments_exits_with_usage_code() {
    let bare = cmd().output().expect("bare invocation");
    assert_eq!(bare.status.code().unwrap(), 2);
}

#[test]
fn version_emits_json() {
    let version = cmd().arg("version").output().expect("version");
    assert!(version.status.success());
    let body = parse_json(std::str::from_utf8(&version.stdout).expect("utf8"));
    assert_eq!(body["name"], json!("slicekit"));
    assert!(body["version"].as_str().is_some());
}

#[test]
fn completion_prints_a_script() {
    let completion = cmd().args(["completion", "bash"]).output().expect("completion");
    assert!(completion.status.success());
    assert!(!completion.stdout.is_empty());
}
