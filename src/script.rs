//! Purpose: Execute JSON step manifests against the view API.
//! Exports: `run_manifest`, `run_manifest_file`, `RunSummary`.
//! Role: Reference runner shared by the CLI and integration tests.
//! Invariants: Manifests are JSON-only; steps execute in order; fail-fast on errors.
//! Invariants: Views live in a per-run namespace; elements are JSON values.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::api::{Error, ErrorKind, SeqView};

pub const SCRIPT_VERSION: u64 = 0;

/// Status envelope for a completed run, serialized as-is by the CLI.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
pub struct RunSummary {
    pub ok: bool,
    pub steps: usize,
}

/// Outcome of one executed operation: the domain result (some ops produce a
/// value), kept separate from manifest-shape errors which abort the run.
type OpResult = Result<Option<Value>, Error>;

type Views = HashMap<String, SeqView<Value>>;

pub fn run_manifest_file(path: &Path) -> Result<RunSummary, Error> {
    let content = fs::read_to_string(path).map_err(|err| {
        Error::new(ErrorKind::Io)
            .with_message(format!("failed to read manifest {}", path.display()))
            .with_source(err)
    })?;
    let manifest: Value = serde_json::from_str(&content).map_err(|err| {
        Error::new(ErrorKind::Usage)
            .with_message("failed to parse manifest json")
            .with_source(err)
    })?;
    run_manifest(&manifest)
}

pub fn run_manifest(manifest: &Value) -> Result<RunSummary, Error> {
    let version = manifest
        .get("script_version")
        .and_then(Value::as_u64)
        .ok_or_else(|| Error::new(ErrorKind::Usage).with_message("missing script_version"))?;
    if version != SCRIPT_VERSION {
        return Err(Error::new(ErrorKind::Usage)
            .with_message(format!("unsupported script_version: {version}")));
    }

    let steps = manifest
        .get("steps")
        .and_then(Value::as_array)
        .ok_or_else(|| Error::new(ErrorKind::Usage).with_message("manifest steps must be an array"))?;

    let mut views = Views::new();
    for (index, step) in steps.iter().enumerate() {
        run_step(&mut views, step, index)?;
    }
    Ok(RunSummary {
        ok: true,
        steps: steps.len(),
    })
}

fn run_step(views: &mut Views, step: &Value, index: usize) -> Result<(), Error> {
    let step_id = step.get("id").and_then(Value::as_str);
    let op = step
        .get("op")
        .and_then(Value::as_str)
        .ok_or_else(|| step_error(index, step_id, "missing op"))?;
    debug!(index, op, "running step");

    let outcome = match op {
        "allocate" => run_allocate(views, step, index, step_id)?,
        "make" => run_make(views, step, index, step_id)?,
        "set" => run_set(views, step, index, step_id)?,
        "get" => run_get(views, step, index, step_id)?,
        "append" => run_append(views, step, index, step_id)?,
        "reserve" => run_reserve(views, step, index, step_id)?,
        "subrange" => run_subrange(views, step, index, step_id)?,
        "slice" => run_slice(views, step, index, step_id)?,
        "insert" => run_insert(views, step, index, step_id)?,
        "remove" => run_remove(views, step, index, step_id)?,
        "swap" => run_swap(views, step, index, step_id)?,
        "reverse" => run_reverse(views, step, index, step_id)?,
        "sort" => run_sort(views, step, index, step_id)?,
        "clear" => run_clear(views, step, index, step_id)?,
        "extend" => run_extend(views, step, index, step_id)?,
        "expect_view" => {
            run_expect_view(views, step, index, step_id)?;
            Ok(None)
        }
        "expect_shared" => {
            run_expect_shared(views, step, index, step_id)?;
            Ok(None)
        }
        _ => return Err(step_error(index, step_id, format!("unknown op: {op}"))),
    };

    validate_outcome(step.get("expect"), outcome, index, step_id)
}

fn run_allocate(
    views: &mut Views,
    step: &Value,
    index: usize,
    step_id: Option<&str>,
) -> Result<OpResult, Error> {
    let name = view_name(step, index, step_id)?;
    let len = usize_input(step, "len", index, step_id)?;
    Ok(match SeqView::with_len(len) {
        Ok(view) => {
            views.insert(name.to_string(), view);
            Ok(None)
        }
        Err(err) => Err(err),
    })
}

fn run_make(
    views: &mut Views,
    step: &Value,
    index: usize,
    step_id: Option<&str>,
) -> Result<OpResult, Error> {
    let name = view_name(step, index, step_id)?;
    let elems = input(step)
        .get("elems")
        .and_then(Value::as_array)
        .ok_or_else(|| step_error(index, step_id, "input.elems must be an array"))?;
    views.insert(name.to_string(), SeqView::from_vec(elems.clone()));
    Ok(Ok(None))
}

fn run_set(
    views: &mut Views,
    step: &Value,
    index: usize,
    step_id: Option<&str>,
) -> Result<OpResult, Error> {
    let name = view_name(step, index, step_id)?;
    let at = usize_input(step, "index", index, step_id)?;
    let value = required_input(step, "value", index, step_id)?.clone();
    let view = lookup(views, name, index, step_id)?;
    Ok(view.set(at, value).map(|()| None))
}

fn run_get(
    views: &mut Views,
    step: &Value,
    index: usize,
    step_id: Option<&str>,
) -> Result<OpResult, Error> {
    let name = view_name(step, index, step_id)?;
    let at = usize_input(step, "index", index, step_id)?;
    let view = lookup(views, name, index, step_id)?;
    Ok(view.get(at).map(Some))
}

fn run_append(
    views: &mut Views,
    step: &Value,
    index: usize,
    step_id: Option<&str>,
) -> Result<OpResult, Error> {
    let name = view_name(step, index, step_id)?;
    let value = required_input(step, "value", index, step_id)?.clone();
    let view = lookup_mut(views, name, index, step_id)?;
    Ok(view.append(value).map(|()| None))
}

fn run_reserve(
    views: &mut Views,
    step: &Value,
    index: usize,
    step_id: Option<&str>,
) -> Result<OpResult, Error> {
    let name = view_name(step, index, step_id)?;
    let len = usize_input(step, "len", index, step_id)?;
    let view = lookup_mut(views, name, index, step_id)?;
    Ok(view.reserve(len).map(|()| None))
}

fn run_subrange(
    views: &mut Views,
    step: &Value,
    index: usize,
    step_id: Option<&str>,
) -> Result<OpResult, Error> {
    let name = view_name(step, index, step_id)?;
    let from = from_name(step, index, step_id)?;
    let start = usize_input(step, "start", index, step_id)?;
    let source = lookup(views, from, index, step_id)?;
    Ok(match source.subrange(start) {
        Ok(view) => {
            views.insert(name.to_string(), view);
            Ok(None)
        }
        Err(err) => Err(err),
    })
}

fn run_slice(
    views: &mut Views,
    step: &Value,
    index: usize,
    step_id: Option<&str>,
) -> Result<OpResult, Error> {
    let name = view_name(step, index, step_id)?;
    let from = from_name(step, index, step_id)?;
    let start = usize_input(step, "start", index, step_id)?;
    let len = usize_input(step, "len", index, step_id)?;
    let source = lookup(views, from, index, step_id)?;
    Ok(match source.slice(start, len) {
        Ok(view) => {
            views.insert(name.to_string(), view);
            Ok(None)
        }
        Err(err) => Err(err),
    })
}

fn run_insert(
    views: &mut Views,
    step: &Value,
    index: usize,
    step_id: Option<&str>,
) -> Result<OpResult, Error> {
    let name = view_name(step, index, step_id)?;
    let at = usize_input(step, "index", index, step_id)?;
    let value = required_input(step, "value", index, step_id)?.clone();
    let view = lookup_mut(views, name, index, step_id)?;
    Ok(view.insert(at, value).map(|()| None))
}

fn run_remove(
    views: &mut Views,
    step: &Value,
    index: usize,
    step_id: Option<&str>,
) -> Result<OpResult, Error> {
    let name = view_name(step, index, step_id)?;
    let at = usize_input(step, "index", index, step_id)?;
    let view = lookup_mut(views, name, index, step_id)?;
    Ok(view.remove(at).map(Some))
}

fn run_swap(
    views: &mut Views,
    step: &Value,
    index: usize,
    step_id: Option<&str>,
) -> Result<OpResult, Error> {
    let name = view_name(step, index, step_id)?;
    let a = usize_input(step, "a", index, step_id)?;
    let b = usize_input(step, "b", index, step_id)?;
    let view = lookup(views, name, index, step_id)?;
    Ok(view.swap(a, b).map(|()| None))
}

fn run_reverse(
    views: &mut Views,
    step: &Value,
    index: usize,
    step_id: Option<&str>,
) -> Result<OpResult, Error> {
    let name = view_name(step, index, step_id)?;
    let view = lookup(views, name, index, step_id)?;
    view.reverse();
    Ok(Ok(None))
}

fn run_sort(
    views: &mut Views,
    step: &Value,
    index: usize,
    step_id: Option<&str>,
) -> Result<OpResult, Error> {
    let name = view_name(step, index, step_id)?;
    let view = lookup(views, name, index, step_id)?;
    view.sort_by(json_order);
    Ok(Ok(None))
}

/// Total order over JSON values: rank by type (null, bool, number, string,
/// array, object), then compare within the type. Arrays and objects fall
/// back to their serialized text.
fn json_order(a: &Value, b: &Value) -> Ordering {
    fn rank(value: &Value) -> u8 {
        match value {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Number(_) => 2,
            Value::String(_) => 3,
            Value::Array(_) => 4,
            Value::Object(_) => 5,
        }
    }
    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => {
            let x = x.as_f64().unwrap_or(f64::NAN);
            let y = y.as_f64().unwrap_or(f64::NAN);
            x.total_cmp(&y)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ => rank(a)
            .cmp(&rank(b))
            .then_with(|| a.to_string().cmp(&b.to_string())),
    }
}

fn run_clear(
    views: &mut Views,
    step: &Value,
    index: usize,
    step_id: Option<&str>,
) -> Result<OpResult, Error> {
    let name = view_name(step, index, step_id)?;
    let view = lookup_mut(views, name, index, step_id)?;
    view.clear();
    Ok(Ok(None))
}

fn run_extend(
    views: &mut Views,
    step: &Value,
    index: usize,
    step_id: Option<&str>,
) -> Result<OpResult, Error> {
    let name = view_name(step, index, step_id)?;
    let from = from_name(step, index, step_id)?;
    let source = lookup(views, from, index, step_id)?.clone();
    let view = lookup_mut(views, name, index, step_id)?;
    Ok(view.extend(&source).map(|()| None))
}

fn run_expect_view(
    views: &Views,
    step: &Value,
    index: usize,
    step_id: Option<&str>,
) -> Result<(), Error> {
    let name = view_name(step, index, step_id)?;
    let view = lookup(views, name, index, step_id)?;
    let expect = step
        .get("expect")
        .ok_or_else(|| step_error(index, step_id, "missing expect"))?;

    if let Some(elems) = expect.get("elems") {
        let elems = elems
            .as_array()
            .ok_or_else(|| step_error(index, step_id, "expect.elems must be an array"))?;
        let actual = view.to_vec();
        if &actual != elems {
            return Err(step_error(
                index,
                step_id,
                format!(
                    "view {name} elements mismatch: expected {}, got {}",
                    Value::Array(elems.clone()),
                    Value::Array(actual)
                ),
            ));
        }
    }
    if let Some(len) = expect.get("len").and_then(Value::as_u64) {
        if view.len() as u64 != len {
            return Err(step_error(
                index,
                step_id,
                format!("view {name} length mismatch: expected {len}, got {}", view.len()),
            ));
        }
    }
    if let Some(capacity) = expect.get("capacity").and_then(Value::as_u64) {
        if view.capacity() as u64 != capacity {
            return Err(step_error(
                index,
                step_id,
                format!(
                    "view {name} capacity mismatch: expected {capacity}, got {}",
                    view.capacity()
                ),
            ));
        }
    }
    if let Some(is_empty) = expect.get("is_empty").and_then(Value::as_bool) {
        if view.is_empty() != is_empty {
            return Err(step_error(index, step_id, format!("view {name} emptiness mismatch")));
        }
    }
    if let Some(has_backing) = expect.get("has_backing").and_then(Value::as_bool) {
        if view.has_backing() != has_backing {
            return Err(step_error(index, step_id, format!("view {name} backing mismatch")));
        }
    }
    Ok(())
}

fn run_expect_shared(
    views: &Views,
    step: &Value,
    index: usize,
    step_id: Option<&str>,
) -> Result<(), Error> {
    let pair = input(step)
        .get("views")
        .and_then(Value::as_array)
        .filter(|names| names.len() == 2)
        .ok_or_else(|| step_error(index, step_id, "input.views must name two views"))?;
    let shared = input(step)
        .get("shared")
        .and_then(Value::as_bool)
        .unwrap_or(true);

    let first = pair[0]
        .as_str()
        .ok_or_else(|| step_error(index, step_id, "view names must be strings"))?;
    let second = pair[1]
        .as_str()
        .ok_or_else(|| step_error(index, step_id, "view names must be strings"))?;
    let first_view = lookup(views, first, index, step_id)?;
    let second_view = lookup(views, second, index, step_id)?;

    if first_view.shares_backing(second_view) != shared {
        let expected = if shared { "shared" } else { "decoupled" };
        return Err(step_error(
            index,
            step_id,
            format!("views {first} and {second} should be {expected}"),
        ));
    }
    Ok(())
}

fn validate_outcome(
    expect: Option<&Value>,
    outcome: OpResult,
    index: usize,
    step_id: Option<&str>,
) -> Result<(), Error> {
    let expect_error = expect.and_then(|expect| expect.get("error"));

    let err = match outcome {
        Ok(produced) => {
            if expect_error.is_some() {
                return Err(step_error(
                    index,
                    step_id,
                    "expected error but operation succeeded",
                ));
            }
            if let Some(expected_value) = expect.and_then(|expect| expect.get("value")) {
                let actual = produced.ok_or_else(|| {
                    step_error(index, step_id, "expect.value on an op that produces none")
                })?;
                if &actual != expected_value {
                    return Err(step_error(
                        index,
                        step_id,
                        format!("value mismatch: expected {expected_value}, got {actual}"),
                    ));
                }
            }
            return Ok(());
        }
        Err(err) => err,
    };

    let Some(expect_error) = expect_error else {
        return Err(step_error(index, step_id, format!("unexpected error: {err}")));
    };

    let kind = expect_error
        .get("kind")
        .and_then(Value::as_str)
        .ok_or_else(|| step_error(index, step_id, "expect.error.kind is required"))?;
    if kind != err.kind().label() {
        return Err(step_error(
            index,
            step_id,
            format!("expected error kind {kind}, got {}", err.kind().label()),
        ));
    }

    if let Some(substr) = expect_error.get("message_contains").and_then(Value::as_str) {
        let message = err.message().unwrap_or("");
        if !message.contains(substr) {
            return Err(step_error(
                index,
                step_id,
                format!("expected message to contain '{substr}', got '{message}'"),
            ));
        }
    }

    Ok(())
}

fn input(step: &Value) -> &Value {
    step.get("input").unwrap_or(&Value::Null)
}

fn view_name<'a>(step: &'a Value, index: usize, step_id: Option<&str>) -> Result<&'a str, Error> {
    step.get("view")
        .and_then(Value::as_str)
        .ok_or_else(|| step_error(index, step_id, "missing view"))
}

fn from_name<'a>(step: &'a Value, index: usize, step_id: Option<&str>) -> Result<&'a str, Error> {
    input(step)
        .get("from")
        .and_then(Value::as_str)
        .ok_or_else(|| step_error(index, step_id, "missing input.from"))
}

fn usize_input(
    step: &Value,
    key: &str,
    index: usize,
    step_id: Option<&str>,
) -> Result<usize, Error> {
    input(step)
        .get(key)
        .and_then(Value::as_u64)
        .map(|value| value as usize)
        .ok_or_else(|| {
            step_error(index, step_id, format!("input.{key} must be a non-negative integer"))
        })
}

fn required_input<'a>(
    step: &'a Value,
    key: &str,
    index: usize,
    step_id: Option<&str>,
) -> Result<&'a Value, Error> {
    input(step)
        .get(key)
        .ok_or_else(|| step_error(index, step_id, format!("missing input.{key}")))
}

fn lookup<'a>(
    views: &'a Views,
    name: &str,
    index: usize,
    step_id: Option<&str>,
) -> Result<&'a SeqView<Value>, Error> {
    views
        .get(name)
        .ok_or_else(|| step_error(index, step_id, format!("unknown view: {name}")))
}

fn lookup_mut<'a>(
    views: &'a mut Views,
    name: &str,
    index: usize,
    step_id: Option<&str>,
) -> Result<&'a mut SeqView<Value>, Error> {
    views
        .get_mut(name)
        .ok_or_else(|| step_error(index, step_id, format!("unknown view: {name}")))
}

fn step_error(index: usize, step_id: Option<&str>, message: impl Into<String>) -> Error {
    let mut prefix = format!("step {index}");
    if let Some(id) = step_id {
        prefix.push_str(&format!(" ({id})"));
    }
    Error::new(ErrorKind::Usage).with_message(format!("{prefix}: {}", message.into()))
}

#[cfg(test)]
mod tests {
    use super::{run_manifest, RunSummary};
    use crate::api::ErrorKind;
    use serde_json::json;

    #[test]
    fn aliasing_walkthrough_manifest_passes() {
        let manifest = json!({
            "script_version": 0,
            "steps": [
                {"id": "alloc", "op": "allocate", "view": "v", "input": {"len": 3}},
                {"op": "set", "view": "v", "input": {"index": 0, "value": "a"}},
                {"op": "set", "view": "v", "input": {"index": 1, "value": "b"}},
                {"op": "set", "view": "v", "input": {"index": 2, "value": "c"}},
                {"op": "subrange", "view": "l", "input": {"from": "v", "start": 2}},
                {"op": "expect_view", "view": "l", "expect": {"elems": ["c"], "len": 1, "capacity": 1}},
                {"op": "set", "view": "l", "input": {"index": 0, "value": "abc"}},
                {"op": "expect_view", "view": "v", "expect": {"elems": ["a", "b", "abc"]}},
                {"op": "expect_shared", "input": {"views": ["v", "l"]}},
                {"op": "append", "view": "l", "input": {"value": "d"}},
                {"op": "expect_shared", "input": {"views": ["v", "l"], "shared": false}},
                {"op": "expect_view", "view": "v", "expect": {"elems": ["a", "b", "abc"]}}
            ]
        });
        let summary = run_manifest(&manifest).expect("manifest passes");
        assert_eq!(summary, RunSummary { ok: true, steps: 12 });
        assert_eq!(json!(summary), json!({"ok": true, "steps": 12}));
    }

    #[test]
    fn expected_errors_are_matched_by_kind() {
        let manifest = json!({
            "script_version": 0,
            "steps": [
                {"op": "allocate", "view": "v", "input": {"len": 2}},
                {"op": "get", "view": "v", "input": {"index": 5},
                 "expect": {"error": {"kind": "IndexOutOfRange", "message_contains": "out of range"}}},
                {"op": "subrange", "view": "w", "input": {"from": "v", "start": 3},
                 "expect": {"error": {"kind": "IndexOutOfRange"}}}
            ]
        });
        run_manifest(&manifest).expect("expected errors pass");
    }

    #[test]
    fn unexpected_errors_fail_the_run() {
        let manifest = json!({
            "script_version": 0,
            "steps": [
                {"op": "allocate", "view": "v", "input": {"len": 1}},
                {"op": "set", "view": "v", "input": {"index": 4, "value": 0}}
            ]
        });
        let err = run_manifest(&manifest).expect_err("should fail");
        assert_eq!(err.kind(), ErrorKind::Usage);
        assert!(err.message().unwrap_or("").contains("step 1"));
    }

    #[test]
    fn produced_values_are_checked() {
        let manifest = json!({
            "script_version": 0,
            "steps": [
                {"op": "make", "view": "v", "input": {"elems": [1, 2, 3]}},
                {"op": "get", "view": "v", "input": {"index": 1}, "expect": {"value": 2}},
                {"op": "remove", "view": "v", "input": {"index": 0}, "expect": {"value": 1}},
                {"op": "expect_view", "view": "v", "expect": {"elems": [2, 3], "len": 2}}
            ]
        });
        run_manifest(&manifest).expect("values match");
    }

    #[test]
    fn sort_reorders_elements_for_every_alias() {
        let manifest = json!({
            "script_version": 0,
            "steps": [
                {"op": "make", "view": "v", "input": {"elems": [3, 1, "b", 2, "a", null]}},
                {"op": "subrange", "view": "w", "input": {"from": "v", "start": 1}},
                {"op": "sort", "view": "v"},
                {"op": "expect_view", "view": "v", "expect": {"elems": [null, 1, 2, 3, "a", "b"]}},
                {"op": "expect_view", "view": "w", "expect": {"elems": [1, 2, 3, "a", "b"]}},
                {"op": "expect_shared", "input": {"views": ["v", "w"]}}
            ]
        });
        run_manifest(&manifest).expect("sorted");
    }

    #[test]
    fn unknown_ops_and_versions_are_usage_errors() {
        let manifest = json!({"script_version": 7, "steps": []});
        assert_eq!(
            run_manifest(&manifest).expect_err("bad version").kind(),
            ErrorKind::Usage
        );

        let manifest = json!({
            "script_version": 0,
            "steps": [{"op": "frobnicate", "view": "v"}]
        });
        let err = run_manifest(&manifest).expect_err("unknown op");
        assert_eq!(err.kind(), ErrorKind::Usage);
        assert!(err.message().unwrap_or("").contains("unknown op"));
    }
}
