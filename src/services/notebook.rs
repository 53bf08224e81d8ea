//! Decoding of Jupyter notebook documents (nbformat 4).
//!
//! Reading normalizes the document the way notebook frontends expect it:
//! multi-line string arrays are joined and transient metadata is dropped.
//! Structural problems do not fail the read; they are collected and embedded
//! in the returned document under [`VALIDATION_ERRORS_KEY`].

use serde_json::{Map, Value};
use thiserror::Error;

pub const NBFORMAT_MAJOR: u64 = 4;
pub const VALIDATION_ERRORS_KEY: &str = "validation_errors";

const TRANSIENT_NOTEBOOK_METADATA: [&str; 3] =
    ["signature", "orig_nbformat", "orig_nbformat_minor"];
const CELL_TYPES: [&str; 3] = ["code", "markdown", "raw"];

#[derive(Debug, Error)]
pub enum NotebookError {
    #[error("Notebook does not appear to be JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Notebook must be a JSON object")]
    NotAnObject,
}

/// Parse and normalize a notebook, capturing validation errors.
pub fn read_notebook(content: &[u8]) -> Result<Value, NotebookError> {
    let mut notebook: Value = serde_json::from_slice(content)?;
    let Some(document) = notebook.as_object_mut() else {
        return Err(NotebookError::NotAnObject);
    };

    // A stale capture from an earlier read is recomputed.
    document.remove(VALIDATION_ERRORS_KEY);
    rejoin_lines(document);
    strip_transient(document);

    let errors = validate(document);
    if !errors.is_empty() {
        document.insert(
            VALIDATION_ERRORS_KEY.to_string(),
            Value::Array(errors.into_iter().map(Value::String).collect()),
        );
    }
    Ok(notebook)
}

fn is_json_mime(mime: &str) -> bool {
    mime == "application/json" || (mime.starts_with("application/") && mime.ends_with("+json"))
}

/// Join `["a\n", "b"]` into `"a\nb"`; leaves anything else untouched.
fn join_lines(value: &mut Value) {
    if let Value::Array(parts) = value {
        if parts.iter().all(Value::is_string) {
            let joined: String = parts.iter().filter_map(Value::as_str).collect();
            *value = Value::String(joined);
        }
    }
}

fn join_mime_bundle(bundle: &mut Value) {
    if let Some(bundle) = bundle.as_object_mut() {
        for (mime, data) in bundle.iter_mut() {
            if !is_json_mime(mime) {
                join_lines(data);
            }
        }
    }
}

fn rejoin_lines(document: &mut Map<String, Value>) {
    let Some(cells) = document.get_mut("cells").and_then(Value::as_array_mut) else {
        return;
    };
    for cell in cells.iter_mut().filter_map(Value::as_object_mut) {
        if let Some(source) = cell.get_mut("source") {
            join_lines(source);
        }
        if let Some(attachments) = cell.get_mut("attachments").and_then(Value::as_object_mut) {
            for bundle in attachments.values_mut() {
                join_mime_bundle(bundle);
            }
        }
        if cell.get("cell_type").and_then(Value::as_str) != Some("code") {
            continue;
        }
        let Some(outputs) = cell.get_mut("outputs").and_then(Value::as_array_mut) else {
            continue;
        };
        for output in outputs.iter_mut().filter_map(Value::as_object_mut) {
            match output.get("output_type").and_then(Value::as_str) {
                Some("execute_result") | Some("display_data") => {
                    if let Some(data) = output.get_mut("data") {
                        join_mime_bundle(data);
                    }
                }
                Some("stream") => {
                    if let Some(text) = output.get_mut("text") {
                        join_lines(text);
                    }
                }
                _ => {}
            }
        }
    }
}

fn strip_transient(document: &mut Map<String, Value>) {
    if let Some(metadata) = document.get_mut("metadata").and_then(Value::as_object_mut) {
        for key in TRANSIENT_NOTEBOOK_METADATA {
            metadata.remove(key);
        }
    }
    if let Some(cells) = document.get_mut("cells").and_then(Value::as_array_mut) {
        for cell in cells.iter_mut().filter_map(Value::as_object_mut) {
            if let Some(metadata) = cell.get_mut("metadata").and_then(Value::as_object_mut) {
                metadata.remove("trusted");
            }
        }
    }
}

fn require<'a>(
    object: &'a Map<String, Value>,
    key: &str,
    at: &str,
    errors: &mut Vec<String>,
) -> Option<&'a Value> {
    let value = object.get(key);
    if value.is_none() {
        errors.push(format!("{}: '{}' is a required property", at, key));
    }
    value
}

fn expect_kind(
    value: Option<&Value>,
    ok: bool,
    at: &str,
    key: &str,
    kind: &str,
    errors: &mut Vec<String>,
) {
    if value.is_some() && !ok {
        errors.push(format!("{}: '{}' must be {}", at, key, kind));
    }
}

fn validate(document: &Map<String, Value>) -> Vec<String> {
    let mut errors = Vec::new();

    if let Some(version) = require(document, "nbformat", "notebook", &mut errors) {
        match version.as_u64() {
            Some(NBFORMAT_MAJOR) => {}
            Some(other) => errors.push(format!(
                "notebook: unsupported nbformat {}, expected {}",
                other, NBFORMAT_MAJOR
            )),
            None => errors.push("notebook: 'nbformat' must be an integer".into()),
        }
    }
    let minor = require(document, "nbformat_minor", "notebook", &mut errors);
    expect_kind(
        minor,
        minor.is_some_and(Value::is_u64),
        "notebook",
        "nbformat_minor",
        "an integer",
        &mut errors,
    );
    let metadata = require(document, "metadata", "notebook", &mut errors);
    expect_kind(
        metadata,
        metadata.is_some_and(Value::is_object),
        "notebook",
        "metadata",
        "an object",
        &mut errors,
    );

    match require(document, "cells", "notebook", &mut errors) {
        Some(Value::Array(cells)) => {
            for (index, cell) in cells.iter().enumerate() {
                validate_cell(cell, &format!("cells[{}]", index), &mut errors);
            }
        }
        Some(_) => errors.push("notebook: 'cells' must be an array".into()),
        None => {}
    }
    errors
}

fn validate_cell(cell: &Value, at: &str, errors: &mut Vec<String>) {
    let Some(cell) = cell.as_object() else {
        errors.push(format!("{}: cell must be an object", at));
        return;
    };

    let cell_type = require(cell, "cell_type", at, errors).and_then(Value::as_str);
    if let Some(cell_type) = cell_type {
        if !CELL_TYPES.contains(&cell_type) {
            errors.push(format!("{}: unknown cell_type '{}'", at, cell_type));
        }
    }
    let source = require(cell, "source", at, errors);
    expect_kind(
        source,
        source.is_some_and(Value::is_string),
        at,
        "source",
        "a string",
        errors,
    );
    let metadata = require(cell, "metadata", at, errors);
    expect_kind(
        metadata,
        metadata.is_some_and(Value::is_object),
        at,
        "metadata",
        "an object",
        errors,
    );

    if cell_type == Some("code") {
        let count = require(cell, "execution_count", at, errors);
        expect_kind(
            count,
            count.is_some_and(|c| c.is_null() || c.is_u64()),
            at,
            "execution_count",
            "an integer or null",
            errors,
        );
        match require(cell, "outputs", at, errors) {
            Some(Value::Array(outputs)) => {
                for (index, output) in outputs.iter().enumerate() {
                    validate_output(output, &format!("{}.outputs[{}]", at, index), errors);
                }
            }
            Some(_) => errors.push(format!("{}: 'outputs' must be an array", at)),
            None => {}
        }
    } else {
        for key in ["outputs", "execution_count"] {
            if cell.contains_key(key) {
                errors.push(format!("{}: unexpected property '{}'", at, key));
            }
        }
    }
}

fn validate_output(output: &Value, at: &str, errors: &mut Vec<String>) {
    let Some(output) = output.as_object() else {
        errors.push(format!("{}: output must be an object", at));
        return;
    };
    let output_type = require(output, "output_type", at, errors).and_then(Value::as_str);
    let required: &[&str] = match output_type {
        Some("stream") => &["name", "text"],
        Some("display_data") => &["data", "metadata"],
        Some("execute_result") => &["data", "metadata", "execution_count"],
        Some("error") => &["ename", "evalue", "traceback"],
        Some(other) => {
            errors.push(format!("{}: unknown output_type '{}'", at, other));
            &[]
        }
        None => &[],
    };
    for key in required {
        require(output, key, at, errors);
    }
}
