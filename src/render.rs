//! Workflow rendering with code-include support.
//!
//! Code-bearing node fields may hold an include directive instead of inline
//! source. Rendering resolves each directive against a snapshot, verifies
//! the optional content digest, and substitutes the file text into a copy of
//! the document. Detection is separated from policy: every examined field
//! yields a report, and the caller decides through `RenderOptions` which
//! report kinds are fatal. Resolution is a single-level text substitution;
//! included files are never scanned for further directives.

use crate::error::{Error, Result};
use crate::snapshot::Snapshot;
use regex::Regex;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::sync::OnceLock;

/// Directive format: `@@n8n-gitops:include <path> [sha256=<64 hex chars>]`.
const INCLUDE_DIRECTIVE_PATTERN: &str =
    r"^@@n8n-gitops:include\s+([^\s]+)(?:\s+sha256=([a-fA-F0-9]{64}))?\s*$";

/// Code field names to check, in order. Each denotes a source language the
/// n8n node kinds accept.
pub const CODE_FIELD_NAMES: [&str; 4] = ["pythonCode", "jsCode", "code", "functionCode"];

/// Includes must live under this subtree of the n8n root.
const SCRIPTS_PREFIX: &str = "scripts/";

fn directive_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(INCLUDE_DIRECTIVE_PATTERN).expect("directive regex"))
}

/// Caller-selected enforcement policy for rendering.
#[derive(Debug, Clone, Copy, Default)]
pub struct RenderOptions {
    pub enforce_no_inline_code: bool,
    pub enforce_checksum: bool,
    pub require_checksum: bool,
}

/// Outcome classification for one examined code field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderStatus {
    Included,
    InlineCode,
    ChecksumMismatch,
    MissingFile,
}

/// Report for a single examined code field.
#[derive(Debug, Clone)]
pub struct RenderReport {
    pub node_name: String,
    pub node_id: String,
    pub field: &'static str,
    pub include_path: Option<String>,
    pub sha256_expected: Option<String>,
    pub sha256_actual: Option<String>,
    pub status: RenderStatus,
}

impl RenderReport {
    fn new(node_name: &str, node_id: &str, field: &'static str, status: RenderStatus) -> Self {
        Self {
            node_name: node_name.to_string(),
            node_id: node_id.to_string(),
            field,
            include_path: None,
            sha256_expected: None,
            sha256_actual: None,
            status,
        }
    }
}

/// A parsed include directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncludeDirective {
    pub path: String,
    pub sha256: Option<String>,
}

/// SHA-256 of raw bytes as lowercase hex.
pub fn compute_sha256(content: &[u8]) -> String {
    hex::encode(Sha256::digest(content))
}

/// Parse an include directive, or `None` for anything else (inline code).
pub fn parse_include_directive(text: &str) -> Option<IncludeDirective> {
    let captures = directive_regex().captures(text.trim())?;
    Some(IncludeDirective {
        path: captures[1].to_string(),
        sha256: captures.get(2).map(|digest| digest.as_str().to_string()),
    })
}

/// Serialize a directive back to its wire form.
pub fn format_include_directive(path: &str, sha256: Option<&str>) -> String {
    match sha256 {
        Some(digest) => format!("@@n8n-gitops:include {path} sha256={digest}"),
        None => format!("@@n8n-gitops:include {path}"),
    }
}

/// Reject absolute paths, traversal, and anything outside `scripts/`.
pub fn validate_include_path(path: &str) -> Result<()> {
    if path.starts_with('/') {
        return Err(Error::Render(format!(
            "include path cannot be absolute: {path}"
        )));
    }
    if path.split('/').any(|segment| segment == "..") {
        return Err(Error::Render(format!(
            "include path cannot contain '..': {path}"
        )));
    }
    if !path.starts_with(SCRIPTS_PREFIX) {
        return Err(Error::Render(format!(
            "include path must be under {SCRIPTS_PREFIX}: {path}"
        )));
    }
    Ok(())
}

/// Render a workflow document by resolving include directives.
///
/// Operates on an independent copy; the input is never mutated. Returns the
/// rendered document and one report per examined code field, in node order.
pub fn render_workflow_json(
    workflow: &Value,
    snapshot: &dyn Snapshot,
    n8n_root: &str,
    options: RenderOptions,
) -> Result<(Value, Vec<RenderReport>)> {
    let mut rendered = workflow.clone();
    let mut reports = Vec::new();

    let Some(nodes) = rendered.get_mut("nodes").and_then(Value::as_array_mut) else {
        return Ok((rendered, reports));
    };

    for node in nodes {
        let node_name = node
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or("<unnamed>")
            .to_string();
        let node_id = node
            .get("id")
            .and_then(Value::as_str)
            .unwrap_or("<no-id>")
            .to_string();
        let Some(parameters) = node.get_mut("parameters").and_then(Value::as_object_mut) else {
            continue;
        };

        for field in CODE_FIELD_NAMES {
            let Some(field_value) = parameters.get(field).and_then(Value::as_str) else {
                continue;
            };
            if field_value.is_empty() {
                continue;
            }

            let Some(directive) = parse_include_directive(field_value) else {
                if options.enforce_no_inline_code {
                    return Err(Error::Render(format!(
                        "inline code found in node '{node_name}' field '{field}' \
                         (inline code is not allowed)"
                    )));
                }
                reports.push(RenderReport::new(
                    &node_name,
                    &node_id,
                    field,
                    RenderStatus::InlineCode,
                ));
                continue;
            };

            validate_include_path(&directive.path)?;
            let full_path = format!("{n8n_root}/{}", directive.path);

            if !snapshot.exists(&full_path) {
                let mut report =
                    RenderReport::new(&node_name, &node_id, field, RenderStatus::MissingFile);
                report.include_path = Some(directive.path.clone());
                report.sha256_expected = directive.sha256.clone();
                reports.push(report);
                continue;
            }

            let file_bytes = snapshot.read_bytes(&full_path).map_err(|err| {
                Error::Render(format!(
                    "failed to read include file {full_path} \
                     (referenced in node '{node_name}' field '{field}'): {err}"
                ))
            })?;
            let file_content = String::from_utf8(file_bytes.clone()).map_err(|err| {
                Error::Render(format!("include file {full_path} is not valid UTF-8: {err}"))
            })?;
            let actual_sha256 = compute_sha256(&file_bytes);

            match &directive.sha256 {
                Some(expected) if !expected.eq_ignore_ascii_case(&actual_sha256) => {
                    if options.enforce_checksum {
                        return Err(Error::Render(format!(
                            "checksum mismatch for {} in node '{node_name}': \
                             expected {expected}, got {actual_sha256}",
                            directive.path
                        )));
                    }
                    let mut report = RenderReport::new(
                        &node_name,
                        &node_id,
                        field,
                        RenderStatus::ChecksumMismatch,
                    );
                    report.include_path = Some(directive.path.clone());
                    report.sha256_expected = Some(expected.clone());
                    report.sha256_actual = Some(actual_sha256.clone());
                    reports.push(report);
                }
                None if options.require_checksum => {
                    return Err(Error::Render(format!(
                        "checksum required but not provided for {} in node '{node_name}'",
                        directive.path
                    )));
                }
                _ => {}
            }

            let mut report =
                RenderReport::new(&node_name, &node_id, field, RenderStatus::Included);
            report.include_path = Some(directive.path.clone());
            report.sha256_expected = directive.sha256.clone();
            report.sha256_actual = Some(actual_sha256);
            reports.push(report);

            parameters.insert(field.to_string(), Value::String(file_content));
        }
    }

    Ok((rendered, reports))
}
