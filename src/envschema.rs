//! Environment schema validation.
//!
//! Projects may declare the environment variables their workflows expect in
//! `manifests/env.schema.json`. The checker runs against an explicit
//! variable map supplied by the caller, never the ambient process state.

use crate::error::{Error, Result};
use crate::snapshot::Snapshot;
use regex::Regex;
use serde_json::Value;
use std::collections::BTreeMap;

const SCHEMA_REL_PATH: &str = "manifests/env.schema.json";

/// Validate an environment map against the project's schema, if present.
///
/// Returns issue strings for missing required variables and for values that
/// violate their declared pattern or type. An absent schema file means no
/// issues; a malformed schema is an error.
pub fn validate_env_schema(
    snapshot: &dyn Snapshot,
    n8n_root: &str,
    env_vars: &BTreeMap<String, String>,
) -> Result<Vec<String>> {
    let schema_path = format!("{n8n_root}/{SCHEMA_REL_PATH}");
    if !snapshot.exists(&schema_path) {
        return Ok(Vec::new());
    }

    let content = snapshot.read_text(&schema_path).map_err(|err| {
        Error::Validation(format!("failed to load env schema from {schema_path}: {err}"))
    })?;
    let schema: Value = serde_json::from_str(&content).map_err(|err| {
        Error::Validation(format!("failed to parse env schema {schema_path}: {err}"))
    })?;
    let Some(schema) = schema.as_object() else {
        return Err(Error::Validation(
            "env.schema.json must be a JSON object".to_string(),
        ));
    };

    let mut issues = Vec::new();

    if let Some(required) = schema.get("required") {
        let Some(required) = required.as_array() else {
            return Err(Error::Validation(
                "'required' in env.schema.json must be a list".to_string(),
            ));
        };
        for entry in required {
            let Some(var_name) = entry.as_str() else {
                return Err(Error::Validation(format!(
                    "required variable name must be a string: {entry}"
                )));
            };
            match env_vars.get(var_name) {
                Some(value) if !value.is_empty() => {}
                _ => issues.push(format!(
                    "required environment variable '{var_name}' is not set"
                )),
            }
        }
    }

    if let Some(vars) = schema.get("vars") {
        let Some(vars) = vars.as_object() else {
            return Err(Error::Validation(
                "'vars' in env.schema.json must be an object".to_string(),
            ));
        };
        for (var_name, var_spec) in vars {
            let Some(var_spec) = var_spec.as_object() else {
                continue;
            };
            let Some(value) = env_vars.get(var_name) else {
                continue;
            };
            if let Some(pattern) = var_spec.get("pattern").and_then(Value::as_str) {
                issues.extend(check_pattern(var_name, value, pattern)?);
            }
            if let Some(var_type) = var_spec.get("type").and_then(Value::as_str) {
                issues.extend(check_type(var_name, value, var_type));
            }
        }
    }

    Ok(issues)
}

/// Anchored-at-start match, like the original schema semantics.
fn check_pattern(var_name: &str, value: &str, pattern: &str) -> Result<Option<String>> {
    let regex = Regex::new(&format!("^(?:{pattern})")).map_err(|err| {
        Error::Validation(format!(
            "invalid pattern for environment variable '{var_name}': {err}"
        ))
    })?;
    if regex.is_match(value) {
        Ok(None)
    } else {
        Ok(Some(format!(
            "environment variable '{var_name}' does not match pattern: {pattern}"
        )))
    }
}

fn check_type(var_name: &str, value: &str, var_type: &str) -> Option<String> {
    match var_type {
        "integer" if value.parse::<i64>().is_err() => Some(format!(
            "environment variable '{var_name}' must be an integer"
        )),
        "boolean"
            if !matches!(
                value.to_lowercase().as_str(),
                "true" | "false" | "1" | "0" | "yes" | "no"
            ) =>
        {
            Some(format!(
                "environment variable '{var_name}' must be a boolean (true/false, 1/0, yes/no)"
            ))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::testing::MemorySnapshot;

    fn env(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect()
    }

    fn snapshot_with_schema(schema: &str) -> MemorySnapshot {
        MemorySnapshot::new().with_file("n8n/manifests/env.schema.json", schema)
    }

    #[test]
    fn absent_schema_means_no_issues() {
        let snapshot = MemorySnapshot::new();
        let issues = validate_env_schema(&snapshot, "n8n", &env(&[])).unwrap();
        assert!(issues.is_empty());
    }

    #[test]
    fn missing_required_variable_is_reported() {
        let snapshot = snapshot_with_schema(r#"{"required": ["SLACK_TOKEN"]}"#);
        let issues = validate_env_schema(&snapshot, "n8n", &env(&[])).unwrap();
        assert_eq!(issues.len(), 1);
        assert!(issues[0].contains("SLACK_TOKEN"));

        let issues =
            validate_env_schema(&snapshot, "n8n", &env(&[("SLACK_TOKEN", "tok")])).unwrap();
        assert!(issues.is_empty());
    }

    #[test]
    fn pattern_and_type_violations_are_reported() {
        let snapshot = snapshot_with_schema(
            r#"{"vars": {"PORT": {"type": "integer"}, "URL": {"pattern": "https?://"}}}"#,
        );
        let issues = validate_env_schema(
            &snapshot,
            "n8n",
            &env(&[("PORT", "abc"), ("URL", "ftp://x")]),
        )
        .unwrap();
        assert_eq!(issues.len(), 2);

        let issues = validate_env_schema(
            &snapshot,
            "n8n",
            &env(&[("PORT", "8080"), ("URL", "https://x")]),
        )
        .unwrap();
        assert!(issues.is_empty());
    }

    #[test]
    fn boolean_type_accepts_common_spellings() {
        let snapshot = snapshot_with_schema(r#"{"vars": {"FLAG": {"type": "boolean"}}}"#);
        for ok in ["true", "False", "1", "0", "YES", "no"] {
            let issues = validate_env_schema(&snapshot, "n8n", &env(&[("FLAG", ok)])).unwrap();
            assert!(issues.is_empty(), "expected '{ok}' to be accepted");
        }
        let issues = validate_env_schema(&snapshot, "n8n", &env(&[("FLAG", "maybe")])).unwrap();
        assert_eq!(issues.len(), 1);
    }

    #[test]
    fn malformed_schema_is_validation_error() {
        let snapshot = snapshot_with_schema(r#"["not", "an", "object"]"#);
        let err = validate_env_schema(&snapshot, "n8n", &env(&[])).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }
}
