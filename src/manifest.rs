//! Manifest parsing and validation.
//!
//! The manifest is the declarative source of truth: a YAML list of desired
//! workflows and tags. It is validated completely before any network
//! activity so a defective declaration can never half-deploy.

use crate::error::{Error, Result};
use crate::snapshot::Snapshot;
use serde::Deserialize;
use std::collections::BTreeSet;

/// One desired workflow, as declared in the manifest.
#[derive(Debug, Clone, Deserialize)]
pub struct WorkflowSpec {
    pub name: String,
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub requires_credentials: Vec<String>,
    #[serde(default)]
    pub requires_env: Vec<String>,
}

impl WorkflowSpec {
    /// Backing file path, derived deterministically from the name.
    pub fn file(&self) -> String {
        format!("workflows/{}.json", sanitize_name(&self.name))
    }
}

/// Parsed manifest: workflow specs plus the declared tag set.
#[derive(Debug, Clone)]
pub struct Manifest {
    pub workflows: Vec<WorkflowSpec>,
    pub externalize_code: bool,
    pub tags: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RawManifest {
    #[serde(default = "default_true")]
    externalize_code: bool,
    #[serde(default)]
    tags: Vec<String>,
    workflows: Vec<WorkflowSpec>,
}

fn default_true() -> bool {
    true
}

pub const MANIFEST_REL_PATH: &str = "manifests/workflows.yaml";

/// Load and validate the manifest from a snapshot.
pub fn load_manifest(snapshot: &dyn Snapshot, n8n_root: &str) -> Result<Manifest> {
    let manifest_path = format!("{n8n_root}/{MANIFEST_REL_PATH}");
    let content = snapshot.read_text(&manifest_path).map_err(|err| {
        Error::Manifest(format!("failed to read manifest at {manifest_path}: {err}"))
    })?;
    parse_manifest(&content)
}

/// Parse and validate manifest YAML.
pub fn parse_manifest(content: &str) -> Result<Manifest> {
    let raw: RawManifest = serde_yaml::from_str(content)
        .map_err(|err| Error::Manifest(format!("failed to parse manifest YAML: {err}")))?;

    let mut seen_names = BTreeSet::new();
    for (idx, spec) in raw.workflows.iter().enumerate() {
        if spec.name.is_empty() {
            return Err(Error::Manifest(format!(
                "workflow entry {idx}: 'name' must be a non-empty string"
            )));
        }
        if !seen_names.insert(spec.name.as_str()) {
            return Err(Error::Manifest(format!(
                "duplicate workflow name '{}' found in manifest",
                spec.name
            )));
        }
    }

    let declared_tags: BTreeSet<&str> = raw.tags.iter().map(String::as_str).collect();
    for spec in &raw.workflows {
        for tag_name in &spec.tags {
            if !declared_tags.contains(tag_name.as_str()) {
                return Err(Error::Manifest(format!(
                    "workflow '{}' references undefined tag '{tag_name}'; declared tags: {:?}",
                    spec.name, raw.tags
                )));
            }
        }
    }

    Ok(Manifest {
        workflows: raw.workflows,
        externalize_code: raw.externalize_code,
        tags: raw.tags,
    })
}

/// Sanitize a workflow name for use as a file name.
pub fn sanitize_name(name: &str) -> String {
    let mut safe = String::with_capacity(name.len());
    let mut last_was_underscore = false;
    for ch in name.chars() {
        if ch.is_alphanumeric() || ch == '-' || ch == '.' {
            safe.push(ch);
            last_was_underscore = false;
        } else if !last_was_underscore {
            safe.push('_');
            last_was_underscore = true;
        }
    }
    let trimmed = safe.trim_matches('_');
    if trimmed.is_empty() {
        "workflow".to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::testing::MemorySnapshot;

    const VALID: &str = r#"
externalize_code: true
tags:
  - production
workflows:
  - name: My Flow
    active: true
    tags: [production]
    requires_credentials: [slackApi]
    requires_env: [SLACK_CHANNEL]
  - name: Other
"#;

    #[test]
    fn load_valid_manifest() {
        let snapshot = MemorySnapshot::new().with_file("n8n/manifests/workflows.yaml", VALID);
        let manifest = load_manifest(&snapshot, "n8n").unwrap();
        assert_eq!(manifest.workflows.len(), 2);
        assert!(manifest.externalize_code);
        assert_eq!(manifest.tags, vec!["production"]);

        let spec = &manifest.workflows[0];
        assert_eq!(spec.name, "My Flow");
        assert!(spec.active);
        assert_eq!(spec.tags, vec!["production"]);
        assert_eq!(spec.file(), "workflows/My_Flow.json");

        let other = &manifest.workflows[1];
        assert!(!other.active);
        assert!(other.tags.is_empty());
    }

    #[test]
    fn missing_workflows_key_fails() {
        let err = parse_manifest("tags: []\n").unwrap_err();
        assert!(matches!(err, Error::Manifest(_)));
    }

    #[test]
    fn duplicate_names_fail() {
        let err = parse_manifest("workflows:\n  - name: Same\n  - name: Same\n").unwrap_err();
        assert!(err.to_string().contains("duplicate workflow name"));
    }

    #[test]
    fn undefined_tag_reference_fails() {
        let err = parse_manifest("tags: [production]\nworkflows:\n  - name: A\n    tags: [staging]\n")
            .unwrap_err();
        assert!(err.to_string().contains("undefined tag 'staging'"));
    }

    #[test]
    fn empty_name_fails() {
        let err = parse_manifest("workflows:\n  - name: \"\"\n").unwrap_err();
        assert!(err.to_string().contains("non-empty"));
    }

    #[test]
    fn missing_manifest_file_is_manifest_error() {
        let snapshot = MemorySnapshot::new();
        let err = load_manifest(&snapshot, "n8n").unwrap_err();
        assert!(matches!(err, Error::Manifest(_)));
    }

    #[test]
    fn sanitize_name_rules() {
        assert_eq!(sanitize_name("My Flow"), "My_Flow");
        assert_eq!(sanitize_name("a//b??c"), "a_b_c");
        assert_eq!(sanitize_name("__x__"), "x");
        assert_eq!(sanitize_name("!!!"), "workflow");
        assert_eq!(sanitize_name("keep-me.v2"), "keep-me.v2");
    }
}
