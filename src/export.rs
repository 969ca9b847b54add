//! Export command: pull remote workflows into the git-tracked layout.
//!
//! Exported documents are stripped of volatile fields and written in the
//! normalized JSON form so diffs stay reviewable. When code externalization
//! is on, inline code fields are moved out to `scripts/` and replaced with
//! checksum-carrying include directives.

use crate::cli::ExportArgs;
use crate::client::{resource_id, N8nApi, N8nClient};
use crate::config;
use crate::error::Error;
use crate::manifest::{self, sanitize_name, Manifest};
use crate::normalize::{normalize_json, strip_volatile_fields};
use crate::render::{
    compute_sha256, format_include_directive, parse_include_directive, CODE_FIELD_NAMES,
};
use crate::snapshot::WorkingTreeSnapshot;
use anyhow::{Context, Result};
use serde_json::{json, Value};
use std::collections::BTreeSet;
use std::path::Path;

const N8N_ROOT: &str = "n8n";

/// Fields stripped from exported documents before writing.
const VOLATILE_FIELDS: [&str; 3] = ["id", "createdAt", "updatedAt"];

pub fn run_export(args: &ExportArgs) -> Result<()> {
    let repo_root = args
        .repo_root
        .canonicalize()
        .with_context(|| format!("resolve repo root {}", args.repo_root.display()))?;
    let n8n_root = repo_root.join(N8N_ROOT);
    let workflows_dir = n8n_root.join("workflows");
    let manifests_dir = n8n_root.join("manifests");
    std::fs::create_dir_all(&workflows_dir).context("create workflows directory")?;
    std::fs::create_dir_all(&manifests_dir).context("create manifests directory")?;

    let auth = config::load_auth(&repo_root, args.api_url.as_deref(), args.api_key.as_deref())?;
    println!("exporting workflows from {}", auth.api_url);
    println!("target directory: {}", workflows_dir.display());
    println!();

    // An existing manifest drives --from-manifest selection and the
    // externalize_code default; its absence only matters for --from-manifest.
    let snapshot = WorkingTreeSnapshot::new(repo_root.clone());
    let existing_manifest = manifest::load_manifest(&snapshot, N8N_ROOT).ok();
    let externalize = args.externalize_code
        || existing_manifest
            .as_ref()
            .map(|manifest| manifest.externalize_code)
            .unwrap_or(true);

    let client = N8nClient::new(&auth.api_url, &auth.api_key);

    println!("fetching workflows...");
    let remote_workflows = client.list_workflows().context("fetch remote workflows")?;
    println!("found {} remote workflow(s)", remote_workflows.len());

    let selected = select_workflows(args, &remote_workflows, existing_manifest.as_ref())?;
    if selected.is_empty() {
        println!("no workflows selected for export");
        return Ok(());
    }
    println!();
    println!("exporting {} workflow(s)...", selected.len());

    let mut exported: Vec<ExportedSpec> = Vec::new();
    for summary in &selected {
        let (Some(workflow_id), Some(name)) = (
            resource_id(summary),
            summary.get("name").and_then(Value::as_str),
        ) else {
            eprintln!("warning: skipping workflow with missing id or name");
            continue;
        };
        println!("  exporting: {name}");

        let mut workflow = match client.get_workflow(&workflow_id) {
            Ok(workflow) => workflow,
            Err(err) => {
                eprintln!("warning: failed to fetch workflow '{name}': {err}");
                continue;
            }
        };

        if externalize {
            let count = externalize_code_fields(&mut workflow, name, &n8n_root)?;
            if count > 0 {
                println!("    externalized {count} code field(s)");
            }
        }

        let active = workflow.get("active").and_then(Value::as_bool).unwrap_or(false);
        let tag_names = workflow_tag_names(&workflow);

        let cleaned = strip_volatile_fields(&workflow, &VOLATILE_FIELDS);
        let normalized = normalize_json(&cleaned);

        let filename = format!("{}.json", sanitize_name(name));
        let filepath = workflows_dir.join(&filename);
        std::fs::write(&filepath, normalized)
            .with_context(|| format!("write {}", filepath.display()))?;
        println!("    saved to: n8n/workflows/{filename}");

        exported.push(ExportedSpec {
            name: name.to_string(),
            active,
            tags: tag_names,
        });
    }

    if args.all && !exported.is_empty() {
        println!();
        println!("updating manifest...");
        let manifest_path = manifests_dir.join("workflows.yaml");
        write_merged_manifest(&manifest_path, existing_manifest.as_ref(), &exported)?;
        println!("  updated manifest: n8n/manifests/workflows.yaml");
    }

    println!();
    println!("export complete: {} workflow(s)", exported.len());
    println!("next: review the exported files and commit the n8n/ directory");
    Ok(())
}

struct ExportedSpec {
    name: String,
    active: bool,
    tags: Vec<String>,
}

fn select_workflows(
    args: &ExportArgs,
    remote_workflows: &[Value],
    existing_manifest: Option<&Manifest>,
) -> Result<Vec<Value>> {
    if args.all {
        return Ok(remote_workflows.to_vec());
    }
    if let Some(names) = &args.names {
        let requested: Vec<&str> = names.split(',').map(str::trim).collect();
        let selected: Vec<Value> = remote_workflows
            .iter()
            .filter(|workflow| {
                workflow
                    .get("name")
                    .and_then(Value::as_str)
                    .is_some_and(|name| requested.contains(&name))
            })
            .cloned()
            .collect();
        let found: BTreeSet<&str> = selected
            .iter()
            .filter_map(|workflow| workflow.get("name").and_then(Value::as_str))
            .collect();
        for name in requested {
            if !found.contains(name) {
                eprintln!("warning: workflow not found on the remote: {name}");
            }
        }
        return Ok(selected);
    }
    if args.from_manifest {
        let manifest = existing_manifest.ok_or_else(|| {
            Error::Manifest("--from-manifest requires a loadable manifest".to_string())
        })?;
        let declared: BTreeSet<&str> = manifest
            .workflows
            .iter()
            .map(|spec| spec.name.as_str())
            .collect();
        return Ok(remote_workflows
            .iter()
            .filter(|workflow| {
                workflow
                    .get("name")
                    .and_then(Value::as_str)
                    .is_some_and(|name| declared.contains(name))
            })
            .cloned()
            .collect());
    }
    Err(Error::Config("must specify --all, --names, or --from-manifest".to_string()).into())
}

/// Move inline code out to `scripts/` files, leaving include directives with
/// content digests behind.
fn externalize_code_fields(
    workflow: &mut Value,
    workflow_name: &str,
    n8n_root: &Path,
) -> Result<usize> {
    let workflow_dir = sanitize_name(workflow_name);
    let Some(nodes) = workflow.get_mut("nodes").and_then(Value::as_array_mut) else {
        return Ok(0);
    };
    let mut count = 0;
    for node in nodes {
        let node_name = node
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or("node")
            .to_string();
        let Some(parameters) = node.get_mut("parameters").and_then(Value::as_object_mut) else {
            continue;
        };
        for field in CODE_FIELD_NAMES {
            let Some(code) = parameters.get(field).and_then(Value::as_str) else {
                continue;
            };
            if code.trim().is_empty() || parse_include_directive(code).is_some() {
                continue;
            }
            let code = code.to_string();

            let extension = if field == "pythonCode" { "py" } else { "js" };
            let rel_path = format!(
                "scripts/{workflow_dir}/{}_{field}.{extension}",
                sanitize_name(&node_name)
            );
            let script_path = n8n_root.join(&rel_path);
            if let Some(parent) = script_path.parent() {
                std::fs::create_dir_all(parent).context("create scripts directory")?;
            }
            std::fs::write(&script_path, &code)
                .with_context(|| format!("write {}", script_path.display()))?;

            let digest = compute_sha256(code.as_bytes());
            parameters.insert(
                field.to_string(),
                Value::String(format_include_directive(&rel_path, Some(&digest))),
            );
            count += 1;
        }
    }
    Ok(count)
}

/// Tag names on a remote workflow document (`tags: [{id, name}, ...]`).
fn workflow_tag_names(workflow: &Value) -> Vec<String> {
    workflow
        .get("tags")
        .and_then(Value::as_array)
        .map(|tags| {
            tags.iter()
                .filter_map(|tag| tag.get("name").and_then(Value::as_str))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Merge exported entries into the manifest, preserving entries for
/// workflows that were not part of this export.
fn write_merged_manifest(
    manifest_path: &Path,
    existing: Option<&Manifest>,
    exported: &[ExportedSpec],
) -> Result<()> {
    let mut entries: Vec<(String, Value)> = existing
        .map(|manifest| {
            manifest
                .workflows
                .iter()
                .map(|spec| {
                    (
                        spec.name.clone(),
                        json!({
                            "name": spec.name,
                            "active": spec.active,
                            "tags": spec.tags,
                        }),
                    )
                })
                .collect()
        })
        .unwrap_or_default();

    let mut tag_names: BTreeSet<String> = existing
        .map(|manifest| manifest.tags.iter().cloned().collect())
        .unwrap_or_default();

    for spec in exported {
        let entry = json!({
            "name": spec.name,
            "active": spec.active,
            "tags": spec.tags,
        });
        match entries.iter_mut().find(|(name, _)| *name == spec.name) {
            Some((_, existing_entry)) => *existing_entry = entry,
            None => entries.push((spec.name.clone(), entry)),
        }
        tag_names.extend(spec.tags.iter().cloned());
    }

    let externalize = existing.map(|manifest| manifest.externalize_code).unwrap_or(true);
    let document = json!({
        "externalize_code": externalize,
        "tags": tag_names.iter().collect::<Vec<_>>(),
        "workflows": entries.iter().map(|(_, entry)| entry).collect::<Vec<_>>(),
    });
    let yaml = serde_yaml::to_string(&document).context("serialize manifest YAML")?;
    std::fs::write(manifest_path, yaml)
        .with_context(|| format!("write {}", manifest_path.display()))?;
    Ok(())
}
