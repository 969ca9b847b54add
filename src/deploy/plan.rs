//! Deployment planning.
//!
//! Planning combines the manifest, the rendered workflow documents, and the
//! remote inventory into an ordered action list. It performs no writes; a
//! plan either covers every declared workflow or fails as a whole.

use crate::client::resource_id;
use crate::error::{Error, Result};
use crate::manifest::{Manifest, WorkflowSpec};
use crate::render::{render_workflow_json, RenderOptions, RenderReport, RenderStatus};
use crate::snapshot::Snapshot;
use serde_json::Value;
use std::collections::BTreeMap;

/// What to do with one declared workflow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Create,
    Replace { workflow_id: String },
}

/// One planned deployment step, consumed exactly once by the executor.
#[derive(Debug)]
pub struct PlanItem {
    pub spec: WorkflowSpec,
    pub workflow: Value,
    pub action: Action,
    pub reports: Vec<RenderReport>,
}

/// Index remote workflows by exact name.
pub fn name_to_id_index(remote_workflows: &[Value]) -> BTreeMap<String, String> {
    let mut index = BTreeMap::new();
    for workflow in remote_workflows {
        if let (Some(name), Some(id)) = (
            workflow.get("name").and_then(Value::as_str),
            resource_id(workflow),
        ) {
            index.insert(name.to_string(), id);
        }
    }
    index
}

/// Build the deployment plan in manifest order.
///
/// Every failure to load, parse, or render a declared workflow is fatal for
/// the whole plan; nothing is silently skipped. A missing include file is
/// treated the same way, since deploying an unresolved directive is never
/// useful.
pub fn build_plan(
    manifest: &Manifest,
    snapshot: &dyn Snapshot,
    n8n_root: &str,
    name_to_id: &BTreeMap<String, String>,
) -> Result<Vec<PlanItem>> {
    let mut plan = Vec::new();
    for spec in &manifest.workflows {
        let workflow_path = format!("{n8n_root}/{}", spec.file());
        let workflow_json = snapshot.read_text(&workflow_path).map_err(|err| {
            Error::Snapshot(format!(
                "failed to load workflow '{}' from {workflow_path}: {err}",
                spec.name
            ))
        })?;
        let workflow: Value = serde_json::from_str(&workflow_json).map_err(|err| {
            Error::Render(format!("invalid JSON in {workflow_path}: {err}"))
        })?;

        let (mut rendered, reports) =
            render_workflow_json(&workflow, snapshot, n8n_root, RenderOptions::default())
                .map_err(|err| {
                    Error::Render(format!("failed to render workflow '{}': {err}", spec.name))
                })?;
        if let Some(missing) = reports
            .iter()
            .find(|report| report.status == RenderStatus::MissingFile)
        {
            return Err(Error::Render(format!(
                "workflow '{}': include file not found: {} (node '{}')",
                spec.name,
                missing.include_path.as_deref().unwrap_or("<unknown>"),
                missing.node_name
            )));
        }

        // The manifest is authoritative over whatever name the file carries.
        if let Some(map) = rendered.as_object_mut() {
            map.insert("name".to_string(), Value::String(spec.name.clone()));
        }

        let action = match name_to_id.get(&spec.name) {
            Some(id) => Action::Replace {
                workflow_id: id.clone(),
            },
            None => Action::Create,
        };

        plan.push(PlanItem {
            spec: spec.clone(),
            workflow: rendered,
            action,
            reports,
        });
    }
    Ok(plan)
}

/// Remote workflows whose names are absent from the manifest.
pub fn find_prune_targets(remote_workflows: &[Value], manifest: &Manifest) -> Vec<Value> {
    let declared: std::collections::BTreeSet<&str> = manifest
        .workflows
        .iter()
        .map(|spec| spec.name.as_str())
        .collect();
    remote_workflows
        .iter()
        .filter(|workflow| {
            workflow
                .get("name")
                .and_then(Value::as_str)
                .is_some_and(|name| !declared.contains(name))
        })
        .cloned()
        .collect()
}
