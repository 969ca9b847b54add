//! Plan execution against the remote service.
//!
//! One workflow is deployed at a time, in plan order. A failure on any
//! workflow aborts the remaining deployment so a partial rollout cannot go
//! unnoticed; prune failures, by contrast, are isolated per item.

use crate::client::{resource_id, N8nApi};
use crate::deploy::plan::{Action, PlanItem};
use crate::error::Result;
use crate::manifest::WorkflowSpec;
use serde_json::Value;
use std::collections::BTreeMap;

/// Fields owned by the server. Sending them back on a write makes the API
/// reject the document, so they are stripped before create/update.
const SERVER_MANAGED_FIELDS: [&str; 9] = [
    "id",
    "createdAt",
    "updatedAt",
    "versionId",
    "shared",
    "isArchived",
    "active",
    "tags",
    "triggerCount",
];

/// Strip server-managed and null/empty metadata fields on a copy.
pub fn prepare_workflow_for_api(workflow: &Value) -> Value {
    let mut cleaned = workflow.clone();
    if let Some(map) = cleaned.as_object_mut() {
        for field in SERVER_MANAGED_FIELDS {
            map.remove(field);
        }
        // Present-but-empty metadata also fails write validation.
        if map.get("meta").is_some_and(Value::is_null) {
            map.remove("meta");
        }
        if map
            .get("pinData")
            .and_then(Value::as_object)
            .is_some_and(serde_json::Map::is_empty)
        {
            map.remove("pinData");
        }
        if map.get("staticData").is_some_and(Value::is_null) {
            map.remove("staticData");
        }
    }
    cleaned
}

/// Execute every plan item in order, stopping at the first failure.
pub fn execute_plan(
    client: &dyn N8nApi,
    plan: &[PlanItem],
    backup: bool,
    tag_ids: &BTreeMap<String, String>,
) -> Result<()> {
    for item in plan {
        if let Err(err) = deploy_item(client, item, backup, tag_ids) {
            print_error_hints(&err, &item.spec.name);
            return Err(err);
        }
    }
    Ok(())
}

fn deploy_item(
    client: &dyn N8nApi,
    item: &PlanItem,
    backup: bool,
    tag_ids: &BTreeMap<String, String>,
) -> Result<()> {
    let api_workflow = prepare_workflow_for_api(&item.workflow);
    let workflow_id = match &item.action {
        Action::Create => {
            println!("  creating: {}...", item.spec.name);
            create_workflow(client, &api_workflow)?
        }
        Action::Replace { workflow_id } => {
            println!("  replacing: {}...", item.spec.name);
            if backup {
                replace_with_backup(client, &item.spec, &api_workflow, workflow_id)?
            } else {
                replace(client, &api_workflow, workflow_id)?
            }
        }
    };

    match workflow_id {
        Some(workflow_id) => set_workflow_state(client, &item.spec, &workflow_id, tag_ids)?,
        None => tracing::warn!(
            workflow = %item.spec.name,
            "no workflow ID returned, skipping activation and tag assignment"
        ),
    }
    Ok(())
}

fn create_workflow(client: &dyn N8nApi, api_workflow: &Value) -> Result<Option<String>> {
    let created = client.create_workflow(api_workflow)?;
    let workflow_id = resource_id(&created);
    match &workflow_id {
        Some(id) => println!("    created with ID: {id}"),
        None => println!("    created, but the server returned no ID"),
    }
    Ok(workflow_id)
}

/// Replace by deleting the old workflow and creating the new one fresh.
///
/// A failed delete is downgraded to a warning: the stale workflow would
/// otherwise block the name, but losing it is preferable to aborting.
fn replace(
    client: &dyn N8nApi,
    api_workflow: &Value,
    workflow_id: &str,
) -> Result<Option<String>> {
    println!("    deleting old workflow...");
    match client.delete_workflow(workflow_id) {
        Ok(()) => println!("    old workflow deleted"),
        Err(err) => {
            tracing::warn!(workflow_id, error = %err, "could not delete old workflow");
            eprintln!("warning: could not delete old workflow: {err}");
            eprintln!("         creating new workflow anyway...");
        }
    }
    create_workflow(client, api_workflow)
}

/// Replace after renaming the old workflow in place as a backup.
fn replace_with_backup(
    client: &dyn N8nApi,
    spec: &WorkflowSpec,
    api_workflow: &Value,
    workflow_id: &str,
) -> Result<Option<String>> {
    let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
    let backup_name = format!("[BKP {timestamp}] {}", spec.name);
    println!("    backing up old workflow as: {backup_name}");

    let mut old_workflow = client.get_workflow(workflow_id)?;
    if let Some(map) = old_workflow.as_object_mut() {
        map.insert("name".to_string(), Value::String(backup_name));
    }
    let old_cleaned = prepare_workflow_for_api(&old_workflow);
    client.update_workflow(workflow_id, &old_cleaned)?;
    println!("    backup created");

    create_workflow(client, api_workflow)
}

/// Set the activation flag explicitly and push resolved tag IDs.
fn set_workflow_state(
    client: &dyn N8nApi,
    spec: &WorkflowSpec,
    workflow_id: &str,
    tag_ids: &BTreeMap<String, String>,
) -> Result<()> {
    if spec.active {
        client.activate_workflow(workflow_id)?;
        println!("    activated");
    } else {
        client.deactivate_workflow(workflow_id)?;
        println!("    deactivated");
    }

    if spec.tags.is_empty() {
        return Ok(());
    }
    let mut resolved = Vec::new();
    for tag_name in &spec.tags {
        match tag_ids.get(tag_name) {
            Some(id) => resolved.push(id.clone()),
            None => {
                tracing::warn!(tag = %tag_name, "no remote ID resolved for tag, dropping");
                eprintln!("warning: no remote ID resolved for tag '{tag_name}', dropping");
            }
        }
    }
    if !resolved.is_empty() {
        client.update_workflow_tags(workflow_id, &resolved)?;
        println!("    tags updated ({} tag(s))", resolved.len());
    }
    Ok(())
}

/// Delete remote workflows absent from the manifest; failures are isolated.
pub fn prune_workflows(client: &dyn N8nApi, targets: &[Value]) {
    if targets.is_empty() {
        return;
    }
    println!();
    println!("pruning workflows not in manifest...");
    for workflow in targets {
        let name = workflow
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or("<unnamed>");
        let Some(workflow_id) = resource_id(workflow) else {
            eprintln!("warning: cannot prune '{name}': no ID");
            continue;
        };
        println!("  deleting: {name}...");
        match client.delete_workflow(&workflow_id) {
            Ok(()) => println!("    deleted"),
            Err(err) => eprintln!("warning: failed to delete '{name}': {err}"),
        }
    }
}

/// Delete remote tags absent from the manifest; failures are isolated.
pub fn prune_tags(client: &dyn N8nApi, targets: &[(String, String)]) {
    if targets.is_empty() {
        return;
    }
    println!();
    println!("pruning tags not in manifest...");
    for (tag_id, name) in targets {
        println!("  deleting tag: {name}...");
        match client.delete_tag(tag_id) {
            Ok(()) => println!("    deleted"),
            Err(err) => eprintln!("warning: failed to delete tag '{name}': {err}"),
        }
    }
}

/// Suggest a fix when the server rejected a document over a leftover
/// server-managed field.
fn print_error_hints(err: &crate::error::Error, workflow_name: &str) {
    let text = err.to_string().to_lowercase();
    let rejected_write = matches!(
        err,
        crate::error::Error::Api {
            status: Some(400),
            ..
        }
    );
    if rejected_write || text.contains("additional properties") || text.contains("validation") {
        eprintln!("hint: the workflow file may contain fields managed by the n8n server.");
        eprintln!("      re-export it to get a clean copy:");
        eprintln!("        n8n-gitops export --names \"{workflow_name}\"");
    }
}
