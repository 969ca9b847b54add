//! Deploy command: reconcile the declared manifest against the remote
//! n8n instance.
//!
//! Phases run strictly in order: tag reconciliation, remote inventory,
//! planning, plan printout, execution, prune. The printed log doubles as the
//! audit trail of exactly what was done, so everything is sequential and
//! deterministic.

pub mod execute;
pub mod plan;
pub mod tags;

use crate::cli::DeployArgs;
use crate::client::{N8nApi, N8nClient};
use crate::config;
use crate::error::Error;
use crate::manifest;
use crate::render::RenderStatus;
use crate::snapshot;
use anyhow::{Context, Result};
use plan::{Action, PlanItem};
use serde_json::Value;

const N8N_ROOT: &str = "n8n";

pub fn run_deploy(args: &DeployArgs) -> Result<()> {
    // Backup and prune are mutually exclusive; reject before any network
    // activity.
    if args.backup && args.prune {
        return Err(Error::Config(
            "--backup and --prune cannot be combined: pruning deletes exactly the \
             workflows a backup would preserve"
                .to_string(),
        )
        .into());
    }

    let repo_root = args
        .repo_root
        .canonicalize()
        .with_context(|| format!("resolve repo root {}", args.repo_root.display()))?;
    let auth = config::load_auth(&repo_root, args.api_url.as_deref(), args.api_key.as_deref())?;
    let snapshot = snapshot::create_snapshot(&repo_root, args.git_ref.as_deref());

    println!("deploying workflows from {}", repo_root.display());
    if let Some(git_ref) = &args.git_ref {
        println!("using git ref: {git_ref}");
    }
    println!("target: {}", auth.api_url);
    println!();

    let manifest = manifest::load_manifest(snapshot.as_ref(), N8N_ROOT)?;
    println!("loaded manifest: {} workflow(s)", manifest.workflows.len());

    let client = N8nClient::new(&auth.api_url, &auth.api_key);

    let tag_sync = tags::reconcile_tags(&client, &manifest.tags, args.prune);

    println!();
    println!("fetching remote workflows...");
    let remote_workflows = client
        .list_workflows()
        .context("fetch remote workflows")?;
    println!("found {} remote workflow(s)", remote_workflows.len());

    let name_to_id = plan::name_to_id_index(&remote_workflows);
    let plan_items = plan::build_plan(&manifest, snapshot.as_ref(), N8N_ROOT, &name_to_id)?;
    let prune_targets = if args.prune {
        plan::find_prune_targets(&remote_workflows, &manifest)
    } else {
        Vec::new()
    };

    print_plan(&plan_items, &prune_targets, &tag_sync.prune, args.backup);

    if args.dry_run {
        println!();
        println!("dry run: no changes made");
        return Ok(());
    }

    println!();
    println!("executing deployment...");
    execute::execute_plan(&client, &plan_items, args.backup, &tag_sync.name_to_id)?;
    execute::prune_workflows(&client, &prune_targets);
    execute::prune_tags(&client, &tag_sync.prune);

    println!();
    println!("deployment successful");
    Ok(())
}

fn print_plan(
    plan: &[PlanItem],
    prune_targets: &[Value],
    tag_prune: &[(String, String)],
    backup: bool,
) {
    println!();
    println!("deployment plan:");
    for item in plan {
        match &item.action {
            Action::Create => println!("  + create: {}", item.spec.name),
            Action::Replace { .. } if backup => {
                println!("  ~ replace (with backup): {}", item.spec.name)
            }
            Action::Replace { .. } => println!("  ~ replace: {}", item.spec.name),
        }
        for report in &item.reports {
            if report.status == RenderStatus::Included {
                println!(
                    "      include: {}",
                    report.include_path.as_deref().unwrap_or("<unknown>")
                );
            }
        }
    }
    if !prune_targets.is_empty() {
        println!("  - prune: {} workflow(s) not in manifest:", prune_targets.len());
        for workflow in prune_targets {
            println!(
                "      - {}",
                workflow.get("name").and_then(Value::as_str).unwrap_or("<unnamed>")
            );
        }
    }
    if !tag_prune.is_empty() {
        println!("  - prune: {} tag(s) not in manifest:", tag_prune.len());
        for (_, name) in tag_prune {
            println!("      - {name}");
        }
    }
}
