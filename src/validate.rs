//! Validate command: offline checks against a snapshot.
//!
//! Validation never touches the network. It loads the manifest, renders
//! every declared workflow under the caller's enforcement flags, checks that
//! the tracked files are normalized, and runs the environment schema.

use crate::cli::ValidateArgs;
use crate::config::parse_env_file;
use crate::envschema::validate_env_schema;
use crate::manifest;
use crate::normalize::normalize_json;
use crate::render::{render_workflow_json, RenderOptions, RenderStatus};
use crate::snapshot;
use anyhow::{anyhow, Context, Result};
use serde_json::Value;
use std::collections::BTreeMap;

const N8N_ROOT: &str = "n8n";

pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    let repo_root = args
        .repo_root
        .canonicalize()
        .with_context(|| format!("resolve repo root {}", args.repo_root.display()))?;
    let snapshot = snapshot::create_snapshot(&repo_root, args.git_ref.as_deref());

    let mut warnings: Vec<String> = Vec::new();
    let mut errors: Vec<String> = Vec::new();

    println!("validating n8n-gitops project at {}", repo_root.display());
    if let Some(git_ref) = &args.git_ref {
        println!("using git ref: {git_ref}");
    }
    println!();

    let manifest = match manifest::load_manifest(snapshot.as_ref(), N8N_ROOT) {
        Ok(manifest) => manifest,
        Err(err) => {
            errors.push(err.to_string());
            print_results(&warnings, &errors, args.strict);
            return Err(anyhow!("validation failed"));
        }
    };
    println!("manifest loaded: {} workflow(s)", manifest.workflows.len());

    let render_options = RenderOptions {
        enforce_no_inline_code: args.enforce_no_inline_code,
        enforce_checksum: args.enforce_checksum,
        require_checksum: args.require_checksum,
    };

    for spec in &manifest.workflows {
        let workflow_path = format!("{N8N_ROOT}/{}", spec.file());
        println!();
        println!("validating workflow: {}", spec.name);
        println!("  file: {workflow_path}");

        if !snapshot.exists(&workflow_path) {
            errors.push(format!("workflow file not found: {workflow_path}"));
            continue;
        }
        let workflow_json = match snapshot.read_text(&workflow_path) {
            Ok(content) => content,
            Err(err) => {
                errors.push(format!("failed to read {workflow_path}: {err}"));
                continue;
            }
        };
        let workflow: Value = match serde_json::from_str(&workflow_json) {
            Ok(workflow) => workflow,
            Err(err) => {
                errors.push(format!("invalid JSON in {workflow_path}: {err}"));
                continue;
            }
        };

        match render_workflow_json(&workflow, snapshot.as_ref(), N8N_ROOT, render_options) {
            Ok((_, reports)) => {
                for report in &reports {
                    match report.status {
                        RenderStatus::Included => println!(
                            "  include resolved: {} in {}",
                            report.include_path.as_deref().unwrap_or("<unknown>"),
                            report.node_name
                        ),
                        RenderStatus::InlineCode => warnings.push(format!(
                            "inline code in node '{}' field '{}'",
                            report.node_name, report.field
                        )),
                        RenderStatus::ChecksumMismatch => warnings.push(format!(
                            "checksum mismatch in node '{}': {} (expected: {}, got: {})",
                            report.node_name,
                            report.include_path.as_deref().unwrap_or("<unknown>"),
                            report.sha256_expected.as_deref().unwrap_or("<none>"),
                            report.sha256_actual.as_deref().unwrap_or("<none>"),
                        )),
                        RenderStatus::MissingFile => errors.push(format!(
                            "include file not found: {} (node '{}')",
                            report.include_path.as_deref().unwrap_or("<unknown>"),
                            report.node_name
                        )),
                    }
                }
            }
            Err(err) => {
                errors.push(format!("render error in {}: {err}", spec.name));
                continue;
            }
        }

        if workflow_json.trim() != normalize_json(&workflow).trim() {
            warnings.push(format!(
                "workflow {} is not normalized (re-export or run the file through \
                 deterministic formatting)",
                spec.name
            ));
        }
    }

    println!();
    println!("validating environment schema...");
    match validate_env_schema(snapshot.as_ref(), N8N_ROOT, &environment(args)?) {
        Ok(issues) if issues.is_empty() => println!("  environment schema ok"),
        Ok(issues) => warnings.extend(issues),
        Err(err) => errors.push(err.to_string()),
    }

    println!();
    print_results(&warnings, &errors, args.strict);

    if !errors.is_empty() || (args.strict && !warnings.is_empty()) {
        return Err(anyhow!("validation failed"));
    }
    println!();
    println!("validation successful");
    Ok(())
}

/// Process environment overlaid with an optional env file; existing process
/// variables win, matching dotenv semantics.
fn environment(args: &ValidateArgs) -> Result<BTreeMap<String, String>> {
    let mut env_vars: BTreeMap<String, String> = std::env::vars().collect();
    if let Some(env_file) = &args.env_file {
        let content = std::fs::read_to_string(env_file)
            .with_context(|| format!("read env file {}", env_file.display()))?;
        for (key, value) in parse_env_file(&content) {
            env_vars.entry(key).or_insert(value);
        }
    }
    Ok(env_vars)
}

fn print_results(warnings: &[String], errors: &[String], strict: bool) {
    if !warnings.is_empty() {
        println!("warnings:");
        for warning in warnings {
            println!("  ! {warning}");
        }
        if strict {
            println!("(warnings treated as errors in strict mode)");
        }
    }
    if !errors.is_empty() {
        println!("errors:");
        for error in errors {
            println!("  x {error}");
        }
    }
}
