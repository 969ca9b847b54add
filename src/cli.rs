//! CLI argument parsing.
//!
//! The CLI is intentionally thin: flags map one-to-one onto the deploy
//! pipeline's inputs, and no policy lives here beyond arg wiring.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

/// Root CLI entrypoint.
#[derive(Parser, Debug)]
#[command(
    name = "n8n-gitops",
    version,
    about = "Git-backed declarative deployment for n8n workflows",
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct RootArgs {
    /// Increase diagnostic verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Top-level commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Deploy declared workflows to the n8n instance
    Deploy(DeployArgs),
    /// Validate manifest, workflows, and includes without network access
    Validate(ValidateArgs),
    /// Export workflows from the n8n instance into the repository
    Export(ExportArgs),
    /// Deploy a previous revision (deploy with a required git ref)
    Rollback(RollbackArgs),
}

/// Deploy command inputs.
#[derive(Parser, Debug)]
#[command(about = "Deploy declared workflows to the n8n instance")]
pub struct DeployArgs {
    /// Repository root containing the n8n/ directory
    #[arg(long, value_name = "DIR", default_value = ".")]
    pub repo_root: PathBuf,

    /// Deploy from a git ref (tag, branch, commit) instead of the working tree
    #[arg(long, value_name = "REF")]
    pub git_ref: Option<String>,

    /// n8n API base URL (overrides N8N_API_URL and .n8n-auth)
    #[arg(long, value_name = "URL")]
    pub api_url: Option<String>,

    /// n8n API key (overrides N8N_API_KEY and .n8n-auth)
    #[arg(long, value_name = "KEY")]
    pub api_key: Option<String>,

    /// Print the deployment plan without making changes
    #[arg(long)]
    pub dry_run: bool,

    /// Delete remote workflows and tags that are not in the manifest
    #[arg(long)]
    pub prune: bool,

    /// Keep a renamed copy of each replaced workflow
    #[arg(long)]
    pub backup: bool,
}

/// Validate command inputs.
#[derive(Parser, Debug)]
#[command(about = "Validate manifest, workflows, and includes")]
pub struct ValidateArgs {
    /// Repository root containing the n8n/ directory
    #[arg(long, value_name = "DIR", default_value = ".")]
    pub repo_root: PathBuf,

    /// Validate a git ref (tag, branch, commit) instead of the working tree
    #[arg(long, value_name = "REF")]
    pub git_ref: Option<String>,

    /// Treat warnings as errors
    #[arg(long)]
    pub strict: bool,

    /// Fail on inline code in code-bearing fields
    #[arg(long)]
    pub enforce_no_inline_code: bool,

    /// Fail on include checksum mismatches
    #[arg(long)]
    pub enforce_checksum: bool,

    /// Fail on includes that carry no checksum
    #[arg(long)]
    pub require_checksum: bool,

    /// Overlay a dotenv-style file for environment schema checks
    #[arg(long, value_name = "PATH")]
    pub env_file: Option<PathBuf>,
}

/// Export command inputs.
#[derive(Parser, Debug)]
#[command(about = "Export workflows from the n8n instance")]
pub struct ExportArgs {
    /// Repository root containing the n8n/ directory
    #[arg(long, value_name = "DIR", default_value = ".")]
    pub repo_root: PathBuf,

    /// n8n API base URL (overrides N8N_API_URL and .n8n-auth)
    #[arg(long, value_name = "URL")]
    pub api_url: Option<String>,

    /// n8n API key (overrides N8N_API_KEY and .n8n-auth)
    #[arg(long, value_name = "KEY")]
    pub api_key: Option<String>,

    /// Export every remote workflow and update the manifest
    #[arg(long)]
    pub all: bool,

    /// Export a comma-separated list of workflow names
    #[arg(long, value_name = "NAMES", conflicts_with = "all")]
    pub names: Option<String>,

    /// Export only workflows declared in the manifest
    #[arg(long, conflicts_with_all = ["all", "names"])]
    pub from_manifest: bool,

    /// Move inline code out to scripts/ with include directives
    #[arg(long)]
    pub externalize_code: bool,
}

/// Rollback command inputs.
#[derive(Parser, Debug)]
#[command(about = "Deploy a previous revision")]
pub struct RollbackArgs {
    /// Repository root containing the n8n/ directory
    #[arg(long, value_name = "DIR", default_value = ".")]
    pub repo_root: PathBuf,

    /// Git ref (tag, branch, commit) to roll back to
    #[arg(long, value_name = "REF")]
    pub git_ref: String,

    /// n8n API base URL (overrides N8N_API_URL and .n8n-auth)
    #[arg(long, value_name = "URL")]
    pub api_url: Option<String>,

    /// n8n API key (overrides N8N_API_KEY and .n8n-auth)
    #[arg(long, value_name = "KEY")]
    pub api_key: Option<String>,

    /// Print the deployment plan without making changes
    #[arg(long)]
    pub dry_run: bool,

    /// Delete remote workflows and tags that are not in the manifest
    #[arg(long)]
    pub prune: bool,

    /// Keep a renamed copy of each replaced workflow
    #[arg(long)]
    pub backup: bool,
}

impl RollbackArgs {
    /// Rollback delegates wholesale to deploy.
    pub fn as_deploy_args(&self) -> DeployArgs {
        DeployArgs {
            repo_root: self.repo_root.clone(),
            git_ref: Some(self.git_ref.clone()),
            api_url: self.api_url.clone(),
            api_key: self.api_key.clone(),
            dry_run: self.dry_run,
            prune: self.prune,
            backup: self.backup,
        }
    }
}
