//! Rollback command: deploy a historical revision.

use crate::cli::RollbackArgs;
use crate::deploy;
use anyhow::Result;

/// Rollback is deploy with a required git ref.
pub fn run_rollback(args: &RollbackArgs) -> Result<()> {
    println!("rolling back to git ref: {}", args.git_ref);
    println!();
    deploy::run_deploy(&args.as_deploy_args())
}
