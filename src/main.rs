use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod client;
mod config;
mod deploy;
mod envschema;
mod error;
mod export;
mod manifest;
mod normalize;
mod render;
mod rollback;
mod snapshot;
mod validate;

fn main() {
    let args = cli::RootArgs::parse();
    init_tracing(args.verbose);

    let result = match &args.command {
        cli::Command::Deploy(deploy_args) => deploy::run_deploy(deploy_args),
        cli::Command::Validate(validate_args) => validate::run_validate(validate_args),
        cli::Command::Export(export_args) => export::run_export(export_args),
        cli::Command::Rollback(rollback_args) => rollback::run_rollback(rollback_args),
    };

    if let Err(err) = result {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

/// Diagnostics go to stderr so stdout stays a clean audit log.
fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
