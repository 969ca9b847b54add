//! Integration tests for deploy-command flag handling that needs no
//! network: conflicting flags and missing credentials both fail before any
//! request is attempted.

mod common;

use common::{run_cli, stderr, ProjectFixture};

#[test]
fn backup_and_prune_conflict_is_a_configuration_error() {
    let fixture = ProjectFixture::new();
    let root = fixture.root().to_string_lossy().to_string();

    let output = run_cli(&[
        "deploy",
        "--repo-root",
        &root,
        "--backup",
        "--prune",
        "--api-url",
        "http://127.0.0.1:9",
        "--api-key",
        "k",
    ]);
    assert_eq!(output.status.code(), Some(1));
    let text = stderr(&output);
    assert!(text.contains("configuration error"), "stderr: {text}");
    assert!(text.contains("--backup and --prune"));
}

#[test]
fn missing_credentials_fail_before_any_network_use() {
    let fixture = ProjectFixture::new();
    let root = fixture.root().to_string_lossy().to_string();

    let output = run_cli(&["deploy", "--repo-root", &root]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("N8N_API_URL"));
}

#[test]
fn rollback_requires_a_git_ref() {
    let output = run_cli(&["rollback"]);
    // clap rejects the missing required flag.
    assert!(!output.status.success());
    assert!(stderr(&output).contains("--git-ref"));
}
