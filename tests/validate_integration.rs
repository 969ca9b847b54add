//! Integration tests for the offline validate command.

mod common;

use common::{run_cli, stdout, ProjectFixture};

const HELLO_SHA256: &str = "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9";

fn workflow_doc(code_field: &str) -> String {
    // Normalized form: sorted keys, 2-space indent, trailing newline.
    format!(
        "{{\n  \"name\": \"A\",\n  \"nodes\": [\n    {{\n      \"id\": \"1\",\n      \
         \"name\": \"Run\",\n      \"parameters\": {{\n        \"pythonCode\": \"{code_field}\"\n      \
         }}\n    }}\n  ]\n}}\n"
    )
}

fn project_with_include(directive: &str) -> ProjectFixture {
    let fixture = ProjectFixture::new();
    fixture.write(
        "n8n/manifests/workflows.yaml",
        "tags: []\nworkflows:\n  - name: A\n",
    );
    fixture.write("n8n/workflows/A.json", &workflow_doc(directive));
    fixture.write("n8n/scripts/hello.py", "hello world");
    fixture
}

#[test]
fn valid_project_passes() {
    let fixture = project_with_include("@@n8n-gitops:include scripts/hello.py");
    let root = fixture.root().to_string_lossy().to_string();

    let output = run_cli(&["validate", "--repo-root", &root]);
    assert!(output.status.success(), "stdout: {}", stdout(&output));
    let text = stdout(&output);
    assert!(text.contains("include resolved: scripts/hello.py"));
    assert!(text.contains("validation successful"));
}

#[test]
fn missing_include_file_fails_validation() {
    let fixture = project_with_include("@@n8n-gitops:include scripts/gone.py");
    let root = fixture.root().to_string_lossy().to_string();

    let output = run_cli(&["validate", "--repo-root", &root]);
    assert!(!output.status.success());
    assert_eq!(output.status.code(), Some(1));
    assert!(stdout(&output).contains("include file not found"));
}

#[test]
fn inline_code_is_a_warning_unless_enforced() {
    let fixture = project_with_include("print(42)");
    let root = fixture.root().to_string_lossy().to_string();

    let output = run_cli(&["validate", "--repo-root", &root]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("inline code in node 'Run'"));

    let output = run_cli(&["validate", "--repo-root", &root, "--enforce-no-inline-code"]);
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn strict_mode_promotes_warnings() {
    let fixture = project_with_include("print(42)");
    let root = fixture.root().to_string_lossy().to_string();

    let output = run_cli(&["validate", "--repo-root", &root, "--strict"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stdout(&output).contains("warnings treated as errors"));
}

#[test]
fn checksum_flags_control_enforcement() {
    // Matching digest passes even under enforcement.
    let fixture = project_with_include(&format!(
        "@@n8n-gitops:include scripts/hello.py sha256={HELLO_SHA256}"
    ));
    let root = fixture.root().to_string_lossy().to_string();
    let output = run_cli(&["validate", "--repo-root", &root, "--enforce-checksum"]);
    assert!(output.status.success(), "stdout: {}", stdout(&output));

    // A digest-less include fails only under --require-checksum.
    let fixture = project_with_include("@@n8n-gitops:include scripts/hello.py");
    let root = fixture.root().to_string_lossy().to_string();
    let output = run_cli(&["validate", "--repo-root", &root, "--require-checksum"]);
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn missing_manifest_fails() {
    let fixture = ProjectFixture::new();
    let root = fixture.root().to_string_lossy().to_string();

    let output = run_cli(&["validate", "--repo-root", &root]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stdout(&output).contains("manifest"));
}
