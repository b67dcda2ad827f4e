//! Integration tests with real git and python3
//!
//! These tests need `git` and `python3` on PATH. They are tagged with
//! `#[ignore]` and should be run explicitly with:
//!
//!     cargo test --test integration -- --ignored

use std::path::Path;
use std::process::Command;
use workflow_runner::core::config::WorkflowConfig;
use workflow_runner::core::{RunResult, RunStatus, TriggerEvent};
use workflow_runner::execution::PipelineRunner;
use workflow_runner::host::{HostConfig, ProcessHost};

const WORKFLOW: &str = r#"
name: Python CI
on:
  push:
    branches: [main]
  pull_request:
    branches: [main]
steps:
  - name: Checkout
    uses: actions/checkout@v4
  - name: Set up Python
    uses: actions/setup-python@v5
    with:
      python-version: "3"
  - name: Install dependencies
    uses: runner/install-dependencies
  - name: Configure PYTHONPATH
    uses: runner/set-env
    with:
      name: PYTHONPATH
      append-path: "{{ workspace }}"
  - name: Run tests
    uses: runner/discover-tests
"#;

fn git(dir: &Path, args: &[&str]) {
    let status = Command::new("git")
        .args(args)
        .current_dir(dir)
        .status()
        .expect("git should be installed");
    assert!(status.success(), "git {:?} failed", args);
}

/// Create a repository on branch main with one test module
fn create_repository(dir: &Path, expected_sum: u32) {
    std::fs::create_dir_all(dir.join("tests")).unwrap();
    std::fs::write(dir.join("app.py"), "def add(a, b):\n    return a + b\n").unwrap();
    std::fs::write(
        dir.join("tests/test_app.py"),
        format!(
            "import unittest\nfrom app import add\n\n\
             class AppTest(unittest.TestCase):\n    \
             def test_add(self):\n        \
             self.assertEqual(add(1, 2), {})\n",
            expected_sum
        ),
    )
    .unwrap();
    init_repository(dir);
}

/// Initialise a repository on branch main and commit everything in it
fn init_repository(dir: &Path) {
    git(dir, &["init", "--quiet", "--initial-branch=main"]);
    git(dir, &["add", "."]);
    git(
        dir,
        &[
            "-c",
            "user.name=Runner",
            "-c",
            "user.email=runner@example.com",
            "commit",
            "--quiet",
            "-m",
            "initial",
        ],
    );
}

async fn run(event: TriggerEvent) -> Option<RunResult> {
    let workflow = WorkflowConfig::from_yaml(WORKFLOW)
        .unwrap()
        .to_workflow()
        .unwrap();
    PipelineRunner::new(ProcessHost::new(), HostConfig::new().with_command_timeout(300))
        .dispatch(&workflow, &event)
        .await
        .expect("run should start")
}

#[tokio::test]
#[ignore] // Requires git and python3
async fn test_real_push_with_passing_test() {
    let repo = tempfile::tempdir().unwrap();
    create_repository(repo.path(), 3);

    let source = repo.path().display().to_string();
    let result = run(TriggerEvent::push(&source, "main")).await.unwrap();

    assert_eq!(result.status, RunStatus::Succeeded, "{:#?}", result.steps);
    assert_eq!(result.exit_code(), 0);
    // No manifest in the repository: tolerated
    assert_eq!(result.tolerated_failures().count(), 1);
    assert_eq!(result.test_report().unwrap().passed, 1);
}

#[tokio::test]
#[ignore] // Requires git and python3
async fn test_real_push_with_assertion_failure() {
    let repo = tempfile::tempdir().unwrap();
    create_repository(repo.path(), 4);

    let source = repo.path().display().to_string();
    let result = run(TriggerEvent::push(&source, "main")).await.unwrap();

    assert_eq!(result.status, RunStatus::Failed);
    assert_ne!(result.exit_code(), 0);
    assert_eq!(result.test_report().unwrap().failed, 1);
}

#[tokio::test]
#[ignore] // Requires git and python3
async fn test_real_pull_request_to_develop_is_ignored() {
    let repo = tempfile::tempdir().unwrap();
    create_repository(repo.path(), 3);

    let source = repo.path().display().to_string();
    assert!(run(TriggerEvent::pull_request(&source, "develop")).await.is_none());
}

#[tokio::test]
#[ignore] // Requires git and python3
async fn test_real_tests_import_sibling_helpers() {
    let repo = tempfile::tempdir().unwrap();
    let dir = repo.path();
    std::fs::create_dir_all(dir.join("tests")).unwrap();
    std::fs::write(dir.join("tests/helpers.py"), "def three():\n    return 3\n").unwrap();
    std::fs::write(
        dir.join("tests/test_a.py"),
        "import unittest\nfrom helpers import three\n\n\
         class HelperTest(unittest.TestCase):\n    \
         def test_three(self):\n        \
         self.assertEqual(three(), 3)\n",
    )
    .unwrap();
    init_repository(dir);

    let source = dir.display().to_string();
    let result = run(TriggerEvent::push(&source, "main")).await.unwrap();

    assert_eq!(result.status, RunStatus::Succeeded, "{:#?}", result.steps);
    let report = result.test_report().unwrap();
    assert_eq!(report.files.len(), 1);
    assert_eq!(report.files[0].path, "tests/test_a.py");
    assert_eq!(report.passed, 1);
    assert_eq!(report.errors, 0);
}
