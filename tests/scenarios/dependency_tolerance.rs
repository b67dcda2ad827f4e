//! Test: Dependency Tolerance - install failures never stop the Run

use crate::helpers::*;

#[tokio::test]
async fn test_missing_manifest_does_not_stop_later_steps() {
    let host = MockHost::new().with_repository(&[
        ("app.py", "def add(a, b):\n    return a + b\n"),
        ("tests/test_app.py", "import unittest\n"),
    ]);
    let (result, runner) = run_python_ci(host).await;

    assert_run_succeeded(&result);
    assert_execution_order(&result, &STEP_NAMES);
    assert_step_outcome(
        &result,
        "Install dependencies",
        "tolerated failure",
        Some("DependencyInstallWarning"),
    );
    assert_step_outcome(&result, "Configure PYTHONPATH", "success", None);
    assert_step_outcome(&result, "Run tests", "success", None);

    let host = runner.host();
    assert!(host.invoked("pip install --upgrade pip"));
    assert!(!host.invoked("pip install -r"), "No install without a manifest");
    assert!(host.invoked("unittest -v test_app"));
}

#[tokio::test]
async fn test_failing_install_is_tolerated() {
    let (result, runner) = run_python_ci(MockHost::new().fail_pip_install()).await;

    assert_run_succeeded(&result);
    assert_eq!(result.tolerated_failures().count(), 1);
    let error = result
        .step("Install dependencies")
        .and_then(|s| s.outcome.error())
        .unwrap();
    assert!(error.to_string().contains("nonexistent-pkg"));
    assert!(runner.host().invoked("unittest"));
}

#[tokio::test]
async fn test_failing_pip_upgrade_is_tolerated() {
    let (result, runner) = run_python_ci(MockHost::new().fail_pip_upgrade()).await;

    assert_run_succeeded(&result);
    assert_step_outcome(
        &result,
        "Install dependencies",
        "tolerated failure",
        Some("DependencyInstallWarning"),
    );
    assert!(!runner.host().invoked("pip install -r"));
}

#[tokio::test]
async fn test_strict_install_makes_failure_fatal() {
    let yaml = PYTHON_CI.replace(
        "    uses: runner/install-dependencies\n",
        "    uses: runner/install-dependencies\n    continue-on-error: false\n",
    );
    let (result, _) = dispatch(&yaml, MockHost::new().fail_pip_install(), push("main")).await;
    let result = result.unwrap();

    assert_run_failed(&result);
    assert_step_outcome(
        &result,
        "Install dependencies",
        "fatal failure",
        Some("DependencyInstallWarning"),
    );
    assert_skipped(&result, &["Configure PYTHONPATH", "Run tests"]);
}

#[tokio::test]
async fn test_install_runs_in_working_directory_with_run_environment() {
    let (result, runner) = run_python_ci(MockHost::new()).await;
    assert_run_succeeded(&result);

    let calls = runner.host().calls();
    let install = calls
        .iter()
        .find(|c| c.display().contains("pip install -r requirements.txt"))
        .expect("manifest install should run");
    assert_eq!(install.program, "python3.13");
    assert!(install.cwd.is_some());
    let env = install.env.as_ref().unwrap();
    assert_eq!(env.get("PATH").map(String::as_str), Some("/usr/local/bin:/usr/bin:/bin"));
}
