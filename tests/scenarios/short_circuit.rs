//! Test: Short Circuit - a fatal failure stops the Run

use crate::helpers::*;

#[tokio::test]
async fn test_checkout_failure_invokes_no_later_step() {
    let (result, runner) = run_python_ci(MockHost::new().fail_checkout()).await;

    assert_run_failed(&result);
    assert_execution_order(&result, &["Checkout"]);
    assert_step_outcome(&result, "Checkout", "fatal failure", Some("CheckoutError"));
    assert_skipped(&result, &STEP_NAMES[1..]);

    let host = runner.host();
    assert!(host.invoked("git clone"));
    assert!(!host.invoked("python"), "No interpreter may be probed after checkout fails");
    assert!(!host.invoked("pip"));
    assert!(result.environment.is_empty());
}

#[tokio::test]
async fn test_provisioning_failure_is_fatal() {
    let (result, runner) = run_python_ci(MockHost::new().with_python(None)).await;

    assert_run_failed(&result);
    assert_step_outcome(&result, "Set up Python", "fatal failure", Some("ProvisioningError"));
    assert_skipped(&result, &STEP_NAMES[2..]);
    assert!(!runner.host().invoked("pip install"));
}

#[tokio::test]
async fn test_wrong_interpreter_version_is_fatal() {
    let (result, _) = run_python_ci(MockHost::new().with_python(Some("3.12.7"))).await;

    assert_run_failed(&result);
    assert_step_outcome(&result, "Set up Python", "fatal failure", Some("ProvisioningError"));
}

#[tokio::test]
async fn test_failing_command_stops_run() {
    let yaml = r#"
on:
  push:
    branches: [main]
steps:
  - name: Lint
    run: flake8 .
  - name: Build
    run: make build
"#;
    let host = MockHost::new().with_command_status("flake8", 1);
    let (result, runner) = dispatch(yaml, host, push("main")).await;
    let result = result.unwrap();

    assert_run_failed(&result);
    assert_step_outcome(&result, "Lint", "fatal failure", Some("CommandFailed"));
    assert_skipped(&result, &["Build"]);
    assert!(!runner.host().invoked("make build"));
}

#[tokio::test]
async fn test_continue_on_error_lets_run_proceed() {
    let yaml = r#"
on:
  push:
    branches: [main]
steps:
  - name: Lint
    run: flake8 .
    continue-on-error: true
  - name: Build
    run: make build
"#;
    let host = MockHost::new().with_command_status("flake8", 1);
    let (result, _) = dispatch(yaml, host, push("main")).await;
    let result = result.unwrap();

    assert_run_succeeded(&result);
    assert_step_outcome(&result, "Lint", "tolerated failure", Some("CommandFailed"));
    assert!(is_success(&result.step("Build").unwrap().outcome));
    assert!(result.skipped_steps.is_empty());
}
