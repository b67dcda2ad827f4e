//! Scenario-based tests for workflow-runner

mod helpers;

mod dependency_tolerance;
mod short_circuit;
