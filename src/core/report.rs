//! Test execution counts

use serde::Serialize;

/// Counts for one discovered test file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TestFileReport {
    /// Path relative to the working directory
    pub path: String,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub errors: usize,
    pub skipped: usize,
    pub exit_code: i32,
}

impl TestFileReport {
    pub fn is_clean(&self) -> bool {
        self.failed == 0 && self.errors == 0
    }
}

/// Aggregated counts across all discovered files
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TestReport {
    pub files: Vec<TestFileReport>,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub errors: usize,
    pub skipped: usize,
}

impl TestReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, file: TestFileReport) {
        self.total += file.total;
        self.passed += file.passed;
        self.failed += file.failed;
        self.errors += file.errors;
        self.skipped += file.skipped;
        self.files.push(file);
    }

    /// Any failing or erroring case
    pub fn has_failures(&self) -> bool {
        self.failed > 0 || self.errors > 0
    }

    pub fn summary(&self) -> String {
        format!(
            "{} files, {} tests: {} passed, {} failed, {} errors, {} skipped",
            self.files.len(),
            self.total,
            self.passed,
            self.failed,
            self.errors,
            self.skipped
        )
    }
}
