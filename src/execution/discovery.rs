//! Test discovery - locate test files and read unittest summaries

use crate::core::report::TestFileReport;
use glob_match::glob_match;
use regex::Regex;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::OnceLock;

/// Find test files under `workspace/start_directory`.
///
/// Returns `Ok(None)` when the start directory does not exist. Paths are
/// relative to the workspace and sorted. Subdirectories are only entered
/// when they are packages (contain `__init__.py`). `pattern` is a glob
/// matched against file names.
pub fn discover_test_files(
    workspace: &Path,
    start_directory: &str,
    pattern: &str,
) -> io::Result<Option<Vec<PathBuf>>> {
    let root = workspace.join(start_directory);
    if !root.is_dir() {
        return Ok(None);
    }

    let mut found = Vec::new();
    walk(&root, workspace, pattern, &mut found)?;
    found.sort();
    Ok(Some(found))
}

fn walk(dir: &Path, workspace: &Path, pattern: &str, found: &mut Vec<PathBuf>) -> io::Result<()> {
    let mut entries = std::fs::read_dir(dir)?.collect::<Result<Vec<_>, _>>()?;
    entries.sort_by_key(|e| e.file_name());

    for entry in entries {
        let path = entry.path();
        let name = entry.file_name().to_string_lossy().into_owned();
        let file_type = entry.file_type()?;

        if file_type.is_dir() {
            if name.starts_with('.') || name == "__pycache__" {
                continue;
            }
            if path.join("__init__.py").is_file() {
                walk(&path, workspace, pattern, found)?;
            }
        } else if glob_match(pattern, &name) {
            let relative = path.strip_prefix(workspace).unwrap_or(&path).to_path_buf();
            found.push(relative);
        }
    }

    Ok(())
}

/// Dotted module name of a discovered file, relative to the start directory.
///
/// `tests/unit/test_unit.py` under `tests` becomes `unit.test_unit`, the name
/// unittest discovery imports it by with the start directory on `sys.path`.
pub fn module_name(start_directory: &str, file: &Path) -> Option<String> {
    let start = normal_components(Path::new(start_directory));
    let mut parts = normal_components(file);
    if parts.len() <= start.len() || !parts.starts_with(&start) {
        return None;
    }

    let file_name = parts.pop()?;
    let stem = Path::new(&file_name).file_stem()?.to_string_lossy().into_owned();
    parts.drain(..start.len());
    parts.push(stem);
    Some(parts.join("."))
}

fn normal_components(path: &Path) -> Vec<String> {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect()
}

/// Counts read from a unittest summary
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SuiteCounts {
    pub total: usize,
    pub failures: usize,
    pub errors: usize,
    pub skipped: usize,
    /// "NO TESTS RAN" was reported
    pub no_tests: bool,
}

/// Parse the trailing summary unittest writes to stderr:
///
/// ```text
/// Ran 3 tests in 0.002s
///
/// FAILED (failures=1, errors=1, skipped=1)
/// ```
pub fn parse_unittest_summary(output: &str) -> Option<SuiteCounts> {
    static RAN: OnceLock<Regex> = OnceLock::new();
    static STATUS: OnceLock<Regex> = OnceLock::new();
    static DETAIL: OnceLock<Regex> = OnceLock::new();

    let ran = RAN.get_or_init(|| Regex::new(r"(?m)^Ran (\d+) tests? in ").expect("valid regex"));
    let status = STATUS.get_or_init(|| {
        Regex::new(r"(?m)^(OK|FAILED|NO TESTS RAN)(?: \(([^)]*)\))?\s*$").expect("valid regex")
    });
    let detail = DETAIL.get_or_init(|| Regex::new(r"([a-z ]+)=(\d+)").expect("valid regex"));

    let total = ran
        .captures_iter(output)
        .last()
        .and_then(|caps| caps[1].parse::<usize>().ok())?;

    let mut counts = SuiteCounts {
        total,
        ..Default::default()
    };

    if let Some(caps) = status.captures_iter(output).last() {
        counts.no_tests = &caps[1] == "NO TESTS RAN";
        if let Some(details) = caps.get(2) {
            for item in detail.captures_iter(details.as_str()) {
                let value = item[2].parse::<usize>().unwrap_or(0);
                match item[1].trim() {
                    "failures" | "unexpected successes" => counts.failures += value,
                    "errors" => counts.errors += value,
                    "skipped" => counts.skipped += value,
                    _ => {}
                }
            }
        }
    }

    Some(counts)
}

/// Build the per-file report from a finished unittest invocation.
///
/// A non-zero exit without any recorded failure (for example an import
/// error before the summary) counts as one error.
pub fn file_report(path: &str, exit_code: i32, output: &str) -> TestFileReport {
    let counts = parse_unittest_summary(output);

    let mut report = TestFileReport {
        path: path.to_string(),
        exit_code,
        ..Default::default()
    };

    match counts {
        Some(counts) => {
            report.total = counts.total;
            report.failed = counts.failures;
            report.errors = counts.errors;
            report.skipped = counts.skipped;
            if exit_code != 0 && !counts.no_tests && counts.failures == 0 && counts.errors == 0 {
                report.errors = 1;
            }
        }
        None if exit_code != 0 => report.errors = 1,
        None => {}
    }

    report.passed = report
        .total
        .saturating_sub(report.failed + report.errors + report.skipped);
    report
}
