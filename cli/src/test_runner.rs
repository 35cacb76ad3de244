use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use interpreter::InterpretError;

use crate::fixture::{Expect, Fixture, FixtureRun};

const SUFFIX: &str = ".test.toml";

pub enum TestOutcome {
    Pass,
    Fail(String),
}

pub struct TestResult {
    pub path: PathBuf,
    pub description: Option<String>,
    pub outcome: TestOutcome,
}

fn run_single_test(path: &Path) -> TestResult {
    let fixture = match Fixture::load(path) {
        Ok(fixture) => fixture,
        Err(e) => {
            return TestResult {
                path: path.to_path_buf(),
                description: None,
                outcome: TestOutcome::Fail(e),
            };
        }
    };
    let description = fixture.description.clone();

    let outcome = match fixture.run(&fixture.interpreter) {
        Ok(run) => match check(&fixture.expect, &run) {
            None => TestOutcome::Pass,
            Some(reason) => TestOutcome::Fail(reason),
        },
        Err(e) => TestOutcome::Fail(format!("cannot build document: {}", e)),
    };

    TestResult {
        path: path.to_path_buf(),
        description,
        outcome,
    }
}

/// Compare a run against expectations. Returns `Some(reason)` on mismatch.
fn check(expect: &Expect, run: &FixtureRun) -> Option<String> {
    let failed = match &run.result {
        Err(InterpretError::CommandsFailed(n)) => *n,
        _ => 0,
    };

    match (&expect.error, &run.result) {
        (Some(expected), Err(error)) => {
            let message = error.to_string();
            if !message.contains(expected.as_str()) {
                return Some(format!(
                    "expected error containing \"{}\", got: {}",
                    expected, message
                ));
            }
        }
        (Some(expected), Ok(_)) => {
            return Some(format!(
                "expected error containing \"{}\", but interpretation succeeded",
                expected
            ));
        }
        (None, Err(InterpretError::CommandsFailed(_))) if expect.failed.is_some() => {}
        (None, Err(error)) => return Some(format!("unexpected error: {}", error)),
        (None, Ok(_)) => {}
    }

    if let Some(expected) = expect.failed {
        if expected != failed {
            return Some(format!("expected {} failed command(s), got {}", expected, failed));
        }
    }

    if let Some(expected) = &expect.tree {
        let actual = normalize(&run.tree);
        let expected = normalize(expected);
        if actual != expected {
            return Some(format!(
                "tree mismatch\n  expected:\n{}\n  actual:\n{}",
                indent(&expected),
                indent(&actual)
            ));
        }
    }

    if let Some(expected) = &expect.names {
        let actual = run.document.names();
        if &actual != expected {
            return Some(format!(
                "marker names mismatch\n  expected:\n{}\n  actual:\n{}",
                indent(&expected.join("\n")),
                indent(&actual.join("\n"))
            ));
        }
    }

    None
}

fn normalize(text: &str) -> String {
    text.trim_matches('\n')
        .lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n")
}

fn indent(text: &str) -> String {
    text.lines()
        .map(|line| format!("    {}", line))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Discover fixtures grouped by category (subfolder relative to root).
/// Files directly in `root` get category "" (uncategorized).
fn discover_categorized(root: &Path) -> BTreeMap<String, Vec<PathBuf>> {
    let mut categories: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();
    collect_tests(root, root, &mut categories);
    for files in categories.values_mut() {
        files.sort();
    }
    categories
}

fn collect_tests(dir: &Path, root: &Path, out: &mut BTreeMap<String, Vec<PathBuf>>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_tests(&path, root, out);
        } else if path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|name| name.ends_with(SUFFIX))
        {
            let category = path
                .parent()
                .and_then(|p| p.strip_prefix(root).ok())
                .map(|p| p.to_string_lossy().replace('\\', "/"))
                .unwrap_or_default();
            out.entry(category).or_default().push(path);
        }
    }
}

pub fn list_categories(path: &Path) {
    if path.is_file() {
        eprintln!("(single file, no categories)");
        return;
    }

    let categories = discover_categorized(path);
    if categories.is_empty() {
        eprintln!("no {} files found in {}", SUFFIX, path.display());
        return;
    }

    eprintln!("available categories:");
    for (cat, files) in &categories {
        let label = if cat.is_empty() { "(root)" } else { cat.as_str() };
        eprintln!("  {} ({} tests)", label, files.len());
    }
}

fn pass_label(no_color: bool) -> &'static str {
    if no_color { "PASS" } else { "\x1b[32mPASS\x1b[0m" }
}

fn fail_label(no_color: bool) -> &'static str {
    if no_color { "FAIL" } else { "\x1b[31mFAIL\x1b[0m" }
}

fn bold(s: &str, no_color: bool) -> String {
    if no_color {
        s.to_string()
    } else {
        format!("\x1b[1m{}\x1b[0m", s)
    }
}

fn label_of(result: &TestResult) -> &str {
    result.description.as_deref().unwrap_or_else(|| {
        result
            .path
            .file_name()
            .and_then(|s| s.to_str())
            .map(|s| s.trim_end_matches(SUFFIX))
            .unwrap_or("?")
    })
}

/// Select the categories to run. Unknown requests are reported and skipped.
fn select<'a>(
    all: &'a BTreeMap<String, Vec<PathBuf>>,
    requested: &[String],
) -> BTreeMap<&'a str, &'a Vec<PathBuf>> {
    if requested.is_empty() {
        return all.iter().map(|(k, v)| (k.as_str(), v)).collect();
    }
    let mut selected = BTreeMap::new();
    for request in requested {
        let request = request.trim_matches('/');
        let before = selected.len();
        for (cat, files) in all {
            if cat == request || cat.starts_with(&format!("{}/", request)) {
                selected.insert(cat.as_str(), files);
            }
        }
        if selected.len() == before {
            eprintln!(
                "warning: category '{}' not found (available: {})",
                request,
                all.keys()
                    .map(|k| if k.is_empty() { "(root)" } else { k.as_str() })
                    .collect::<Vec<_>>()
                    .join(", ")
            );
        }
    }
    selected
}

/// Run all fixtures under `path` (or a single file).
/// Returns exit code: 0 = all pass, 1 = any failure.
pub fn run_tests(path: &Path, no_color: bool, categories: &[String]) -> i32 {
    let results: Vec<(String, Vec<TestResult>)> = if path.is_file() {
        vec![(String::new(), vec![run_single_test(path)])]
    } else {
        let all = discover_categorized(path);
        if all.is_empty() {
            eprintln!("no {} files found in {}", SUFFIX, path.display());
            return 1;
        }
        let selected = select(&all, categories);
        if selected.is_empty() {
            eprintln!("no matching categories found");
            return 1;
        }
        selected
            .into_iter()
            .map(|(cat, files)| (cat.to_string(), files.iter().map(|f| run_single_test(f)).collect()))
            .collect()
    };

    let mut passed = 0usize;
    let mut failures: Vec<&TestResult> = Vec::new();

    for (cat, results) in &results {
        if path.is_dir() {
            eprintln!();
            eprintln!("{}", bold(if cat.is_empty() { "(root)" } else { cat.as_str() }, no_color));
        }
        for result in results {
            match &result.outcome {
                TestOutcome::Pass => {
                    passed += 1;
                    eprintln!("  {}  {}", pass_label(no_color), label_of(result));
                }
                TestOutcome::Fail(_) => {
                    eprintln!("  {}  {}", fail_label(no_color), label_of(result));
                    failures.push(result);
                }
            }
        }
    }

    if !failures.is_empty() {
        eprintln!();
        eprintln!("failures:");
        for f in &failures {
            eprintln!();
            eprintln!("  --- {} ---", f.path.display());
            if let TestOutcome::Fail(reason) = &f.outcome {
                for line in reason.lines() {
                    eprintln!("  {}", line);
                }
            }
        }
    }

    eprintln!();
    let failed = failures.len();
    if failed == 0 {
        let ok = if no_color { "ok" } else { "\x1b[32mok\x1b[0m" };
        eprintln!("test result: {}. {} passed, 0 failed", ok, passed);
        0
    } else {
        let bad = if no_color { "FAILED" } else { "\x1b[31mFAILED\x1b[0m" };
        eprintln!(
            "test result: {}. {} passed, {} failed (of {})",
            bad,
            passed,
            failed,
            passed + failed
        );
        1
    }
}
