//! Architecture guard tests for the slotkeeper workspace.
//!
//! These tests scan source files to enforce design-level consistency:
//! - Error handling style (thiserror vs hand-written Display)
//! - No `Result<_, String>` in slotkeeper-core
//! - No `.unwrap()` in production code
//! - File size limits
//! - No bare generic type names for public types
//!
//! Run: `cargo test --package slotkeeper-core --test architecture_guards -- --nocapture`

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn collect_rs_files(dir: &Path, filter: &dyn Fn(&Path) -> bool) -> Vec<PathBuf> {
    let mut result = Vec::new();
    if !dir.exists() {
        return result;
    }
    for entry in walkdir(dir) {
        if entry.extension().is_some_and(|e| e == "rs") && filter(&entry) {
            result.push(entry);
        }
    }
    result
}

/// Simple recursive directory walk (no external dep).
fn walkdir(dir: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    if let Ok(entries) = fs::read_dir(dir) {
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                files.extend(walkdir(&path));
            } else {
                files.push(path);
            }
        }
    }
    files
}

fn workspace_root() -> PathBuf {
    let manifest = PathBuf::from(env!("CARGO_MANIFEST_DIR")); // crates/slotkeeper-core
    manifest
        .parent()
        .and_then(|p| p.parent())
        .expect("cannot determine workspace root")
        .to_path_buf()
}

/// Source files that only exist for tests (`tests/`, `testing.rs`, `*_tests.rs`).
fn is_test_file(path: &Path) -> bool {
    let s = path.to_string_lossy();
    s.contains("/tests/") || s.contains("/test") || s.ends_with("_tests.rs")
}

fn rel(path: &Path, root: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .into_owned()
}

/// Lines of a file up to its first `#[cfg(test)]` item.
fn production_lines(content: &str) -> impl Iterator<Item = (usize, &str)> {
    content
        .lines()
        .enumerate()
        .take_while(|(_, line)| line.trim() != "#[cfg(test)]")
}

fn report(code: &str, headline: &str, violations: &[(String, usize, String)]) {
    if violations.is_empty() {
        return;
    }
    let mut msg = format!("\n[{code}] {headline}\n\n");
    for (file, line, text) in violations {
        msg.push_str(&format!("  {}:{} -> {}\n", file, line, text));
    }
    msg.push_str("\nAdd to allowlist in architecture_guards.rs if intentional.\n");
    panic!("{msg}");
}

// ---------------------------------------------------------------------------
// RS-ERR-01: Error types must use thiserror, no hand-written Display
// ---------------------------------------------------------------------------

#[test]
fn test_error_types_use_thiserror() {
    let root = workspace_root();
    let files = collect_rs_files(&root.join("crates"), &|p| !is_test_file(p));
    let mut violations = Vec::new();

    for file in &files {
        let Ok(content) = fs::read_to_string(file) else {
            continue;
        };
        for (i, line) in content.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.starts_with("impl")
                && trimmed.contains("Display for")
                && trimmed.contains("Error")
            {
                violations.push((rel(file, &root), i + 1, trimmed.to_string()));
            }
        }
    }

    report(
        "RS-ERR-01",
        "Hand-written Display for Error types detected. Use #[derive(thiserror::Error)] instead.",
        &violations,
    );
}

// ---------------------------------------------------------------------------
// RS-ERR-02: No Result<_, String> in slotkeeper-core
// ---------------------------------------------------------------------------

#[test]
fn test_no_result_string_in_core() {
    let root = workspace_root();
    let files = collect_rs_files(&root.join("crates/slotkeeper-core/src"), &|p| {
        !is_test_file(p)
    });
    let mut violations = Vec::new();

    for file in &files {
        let Ok(content) = fs::read_to_string(file) else {
            continue;
        };
        for (i, line) in content.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.starts_with("//") || trimmed.starts_with('*') {
                continue;
            }
            if let Some(pos) = trimmed.find("Result") {
                let after = &trimmed[pos..];
                let is_alias = trimmed[..pos].ends_with("Slotkeeper");
                if !is_alias && (after.contains(", String>") || after.contains(",String>")) {
                    violations.push((rel(file, &root), i + 1, trimmed.to_string()));
                }
            }
        }
    }

    report(
        "RS-ERR-02",
        "Result<_, String> found in slotkeeper-core. Use SlotkeeperResult instead.",
        &violations,
    );
}

// ---------------------------------------------------------------------------
// RS-ERR-03: No .unwrap() outside test code
// ---------------------------------------------------------------------------

#[test]
fn test_no_unwrap_in_production_code() {
    let root = workspace_root();
    let files = collect_rs_files(&root.join("crates"), &|p| !is_test_file(p));
    let mut violations = Vec::new();

    for file in &files {
        let Ok(content) = fs::read_to_string(file) else {
            continue;
        };
        for (i, line) in production_lines(&content) {
            let trimmed = line.trim();
            if trimmed.starts_with("//") {
                continue;
            }
            if trimmed.contains(".unwrap()") {
                violations.push((rel(file, &root), i + 1, trimmed.to_string()));
            }
        }
    }

    report(
        "RS-ERR-03",
        "`.unwrap()` in production code. Propagate with `?` or handle the None/Err case.",
        &violations,
    );
}

// ---------------------------------------------------------------------------
// RS-SIZE-01: File size limits (500 production lines)
// ---------------------------------------------------------------------------

#[test]
fn test_file_size_limits() {
    let root = workspace_root();
    const MAX_LINES: usize = 500;

    let allowlist: HashSet<&str> = [
        "crates/slotkeeper-core/src/lifecycle.rs", // save/load/acquire share private helpers
    ]
    .into_iter()
    .collect();

    let files = collect_rs_files(&root.join("crates"), &|p| !is_test_file(p));
    let mut violations = Vec::new();

    for file in &files {
        let Ok(content) = fs::read_to_string(file) else {
            continue;
        };
        let relative = rel(file, &root);
        if allowlist.contains(relative.as_str()) {
            continue;
        }
        let count = production_lines(&content).count();
        if count > MAX_LINES {
            violations.push((relative, count, format!("{count} lines")));
        }
    }

    report(
        "RS-SIZE-01",
        "Files exceeding 500 production lines (split into submodules).",
        &violations,
    );
}

// ---------------------------------------------------------------------------
// RS-NAME-01: No bare generic type names for public types
// ---------------------------------------------------------------------------

#[test]
fn test_no_bare_generic_type_names() {
    let root = workspace_root();
    let bare_names: HashSet<&str> = ["Error", "Config", "Status", "Result", "Context"]
        .into_iter()
        .collect();

    let files = collect_rs_files(&root.join("crates"), &|p| !is_test_file(p));
    let mut violations = Vec::new();

    for file in &files {
        let Ok(content) = fs::read_to_string(file) else {
            continue;
        };
        for (i, line) in content.lines().enumerate() {
            let trimmed = line.trim();
            if !trimmed.starts_with("pub struct") && !trimmed.starts_with("pub enum") {
                continue;
            }
            let type_name = trimmed
                .trim_start_matches("pub struct ")
                .trim_start_matches("pub enum ")
                .split(|c: char| !c.is_alphanumeric() && c != '_')
                .next()
                .unwrap_or("");
            if bare_names.contains(type_name) {
                violations.push((rel(file, &root), i + 1, trimmed.to_string()));
            }
        }
    }

    report(
        "RS-NAME-01",
        "Bare generic type names for public types. Use a domain prefix: SlotkeeperError, BackendConfig.",
        &violations,
    );
}
