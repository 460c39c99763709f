//! Architectural Enforcement Integration Tests
//!
//! This package contains integration tests that enforce architectural principles
//! of the display crate:
//! - The library never prints to stdout/stderr (it owns the screen layout)
//! - Only the input module touches stdin
//! - Production code propagates errors instead of unwrapping
//!
//! These helpers read the crate's sources and hand the tests the production
//! lines only: comments are stripped and everything from the first
//! `#[cfg(test)]` onward is skipped.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Root of the workspace this package lives in
pub fn workspace_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../..")
}

/// Source directory of the display crate
pub fn display_sources() -> PathBuf {
    workspace_root().join("tui/src")
}

/// All `.rs` files under `dir`, sorted
pub fn rust_sources(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = walkdir::WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.path().extension().and_then(|s| s.to_str()) == Some("rs"))
        .map(|e| e.into_path())
        .collect();
    files.sort();
    files
}

/// One line of production code
#[derive(Debug, Clone)]
pub struct SourceLine {
    pub path: PathBuf,
    pub number: usize,
    /// The line with any `//` comment removed
    pub code: String,
}

impl std::fmt::Display for SourceLine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{} - {}", self.path.display(), self.number, self.code.trim())
    }
}

/// Production lines of a file: comments stripped, test module excluded
pub fn production_lines(path: &Path) -> io::Result<Vec<SourceLine>> {
    let content = fs::read_to_string(path)?;
    let mut lines = Vec::new();

    for (idx, line) in content.lines().enumerate() {
        if line.trim() == "#[cfg(test)]" {
            break;
        }
        let code = line.split("//").next().unwrap_or(line);
        if code.trim().is_empty() {
            continue;
        }
        lines.push(SourceLine {
            path: path.to_path_buf(),
            number: idx + 1,
            code: code.to_string(),
        });
    }

    Ok(lines)
}

/// Whether a file is a binary entry point rather than library code
pub fn is_entry_point(path: &Path) -> bool {
    path.file_name().and_then(|s| s.to_str()) == Some("main.rs")
}

/// Production lines across the display crate containing any of `patterns`
pub fn find_violations<F>(include: F, patterns: &[&str]) -> Vec<SourceLine>
where
    F: Fn(&Path) -> bool,
{
    let mut violations = Vec::new();
    for file in rust_sources(&display_sources()) {
        if !include(&file) {
            continue;
        }
        let Ok(lines) = production_lines(&file) else {
            continue;
        };
        violations.extend(
            lines
                .into_iter()
                .filter(|line| patterns.iter().any(|p| line.code.contains(p))),
        );
    }
    violations
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_production_lines_skip_comments_and_tests() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "//! docs println!(\"x\")").unwrap();
        writeln!(file, "fn a() {{ let x = 1; }} // println!").unwrap();
        writeln!(file, "#[cfg(test)]").unwrap();
        writeln!(file, "fn b() {{ println!(\"test\"); }}").unwrap();
        file.flush().unwrap();

        let lines = production_lines(file.path()).unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].number, 2);
        assert!(!lines[0].code.contains("println"));
    }

    #[test]
    fn test_display_sources_found() {
        let files = rust_sources(&display_sources());
        assert!(files.iter().any(|f| f.ends_with("display.rs")));
        assert!(files.iter().any(|f| is_entry_point(f)));
    }
}
