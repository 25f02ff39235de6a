//! Architectural Enforcement Integration Tests
//!
//! This package contains integration tests that enforce architectural principles:
//! - No sleep() calls in production code (timers go through `tokio::time::interval`
//!   or explicit deadlines checked by `tick`)
//! - No blocking I/O inside async functions
//! - The core crate stays free of terminal UI dependencies
//!
//! The helpers below scan the workspace sources line by line.

use std::fs;
use std::path::{Path, PathBuf};

/// Production source directories, relative to the workspace root
pub const PRODUCTION_DIRS: [&str; 2] = ["glass/core/src", "tui/src"];

/// Workspace root (two levels above this package)
pub fn workspace_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("..")
}

/// A source file split into lines
pub struct SourceFile {
    /// Path relative to the workspace root
    pub path: PathBuf,
    /// File lines
    pub lines: Vec<String>,
}

impl SourceFile {
    /// Code part of line `idx` (comments stripped)
    pub fn code(&self, idx: usize) -> &str {
        let line = self.lines[idx].as_str();
        line.split("//").next().unwrap_or(line)
    }

    /// Index of the first line of the `#[cfg(test)]` module, if any
    pub fn test_module_start(&self) -> Option<usize> {
        self.lines
            .iter()
            .position(|l| l.trim_start().starts_with("#[cfg(test)]"))
    }

    /// Whether line `idx` is test-only code
    pub fn is_test_code(&self, idx: usize) -> bool {
        self.test_module_start().is_some_and(|start| idx >= start)
    }

    /// Signature line of the function enclosing line `idx`
    pub fn enclosing_fn(&self, idx: usize) -> Option<&str> {
        (0..=idx).rev().map(|i| self.lines[i].trim()).find(|l| {
            let l = l
                .trim_start_matches("pub(crate) ")
                .trim_start_matches("pub ");
            l.starts_with("fn ") || l.starts_with("async fn ")
        })
    }
}

/// All `.rs` files under the production directories
pub fn production_sources() -> Vec<SourceFile> {
    let root = workspace_root();
    let mut files = Vec::new();
    for dir in PRODUCTION_DIRS {
        for entry in walkdir::WalkDir::new(root.join(dir))
            .into_iter()
            .filter_map(Result::ok)
        {
            if entry.path().extension().and_then(|s| s.to_str()) != Some("rs") {
                continue;
            }
            let Ok(content) = fs::read_to_string(entry.path()) else {
                continue;
            };
            files.push(SourceFile {
                path: entry
                    .path()
                    .strip_prefix(&root)
                    .unwrap_or(entry.path())
                    .to_path_buf(),
                lines: content.lines().map(str::to_string).collect(),
            });
        }
    }
    files
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(src: &str) -> SourceFile {
        SourceFile {
            path: PathBuf::from("x.rs"),
            lines: src.lines().map(str::to_string).collect(),
        }
    }

    #[test]
    fn test_enclosing_fn() {
        let f = file("pub async fn load() {\n    let x = 1;\n}\nfn other() {\n    y();\n}");
        assert_eq!(f.enclosing_fn(1), Some("pub async fn load() {"));
        assert_eq!(f.enclosing_fn(4), Some("fn other() {"));
    }

    #[test]
    fn test_test_module_detection() {
        let f = file("fn a() {}\n#[cfg(test)]\nmod tests {\n    fn b() {}\n}");
        assert!(!f.is_test_code(0));
        assert!(f.is_test_code(3));
    }

    #[test]
    fn test_comments_are_stripped() {
        let f = file("let a = 1; // std::thread::sleep(d)");
        assert_eq!(f.code(0), "let a = 1; ");
    }

    #[test]
    fn test_workspace_sources_found() {
        let files = production_sources();
        assert!(files
            .iter()
            .any(|f| f.path.ends_with("glass/core/src/lib.rs")));
        assert!(files.iter().any(|f| f.path.ends_with("tui/src/app.rs")));
    }
}
