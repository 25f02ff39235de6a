//! Integration Test: Async Discipline
//!
//! **Policy**: Production code in the core and the TUI never sleeps and never
//! blocks inside an async function. Feedback windows, polling and location
//! reports are deadlines checked on `tick`; the TUI drives `tick` from
//! `tokio::time::interval`.
//!
//! Blocking file access is fine in plain functions that run before the event
//! loop starts (config loading, log file setup).

use architectural_enforcement::production_sources;

/// Test that production code does not contain sleep() calls
#[test]
fn test_no_sleep_in_production_code() {
    let mut violations = Vec::new();

    for file in production_sources() {
        for idx in 0..file.lines.len() {
            if file.is_test_code(idx) {
                break;
            }
            let code = file.code(idx);
            if code.contains("::sleep(") || code.contains(".sleep(") {
                violations.push(format!(
                    "{}:{} - {}",
                    file.path.display(),
                    idx + 1,
                    file.lines[idx].trim()
                ));
            }
        }
    }

    if !violations.is_empty() {
        for violation in &violations {
            eprintln!("  sleep: {violation}");
        }
        panic!(
            "\nFound {} sleep call(s) in production code. Use a deadline and tick, or tokio::time::interval.",
            violations.len()
        );
    }
}

/// Blocking calls that must not appear inside an async fn
const BLOCKING: [&str; 5] = [
    "std::fs::",
    "std::net::",
    "std::thread::sleep",
    "reqwest::blocking",
    ".output()",
];

/// Test that async functions do not block the runtime
#[test]
fn test_no_blocking_io_in_async_fns() {
    let mut violations = Vec::new();

    for file in production_sources() {
        for idx in 0..file.lines.len() {
            if file.is_test_code(idx) {
                break;
            }
            let code = file.code(idx);
            if !BLOCKING.iter().any(|pattern| code.contains(pattern)) {
                continue;
            }
            let in_async = file
                .enclosing_fn(idx)
                .is_some_and(|signature| signature.contains("async fn"));
            if in_async {
                violations.push(format!(
                    "{}:{} - {}",
                    file.path.display(),
                    idx + 1,
                    file.lines[idx].trim()
                ));
            }
        }
    }

    if !violations.is_empty() {
        for violation in &violations {
            eprintln!("  blocking: {violation}");
        }
        panic!(
            "\nFound {} blocking call(s) inside async functions.",
            violations.len()
        );
    }
}

/// Test that the core crate has no UI framework dependencies
#[test]
fn test_core_has_no_tui_dependencies() {
    let manifest = std::fs::read_to_string(
        architectural_enforcement::workspace_root().join("glass/core/Cargo.toml"),
    )
    .unwrap();

    for forbidden in ["ratatui", "crossterm"] {
        assert!(
            !manifest.contains(forbidden),
            "glass-core must not depend on {forbidden}"
        );
    }

    for file in production_sources()
        .iter()
        .filter(|f| f.path.starts_with("glass"))
    {
        for line in &file.lines {
            assert!(
                !line.contains("use ratatui") && !line.contains("use crossterm"),
                "{} imports a terminal UI crate",
                file.path.display()
            );
        }
    }
}
