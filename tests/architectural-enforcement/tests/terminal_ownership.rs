//! Integration Test: Terminal Ownership
//!
//! The display draws both screen regions with absolute cursor addressing.
//! Anything else writing to the terminal tears that layout apart, so:
//!
//! - library code never prints with `println!`/`eprintln!`/`print!`/`dbg!`
//!   (the binary entry point may, after the session has closed)
//! - only the input module reads stdin

use std::path::Path;

use architectural_enforcement::{find_violations, is_entry_point, SourceLine};

fn report(violations: &[SourceLine], rule: &str) {
    if violations.is_empty() {
        return;
    }
    let listing: Vec<String> = violations.iter().map(|v| format!("  {v}")).collect();
    panic!(
        "\n{rule}\nFound {} violation(s):\n{}\n",
        violations.len(),
        listing.join("\n")
    );
}

#[test]
fn test_library_never_prints() {
    let violations = find_violations(
        |path| !is_entry_point(path),
        &["println!", "eprintln!", "print!(", "eprint!(", "dbg!("],
    );
    report(
        &violations,
        "Library code must not print; route text through the renderer or tracing.",
    );
}

#[test]
fn test_only_input_module_reads_stdin() {
    let violations = find_violations(
        |path: &Path| path.file_name().and_then(|s| s.to_str()) != Some("input.rs"),
        &["stdin()", "read_line(&mut io::stdin"],
    );
    report(
        &violations,
        "Only input.rs may read stdin; everything else receives lines as messages.",
    );
}
