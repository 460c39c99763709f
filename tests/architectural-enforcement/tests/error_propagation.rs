//! Integration Test: Error Propagation
//!
//! Production code returns `Result` and propagates with `?`. A panic in the
//! UI task would leave the terminal in raw mode, so `unwrap()` and
//! `expect()` are confined to tests.

use architectural_enforcement::find_violations;

#[test]
fn test_no_unwrap_in_production_code() {
    let violations = find_violations(|_| true, &[".unwrap()", ".expect("]);

    if !violations.is_empty() {
        let listing: Vec<String> = violations.iter().map(|v| format!("  {v}")).collect();
        panic!(
            "\nFound {} unwrap/expect call(s) in production code:\n{}\n",
            violations.len(),
            listing.join("\n")
        );
    }
}
