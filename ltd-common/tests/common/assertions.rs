use serde_json::Value;
use std::path::Path;

pub fn assert_called(calls: &[String], expected: &str) {
    assert!(
        calls.iter().any(|call| call == expected),
        "Expected call '{expected}', got: {calls:#?}"
    );
}

pub fn assert_not_called(calls: &[String], prefix: &str) {
    assert!(
        !calls.iter().any(|call| call.starts_with(prefix)),
        "Expected no call starting with '{prefix}', got: {calls:#?}"
    );
}

/// Parse a JSON artifact, failing the test when it is missing.
pub fn assert_artifact(root: &Path, name: &str) -> Value {
    let path = root.join(name);
    assert!(path.is_file(), "Expected artifact to exist: {}", path.display());
    let text = std::fs::read_to_string(&path).expect("Failed to read artifact");
    serde_json::from_str(&text).expect("Artifact is not JSON")
}
