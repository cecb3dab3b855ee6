//! Golden-file tests for request conversion and frame classification.

use std::fs;
use std::path::PathBuf;

use pretty_assertions::assert_eq;
use serde::de::DeserializeOwned;

mod gemini;

pub struct GoldenTest {
    root: PathBuf,
}

impl GoldenTest {
    pub fn new(suite: &str) -> Self {
        let manifest_dir = std::env::var("CARGO_MANIFEST_DIR").expect("CARGO_MANIFEST_DIR not set");
        let root = PathBuf::from(manifest_dir)
            .join("tests")
            .join("golden")
            .join("data")
            .join(suite);
        Self { root }
    }

    pub fn load_json<T: DeserializeOwned>(&self, name: &str) -> T {
        let path = self.root.join(format!("{name}.json"));
        let content = fs::read_to_string(&path)
            .unwrap_or_else(|_| panic!("Failed to read golden file: {path:?}"));
        serde_json::from_str(&content)
            .unwrap_or_else(|e| panic!("Failed to parse golden file {path:?}: {e}"))
    }

    /// Compare `actual` with the stored JSON, ignoring formatting.
    pub fn assert_json<T: serde::Serialize>(&self, name: &str, actual: &T) {
        let expected: serde_json::Value = self.load_json(name);
        let actual = serde_json::to_value(actual).expect("Failed to serialize actual value");
        assert_eq!(expected, actual, "Golden test failed for {name}");
    }
}
