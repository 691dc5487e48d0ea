//! JSON output: stdout envelopes and result files

use std::fs;
use std::path::Path;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Wrapper for JSON output with metadata
#[derive(Debug, Serialize, Deserialize)]
pub struct JsonOutput<T> {
    /// The actual data
    pub data: T,

    /// Metadata about the response
    pub meta: Metadata,
}

/// Metadata included in JSON output
#[derive(Debug, Serialize, Deserialize)]
pub struct Metadata {
    /// Timestamp of the response
    pub timestamp: String,

    /// CLI version
    pub version: String,

    /// Number of items, for list output
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
}

impl<T> JsonOutput<T> {
    /// Create a new JSON output with metadata
    pub fn new(data: T) -> Self {
        Self {
            data,
            meta: Metadata {
                timestamp: Utc::now().to_rfc3339(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                count: None,
            },
        }
    }

    pub fn with_count(mut self, count: usize) -> Self {
        self.meta.count = Some(count);
        self
    }
}

/// Format a list as pretty-printed JSON with an item count
pub fn format_json_list<T: Serialize>(items: &[T]) -> Result<String> {
    let output = JsonOutput::new(items).with_count(items.len());
    Ok(serde_json::to_string_pretty(&output)?)
}

/// Write `value` as pretty JSON to `path`, creating parent directories.
///
/// Result files are plain documents, not wrapped in the stdout envelope.
pub fn write_json_file<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let mut content = serde_json::to_string_pretty(value)?;
    content.push('\n');
    fs::write(path, content)?;
    log::debug!("Wrote {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Serialize, Clone)]
    struct TestItem {
        arn: String,
    }

    #[test]
    fn test_json_output_new() {
        let output = JsonOutput::new(vec!["a", "b"]);

        assert_eq!(output.data, vec!["a", "b"]);
        assert_eq!(output.meta.version, env!("CARGO_PKG_VERSION"));
        assert!(!output.meta.timestamp.is_empty());
        assert!(output.meta.count.is_none());
    }

    #[test]
    fn test_format_json_list_counts_items() {
        let items = vec![
            TestItem { arn: "arn:aws:s3:::a".into() },
            TestItem { arn: "arn:aws:s3:::b".into() },
        ];
        let result = format_json_list(&items).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&result).unwrap();

        assert_eq!(parsed["meta"]["count"], 2);
        assert_eq!(parsed["data"][1]["arn"], "arn:aws:s3:::b");
    }

    #[test]
    fn test_format_json_list_empty() {
        let items: Vec<TestItem> = vec![];
        let result = format_json_list(&items).unwrap();
        assert!(result.contains("\"data\": []"));
        assert!(result.contains("\"count\": 0"));
    }

    #[test]
    fn test_write_json_file_is_plain_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("out.json");

        write_json_file(&path, &serde_json::json!({"total": 1})).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert_eq!(parsed, serde_json::json!({"total": 1}));
    }
}
