//! Directory maps of source repositories
//!
//! A mapping file is a JSON object keyed by `owner/repo`. Each value is
//! either a nested directory tree (`{"network": {"vpc": {}}}`) or an
//! `{"error": "..."}` record for a repository that could not be read.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Nested directory tree; a leaf is an empty map
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DirTree(pub BTreeMap<String, DirTree>);

impl DirTree {
    /// Build a tree from slash-separated directory paths
    pub fn from_paths<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut root = DirTree::default();
        for path in paths {
            let mut node = &mut root;
            for part in path.as_ref().split('/').filter(|p| !p.is_empty()) {
                node = node.0.entry(part.to_string()).or_default();
            }
        }
        root
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Every directory in the tree, leaves and parents alike
    pub fn count(&self) -> usize {
        self.0.values().map(|child| 1 + child.count()).sum()
    }

    /// Paths of directories that have no subdirectories
    pub fn leaf_directories(&self) -> Vec<String> {
        let mut leaves = Vec::new();
        self.collect_leaves("", &mut leaves);
        leaves
    }

    fn collect_leaves(&self, prefix: &str, leaves: &mut Vec<String>) {
        for (name, child) in &self.0 {
            let path = if prefix.is_empty() {
                name.clone()
            } else {
                format!("{}/{}", prefix, name)
            };
            if child.is_empty() {
                leaves.push(path);
            } else {
                child.collect_leaves(&path, leaves);
            }
        }
    }
}

/// One repository's entry in a mapping file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RepoMapping {
    Failed { error: String },
    Tree(DirTree),
}

/// Mapping file contents keyed by `owner/repo`
pub type Mapping = BTreeMap<String, RepoMapping>;

pub fn load_mapping(path: &Path) -> Result<Mapping> {
    let content = fs::read_to_string(path).map_err(|e| {
        Error::Other(format!(
            "cannot read mapping file {}: {}",
            path.display(),
            e
        ))
    })?;
    Ok(serde_json::from_str(&content)?)
}

pub fn save_mapping(path: &Path, mapping: &Mapping) -> Result<()> {
    crate::output::json::write_json_file(path, mapping)
}
