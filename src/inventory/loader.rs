// Copyright 2025 Lablup Inc. and Jeongkyu Shin
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Inventory document loading and merging.
//!
//! An inventory is a directory of YAML documents read in file name order.
//! Each document may contribute three top-level sections:
//!
//! ```yaml
//! Defaults:
//!   user: ops
//!   identity-file: ~/.ssh/id_cluster
//! Nodes:
//!   web1: { ip: 10.0.0.11 }
//!   web2: { ip: 10.0.0.12, port: 2222 }
//! Groups:
//!   edge: [web1, web2]
//! ```
//!
//! Documents that are empty or are not valid YAML are skipped. A node whose
//! attributes cannot be interpreted is skipped without affecting its siblings.

use anyhow::{bail, Context};
use serde_yaml::{Mapping, Value};
use std::path::{Path, PathBuf};
use tokio::fs;

use super::types::{GroupSpec, Inventory, NodeAttributes, NodeSpec};
use crate::error::{Error, Result};

const NODES_KEY: &str = "Nodes";
const GROUPS_KEY: &str = "Groups";
const DEFAULTS_KEY: &str = "Defaults";

/// Fully typed content of one document, built before anything is merged so
/// that a structurally malformed document never contributes partial state.
/// A single node with unusable attributes is dropped on its own.
#[derive(Debug, Default)]
struct ParsedDocument {
    nodes: Vec<NodeSpec>,
    groups: Vec<GroupSpec>,
    defaults: Option<NodeAttributes>,
}

fn key_to_string(key: &Value) -> anyhow::Result<String> {
    match key {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        other => bail!("unsupported key {other:?}"),
    }
}

fn section<'a>(mapping: &'a Mapping, key: &str) -> anyhow::Result<Option<&'a Mapping>> {
    match mapping.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Mapping(m)) => Ok(Some(m)),
        Some(_) => bail!("'{key}' must be a mapping"),
    }
}

fn parse_document(content: &str) -> anyhow::Result<Option<ParsedDocument>> {
    let value: Value = serde_yaml::from_str(content).context("invalid YAML")?;
    let mapping = match value {
        Value::Null => return Ok(None),
        Value::Mapping(m) if m.is_empty() => return Ok(None),
        Value::Mapping(m) => m,
        _ => bail!("top level must be a mapping"),
    };

    let mut doc = ParsedDocument::default();

    if let Some(nodes) = section(&mapping, NODES_KEY)? {
        for (key, attrs) in nodes {
            let id = key_to_string(key)?;
            let attributes = match attrs {
                Value::Null => NodeAttributes::default(),
                other => match serde_yaml::from_value(other.clone()) {
                    Ok(attributes) => attributes,
                    Err(e) => {
                        tracing::warn!("Skipping node '{id}': invalid attributes: {e}");
                        continue;
                    }
                },
            };
            doc.nodes.push(NodeSpec { id, attributes });
        }
    }

    if let Some(groups) = section(&mapping, GROUPS_KEY)? {
        for (key, members) in groups {
            let id = key_to_string(key)?;
            let members = match members {
                Value::Null => Vec::new(),
                Value::Sequence(items) => items
                    .iter()
                    .map(key_to_string)
                    .collect::<anyhow::Result<Vec<_>>>()
                    .with_context(|| format!("invalid member list for group '{id}'"))?,
                _ => bail!("group '{id}' must be a list of node names"),
            };
            doc.groups.push(GroupSpec { id, members });
        }
    }

    if let Some(defaults) = mapping.get(DEFAULTS_KEY) {
        if !defaults.is_null() {
            doc.defaults = Some(
                serde_yaml::from_value(defaults.clone()).context("invalid 'Defaults' section")?,
            );
        }
    }

    Ok(Some(doc))
}

impl Inventory {
    /// Merge one document into the inventory.
    ///
    /// Returns `false` when the document was skipped (empty or unparsable).
    /// `source` only labels log messages.
    pub fn merge_document(&mut self, source: &str, content: &str) -> bool {
        let doc = match parse_document(content) {
            Ok(Some(doc)) => doc,
            Ok(None) => {
                tracing::debug!("Skipping empty inventory document {source}");
                return false;
            }
            Err(e) => {
                tracing::warn!("Skipping inventory document {source}: {e:#}");
                return false;
            }
        };

        tracing::debug!(
            "Inventory document {source}: {} node(s), {} group(s)",
            doc.nodes.len(),
            doc.groups.len()
        );

        for node in doc.nodes {
            self.insert_node(node);
        }
        for group in doc.groups {
            self.insert_group(group);
        }
        if let Some(defaults) = doc.defaults {
            self.defaults.merge_from(defaults);
        }
        true
    }

    /// Build an inventory from in-memory documents, merged in order.
    pub fn from_documents<'a>(documents: impl IntoIterator<Item = &'a str>) -> Self {
        let mut inventory = Self::new();
        for (idx, content) in documents.into_iter().enumerate() {
            inventory.merge_document(&format!("#{idx}"), content);
        }
        inventory
    }

    /// Load every `*.yml` / `*.yaml` document under `dir`, sorted by file name.
    pub async fn load_dir(dir: &Path) -> Result<Self> {
        let inventory_error = |source: std::io::Error| Error::Inventory {
            path: dir.to_path_buf(),
            source,
        };

        let mut entries = fs::read_dir(dir).await.map_err(inventory_error)?;
        let mut files: Vec<PathBuf> = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(inventory_error)? {
            let path = entry.path();
            let is_yaml = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext == "yml" || ext == "yaml");
            if is_yaml && path.is_file() {
                files.push(path);
            }
        }
        files.sort();

        let mut inventory = Self::new();
        for path in files {
            match fs::read_to_string(&path).await {
                Ok(content) => {
                    inventory.merge_document(&path.display().to_string(), &content);
                }
                Err(e) => {
                    tracing::warn!("Skipping unreadable inventory document {path:?}: {e}");
                }
            }
        }

        tracing::debug!(
            "Loaded inventory from {dir:?}: {} node(s), {} group(s)",
            inventory.nodes.len(),
            inventory.groups.len()
        );
        Ok(inventory)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_nodes_groups_and_defaults() {
        let inventory = Inventory::from_documents([r#"
Defaults:
  user: ops
Nodes:
  web1:
    ip: 10.0.0.11
    identity-file: ~/.ssh/web
    proxy-suffix: ext
    rack: r12
  web2:
Groups:
  edge: [web1, web2]
"#]);

        let web1 = inventory.node("web1").unwrap();
        assert_eq!(web1.address(), "10.0.0.11");
        assert_eq!(web1.attributes.identity_file.as_deref(), Some("~/.ssh/web"));
        assert_eq!(web1.attributes.proxy_suffix.as_deref(), Some("ext"));
        assert_eq!(
            web1.attributes.extra.get("rack"),
            Some(&Value::String("r12".to_string()))
        );

        assert_eq!(inventory.node("web2").unwrap().address(), "web2");
        assert_eq!(inventory.group("edge").unwrap().members, vec!["web1", "web2"]);
        assert_eq!(inventory.defaults().user.as_deref(), Some("ops"));
    }

    #[test]
    fn test_later_documents_override() {
        let inventory = Inventory::from_documents([
            "Nodes:\n  a: { port: 22 }\n  b: {}\nGroups:\n  g: [a]\n",
            "Nodes:\n  a: { port: 2222 }\nGroups:\n  g: [b]\n",
        ]);

        let ids: Vec<_> = inventory.nodes().iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(inventory.node("a").unwrap().attributes.port, Some(2222));
        assert_eq!(inventory.group("g").unwrap().members, vec!["b"]);
    }

    #[test]
    fn test_bad_and_empty_documents_are_skipped() {
        let mut inventory = Inventory::new();
        assert!(!inventory.merge_document("empty", ""));
        assert!(!inventory.merge_document("null", "~"));
        assert!(!inventory.merge_document("broken", "Nodes: [unclosed"));
        assert!(!inventory.merge_document("scalar", "just a string"));
        assert!(inventory.merge_document("good", "Nodes:\n  a: {}\n"));
        assert_eq!(inventory.nodes().len(), 1);
    }

    #[test]
    fn test_bad_node_does_not_drop_its_siblings() {
        let inventory = Inventory::from_documents([
            "Nodes:\n  web1: { ip: 10.0.0.1 }\n  web2: { ip: 10.0.0.2, port: nope }\n  web3: { ip: 10.0.0.3 }\nGroups:\n  edge: [web1, web2, web3]\n",
        ]);

        let ids: Vec<_> = inventory.nodes().iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["web1", "web3"]);
        assert_eq!(inventory.group("edge").unwrap().members.len(), 3);
        assert_eq!(inventory.node("web3").unwrap().address(), "10.0.0.3");

        let selection = crate::inventory::resolve(&inventory, &["web1"]).unwrap();
        assert_eq!(selection.as_slice(), ["web1"]);
    }

    #[test]
    fn test_quoted_port_is_accepted() {
        let inventory = Inventory::from_documents([
            "Nodes:\n  web1: { ip: 10.0.0.1 }\n  web2: { ip: 10.0.0.2, port: '2222' }\nGroups:\n  edge: [web1, web2]\n",
        ]);

        assert_eq!(inventory.nodes().len(), 2);
        assert_eq!(inventory.node("web2").unwrap().attributes.port, Some(2222));
        assert_eq!(inventory.node("web1").unwrap().attributes.port, None);
    }

    #[test]
    fn test_group_members_are_not_validated_at_load() {
        let inventory = Inventory::from_documents(["Groups:\n  ghosts: [nobody]\n"]);
        assert_eq!(inventory.group("ghosts").unwrap().members, vec!["nobody"]);
        assert!(inventory.is_empty());
    }

    #[tokio::test]
    async fn test_load_dir_sorted_and_filtered() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("20-override.yml"), "Nodes:\n  a: { user: late }\n")
            .unwrap();
        std::fs::write(dir.path().join("10-base.yaml"), "Nodes:\n  a: { user: early }\n  b:\n")
            .unwrap();
        std::fs::write(dir.path().join("README.md"), "Nodes: not yaml at all: [").unwrap();
        std::fs::write(dir.path().join("00-empty.yml"), "").unwrap();

        let inventory = Inventory::load_dir(dir.path()).await.unwrap();
        let ids: Vec<_> = inventory.nodes().iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(inventory.node("a").unwrap().attributes.user.as_deref(), Some("late"));
    }

    #[tokio::test]
    async fn test_load_missing_dir_is_an_error() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope");
        let err = Inventory::load_dir(&missing).await.unwrap_err();
        assert!(matches!(err, Error::Inventory { .. }));
    }
}
