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

//! Inventory type definitions.

use serde::{de, Deserialize, Deserializer, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Transport attributes attached to a node (or to the inventory-wide defaults).
///
/// Keys follow the inventory file convention (`identity-file`, `proxy-suffix`).
/// Anything the engine does not interpret is kept verbatim in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct NodeAttributes {
    /// Address to connect to. Falls back to the node identifier.
    #[serde(alias = "ip", alias = "hostname")]
    pub address: Option<String>,
    #[serde(deserialize_with = "deserialize_port")]
    pub port: Option<u16>,
    pub user: Option<String>,
    #[serde(alias = "identity")]
    pub identity_file: Option<String>,
    /// Node identifier or `[user@]host[:port]` to tunnel through.
    pub proxy: Option<String>,
    /// Suffix for the secondary SSH alias of proxied hosts.
    pub proxy_suffix: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

/// Accept `port: 2222` as well as `port: '2222'`.
fn deserialize_port<'de, D>(deserializer: D) -> Result<Option<u16>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Port {
        Number(u16),
        Text(String),
    }

    match Option::<Port>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Port::Number(port)) => Ok(Some(port)),
        Some(Port::Text(text)) => text
            .trim()
            .parse::<u16>()
            .map(Some)
            .map_err(|_| de::Error::custom(format!("invalid port '{text}'"))),
    }
}

impl NodeAttributes {
    /// Overlay `other` on top of `self`: every field set in `other` wins.
    pub(crate) fn merge_from(&mut self, other: NodeAttributes) {
        if other.address.is_some() {
            self.address = other.address;
        }
        if other.port.is_some() {
            self.port = other.port;
        }
        if other.user.is_some() {
            self.user = other.user;
        }
        if other.identity_file.is_some() {
            self.identity_file = other.identity_file;
        }
        if other.proxy.is_some() {
            self.proxy = other.proxy;
        }
        if other.proxy_suffix.is_some() {
            self.proxy_suffix = other.proxy_suffix;
        }
        self.extra.extend(other.extra);
    }
}

/// A managed machine.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeSpec {
    pub id: String,
    pub attributes: NodeAttributes,
}

impl NodeSpec {
    pub fn new(id: impl Into<String>, attributes: NodeAttributes) -> Self {
        Self {
            id: id.into(),
            attributes,
        }
    }

    /// Connection address: the explicit address, or the identifier itself
    /// (which then behaves like an SSH host alias).
    pub fn address(&self) -> &str {
        self.attributes.address.as_deref().unwrap_or(&self.id)
    }
}

/// A named, ordered list of node identifiers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupSpec {
    pub id: String,
    pub members: Vec<String>,
}

/// Merged view of every inventory document.
///
/// Nodes and groups keep first-seen order; a later definition with the same
/// identifier replaces the earlier one in place.
#[derive(Debug, Clone, Default)]
pub struct Inventory {
    pub(super) nodes: Vec<NodeSpec>,
    pub(super) node_index: HashMap<String, usize>,
    pub(super) groups: Vec<GroupSpec>,
    pub(super) group_index: HashMap<String, usize>,
    pub(super) defaults: NodeAttributes,
}

impl Inventory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_node(&mut self, node: NodeSpec) {
        match self.node_index.get(&node.id) {
            Some(&idx) => self.nodes[idx] = node,
            None => {
                self.node_index.insert(node.id.clone(), self.nodes.len());
                self.nodes.push(node);
            }
        }
    }

    pub fn insert_group(&mut self, group: GroupSpec) {
        match self.group_index.get(&group.id) {
            Some(&idx) => self.groups[idx] = group,
            None => {
                self.group_index.insert(group.id.clone(), self.groups.len());
                self.groups.push(group);
            }
        }
    }

    pub fn node(&self, id: &str) -> Option<&NodeSpec> {
        self.node_index.get(id).map(|&idx| &self.nodes[idx])
    }

    pub fn group(&self, id: &str) -> Option<&GroupSpec> {
        self.group_index.get(id).map(|&idx| &self.groups[idx])
    }

    /// Nodes in load order.
    pub fn nodes(&self) -> &[NodeSpec] {
        &self.nodes
    }

    pub fn groups(&self) -> &[GroupSpec] {
        &self.groups
    }

    /// Inventory-wide attribute defaults (`Defaults` section).
    pub fn defaults(&self) -> &NodeAttributes {
        &self.defaults
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_falls_back_to_id() {
        let node = NodeSpec::new("web1", NodeAttributes::default());
        assert_eq!(node.address(), "web1");

        let node = NodeSpec::new(
            "web2",
            NodeAttributes {
                address: Some("10.0.0.2".to_string()),
                ..Default::default()
            },
        );
        assert_eq!(node.address(), "10.0.0.2");
    }

    #[test]
    fn test_insert_replaces_in_place() {
        let mut inventory = Inventory::new();
        inventory.insert_node(NodeSpec::new("a", NodeAttributes::default()));
        inventory.insert_node(NodeSpec::new("b", NodeAttributes::default()));
        inventory.insert_node(NodeSpec::new(
            "a",
            NodeAttributes {
                port: Some(2222),
                ..Default::default()
            },
        ));

        let ids: Vec<_> = inventory.nodes().iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(inventory.node("a").unwrap().attributes.port, Some(2222));
    }

    #[test]
    fn test_attribute_merge() {
        let mut base = NodeAttributes {
            user: Some("ops".to_string()),
            port: Some(22),
            ..Default::default()
        };
        base.merge_from(NodeAttributes {
            port: Some(2200),
            ..Default::default()
        });
        assert_eq!(base.user.as_deref(), Some("ops"));
        assert_eq!(base.port, Some(2200));
    }
}
