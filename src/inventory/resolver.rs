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

//! Selection resolution: node and group tokens to an ordered node list.

use std::collections::HashSet;
use std::fmt;

use super::types::Inventory;
use crate::error::{Error, Result};

/// The de-duplicated, insertion-ordered node identifiers targeted by one
/// invocation. Every member is known to exist in the inventory it was
/// resolved against.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionSet {
    nodes: Vec<String>,
}

impl SelectionSet {
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.nodes.iter().map(String::as_str)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.nodes
    }

    pub fn contains(&self, node: &str) -> bool {
        self.nodes.iter().any(|n| n == node)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl fmt::Display for SelectionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.nodes.join(", "))
    }
}

impl<'a> IntoIterator for &'a SelectionSet {
    type Item = &'a String;
    type IntoIter = std::slice::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.nodes.iter()
    }
}

/// Split a comma-separated selection string into tokens.
///
/// Whitespace around tokens and empty tokens are dropped, so `None`, `""`
/// and `" , "` all mean "every node".
pub fn parse_selection(selection: Option<&str>) -> Vec<String> {
    selection
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect()
}

/// Accumulates identifiers in encounter order, first occurrence wins.
#[derive(Default)]
struct OrderedSet {
    seen: HashSet<String>,
    items: Vec<String>,
}

impl OrderedSet {
    fn push(&mut self, item: &str) {
        if self.seen.insert(item.to_string()) {
            self.items.push(item.to_string());
        }
    }
}

/// Resolve selection tokens against the inventory.
///
/// Each token matches a node identifier first, then a group identifier.
/// An empty selection selects every node in load order. A token that matches
/// nothing, or a group member that names an undefined node, fails with
/// [`Error::UnknownTarget`].
pub fn resolve<S: AsRef<str>>(inventory: &Inventory, selection: &[S]) -> Result<SelectionSet> {
    if selection.is_empty() {
        return Ok(SelectionSet {
            nodes: inventory.nodes().iter().map(|n| n.id.clone()).collect(),
        });
    }

    let mut selected = OrderedSet::default();
    for token in selection {
        let token = token.as_ref();
        if inventory.node(token).is_some() {
            selected.push(token);
        } else if let Some(group) = inventory.group(token) {
            for member in &group.members {
                selected.push(member);
            }
        } else {
            tracing::error!("Node information not found: {token}");
            return Err(Error::UnknownTarget(token.to_string()));
        }
    }

    if let Some(missing) = selected.items.iter().find(|id| inventory.node(id).is_none()) {
        tracing::error!("Node information not found: {missing}");
        return Err(Error::UnknownTarget(missing.clone()));
    }

    Ok(SelectionSet {
        nodes: selected.items,
    })
}
