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

//! Node and group inventory.
//!
//! The inventory is loaded once per invocation and is read-only afterwards.
//! A selection (node and/or group names) is resolved against it into a
//! [`SelectionSet`] before any remote operation starts.

mod loader;
mod resolver;
mod target;
mod types;

pub use resolver::{parse_selection, resolve, SelectionSet};
pub use types::{GroupSpec, Inventory, NodeAttributes, NodeSpec};
