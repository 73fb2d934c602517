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

//! Multi-node execution engine for cluster administration.
//!
//! Resolve a selection of inventory nodes and groups, then run commands on
//! them one by one or all at once, read files from them, and write files to
//! them through a privileged relay copy. Everything goes through
//! [`ClusterContext`].

pub mod config;
pub mod context;
pub mod error;
pub mod executor;
pub mod inventory;
pub mod pool;
pub mod transfer;
pub mod transport;
pub mod utils;
pub mod validation;

pub use config::EngineConfig;
pub use context::ClusterContext;
pub use error::{Error, Result};
pub use executor::{AggregateResult, HostOutcome, HostResult};
pub use inventory::{Inventory, SelectionSet};
pub use utils::init_logging;
pub use validation::{validate_username, ValidationError};
