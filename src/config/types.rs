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

//! Configuration type definitions.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::transport::ssh::StrictHostKeyChecking;

/// Engine configuration.
///
/// Every field has a default, so an empty (or missing) config file yields a
/// usable configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Directory holding the inventory documents.
    pub inventory_dir: PathBuf,
    /// Root under which `logs/<timestamp>/` directories are created.
    pub log_root: PathBuf,
    /// Remote directory used for relay writes.
    pub scratch_dir: String,
    /// Login user when neither the node nor the inventory defaults set one.
    pub default_user: Option<String>,
    pub default_identity_file: Option<String>,
    pub default_port: u16,
    pub strict_host_key_checking: StrictHostKeyChecking,
    pub connect_timeout_secs: u64,
    /// Upper bound on concurrently dispatched hosts. Unbounded when unset.
    pub max_parallel: Option<usize>,
    /// Per-host command timeout for parallel runs. No timeout when unset.
    pub command_timeout_secs: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            inventory_dir: PathBuf::from("data"),
            log_root: PathBuf::from("."),
            scratch_dir: "/tmp".to_string(),
            default_user: None,
            default_identity_file: None,
            default_port: 22,
            strict_host_key_checking: StrictHostKeyChecking::default(),
            connect_timeout_secs: 30,
            max_parallel: None,
            command_timeout_secs: None,
        }
    }
}

impl EngineConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn command_timeout(&self) -> Option<Duration> {
        self.command_timeout_secs.map(Duration::from_secs)
    }

    /// Directory where a parallel run started at `timestamp` stores its logs.
    pub fn log_dir_for(&self, timestamp: &str) -> PathBuf {
        self.log_root.join("logs").join(timestamp)
    }
}
