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

//! Configuration loading and environment overrides.

use anyhow::{Context, Result};
use std::env;
use std::path::{Path, PathBuf};
use tokio::fs;

use super::types::EngineConfig;
use super::utils::expand_tilde;

const INVENTORY_ENV: &str = "DSPL_INVENTORY";
const LOG_ROOT_ENV: &str = "DSPL_LOG_ROOT";
const SCRATCH_DIR_ENV: &str = "DSPL_SCRATCH_DIR";

impl EngineConfig {
    /// Load configuration from a YAML file. A missing file yields defaults.
    pub async fn load(path: &Path) -> Result<Self> {
        let expanded_path = expand_tilde(path);

        if !expanded_path.exists() {
            tracing::debug!(
                "Config file not found at {:?}, using defaults",
                expanded_path
            );
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&expanded_path).await.with_context(|| {
            format!(
                "Failed to read configuration file at {}",
                expanded_path.display()
            )
        })?;

        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: EngineConfig = serde_yaml::from_str(&content).with_context(|| {
            format!(
                "Failed to parse YAML configuration file at {}",
                expanded_path.display()
            )
        })?;

        Ok(config)
    }

    /// Apply `DSPL_INVENTORY`, `DSPL_LOG_ROOT` and `DSPL_SCRATCH_DIR` when set.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(dir) = env::var(INVENTORY_ENV) {
            tracing::debug!("Inventory directory overridden by {INVENTORY_ENV}: {dir}");
            self.inventory_dir = PathBuf::from(dir);
        }
        if let Ok(root) = env::var(LOG_ROOT_ENV) {
            self.log_root = PathBuf::from(root);
        }
        if let Ok(scratch) = env::var(SCRATCH_DIR_ENV) {
            self.scratch_dir = scratch;
        }
        self.inventory_dir = expand_tilde(&self.inventory_dir);
        self.log_root = expand_tilde(&self.log_root);
        self
    }
}
