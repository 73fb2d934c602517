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

//! Execution context shared by every operation of one invocation.
//!
//! A [`ClusterContext`] resolves the node selection once, at construction,
//! and owns the connection pool. Consumers issue any number of operations
//! against the fixed node set and call [`ClusterContext::close`] at the end.
//!
//! ```no_run
//! use dspl::{ClusterContext, EngineConfig};
//!
//! # async fn run() -> dspl::Result<()> {
//! let ctx = ClusterContext::from_config(EngineConfig::default(), Some("edge")).await?;
//! ctx.run_parallel(&["apt-get update", "apt-get -y upgrade"], true, false, true)
//!     .await?;
//! ctx.close().await;
//! # Ok(())
//! # }
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{error, info};

use crate::config::{selection_from_env, EngineConfig};
use crate::error::{Error, Result};
use crate::executor::{self, join_commands, log_outcomes, AggregateResult, HostResult, ParallelExecutor};
use crate::inventory::{parse_selection, resolve, Inventory, SelectionSet};
use crate::pool::ConnectionPool;
use crate::transfer;
use crate::transport::ssh::SshTransport;
use crate::transport::{CommandOutput, Transport};
use crate::utils::output::{log_dir_timestamp, save_host_outputs};

pub struct ClusterContext {
    inventory: Arc<Inventory>,
    selection: SelectionSet,
    pool: ConnectionPool,
    executor: ParallelExecutor,
    config: EngineConfig,
}

impl ClusterContext {
    /// Resolve `selection` against `inventory` and set up a pool over `transport`.
    ///
    /// Fails with [`Error::UnknownTarget`] before any connection is attempted.
    pub fn new<S: AsRef<str>>(
        inventory: Inventory,
        selection: &[S],
        transport: Arc<dyn Transport>,
        config: EngineConfig,
    ) -> Result<Self> {
        let selection = resolve(&inventory, selection)?;
        info!("Selected nodes: {}", selection);

        let inventory = Arc::new(inventory);
        let pool = ConnectionPool::new(transport, Arc::clone(&inventory), config.clone());
        Ok(Self {
            inventory,
            selection,
            pool,
            executor: ParallelExecutor::from_config(&config),
            config,
        })
    }

    /// Load the inventory from `config.inventory_dir` and connect over SSH.
    ///
    /// `selection` is a comma-separated token list; when `None`, the `NODES`
    /// environment variable is used instead.
    pub async fn from_config(config: EngineConfig, selection: Option<&str>) -> Result<Self> {
        let inventory = Inventory::load_dir(&config.inventory_dir).await?;
        let selection = match selection {
            Some(selection) => parse_selection(Some(selection)),
            None => parse_selection(selection_from_env().as_deref()),
        };
        let transport = Arc::new(SshTransport::from_config(&config));
        Self::new(inventory, &selection, transport, config)
    }

    pub fn selection(&self) -> &SelectionSet {
        &self.selection
    }

    pub fn inventory(&self) -> &Inventory {
        &self.inventory
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run `command` on each selected node in order.
    pub async fn run_sequential(
        &self,
        command: &str,
        warn_on_failure: bool,
    ) -> Result<Vec<HostResult>> {
        executor::run_sequential(&self.pool, &self.selection, command, warn_on_failure).await
    }

    /// Run `command` on one selected node.
    pub async fn run_on(
        &self,
        node: &str,
        command: &str,
        warn_on_failure: bool,
    ) -> Result<CommandOutput> {
        self.ensure_selected(node)?;
        executor::run_on(&self.pool, node, command, warn_on_failure).await
    }

    /// Run `commands`, joined fail-fast, on every selected node at once.
    ///
    /// With `capture_results`, every host that reported an exit status gets
    /// `<node>.stdout` and `<node>.stderr` under
    /// `<log_root>/logs/<start timestamp>/`. Without `warn_on_failure`, any
    /// non-zero exit fails the call after all hosts have finished. Hosts that
    /// never reported an exit status are logged but do not fail the call.
    pub async fn run_parallel<S: AsRef<str>>(
        &self,
        commands: &[S],
        sudo: bool,
        warn_on_failure: bool,
        capture_results: bool,
    ) -> Result<AggregateResult> {
        let log_dir = self.config.log_dir_for(&log_dir_timestamp());
        let command = join_commands(commands, sudo);

        info!("Running commands in {}", self.selection);
        let aggregate = self.executor.execute(&self.pool, &self.selection, &command).await;

        if capture_results {
            save_host_outputs(&log_dir, &aggregate).await;
        }
        log_outcomes(&aggregate);

        if !aggregate.failed.is_empty() && !warn_on_failure {
            let err = Error::command_failed_in_hosts(aggregate.failed.len());
            error!("{} ({})", err, aggregate.failed_nodes().join(", "));
            return Err(err);
        }
        Ok(aggregate)
    }

    /// Read `path` from every selected node; `None` where it does not exist.
    pub async fn read_file(&self, path: &str) -> Result<BTreeMap<String, Option<String>>> {
        transfer::read_file(&self.pool, &self.selection, path).await
    }

    /// Write per-node `contents` to `path` through a privileged relay copy.
    pub async fn write_file(&self, path: &str, contents: &BTreeMap<String, String>) -> Result<()> {
        transfer::write_file(
            &self.pool,
            &self.selection,
            &self.config.scratch_dir,
            path,
            contents,
        )
        .await
    }

    pub async fn exists(&self, path: &str, sudo: bool) -> Result<BTreeMap<String, bool>> {
        transfer::exists(&self.pool, &self.selection, path, sudo).await
    }

    /// Number of currently open connections.
    pub async fn connection_count(&self) -> usize {
        self.pool.connection_count().await
    }

    /// Close every open connection. Safe to call more than once.
    pub async fn close(&self) {
        self.pool.close_all().await;
    }

    fn ensure_selected(&self, node: &str) -> Result<()> {
        if self.selection.contains(node) {
            return Ok(());
        }
        error!("Node information not found: {}", node);
        Err(Error::UnknownTarget(node.to_string()))
    }
}
