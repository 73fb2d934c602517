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

use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{error, info};

use super::result_types::{AggregateResult, HostOutcome, HostResult};
use crate::config::EngineConfig;
use crate::inventory::SelectionSet;
use crate::pool::ConnectionPool;
use crate::transport;

/// Dispatches one command to many nodes at once.
///
/// Fan-out is unbounded and commands never time out unless configured.
#[derive(Debug, Clone, Default)]
pub struct ParallelExecutor {
    max_parallel: Option<usize>,
    command_timeout: Option<Duration>,
}

impl ParallelExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            max_parallel: config.max_parallel,
            command_timeout: config.command_timeout(),
        }
    }

    pub fn with_max_parallel(mut self, max_parallel: Option<usize>) -> Self {
        self.max_parallel = max_parallel;
        self
    }

    pub fn with_command_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.command_timeout = timeout;
        self
    }

    /// Run `command` on every node of `nodes` and wait for all of them.
    ///
    /// Connections are established up front, concurrently. A node that cannot
    /// be reached, whose transport fails mid-command, or whose task panics is
    /// reported as errored; it never affects the other nodes.
    pub async fn execute(
        &self,
        pool: &ConnectionPool,
        nodes: &SelectionSet,
        command: &str,
    ) -> AggregateResult {
        let connections = pool.connect_all(nodes.as_slice()).await;
        let semaphore = self
            .max_parallel
            .map(|limit| Arc::new(Semaphore::new(limit.max(1))));

        let tasks: Vec<_> = connections
            .into_iter()
            .map(|(node, connection)| {
                let command = command.to_string();
                let semaphore = semaphore.clone();
                let command_timeout = self.command_timeout;

                tokio::spawn(async move {
                    let session = match connection {
                        Ok(session) => session,
                        Err(e) => return HostResult::errored(node, e.to_string()),
                    };

                    let _permit = match semaphore {
                        Some(semaphore) => match semaphore.acquire_owned().await {
                            Ok(permit) => Some(permit),
                            Err(e) => {
                                return HostResult::errored(
                                    node,
                                    format!("Semaphore acquisition failed: {e}"),
                                )
                            }
                        },
                        None => None,
                    };

                    info!("Running command in {}", node);
                    let result = match command_timeout {
                        Some(limit) => tokio::time::timeout(limit, session.execute(&command))
                            .await
                            .unwrap_or(Err(transport::Error::CommandTimeout(limit))),
                        None => session.execute(&command).await,
                    };

                    match result {
                        Ok(output) => HostResult::exited(node, output),
                        Err(e) => HostResult::errored(node, e.to_string()),
                    }
                })
            })
            .collect();

        let results = join_all(tasks).await;
        collect_results(nodes, command, results)
    }
}

/// Turn task results back into per-node results, keeping the selection order.
fn collect_results(
    nodes: &SelectionSet,
    command: &str,
    results: Vec<Result<HostResult, tokio::task::JoinError>>,
) -> AggregateResult {
    let host_results = nodes
        .iter()
        .zip(results)
        .map(|(node, result)| match result {
            Ok(host_result) => host_result,
            Err(e) => {
                error!("Task failed for node {}: {}", node, e);
                HostResult::errored(node, format!("Task execution failed: {e}"))
            }
        })
        .collect();
    AggregateResult::partition(command, host_results)
}

/// Log every host's outcome: exit status for hosts that ran, the error for
/// hosts that did not.
pub fn log_outcomes(aggregate: &AggregateResult) {
    for result in aggregate.exited() {
        if let Some(status) = result.exit_status() {
            info!("Host {} exit code: {}", result.node, status);
        }
    }
    for result in &aggregate.errored {
        if let HostOutcome::Errored(message) = &result.outcome {
            error!("Host {} returned: {}", result.node, message);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::{resolve, Inventory};
    use crate::transport::memory::{MemoryHost, MemoryTransport};
    use crate::transport::CommandOutput;

    fn setup(hosts: Vec<MemoryHost>) -> (ConnectionPool, SelectionSet, MemoryTransport) {
        let inventory = Inventory::from_documents(["Nodes:\n  web1: {}\n  web2: {}\n  web3: {}\n"]);
        let selection = resolve(&inventory, &[] as &[&str]).unwrap();
        let transport = MemoryTransport::new(hosts);
        let pool = ConnectionPool::new(
            Arc::new(transport.clone()),
            Arc::new(inventory),
            EngineConfig::default(),
        );
        (pool, selection, transport)
    }

    #[tokio::test]
    async fn test_partitions_mixed_outcomes() {
        let (pool, nodes, _) = setup(vec![
            MemoryHost::new("web1"),
            MemoryHost::new("web2").respond(
                "check",
                CommandOutput {
                    exit_status: 3,
                    ..CommandOutput::default()
                },
            ),
            MemoryHost::new("web3").unreachable(),
        ]);
        let aggregate = ParallelExecutor::new().execute(&pool, &nodes, "check").await;
        // web1 has no scripted answer, so its shell reports 127.
        assert!(aggregate.succeeded.is_empty());
        assert_eq!(aggregate.failed_nodes(), ["web1", "web2"]);
        assert_eq!(aggregate.errored_nodes(), ["web3"]);
        assert_eq!(aggregate.len(), nodes.len());
    }

    #[tokio::test]
    async fn test_runs_hosts_concurrently_by_default() {
        let hosts = ["web1", "web2", "web3"]
            .into_iter()
            .map(|id| MemoryHost::new(id).with_latency(Duration::from_millis(50)))
            .collect();
        let (pool, nodes, transport) = setup(hosts);

        let aggregate = ParallelExecutor::new().execute(&pool, &nodes, "true").await;
        assert_eq!(aggregate.succeeded.len(), 3);
        assert_eq!(transport.peak_concurrency(), 3);
    }

    #[tokio::test]
    async fn test_max_parallel_bounds_fan_out() {
        let hosts = ["web1", "web2", "web3"]
            .into_iter()
            .map(|id| MemoryHost::new(id).with_latency(Duration::from_millis(20)))
            .collect();
        let (pool, nodes, transport) = setup(hosts);

        let aggregate = ParallelExecutor::new()
            .with_max_parallel(Some(1))
            .execute(&pool, &nodes, "true")
            .await;
        assert_eq!(aggregate.succeeded.len(), 3);
        assert_eq!(transport.peak_concurrency(), 1);
    }

    #[tokio::test]
    async fn test_command_timeout_marks_host_errored() {
        let (pool, nodes, _) = setup(vec![
            MemoryHost::new("web1"),
            MemoryHost::new("web2").with_latency(Duration::from_secs(30)),
            MemoryHost::new("web3"),
        ]);

        let aggregate = ParallelExecutor::new()
            .with_command_timeout(Some(Duration::from_millis(100)))
            .execute(&pool, &nodes, "true")
            .await;
        assert_eq!(aggregate.errored_nodes(), ["web2"]);
        assert_eq!(aggregate.succeeded.len(), 2);
    }
}
