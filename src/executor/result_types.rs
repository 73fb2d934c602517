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

//! Result types for command execution.

use crate::transport::CommandOutput;

/// What happened on one host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostOutcome {
    /// The command ran and reported an exit status.
    Exited(CommandOutput),
    /// No exit status: connect failure, transport fault, timeout or task panic.
    Errored(String),
}

/// Result of executing a command on a single node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostResult {
    pub node: String,
    pub outcome: HostOutcome,
}

impl HostResult {
    pub fn exited(node: impl Into<String>, output: CommandOutput) -> Self {
        Self {
            node: node.into(),
            outcome: HostOutcome::Exited(output),
        }
    }

    pub fn errored(node: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            node: node.into(),
            outcome: HostOutcome::Errored(error.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(&self.outcome, HostOutcome::Exited(output) if output.is_success())
    }

    pub fn exit_status(&self) -> Option<u32> {
        match &self.outcome {
            HostOutcome::Exited(output) => Some(output.exit_status),
            HostOutcome::Errored(_) => None,
        }
    }

    pub fn output(&self) -> Option<&CommandOutput> {
        match &self.outcome {
            HostOutcome::Exited(output) => Some(output),
            HostOutcome::Errored(_) => None,
        }
    }
}

/// Per-host results of one parallel run, split by outcome.
///
/// Every host lands in exactly one of the three lists; each list keeps the
/// selection order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AggregateResult {
    /// The composed command that was dispatched.
    pub command: String,
    /// Exit status 0.
    pub succeeded: Vec<HostResult>,
    /// Non-zero exit status.
    pub failed: Vec<HostResult>,
    /// No exit status at all.
    pub errored: Vec<HostResult>,
}

impl AggregateResult {
    pub fn partition(command: impl Into<String>, results: Vec<HostResult>) -> Self {
        let mut aggregate = Self {
            command: command.into(),
            ..Self::default()
        };
        for result in results {
            match result.exit_status() {
                Some(0) => aggregate.succeeded.push(result),
                Some(_) => aggregate.failed.push(result),
                None => aggregate.errored.push(result),
            }
        }
        aggregate
    }

    /// Hosts that reported an exit status, succeeded first.
    pub fn exited(&self) -> impl Iterator<Item = &HostResult> {
        self.succeeded.iter().chain(self.failed.iter())
    }

    pub fn len(&self) -> usize {
        self.succeeded.len() + self.failed.len() + self.errored.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn failed_nodes(&self) -> Vec<&str> {
        self.failed.iter().map(|r| r.node.as_str()).collect()
    }

    pub fn errored_nodes(&self) -> Vec<&str> {
        self.errored.iter().map(|r| r.node.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exit(node: &str, status: u32) -> HostResult {
        HostResult::exited(
            node,
            CommandOutput {
                exit_status: status,
                ..CommandOutput::default()
            },
        )
    }

    #[test]
    fn test_partition_is_exhaustive_and_disjoint() {
        let aggregate = AggregateResult::partition(
            "uptime",
            vec![
                exit("a", 0),
                exit("b", 2),
                HostResult::errored("c", "connection refused"),
                exit("d", 0),
                exit("e", 127),
            ],
        );

        assert_eq!(aggregate.command, "uptime");
        assert_eq!(aggregate.len(), 5);
        let succeeded: Vec<_> = aggregate.succeeded.iter().map(|r| r.node.as_str()).collect();
        assert_eq!(succeeded, ["a", "d"]);
        assert_eq!(aggregate.failed_nodes(), ["b", "e"]);
        assert_eq!(aggregate.errored_nodes(), ["c"]);
        assert_eq!(aggregate.exited().count(), 4);
    }

    #[test]
    fn test_host_result_accessors() {
        let ok = exit("a", 0);
        assert!(ok.is_success());
        assert_eq!(ok.exit_status(), Some(0));
        assert!(ok.output().is_some());

        let err = HostResult::errored("b", "timeout");
        assert!(!err.is_success());
        assert_eq!(err.exit_status(), None);
        assert!(err.output().is_none());
    }

    #[test]
    fn test_empty_partition() {
        let aggregate = AggregateResult::partition("true", Vec::new());
        assert!(aggregate.is_empty());
    }
}
