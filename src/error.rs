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

//! Engine-level error type.
//!
//! Every fatal condition the engine can report flows through [`Error`]:
//!
//! - [`Error::UnknownTarget`]: a selection token (or a group member) names nothing
//!   in the inventory. Raised before any connection is opened.
//! - [`Error::RemoteCommand`]: a command exited non-zero and the caller did not
//!   ask for failures to be tolerated.
//! - [`Error::TransportFault`]: a connection could not be established, or an I/O
//!   fault other than "file not found" happened on the transport.
//! - [`Error::Validation`]: consumer input was rejected.
//! - [`Error::Inventory`]: the inventory directory could not be read.

use std::path::PathBuf;
use thiserror::Error;

use crate::transport;
use crate::validation::ValidationError;

/// Result alias used across the engine.
pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    /// Selection token or group member that matches no node or group.
    #[error("Node information not found: {0}")]
    UnknownTarget(String),

    /// Non-zero exit on one or more hosts.
    #[error("{message}")]
    RemoteCommand {
        message: String,
        /// Number of hosts whose command exited non-zero.
        failed_hosts: usize,
    },

    /// Connection or transport-level I/O fault on a single node.
    #[error("transport fault on {node}: {source}")]
    TransportFault {
        node: String,
        #[source]
        source: transport::Error,
    },

    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The inventory directory itself could not be read.
    #[error("failed to read inventory at {}: {source}", path.display())]
    Inventory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    /// Non-zero exit on a single node, raised by sequential runs and relay writes.
    pub fn command_failed_on(node: &str, exit_status: u32) -> Self {
        Self::RemoteCommand {
            message: format!("Command execution failed in {node} with exit code {exit_status}"),
            failed_hosts: 1,
        }
    }

    /// Non-zero exit on `count` hosts of a parallel batch.
    pub fn command_failed_in_hosts(count: usize) -> Self {
        Self::RemoteCommand {
            message: format!("Command execution failed in {count} hosts"),
            failed_hosts: count,
        }
    }

    pub fn transport(node: impl Into<String>, source: transport::Error) -> Self {
        Self::TransportFault {
            node: node.into(),
            source,
        }
    }

    /// Process exit code a consumer binary should terminate with.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::UnknownTarget(_) | Self::Validation(_) | Self::Inventory { .. } => 2,
            Self::RemoteCommand { .. } => 1,
            // Same code the OpenSSH client uses for connection errors
            Self::TransportFault { .. } => 255,
        }
    }
}
