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

//! Remote-shell transport seam.
//!
//! The engine never speaks SSH directly. It asks a [`Transport`] for a
//! [`Session`] per node and drives everything through four primitives:
//! execute a command, upload a buffer, download a file, close.
//!
//! Two implementations ship with the crate:
//! - [`ssh::SshTransport`]: russh + russh-sftp
//! - [`memory::MemoryTransport`]: in-process hosts for tests and dry runs

mod error;
pub mod memory;
pub mod ssh;

use async_trait::async_trait;
use std::fmt;
use std::path::PathBuf;

pub use error::Error;

/// Fully resolved connection parameters for one node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectTarget {
    /// Inventory identifier (or the raw spec for ad-hoc proxy hops).
    pub node_id: String,
    pub host: String,
    pub port: u16,
    pub user: String,
    pub identity_file: Option<PathBuf>,
    /// Hop to tunnel through before reaching `host`.
    pub proxy: Option<Box<ConnectTarget>>,
}

impl ConnectTarget {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl fmt::Display for ConnectTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}:{}", self.user, self.host, self.port)?;
        if let Some(proxy) = &self.proxy {
            write!(f, " via {proxy}")?;
        }
        Ok(())
    }
}

/// Captured result of a remote command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub exit_status: u32,
}

impl CommandOutput {
    pub fn is_success(&self) -> bool {
        self.exit_status == 0
    }

    pub fn stdout_string(&self) -> String {
        String::from_utf8_lossy(&self.stdout).to_string()
    }

    pub fn stderr_string(&self) -> String {
        String::from_utf8_lossy(&self.stderr).to_string()
    }
}

/// Outcome of fetching a remote file.
#[derive(Debug)]
pub enum FileRead {
    Found(Vec<u8>),
    /// The path does not exist on the remote side.
    Missing,
    /// Any other failure.
    Fault(Error),
}

/// Opens authenticated sessions.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn connect(&self, target: &ConnectTarget) -> Result<Box<dyn Session>, Error>;
}

/// One authenticated connection to one node.
///
/// A session serves one in-flight operation at a time; the engine never
/// issues concurrent calls against the same session.
#[async_trait]
pub trait Session: Send + Sync {
    /// Run `command` through the remote shell and wait for it to exit.
    async fn execute(&self, command: &str) -> Result<CommandOutput, Error>;

    /// Write `contents` to `remote_path` as the login user, replacing any existing file.
    async fn upload(&self, contents: &[u8], remote_path: &str) -> Result<(), Error>;

    async fn download(&self, remote_path: &str) -> FileRead;

    async fn close(&self) -> Result<(), Error>;
}
