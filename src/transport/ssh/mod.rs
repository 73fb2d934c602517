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

//! SSH transport built on russh and russh-sftp.

mod channel;
mod client;
mod known_hosts;
mod sftp;

use async_trait::async_trait;
use russh::client::Handle;
use std::time::Duration;

use super::{CommandOutput, ConnectTarget, Error, FileRead, Session, Transport};
use crate::config::EngineConfig;
use client::ClientHandler;

pub use client::KEY_PASSPHRASE_ENV;
pub use known_hosts::{get_check_method, get_default_known_hosts_path, ServerCheckMethod, StrictHostKeyChecking};

/// Opens one SSH connection per node, tunnelling through proxies as needed.
#[derive(Debug, Clone)]
pub struct SshTransport {
    strict_mode: StrictHostKeyChecking,
    connect_timeout: Duration,
}

impl SshTransport {
    pub fn new(strict_mode: StrictHostKeyChecking, connect_timeout: Duration) -> Self {
        Self {
            strict_mode,
            connect_timeout,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.strict_host_key_checking, config.connect_timeout())
    }
}

#[async_trait]
impl Transport for SshTransport {
    async fn connect(&self, target: &ConnectTarget) -> Result<Box<dyn Session>, Error> {
        tracing::debug!("Connecting to {} ({})", target.node_id, target);
        let connection = client::connect(target, self.strict_mode, self.connect_timeout).await?;
        Ok(Box::new(SshSession {
            handle: connection.handle,
            hops: connection.hops,
        }))
    }
}

/// An authenticated SSH connection to one node.
pub struct SshSession {
    handle: Handle<ClientHandler>,
    hops: Vec<Handle<ClientHandler>>,
}

#[async_trait]
impl Session for SshSession {
    async fn execute(&self, command: &str) -> Result<CommandOutput, Error> {
        channel::execute(&self.handle, command).await
    }

    async fn upload(&self, contents: &[u8], remote_path: &str) -> Result<(), Error> {
        sftp::upload(&self.handle, contents, remote_path).await
    }

    async fn download(&self, remote_path: &str) -> FileRead {
        sftp::download(&self.handle, remote_path).await
    }

    async fn close(&self) -> Result<(), Error> {
        let result = self
            .handle
            .disconnect(russh::Disconnect::ByApplication, "", "")
            .await;
        // Inner connection first, then the hops it was tunnelled through.
        for hop in self.hops.iter().rev() {
            if let Err(e) = hop
                .disconnect(russh::Disconnect::ByApplication, "", "")
                .await
            {
                tracing::debug!("Failed to disconnect proxy hop: {}", e);
            }
        }
        result.map_err(Error::from)
    }
}
