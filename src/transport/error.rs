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

use std::io;
use std::time::Duration;
use thiserror::Error;

/// Transport-level failures.
#[derive(Debug, Error)]
pub enum Error {
    #[error("could not resolve address: {0}")]
    AddressInvalid(#[source] io::Error),

    #[error("SSH error: {0}")]
    Ssh(#[from] russh::Error),

    #[error("SFTP error: {0}")]
    Sftp(#[from] russh_sftp::client::error::Error),

    #[error("failed to load SSH key: {0}")]
    KeyInvalid(#[from] russh::keys::Error),

    #[error("authentication failed, the private key was rejected by the server")]
    KeyAuthFailed,

    #[error("failed to connect to SSH agent, is SSH_AUTH_SOCK set?")]
    AgentConnectionFailed,

    #[error("SSH agent has no identities")]
    AgentNoIdentities,

    #[error("SSH agent authentication failed")]
    AgentAuthenticationFailed,

    #[error("connection timeout after {0} seconds")]
    ConnectTimeout(u64),

    #[error("command did not finish within {0:?}")]
    CommandTimeout(Duration),

    #[error("remote command exited without reporting an exit status")]
    CommandDidntExit,

    #[error("connection closed")]
    ConnectionClosed,

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("{0}")]
    Other(String),
}
