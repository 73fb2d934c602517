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

//! Connection establishment: handshake, host key verification, proxy
//! tunnelling and authentication.

use russh::client::{Config, Handle, Handler};
use russh::keys::PrivateKeyWithHashAlg;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use zeroize::Zeroizing;

use super::known_hosts::{get_check_method, ServerCheckMethod, StrictHostKeyChecking};
use crate::transport::{ConnectTarget, Error};

/// Passphrase for encrypted identity files.
pub const KEY_PASSPHRASE_ENV: &str = "DSPL_KEY_PASSPHRASE";

/// SSH client handler for managing server key verification.
#[derive(Debug, Clone)]
pub struct ClientHandler {
    hostname: String,
    port: u16,
    server_check: ServerCheckMethod,
}

impl ClientHandler {
    pub fn new(hostname: String, port: u16, server_check: ServerCheckMethod) -> Self {
        Self {
            hostname,
            port,
            server_check,
        }
    }
}

impl Handler for ClientHandler {
    type Error = Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &russh::keys::PublicKey,
    ) -> Result<bool, Self::Error> {
        Ok(self
            .server_check
            .verify(&self.hostname, self.port, server_public_key))
    }
}

/// An authenticated connection plus the proxy connections it tunnels through.
pub(super) struct Connection {
    pub handle: Handle<ClientHandler>,
    /// Outermost hop first. Kept alive for as long as `handle` is in use.
    pub hops: Vec<Handle<ClientHandler>>,
}

/// Connect to `target`, walking its proxy chain from the outermost hop inwards.
pub(super) async fn connect(
    target: &ConnectTarget,
    strict_mode: StrictHostKeyChecking,
    connect_timeout: Duration,
) -> Result<Connection, Error> {
    let mut chain = Vec::new();
    let mut cursor = Some(target);
    while let Some(hop) = cursor {
        chain.push(hop);
        cursor = hop.proxy.as_deref();
    }
    chain.reverse();

    let mut handles: Vec<Handle<ClientHandler>> = Vec::with_capacity(chain.len());
    for hop in chain {
        let handle = match handles.last() {
            None => connect_direct(hop, strict_mode, connect_timeout).await?,
            Some(previous) => {
                tracing::debug!("Opening tunnel to {} through the previous hop", hop.address());
                connect_through(previous, hop, strict_mode, connect_timeout).await?
            }
        };
        handles.push(handle);
    }

    let handle = handles
        .pop()
        .ok_or_else(|| Error::Other(format!("empty connection chain for {target}")))?;
    Ok(Connection {
        handle,
        hops: handles,
    })
}

async fn connect_direct(
    hop: &ConnectTarget,
    strict_mode: StrictHostKeyChecking,
    connect_timeout: Duration,
) -> Result<Handle<ClientHandler>, Error> {
    let handler = ClientHandler::new(hop.host.clone(), hop.port, get_check_method(strict_mode));
    let mut handle = tokio::time::timeout(
        connect_timeout,
        russh::client::connect(
            Arc::new(Config::default()),
            (hop.host.as_str(), hop.port),
            handler,
        ),
    )
    .await
    .map_err(|_| Error::ConnectTimeout(connect_timeout.as_secs()))??;

    authenticate(&mut handle, &hop.user, hop.identity_file.as_deref()).await?;
    Ok(handle)
}

async fn connect_through(
    previous: &Handle<ClientHandler>,
    hop: &ConnectTarget,
    strict_mode: StrictHostKeyChecking,
    connect_timeout: Duration,
) -> Result<Handle<ClientHandler>, Error> {
    let channel = tokio::time::timeout(
        connect_timeout,
        previous.channel_open_direct_tcpip(hop.host.clone(), u32::from(hop.port), "127.0.0.1", 22),
    )
    .await
    .map_err(|_| Error::ConnectTimeout(connect_timeout.as_secs()))??;

    let handler = ClientHandler::new(hop.host.clone(), hop.port, get_check_method(strict_mode));
    let mut handle = tokio::time::timeout(
        connect_timeout,
        russh::client::connect_stream(Arc::new(Config::default()), channel.into_stream(), handler),
    )
    .await
    .map_err(|_| Error::ConnectTimeout(connect_timeout.as_secs()))??;

    authenticate(&mut handle, &hop.user, hop.identity_file.as_deref()).await?;
    Ok(handle)
}

/// Authenticate as `user`.
///
/// An explicit identity file is the only method tried when present.
/// Otherwise the SSH agent is tried, then the usual default key files.
async fn authenticate(
    handle: &mut Handle<ClientHandler>,
    user: &str,
    identity_file: Option<&Path>,
) -> Result<(), Error> {
    if let Some(key_path) = identity_file {
        tracing::debug!("Authenticating with key: {:?}", key_path);
        return authenticate_with_key(handle, user, key_path).await;
    }

    #[cfg(unix)]
    if std::env::var_os("SSH_AUTH_SOCK").is_some() {
        match authenticate_with_agent(handle, user).await {
            Ok(()) => return Ok(()),
            Err(e) => tracing::debug!("SSH agent authentication failed: {}", e),
        }
    }

    let mut last_error = Error::KeyAuthFailed;
    for key_path in default_key_paths() {
        if !key_path.exists() {
            continue;
        }
        tracing::debug!("Using default key: {:?}", key_path);
        match authenticate_with_key(handle, user, &key_path).await {
            Ok(()) => return Ok(()),
            Err(e) => last_error = e,
        }
    }
    Err(last_error)
}

fn default_key_paths() -> Vec<PathBuf> {
    let Some(dirs) = directories::BaseDirs::new() else {
        return Vec::new();
    };
    let ssh_dir = dirs.home_dir().join(".ssh");
    ["id_ed25519", "id_rsa", "id_ecdsa"]
        .iter()
        .map(|name| ssh_dir.join(name))
        .collect()
}

async fn authenticate_with_key(
    handle: &mut Handle<ClientHandler>,
    user: &str,
    key_path: &Path,
) -> Result<(), Error> {
    let passphrase = std::env::var(KEY_PASSPHRASE_ENV).ok().map(Zeroizing::new);
    let key = russh::keys::load_secret_key(key_path, passphrase.as_ref().map(|p| p.as_str()))?;

    let hash_alg = handle.best_supported_rsa_hash().await?.flatten();
    let result = handle
        .authenticate_publickey(user, PrivateKeyWithHashAlg::new(Arc::new(key), hash_alg))
        .await?;
    if !result.success() {
        return Err(Error::KeyAuthFailed);
    }
    Ok(())
}

#[cfg(unix)]
async fn authenticate_with_agent(
    handle: &mut Handle<ClientHandler>,
    user: &str,
) -> Result<(), Error> {
    let mut agent = russh::keys::agent::client::AgentClient::connect_env()
        .await
        .map_err(|_| Error::AgentConnectionFailed)?;

    let identities = agent
        .request_identities()
        .await
        .map_err(|_| Error::AgentConnectionFailed)?;
    if identities.is_empty() {
        return Err(Error::AgentNoIdentities);
    }

    for identity in identities {
        let hash_alg = handle.best_supported_rsa_hash().await?.flatten();
        let result = handle
            .authenticate_publickey_with(user, identity, hash_alg, &mut agent)
            .await;
        if let Ok(auth_result) = result {
            if auth_result.success() {
                return Ok(());
            }
        }
    }
    Err(Error::AgentAuthenticationFailed)
}
