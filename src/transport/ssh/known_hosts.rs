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

use directories::BaseDirs;
use russh::keys::known_hosts::learn_known_hosts_path;
use russh::keys::{check_known_hosts_path, PublicKey};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

/// Get the default known_hosts file path
pub fn get_default_known_hosts_path() -> Option<PathBuf> {
    BaseDirs::new().map(|dirs| dirs.home_dir().join(".ssh").join("known_hosts"))
}

/// How a connecting client verifies the server's host key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerCheckMethod {
    /// Accept any host key.
    NoCheck,
    /// Key must already be listed in the file.
    KnownHostsFile(PathBuf),
    /// Unknown keys are appended to the file; changed keys are rejected.
    TrustOnFirstUse(PathBuf),
}

impl ServerCheckMethod {
    /// Decide whether `key` presented by `host:port` is acceptable.
    ///
    /// Under trust-on-first-use an unknown key is recorded and accepted. A key
    /// that differs from the recorded one is always rejected.
    pub fn verify(&self, host: &str, port: u16, key: &PublicKey) -> bool {
        match self {
            Self::NoCheck => true,
            Self::KnownHostsFile(path) => match check_known_hosts_path(host, port, key, path) {
                Ok(true) => true,
                Ok(false) => {
                    tracing::error!("Host key for {} is not in {:?}", host, path);
                    false
                }
                Err(e) => {
                    tracing::error!("Host key check for {} failed: {}", host, e);
                    false
                }
            },
            Self::TrustOnFirstUse(path) => match check_known_hosts_path(host, port, key, path) {
                Ok(true) => true,
                Ok(false) => {
                    tracing::info!("Adding host key for {} to {:?}", host, path);
                    if let Err(e) = learn_known_hosts_path(host, port, key, path) {
                        tracing::warn!("Failed to record host key for {}: {}", host, e);
                    }
                    true
                }
                Err(e) => {
                    tracing::error!("Host key check for {} failed: {}", host, e);
                    false
                }
            },
        }
    }
}

/// Create a ServerCheckMethod based on strict host key checking mode
pub fn get_check_method(strict_mode: StrictHostKeyChecking) -> ServerCheckMethod {
    match strict_mode {
        StrictHostKeyChecking::No => {
            tracing::debug!("Host key checking disabled (strict mode = no)");
            ServerCheckMethod::NoCheck
        }
        StrictHostKeyChecking::Yes => match get_default_known_hosts_path() {
            Some(path) => {
                tracing::debug!("Using known_hosts file: {:?} (strict mode)", path);
                ServerCheckMethod::KnownHostsFile(path)
            }
            None => {
                // Nothing to verify against; fail closed rather than accept.
                tracing::warn!("Could not determine known_hosts path, every host key will be rejected");
                ServerCheckMethod::KnownHostsFile(PathBuf::from("/dev/null"))
            }
        },
        StrictHostKeyChecking::AcceptNew => match get_default_known_hosts_path() {
            Some(path) => {
                if let Some(ssh_dir) = path.parent() {
                    if let Err(e) = std::fs::create_dir_all(ssh_dir) {
                        tracing::warn!("Failed to create {:?}: {}", ssh_dir, e);
                    }
                }
                tracing::debug!("Using known_hosts file: {:?} (accept-new mode)", path);
                ServerCheckMethod::TrustOnFirstUse(path)
            }
            None => {
                tracing::warn!("Could not determine known_hosts path, using NoCheck");
                ServerCheckMethod::NoCheck
            }
        },
    }
}

/// Mode for host key checking
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StrictHostKeyChecking {
    /// Always verify host keys (fail on unknown/changed)
    #[serde(alias = "true")]
    Yes,
    /// Never verify host keys (accept all)
    #[serde(alias = "false")]
    No,
    /// Verify known hosts, add new ones automatically (TOFU)
    #[default]
    #[serde(alias = "tofu")]
    AcceptNew,
}

impl FromStr for StrictHostKeyChecking {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "yes" | "true" => Ok(Self::Yes),
            "no" | "false" => Ok(Self::No),
            "accept-new" | "tofu" => Ok(Self::AcceptNew),
            other => Err(format!("unknown host key checking mode '{other}'")),
        }
    }
}
