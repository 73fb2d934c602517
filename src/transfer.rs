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

//! Remote file reads and privileged relay writes.
//!
//! Writes never touch the destination as the login user. Content is first
//! uploaded to a random scratch path, then copied into place with `sudo`,
//! and the scratch file is removed whether or not the copy succeeded.

use std::collections::BTreeMap;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::executor::{run_on, shell_quote};
use crate::inventory::SelectionSet;
use crate::pool::ConnectionPool;
use crate::transport::FileRead;

/// Fetch `path` from every node, in selection order.
///
/// A node without the file maps to `None`. Any other fault aborts the call.
pub async fn read_file(
    pool: &ConnectionPool,
    nodes: &SelectionSet,
    path: &str,
) -> Result<BTreeMap<String, Option<String>>> {
    let mut results = BTreeMap::new();
    for node in nodes {
        let session = pool.get(node).await?;
        let content = match session.download(path).await {
            FileRead::Found(bytes) => Some(String::from_utf8_lossy(&bytes).into_owned()),
            FileRead::Missing => {
                error!("File not found in {}: {}", node, path);
                None
            }
            FileRead::Fault(source) => {
                error!("Failed to read {} from {}: {}", path, node, source);
                return Err(Error::transport(node, source));
            }
        };
        results.insert(node.clone(), content);
    }
    Ok(results)
}

/// Shell command that moves the uploaded scratch file into place.
///
/// Exits with the copy's status; the scratch file is removed either way.
fn relay_command(scratch_path: &str, dest: &str) -> String {
    let scratch = shell_quote(scratch_path);
    format!(
        "sudo cp -- {scratch} {dest}; rc=$?; rm -f -- {scratch}; exit $rc",
        dest = shell_quote(dest)
    )
}

/// Write per-node content to `path`.
///
/// Every key of `contents` must be part of `nodes`; this is checked before
/// anything is uploaded. Nodes without an entry are left alone.
pub async fn write_file(
    pool: &ConnectionPool,
    nodes: &SelectionSet,
    scratch_dir: &str,
    path: &str,
    contents: &BTreeMap<String, String>,
) -> Result<()> {
    if let Some(stray) = contents.keys().find(|node| !nodes.contains(node)) {
        error!("Node information not found: {}", stray);
        return Err(Error::UnknownTarget(stray.clone()));
    }

    let scratch_path = format!("{}/{}", scratch_dir.trim_end_matches('/'), Uuid::new_v4());
    let command = relay_command(&scratch_path, path);

    for node in nodes {
        let Some(content) = contents.get(node) else {
            continue;
        };
        info!("Writing content in {}:{}", node, path);

        let session = pool.get(node).await?;
        if let Err(source) = session.upload(content.as_bytes(), &scratch_path).await {
            error!("Failed to upload {} to {}: {}", scratch_path, node, source);
            // The upload may have created the scratch file before failing.
            let cleanup = format!("rm -f -- {}", shell_quote(&scratch_path));
            if let Err(e) = session.execute(&cleanup).await {
                warn!("Failed to remove {} on {}: {}", scratch_path, node, e);
            }
            return Err(Error::transport(node, source));
        }

        let output = session.execute(&command).await.map_err(|source| {
            error!("Failed to move {} into place on {}: {}", path, node, source);
            Error::transport(node, source)
        })?;
        if !output.is_success() {
            let err = Error::command_failed_on(node, output.exit_status);
            error!("{}: {}", err, output.stderr_string().trim_end());
            return Err(err);
        }
    }
    Ok(())
}

/// Check whether `path` exists on every node.
pub async fn exists(
    pool: &ConnectionPool,
    nodes: &SelectionSet,
    path: &str,
    sudo: bool,
) -> Result<BTreeMap<String, bool>> {
    let mut command = format!("test -e {}", shell_quote(path));
    if sudo {
        command = format!("sudo {command}");
    }

    let mut results = BTreeMap::new();
    for node in nodes {
        let output = run_on(pool, node, &command, true).await?;
        results.insert(node.clone(), output.is_success());
    }
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relay_command_quotes_paths() {
        assert_eq!(
            relay_command("/tmp/abc", "/etc/my app.conf"),
            "sudo cp -- /tmp/abc '/etc/my app.conf'; rc=$?; rm -f -- /tmp/abc; exit $rc"
        );
    }
}
