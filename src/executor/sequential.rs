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

//! Node-by-node execution.

use tracing::{debug, error, info, warn};

use super::result_types::HostResult;
use crate::error::{Error, Result};
use crate::inventory::SelectionSet;
use crate::pool::ConnectionPool;
use crate::transport::CommandOutput;

/// Run `command` on every node of `nodes`, one after another.
///
/// Node N+1 starts only after node N has finished. Without
/// `warn_on_failure`, the first non-zero exit stops the run.
pub async fn run_sequential(
    pool: &ConnectionPool,
    nodes: &SelectionSet,
    command: &str,
    warn_on_failure: bool,
) -> Result<Vec<HostResult>> {
    let mut results = Vec::with_capacity(nodes.len());
    for node in nodes {
        let output = run_on(pool, node, command, warn_on_failure).await?;
        results.push(HostResult::exited(node, output));
    }
    Ok(results)
}

/// Run `command` on a single node.
pub async fn run_on(
    pool: &ConnectionPool,
    node: &str,
    command: &str,
    warn_on_failure: bool,
) -> Result<CommandOutput> {
    info!("Running command `{}` in {}", command, node);
    let session = pool.get(node).await?;
    let output = session.execute(command).await.map_err(|source| {
        error!("Command on {} failed without an exit status: {}", node, source);
        Error::transport(node, source)
    })?;

    info!("Host {} exit code: {}", node, output.exit_status);
    debug!("[{}] stdout: {}", node, output.stdout_string().trim_end());
    debug!("[{}] stderr: {}", node, output.stderr_string().trim_end());

    if !output.is_success() {
        if warn_on_failure {
            warn!(
                "Command `{}` exited with {} in {}",
                command, output.exit_status, node
            );
        } else {
            let err = Error::command_failed_on(node, output.exit_status);
            error!("{}", err);
            return Err(err);
        }
    }
    Ok(output)
}
