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

use std::path::Path;
use tokio::fs;

use crate::executor::AggregateResult;

/// Format of the per-run log directory name.
pub const LOG_DIR_TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// Name of the log directory for a run starting now.
pub fn log_dir_timestamp() -> String {
    chrono::Local::now()
        .format(LOG_DIR_TIMESTAMP_FORMAT)
        .to_string()
}

/// Write `<node>.stdout` and `<node>.stderr` into `output_dir` for every host
/// that reported an exit status.
///
/// Failures never propagate: a directory that cannot be created skips the
/// whole save, and a file that cannot be written is logged before moving on
/// to the next one. Returns the number of files written.
pub async fn save_host_outputs(output_dir: &Path, aggregate: &AggregateResult) -> usize {
    if let Err(e) = fs::create_dir_all(output_dir).await {
        tracing::error!("Failed to create output directory {:?}: {}", output_dir, e);
        return 0;
    }
    tracing::info!("Saving logs in {:?}", output_dir);

    let mut written = 0;
    for result in aggregate.exited() {
        let Some(output) = result.output() else {
            continue;
        };
        let node_name = result.node.replace(['/', '\\'], "_");

        for (extension, contents) in [("stdout", &output.stdout), ("stderr", &output.stderr)] {
            let path = output_dir.join(format!("{node_name}.{extension}"));
            match fs::write(&path, contents).await {
                Ok(()) => written += 1,
                Err(e) => tracing::error!("Failed to write {:?}: {}", path, e),
            }
        }
    }
    written
}
