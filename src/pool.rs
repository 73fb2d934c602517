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

//! Per-node connection cache.
//!
//! One authenticated session per node identifier, created on first use and
//! kept until [`ConnectionPool::close_all`]. The map lock is only held long
//! enough to find (or insert) the node's once-cell; the connect itself runs
//! outside it, so different nodes connect in parallel while a single node is
//! never connected twice.

use futures::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, error};

use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::inventory::Inventory;
use crate::transport::{Session, Transport};

type Slot = Arc<OnceCell<Arc<dyn Session>>>;

pub struct ConnectionPool {
    transport: Arc<dyn Transport>,
    inventory: Arc<Inventory>,
    config: EngineConfig,
    slots: Mutex<HashMap<String, Slot>>,
}

impl ConnectionPool {
    pub fn new(
        transport: Arc<dyn Transport>,
        inventory: Arc<Inventory>,
        config: EngineConfig,
    ) -> Self {
        Self {
            transport,
            inventory,
            config,
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Return the session for `node_id`, connecting on first use.
    ///
    /// A failed connect leaves nothing behind, so the next call retries.
    pub async fn get(&self, node_id: &str) -> Result<Arc<dyn Session>> {
        if self.inventory.node(node_id).is_none() {
            error!("Node information not found: {}", node_id);
            return Err(Error::UnknownTarget(node_id.to_string()));
        }

        let slot = {
            let mut slots = self.slots.lock().await;
            Arc::clone(slots.entry(node_id.to_string()).or_default())
        };

        let session = slot
            .get_or_try_init(|| async {
                let target = self.inventory.connect_target(node_id, &self.config)?;
                debug!("Opening connection to {} ({})", node_id, target);
                match self.transport.connect(&target).await {
                    Ok(session) => Ok::<Arc<dyn Session>, Error>(Arc::from(session)),
                    Err(source) => {
                        error!("Failed to connect to {}: {}", node_id, source);
                        Err(Error::transport(node_id, source))
                    }
                }
            })
            .await?;
        Ok(Arc::clone(session))
    }

    /// Connect every node in `node_ids` concurrently.
    ///
    /// Returns one entry per node, in input order. Failures are reported per
    /// node and never abort the other connects.
    pub async fn connect_all<S: AsRef<str>>(
        &self,
        node_ids: &[S],
    ) -> Vec<(String, Result<Arc<dyn Session>>)> {
        let connects = node_ids.iter().map(|node_id| async move {
            let node_id = node_id.as_ref();
            (node_id.to_string(), self.get(node_id).await)
        });
        join_all(connects).await
    }

    /// Number of live cached sessions.
    pub async fn connection_count(&self) -> usize {
        self.slots
            .lock()
            .await
            .values()
            .filter(|slot| slot.initialized())
            .count()
    }

    /// Close every cached session.
    ///
    /// Close failures are logged and otherwise ignored. Calling this again
    /// is a no-op until new sessions are opened.
    pub async fn close_all(&self) {
        let drained: Vec<(String, Slot)> = self.slots.lock().await.drain().collect();
        for (node_id, slot) in drained {
            let Some(session) = slot.get() else {
                continue;
            };
            debug!("Closing connection to {}", node_id);
            if let Err(e) = session.close().await {
                error!("Failed to close connection to {}: {}", node_id, e);
            }
        }
    }
}
