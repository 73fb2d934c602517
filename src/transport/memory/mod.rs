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

//! In-process transport.
//!
//! Every node is a [`MemoryHost`] with its own file tree and a tiny shell.
//! Hosts can be told to refuse connections, fail reads, fail on close,
//! answer specific commands with canned output, or take a while to answer.
//!
//! ```
//! use dspl::transport::memory::{MemoryHost, MemoryTransport};
//!
//! let transport = MemoryTransport::new([
//!     MemoryHost::new("web1").with_file("/etc/hostname", "web1\n"),
//!     MemoryHost::new("web2").unreachable(),
//! ]);
//! assert!(transport.host("web1").is_some());
//! ```

mod shell;

use async_trait::async_trait;
use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use super::{CommandOutput, ConnectTarget, Error, FileRead, Session, Transport};
use shell::FileSystem;

/// Paths the login user may write to without `sudo`.
const DEFAULT_WRITABLE_PREFIXES: &[&str] = &["/tmp/", "/home/"];

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// One simulated node.
#[derive(Debug)]
pub struct MemoryHost {
    id: String,
    fs: Mutex<FileSystem>,
    responses: Mutex<HashMap<String, CommandOutput>>,
    history: Mutex<Vec<String>>,
    reachable: bool,
    fail_reads: bool,
    fail_uploads: bool,
    fail_close: bool,
    latency: Option<Duration>,
    connects: AtomicUsize,
    closes: AtomicUsize,
    busy: AtomicBool,
    overlapped: AtomicBool,
}

impl MemoryHost {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            fs: Mutex::new(FileSystem {
                writable_prefixes: DEFAULT_WRITABLE_PREFIXES
                    .iter()
                    .map(|p| p.to_string())
                    .collect(),
                ..FileSystem::default()
            }),
            responses: Mutex::new(HashMap::new()),
            history: Mutex::new(Vec::new()),
            reachable: true,
            fail_reads: false,
            fail_uploads: false,
            fail_close: false,
            latency: None,
            connects: AtomicUsize::new(0),
            closes: AtomicUsize::new(0),
            busy: AtomicBool::new(false),
            overlapped: AtomicBool::new(false),
        }
    }

    pub fn with_file(self, path: impl Into<String>, contents: impl Into<Vec<u8>>) -> Self {
        lock(&self.fs).files.insert(path.into(), contents.into());
        self
    }

    /// Answer `command` (matched verbatim) with a fixed result.
    pub fn respond(self, command: impl Into<String>, output: CommandOutput) -> Self {
        lock(&self.responses).insert(command.into(), output);
        self
    }

    /// Refuse every connection attempt.
    pub fn unreachable(mut self) -> Self {
        self.reachable = false;
        self
    }

    /// Every download fails with a transport fault.
    pub fn failing_reads(mut self) -> Self {
        self.fail_reads = true;
        self
    }

    /// Uploads break off half way, leaving a truncated remote file behind.
    pub fn failing_uploads(mut self) -> Self {
        self.fail_uploads = true;
        self
    }

    pub fn failing_close(mut self) -> Self {
        self.fail_close = true;
        self
    }

    /// Delay every command by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn file(&self, path: &str) -> Option<Vec<u8>> {
        lock(&self.fs).files.get(path).cloned()
    }

    pub fn file_paths(&self) -> Vec<String> {
        lock(&self.fs).files.keys().cloned().collect()
    }

    /// Commands received so far, in order.
    pub fn executed(&self) -> Vec<String> {
        lock(&self.history).clone()
    }

    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    /// Whether two commands were ever in flight on this host at once.
    pub fn saw_overlap(&self) -> bool {
        self.overlapped.load(Ordering::SeqCst)
    }
}

/// Transport over a fixed set of [`MemoryHost`]s, keyed by node id.
#[derive(Debug, Default, Clone)]
pub struct MemoryTransport {
    hosts: HashMap<String, Arc<MemoryHost>>,
    in_flight: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

impl MemoryTransport {
    pub fn new(hosts: impl IntoIterator<Item = MemoryHost>) -> Self {
        Self {
            hosts: hosts
                .into_iter()
                .map(|host| (host.id.clone(), Arc::new(host)))
                .collect(),
            ..Self::default()
        }
    }

    pub fn host(&self, id: &str) -> Option<Arc<MemoryHost>> {
        self.hosts.get(id).cloned()
    }

    /// Highest number of commands in flight across all hosts at once.
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn connect(&self, target: &ConnectTarget) -> Result<Box<dyn Session>, Error> {
        let host = self.hosts.get(&target.node_id).ok_or_else(|| {
            Error::AddressInvalid(io::Error::new(
                io::ErrorKind::NotFound,
                format!("unknown host {}", target.host),
            ))
        })?;
        host.connects.fetch_add(1, Ordering::SeqCst);
        if !host.reachable {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                format!("connection to {} refused", target.address()),
            )));
        }
        Ok(Box::new(MemorySession {
            host: Arc::clone(host),
            in_flight: Arc::clone(&self.in_flight),
            peak: Arc::clone(&self.peak),
            closed: AtomicBool::new(false),
        }))
    }
}

struct MemorySession {
    host: Arc<MemoryHost>,
    in_flight: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
    closed: AtomicBool,
}

impl MemorySession {
    fn ensure_open(&self) -> Result<(), Error> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::ConnectionClosed);
        }
        Ok(())
    }
}

#[async_trait]
impl Session for MemorySession {
    async fn execute(&self, command: &str) -> Result<CommandOutput, Error> {
        self.ensure_open()?;
        lock(&self.host.history).push(command.to_string());

        if self.host.busy.swap(true, Ordering::SeqCst) {
            self.host.overlapped.store(true, Ordering::SeqCst);
        }
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        match self.host.latency {
            Some(latency) => tokio::time::sleep(latency).await,
            None => tokio::task::yield_now().await,
        }

        let scripted = lock(&self.host.responses).get(command).cloned();
        let output = match scripted {
            Some(output) => output,
            None => shell::run(&mut lock(&self.host.fs), command),
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.host.busy.store(false, Ordering::SeqCst);
        Ok(output)
    }

    async fn upload(&self, contents: &[u8], remote_path: &str) -> Result<(), Error> {
        self.ensure_open()?;
        let mut fs = lock(&self.host.fs);
        if !fs.is_writable(remote_path) {
            return Err(Error::PermissionDenied(remote_path.to_string()));
        }
        if self.host.fail_uploads {
            let partial = contents[..contents.len() / 2].to_vec();
            fs.files.insert(remote_path.to_string(), partial);
            return Err(Error::Other(format!("transfer to {remote_path} interrupted")));
        }
        fs.files.insert(remote_path.to_string(), contents.to_vec());
        Ok(())
    }

    async fn download(&self, remote_path: &str) -> FileRead {
        if let Err(e) = self.ensure_open() {
            return FileRead::Fault(e);
        }
        if self.host.fail_reads {
            return FileRead::Fault(Error::Other(format!(
                "simulated read failure on {}",
                self.host.id
            )));
        }
        match lock(&self.host.fs).files.get(remote_path) {
            Some(contents) => FileRead::Found(contents.clone()),
            None => FileRead::Missing,
        }
    }

    async fn close(&self) -> Result<(), Error> {
        self.closed.store(true, Ordering::SeqCst);
        self.host.closes.fetch_add(1, Ordering::SeqCst);
        if self.host.fail_close {
            return Err(Error::Other(format!(
                "simulated close failure on {}",
                self.host.id
            )));
        }
        Ok(())
    }
}
