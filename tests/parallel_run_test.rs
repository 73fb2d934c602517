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

//! Sequential and parallel command runs against in-memory hosts.

use dspl::transport::memory::{MemoryHost, MemoryTransport};
use dspl::transport::CommandOutput;
use dspl::{ClusterContext, EngineConfig, Error, Inventory};
use std::sync::Arc;
use tempfile::TempDir;

const INVENTORY: &str = r#"
Nodes:
  web1: { ip: 10.0.0.11 }
  web2: { ip: 10.0.0.12 }
  web3: { ip: 10.0.0.13 }
"#;

fn context(
    selection: &[&str],
    hosts: Vec<MemoryHost>,
    config: EngineConfig,
) -> (ClusterContext, MemoryTransport) {
    let transport = MemoryTransport::new(hosts);
    let ctx = ClusterContext::new(
        Inventory::from_documents([INVENTORY]),
        selection,
        Arc::new(transport.clone()),
        config,
    )
    .unwrap();
    (ctx, transport)
}

fn healthy() -> Vec<MemoryHost> {
    vec![
        MemoryHost::new("web1"),
        MemoryHost::new("web2"),
        MemoryHost::new("web3"),
    ]
}

fn exit_with(status: u32, stdout: &str) -> CommandOutput {
    CommandOutput {
        stdout: stdout.as_bytes().to_vec(),
        stderr: Vec::new(),
        exit_status: status,
    }
}

#[tokio::test]
async fn test_single_failed_host_raises_remote_command() {
    let (ctx, _) = context(&["web1"], healthy(), EngineConfig::default());

    let err = ctx.run_parallel(&["false"], false, false, false).await.unwrap_err();
    assert!(matches!(err, Error::RemoteCommand { failed_hosts: 1, .. }));
    assert!(err.to_string().contains("1 hosts"));
    assert_eq!(err.exit_code(), 1);
}

#[tokio::test]
async fn test_warn_mode_never_raises_on_exit_status() {
    let (ctx, _) = context(&[], healthy(), EngineConfig::default());

    let aggregate = ctx.run_parallel(&["false"], false, true, false).await.unwrap();
    assert_eq!(aggregate.failed.len(), 3);
    assert!(aggregate.succeeded.is_empty());
}

#[tokio::test]
async fn test_errored_hosts_alone_do_not_raise() {
    let hosts = vec![
        MemoryHost::new("web1"),
        MemoryHost::new("web2").unreachable(),
        MemoryHost::new("web3"),
    ];
    let (ctx, _) = context(&[], hosts, EngineConfig::default());

    let aggregate = ctx.run_parallel(&["true"], false, false, false).await.unwrap();
    assert_eq!(aggregate.succeeded.len(), 2);
    assert!(aggregate.failed.is_empty());
    assert_eq!(aggregate.errored_nodes(), ["web2"]);
}

#[tokio::test]
async fn test_partition_covers_every_host_once() {
    let hosts = vec![
        MemoryHost::new("web1").respond("probe", exit_with(0, "ok\n")),
        MemoryHost::new("web2").respond("probe", exit_with(4, "")),
        MemoryHost::new("web3").unreachable(),
    ];
    let (ctx, _) = context(&[], hosts, EngineConfig::default());

    let aggregate = ctx.run_parallel(&["probe"], false, true, false).await.unwrap();
    let mut all: Vec<&str> = aggregate
        .succeeded
        .iter()
        .chain(&aggregate.failed)
        .chain(&aggregate.errored)
        .map(|r| r.node.as_str())
        .collect();
    all.sort_unstable();
    assert_eq!(all, ["web1", "web2", "web3"]);
    assert_eq!(aggregate.failed_nodes(), ["web2"]);
}

#[tokio::test]
async fn test_commands_are_joined_with_sudo_prefix() {
    let (ctx, transport) = context(&["web1"], healthy(), EngineConfig::default());

    let aggregate = ctx
        .run_parallel(&["echo one", "echo two"], true, false, false)
        .await
        .unwrap();
    assert_eq!(aggregate.command, "sudo echo one && sudo echo two");
    let output = aggregate.succeeded[0].output().unwrap();
    assert_eq!(output.stdout_string(), "one\ntwo\n");
    assert_eq!(
        transport.host("web1").unwrap().executed(),
        ["sudo echo one && sudo echo two"]
    );
}

#[tokio::test]
async fn test_capture_results_writes_timestamped_logs() {
    let temp = TempDir::new().unwrap();
    let config = EngineConfig {
        log_root: temp.path().to_path_buf(),
        ..EngineConfig::default()
    };
    let hosts = vec![
        MemoryHost::new("web1"),
        MemoryHost::new("web2").respond("hostname", exit_with(1, "")),
        MemoryHost::new("web3").unreachable(),
    ];
    let (ctx, _) = context(&[], hosts, config);

    ctx.run_parallel(&["hostname"], false, true, true).await.unwrap();

    let runs: Vec<_> = std::fs::read_dir(temp.path().join("logs"))
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .collect();
    assert_eq!(runs.len(), 1);
    let run_dir = &runs[0];
    let name = run_dir.file_name().unwrap().to_string_lossy().to_string();
    assert!(chrono::NaiveDateTime::parse_from_str(&name, "%Y-%m-%d_%H-%M-%S").is_ok());

    // web1's shell does not know `hostname`, so it lands in failed with stderr.
    assert!(run_dir.join("web1.stdout").exists());
    assert!(!std::fs::read(run_dir.join("web1.stderr")).unwrap().is_empty());
    assert!(run_dir.join("web2.stdout").exists());
    assert!(!run_dir.join("web3.stdout").exists());
}

#[tokio::test]
async fn test_connections_are_reused_across_runs() {
    let (ctx, transport) = context(&[], healthy(), EngineConfig::default());

    ctx.run_parallel(&["true"], false, false, false).await.unwrap();
    ctx.run_sequential("true", false).await.unwrap();
    ctx.run_parallel(&["true"], false, false, false).await.unwrap();

    for id in ["web1", "web2", "web3"] {
        let host = transport.host(id).unwrap();
        assert_eq!(host.connect_count(), 1, "{id} connected more than once");
        assert!(!host.saw_overlap());
    }
    assert_eq!(ctx.connection_count().await, 3);
}

#[tokio::test]
async fn test_sequential_stops_at_first_failure() {
    let hosts = vec![
        MemoryHost::new("web1").respond("deploy", exit_with(0, "")),
        MemoryHost::new("web2").respond("deploy", exit_with(2, "")),
        MemoryHost::new("web3").respond("deploy", exit_with(0, "")),
    ];
    let (ctx, transport) = context(&[], hosts, EngineConfig::default());

    let err = ctx.run_sequential("deploy", false).await.unwrap_err();
    assert!(matches!(err, Error::RemoteCommand { failed_hosts: 1, .. }));
    assert!(err.to_string().contains("web2"));
    assert_eq!(transport.host("web1").unwrap().executed(), ["deploy"]);
    assert!(transport.host("web3").unwrap().executed().is_empty());
}

#[tokio::test]
async fn test_sequential_warn_mode_runs_everywhere_in_order() {
    let (ctx, transport) = context(&["web3", "web1"], healthy(), EngineConfig::default());

    let results = ctx.run_sequential("false", true).await.unwrap();
    let nodes: Vec<_> = results.iter().map(|r| r.node.as_str()).collect();
    assert_eq!(nodes, ["web3", "web1"]);
    assert!(results.iter().all(|r| r.exit_status() == Some(1)));
    assert!(transport.host("web2").unwrap().executed().is_empty());
}

#[tokio::test]
async fn test_sequential_transport_fault_is_fatal() {
    let hosts = vec![
        MemoryHost::new("web1"),
        MemoryHost::new("web2").unreachable(),
        MemoryHost::new("web3"),
    ];
    let (ctx, transport) = context(&[], hosts, EngineConfig::default());

    let err = ctx.run_sequential("true", true).await.unwrap_err();
    assert!(matches!(err, Error::TransportFault { ref node, .. } if node == "web2"));
    assert_eq!(err.exit_code(), 255);
    assert!(transport.host("web3").unwrap().executed().is_empty());
}

#[tokio::test]
async fn test_run_on_requires_selected_node() {
    let (ctx, _) = context(&["web1"], healthy(), EngineConfig::default());

    let output = ctx.run_on("web1", "echo hi", false).await.unwrap();
    assert_eq!(output.stdout_string(), "hi\n");
    assert!(matches!(
        ctx.run_on("web2", "echo hi", false).await,
        Err(Error::UnknownTarget(_))
    ));
}
