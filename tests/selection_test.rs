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

//! Node selection through the public context API.

use dspl::config::NODES_ENV;
use dspl::inventory::parse_selection;
use dspl::transport::memory::{MemoryHost, MemoryTransport};
use dspl::{ClusterContext, EngineConfig, Error, Inventory};
use serial_test::serial;
use std::sync::Arc;
use tempfile::TempDir;

fn inventory() -> Inventory {
    Inventory::from_documents([r#"
Nodes:
  web1: { ip: 10.0.0.11 }
  web2: { ip: 10.0.0.12 }
Groups:
  edge: [web1, web2]
  group1: [web2, web1]
"#])
}

fn context(selection: &str) -> dspl::Result<ClusterContext> {
    let transport = MemoryTransport::new([MemoryHost::new("web1"), MemoryHost::new("web2")]);
    ClusterContext::new(
        inventory(),
        &parse_selection(Some(selection)),
        Arc::new(transport),
        EngineConfig::default(),
    )
}

fn selected(selection: &str) -> Vec<String> {
    context(selection)
        .unwrap()
        .selection()
        .iter()
        .map(str::to_string)
        .collect()
}

#[test]
fn test_empty_selection_selects_every_node() {
    assert_eq!(selected(""), ["web1", "web2"]);
}

#[test]
fn test_group_expansion_and_dedup() {
    assert_eq!(selected("edge"), ["web1", "web2"]);
    assert_eq!(selected("edge,web1"), ["web1", "web2"]);
    assert_eq!(selected("web1,group1,web1"), ["web1", "web2"]);
    assert_eq!(selected("group1"), ["web2", "web1"]);
}

#[test]
fn test_unknown_token_fails_before_connecting() {
    let transport = MemoryTransport::new([MemoryHost::new("web1"), MemoryHost::new("web2")]);
    let result = ClusterContext::new(
        inventory(),
        &["web1", "web9"],
        Arc::new(transport.clone()),
        EngineConfig::default(),
    );

    match result {
        Err(Error::UnknownTarget(token)) => assert_eq!(token, "web9"),
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("web9 must not resolve"),
    }
    assert_eq!(transport.host("web1").unwrap().connect_count(), 0);
}

#[test]
fn test_group_with_undefined_member_fails() {
    let inventory = Inventory::from_documents(["Nodes:\n  web1: {}\nGroups:\n  broken: [web1, ghost]\n"]);
    let result = ClusterContext::new(
        inventory,
        &["broken"],
        Arc::new(MemoryTransport::default()),
        EngineConfig::default(),
    );
    assert!(matches!(result, Err(Error::UnknownTarget(name)) if name == "ghost"));
}

#[tokio::test]
#[serial]
async fn test_from_config_reads_inventory_dir_and_nodes_env() {
    let temp = TempDir::new().unwrap();
    std::fs::write(
        temp.path().join("00-nodes.yml"),
        "Nodes:\n  web1: { ip: 127.0.0.1 }\n  web2: { ip: 127.0.0.1 }\n",
    )
    .unwrap();
    std::fs::write(temp.path().join("10-groups.yml"), "Groups:\n  edge: [web2]\n").unwrap();

    let config = EngineConfig {
        inventory_dir: temp.path().to_path_buf(),
        ..EngineConfig::default()
    };

    std::env::set_var(NODES_ENV, "edge");
    let ctx = ClusterContext::from_config(config.clone(), None).await.unwrap();
    assert_eq!(ctx.selection().as_slice(), ["web2"]);

    let ctx = ClusterContext::from_config(config, Some("web1")).await.unwrap();
    assert_eq!(ctx.selection().as_slice(), ["web1"]);
    std::env::remove_var(NODES_ENV);
    assert_eq!(ctx.connection_count().await, 0);
}

#[tokio::test]
async fn test_missing_inventory_dir_is_reported() {
    let config = EngineConfig {
        inventory_dir: "/nonexistent/dspl/inventory".into(),
        ..EngineConfig::default()
    };
    let result = ClusterContext::from_config(config, Some("")).await;
    assert!(matches!(result, Err(Error::Inventory { .. })));
}
