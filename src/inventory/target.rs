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

//! Connection parameter resolution.
//!
//! Each attribute is looked up through an explicit precedence chain:
//! node attributes, then the inventory `Defaults` section, then the engine
//! configuration, then a built-in value.

use std::path::Path;

use super::types::Inventory;
use crate::config::{expand_tilde, get_current_username, EngineConfig};
use crate::error::{Error, Result};
use crate::transport::ConnectTarget;
use crate::validation::ValidationError;

/// Longest proxy chain followed before giving up (guards against loops).
const MAX_PROXY_HOPS: usize = 8;

/// Split `[user@]host[:port]`. IPv6 hosts are written bare (no port) or as
/// `[addr]:port`.
pub(crate) fn parse_host_spec(
    spec: &str,
) -> std::result::Result<(Option<&str>, &str, Option<u16>), ValidationError> {
    let (user, host_part) = match spec.split_once('@') {
        Some((user, rest)) => (Some(user), rest),
        None => (None, spec),
    };

    let parse_port = |port: &str| {
        port.parse::<u16>()
            .map_err(|_| ValidationError::new("proxy", format!("invalid port in '{spec}'")))
    };

    let (host, port) = if let Some(bracketed) = host_part.strip_prefix('[') {
        // `[addr]` or `[addr]:port`
        let (host, rest) = bracketed.split_once(']').ok_or_else(|| {
            ValidationError::new("proxy", format!("unclosed '[' in '{spec}'"))
        })?;
        match rest {
            "" => (host, None),
            _ => match rest.strip_prefix(':') {
                Some(port) => (host, Some(parse_port(port)?)),
                None => {
                    return Err(ValidationError::new(
                        "proxy",
                        format!("unexpected text after ']' in '{spec}'"),
                    ))
                }
            },
        }
    } else if host_part.matches(':').count() > 1 {
        // Bare IPv6 address; a port needs the bracketed form.
        (host_part, None)
    } else {
        match host_part.split_once(':') {
            Some((host, port)) => (host, Some(parse_port(port)?)),
            None => (host_part, None),
        }
    };

    if host.is_empty() || user.is_some_and(str::is_empty) {
        return Err(ValidationError::new(
            "proxy",
            format!("'{spec}' is not a [user@]host[:port] specification"),
        ));
    }
    Ok((user, host, port))
}

impl Inventory {
    /// Resolve the connection parameters for `node_id`, including its proxy chain.
    pub fn connect_target(&self, node_id: &str, config: &EngineConfig) -> Result<ConnectTarget> {
        self.connect_target_hop(node_id, config, 0)
    }

    fn connect_target_hop(
        &self,
        node_id: &str,
        config: &EngineConfig,
        hops: usize,
    ) -> Result<ConnectTarget> {
        if hops > MAX_PROXY_HOPS {
            return Err(ValidationError::new(
                "proxy",
                format!("proxy chain for '{node_id}' exceeds {MAX_PROXY_HOPS} hops"),
            )
            .into());
        }

        let node = self
            .node(node_id)
            .ok_or_else(|| Error::UnknownTarget(node_id.to_string()))?;
        let attrs = &node.attributes;
        let defaults = &self.defaults;

        let user = attrs
            .user
            .clone()
            .or_else(|| defaults.user.clone())
            .or_else(|| config.default_user.clone())
            .unwrap_or_else(get_current_username);
        let port = attrs.port.or(defaults.port).unwrap_or(config.default_port);
        let identity_file = attrs
            .identity_file
            .as_deref()
            .or(defaults.identity_file.as_deref())
            .or(config.default_identity_file.as_deref())
            .map(|path| expand_tilde(Path::new(path)));

        // An inherited default proxy never applies to the proxy host itself.
        let proxy_spec = attrs
            .proxy
            .as_deref()
            .or(defaults.proxy.as_deref())
            .filter(|spec| *spec != node_id);

        let proxy = match proxy_spec {
            None => None,
            Some(spec) if self.node(spec).is_some() => {
                Some(Box::new(self.connect_target_hop(spec, config, hops + 1)?))
            }
            Some(spec) => {
                let (proxy_user, proxy_host, proxy_port) = parse_host_spec(spec)?;
                Some(Box::new(ConnectTarget {
                    node_id: spec.to_string(),
                    host: proxy_host.to_string(),
                    port: proxy_port.unwrap_or(config.default_port),
                    user: proxy_user.map_or_else(|| user.clone(), str::to_string),
                    identity_file: identity_file.clone(),
                    proxy: None,
                }))
            }
        };

        Ok(ConnectTarget {
            node_id: node.id.clone(),
            host: node.address().to_string(),
            port,
            user,
            identity_file,
            proxy,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn config() -> EngineConfig {
        EngineConfig {
            default_user: Some("fallback".to_string()),
            default_identity_file: Some("/keys/default".to_string()),
            ..EngineConfig::default()
        }
    }

    #[test]
    fn test_precedence_chain() {
        let inventory = Inventory::from_documents([r#"
Defaults:
  user: ops
  port: 2200
Nodes:
  web1: { ip: 10.0.0.11, port: 2222 }
  web2: { ip: 10.0.0.12, user: deploy, identity-file: /keys/web2 }
"#]);

        let web1 = inventory.connect_target("web1", &config()).unwrap();
        assert_eq!(web1.host, "10.0.0.11");
        assert_eq!(web1.port, 2222);
        assert_eq!(web1.user, "ops");
        assert_eq!(web1.identity_file, Some(PathBuf::from("/keys/default")));
        assert!(web1.proxy.is_none());

        let web2 = inventory.connect_target("web2", &config()).unwrap();
        assert_eq!(web2.port, 2200);
        assert_eq!(web2.user, "deploy");
        assert_eq!(web2.identity_file, Some(PathBuf::from("/keys/web2")));
    }

    #[test]
    fn test_config_fallbacks() {
        let inventory = Inventory::from_documents(["Nodes:\n  lone: {}\n"]);
        let target = inventory.connect_target("lone", &config()).unwrap();
        assert_eq!(target.host, "lone");
        assert_eq!(target.port, 22);
        assert_eq!(target.user, "fallback");
    }

    #[test]
    fn test_proxy_through_inventory_node() {
        let inventory = Inventory::from_documents([r#"
Defaults:
  proxy: bastion
Nodes:
  bastion: { ip: 203.0.113.5, user: jump }
  db1: { ip: 10.0.0.5 }
"#]);

        let db1 = inventory.connect_target("db1", &config()).unwrap();
        let hop = db1.proxy.expect("db1 should be proxied");
        assert_eq!(hop.node_id, "bastion");
        assert_eq!(hop.host, "203.0.113.5");
        assert_eq!(hop.user, "jump");
        assert!(hop.proxy.is_none(), "default proxy must not apply to itself");
    }

    #[test]
    fn test_proxy_spec_string() {
        let inventory =
            Inventory::from_documents(["Nodes:\n  db1: { user: ops, proxy: 'gw@gate.example.com:2022' }\n"]);
        let hop = inventory
            .connect_target("db1", &config())
            .unwrap()
            .proxy
            .unwrap();
        assert_eq!(hop.user, "gw");
        assert_eq!(hop.host, "gate.example.com");
        assert_eq!(hop.port, 2022);
    }

    #[test]
    fn test_proxy_loop_is_rejected() {
        let inventory =
            Inventory::from_documents(["Nodes:\n  a: { proxy: b }\n  b: { proxy: a }\n"]);
        let err = inventory.connect_target("a", &config()).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_unknown_node() {
        let inventory = Inventory::new();
        let err = inventory.connect_target("ghost", &config()).unwrap_err();
        assert!(matches!(err, Error::UnknownTarget(_)));
    }

    #[test]
    fn test_parse_host_spec() {
        assert_eq!(parse_host_spec("host").unwrap(), (None, "host", None));
        assert_eq!(
            parse_host_spec("me@host:2222").unwrap(),
            (Some("me"), "host", Some(2222))
        );
        assert!(parse_host_spec("host:notaport").is_err());
        assert!(parse_host_spec("@host").is_err());
        assert!(parse_host_spec(":22").is_err());
    }

    #[test]
    fn test_parse_host_spec_ipv6() {
        assert_eq!(parse_host_spec("::1").unwrap(), (None, "::1", None));
        assert_eq!(
            parse_host_spec("gw@fe80::1:2").unwrap(),
            (Some("gw"), "fe80::1:2", None)
        );
        assert_eq!(
            parse_host_spec("[::1]:2022").unwrap(),
            (None, "::1", Some(2022))
        );
        assert_eq!(
            parse_host_spec("jump@[2001:db8::7]").unwrap(),
            (Some("jump"), "2001:db8::7", None)
        );
        assert!(parse_host_spec("[::1").is_err());
        assert!(parse_host_spec("[::1]x").is_err());
        assert!(parse_host_spec("[::1]:port").is_err());
        assert!(parse_host_spec("[]:22").is_err());
    }

    #[test]
    fn test_ipv6_proxy_spec() {
        let inventory = Inventory::from_documents([
            "Nodes:\n  db1: { user: ops, proxy: '[2001:db8::7]:2022' }\n  db2: { proxy: '::1' }\n",
        ]);
        let hop = inventory.connect_target("db1", &config()).unwrap().proxy.unwrap();
        assert_eq!(hop.host, "2001:db8::7");
        assert_eq!(hop.port, 2022);

        let hop = inventory.connect_target("db2", &config()).unwrap().proxy.unwrap();
        assert_eq!(hop.host, "::1");
        assert_eq!(hop.port, 22);
    }
}
