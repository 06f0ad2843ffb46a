//! The object graph emitted by the compiler.
//!
//! Nodes serialize deterministically: collections are kept in the order the
//! compiler built them (listener order, rule order, backend order), so two
//! compiles of identical inputs produce byte-identical serializations and the
//! same [`Checksum`].

use sha2::{Digest, Sha256};
use std::fmt;

use crate::route::{HeaderValue, Redirect, Rewrite, RouteMatch};

/// One model entry's worth of configuration: a parent virtual service and
/// everything hanging off it.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct ConfigGraph {
    pub parent: ParentListenerNode,
}

impl ConfigGraph {
    pub fn checksum(&self) -> serde_json::Result<Checksum> {
        let bytes = serde_json::to_vec(self)?;
        Ok(Checksum(hex::encode(Sha256::digest(&bytes))))
    }
}

/// Content digest of a serialized graph. Entries with equal checksums are
/// never republished.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct Checksum(pub String);

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Attribution back to the objects a node was built from.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub struct OwnerMarkers {
    pub gateway_namespace: String,
    pub gateway_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub route_namespace: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub route_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend_namespace: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend_name: Option<String>,
}

impl OwnerMarkers {
    pub fn gateway(namespace: impl ToString, name: impl ToString) -> Self {
        Self {
            gateway_namespace: namespace.to_string(),
            gateway_name: name.to_string(),
            ..Self::default()
        }
    }

    pub fn with_route(mut self, namespace: impl ToString, name: impl ToString) -> Self {
        self.route_namespace = Some(namespace.to_string());
        self.route_name = Some(name.to_string());
        self
    }

    pub fn with_rule(mut self, rule_name: impl ToString) -> Self {
        self.rule_name = Some(rule_name.to_string());
        self
    }

    pub fn with_backend(mut self, namespace: impl ToString, name: impl ToString) -> Self {
        self.backend_namespace = Some(namespace.to_string());
        self.backend_name = Some(name.to_string());
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct ParentListenerNode {
    pub name: String,
    pub tenant: String,
    /// Deduplicated (port, protocol, ssl) tuples across all valid listeners.
    pub port_protocols: Vec<PortProtocol>,
    pub vip: VipNode,
    pub certificates: Vec<CertificateNode>,
    pub routing: RoutingNodes,
    pub markers: OwnerMarkers,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, serde::Serialize)]
pub struct PortProtocol {
    pub port: u16,
    pub protocol: crate::gateway::Protocol,
    pub enable_ssl: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub enum RoutingNodes {
    /// Shared-parent topology: one child per attached (route, rule).
    Children(Vec<ChildRoutingNode>),
    /// Dedicated topology: all routing state lives on the parent.
    Dedicated(DedicatedNode),
}

#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct ChildRoutingNode {
    pub name: String,
    pub tenant: String,
    /// Hostnames this child answers for: the listener/route intersection.
    pub hostnames: Vec<String>,
    /// The rule's match list, verbatim and in declaration order.
    pub matches: Vec<RouteMatch>,
    pub pools: Vec<PoolNode>,
    pub pool_group: Option<PoolGroupNode>,
    pub policy: Option<PolicyNode>,
    pub persistence: Option<PersistenceNode>,
    pub markers: OwnerMarkers,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub struct DedicatedNode {
    pub pools: Vec<PoolNode>,
    pub pool_groups: Vec<PoolGroupNode>,
    /// One combined policy across every attached rule.
    pub policy: Option<PolicyNode>,
    pub persistence: Vec<PersistenceNode>,
}

#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct PoolNode {
    pub name: String,
    pub tenant: String,
    pub port: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub t1_lr: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network_placement: Option<String>,
    pub markers: OwnerMarkers,
}

#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct PoolGroupNode {
    pub name: String,
    pub tenant: String,
    pub members: Vec<PoolGroupMember>,
    pub markers: OwnerMarkers,
}

#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct PoolGroupMember {
    pub pool_name: String,
    /// Traffic ratio, the declared backend weight.
    pub ratio: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct PolicyNode {
    pub name: String,
    pub tenant: String,
    pub request_rules: Vec<RequestRule>,
    pub response_rules: Vec<ResponseRule>,
    pub markers: OwnerMarkers,
}

impl PolicyNode {
    pub fn is_empty(&self) -> bool {
        self.request_rules.is_empty() && self.response_rules.is_empty()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub struct RequestRule {
    pub name: String,
    pub index: u32,
    #[serde(rename = "match", skip_serializing_if = "Option::is_none")]
    pub match_: Option<RouteMatch>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect: Option<Redirect>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rewrite: Option<Rewrite>,
    pub header_actions: Vec<HeaderAction>,
    /// Content-switch target for dedicated-mode rules.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub switch_pool_group: Option<String>,
    /// Serve a local response instead of switching (the default 404 rule).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_response_status: Option<u16>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub struct ResponseRule {
    pub name: String,
    pub index: u32,
    #[serde(rename = "match", skip_serializing_if = "Option::is_none")]
    pub match_: Option<RouteMatch>,
    pub header_actions: Vec<HeaderAction>,
}

#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct HeaderAction {
    pub op: HeaderOp,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub enum HeaderOp {
    Add,
    Replace,
    Remove,
}

impl HeaderAction {
    pub fn from_modifier(modifier: &crate::route::HeaderModifier) -> Vec<Self> {
        let mut actions = Vec::new();
        for HeaderValue { name, value } in &modifier.add {
            actions.push(Self {
                op: HeaderOp::Add,
                name: name.clone(),
                value: Some(value.clone()),
            });
        }
        for HeaderValue { name, value } in &modifier.set {
            actions.push(Self {
                op: HeaderOp::Replace,
                name: name.clone(),
                value: Some(value.clone()),
            });
        }
        for name in &modifier.remove {
            actions.push(Self {
                op: HeaderOp::Remove,
                name: name.clone(),
                value: None,
            });
        }
        actions
    }
}

#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct PersistenceNode {
    pub name: String,
    pub tenant: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cookie_name: Option<String>,
    /// Whole minutes; 0 means no timeout was configured.
    pub timeout_minutes: u32,
    pub markers: OwnerMarkers,
}

#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct CertificateNode {
    pub name: String,
    pub tenant: String,
    pub cert: String,
    pub key: String,
    pub markers: OwnerMarkers,
}

#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct VipNode {
    pub name: String,
    pub tenant: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    /// Non-wildcard hostnames from the listener/route intersections.
    pub fqdns: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub t1_lr: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::Protocol;

    fn graph(fqdns: Vec<String>) -> ConfigGraph {
        ConfigGraph {
            parent: ParentListenerNode {
                name: "cluster--ns-gw".to_string(),
                tenant: "admin".to_string(),
                port_protocols: vec![PortProtocol {
                    port: 443,
                    protocol: Protocol::Https,
                    enable_ssl: true,
                }],
                vip: VipNode {
                    name: "cluster--ns-gw-vip".to_string(),
                    tenant: "admin".to_string(),
                    ip_address: None,
                    fqdns,
                    t1_lr: None,
                },
                certificates: vec![],
                routing: RoutingNodes::Children(vec![]),
                markers: OwnerMarkers::gateway("ns", "gw"),
            },
        }
    }

    #[test]
    fn checksum_is_stable_for_equal_graphs() {
        let a = graph(vec!["app.example.com".to_string()]).checksum().unwrap();
        let b = graph(vec!["app.example.com".to_string()]).checksum().unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn checksum_changes_with_content() {
        let a = graph(vec!["app.example.com".to_string()]).checksum().unwrap();
        let b = graph(vec!["other.example.com".to_string()]).checksum().unwrap();
        assert_ne!(a, b);
    }
}
