//! Specs of the watched objects, stripped down to the fields the controller
//! acts on.

use std::collections::BTreeMap;

use crate::resource::{ObjectRef, ResourceKind};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Gateway {
    pub class_name: String,
    pub listeners: Vec<Listener>,
    /// Static addresses requested on the gateway spec. At most one is
    /// honored, and it must be an IP address.
    pub addresses: Vec<GatewayAddress>,
    pub generation: i64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GatewayAddress {
    pub value: String,
    /// `IPAddress` is the only supported type; anything else invalidates the
    /// gateway.
    pub type_: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Listener {
    pub name: String,
    pub port: u16,
    pub protocol: Protocol,
    pub hostname: Option<String>,
    pub tls_cert_refs: Vec<ObjectRef>,
    pub allowed_routes: AllowedRoutes,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
pub enum Protocol {
    #[serde(rename = "HTTP")]
    Http,
    #[serde(rename = "HTTPS")]
    Https,
    #[serde(rename = "TCP")]
    Tcp,
    #[serde(rename = "TLS")]
    Tls,
    #[serde(rename = "UDP")]
    Udp,
}

impl Protocol {
    /// Only the HTTP protocols are programmable by this controller.
    pub fn is_supported(&self) -> bool {
        matches!(self, Self::Http | Self::Https)
    }

    pub fn requires_tls(&self) -> bool {
        matches!(self, Self::Https)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AllowedRoutes {
    pub namespaces: NamespaceScope,
    /// Route kinds the listener admits. Empty means the default for the
    /// protocol, i.e. HTTPRoute.
    pub kinds: Vec<ResourceKind>,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum NamespaceScope {
    #[default]
    Same,
    All,
}

impl AllowedRoutes {
    pub fn admits_kind(&self, kind: ResourceKind) -> bool {
        if self.kinds.is_empty() {
            return kind == ResourceKind::HttpRoute;
        }
        self.kinds.contains(&kind)
    }

    pub fn admits_namespace(&self, listener_ns: &str, route_ns: &str) -> bool {
        match self.namespaces {
            NamespaceScope::Same => listener_ns == route_ns,
            NamespaceScope::All => true,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GatewayClass {
    pub controller_name: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Service {
    pub ports: Vec<ServicePort>,
    pub selector: BTreeMap<String, String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServicePort {
    pub name: Option<String>,
    pub port: u16,
    pub target_port: Option<u16>,
}

impl Service {
    pub fn port(&self, port: u16) -> Option<&ServicePort> {
        self.ports.iter().find(|p| p.port == port)
    }

    /// Label-selector matching, the subset form: every selector label must be
    /// present on the pod with the same value.
    pub fn selects(&self, pod: &Pod) -> bool {
        !self.selector.is_empty()
            && self
                .selector
                .iter()
                .all(|(k, v)| pod.labels.get(k) == Some(v))
    }
}

/// The slice of an endpoint set, reduced to its owning service.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EndpointSlice {
    pub service_name: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Secret {
    pub cert: String,
    pub key: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Pod {
    pub labels: BTreeMap<String, String>,
}

/// Per-namespace infrastructure overrides applied to pool placement.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InfraSetting {
    pub t1_lr: Option<String>,
    pub network_placement: Option<String>,
    pub accepted: bool,
}

/// An extension CRD referenced from a route filter. The controller only cares
/// whether the referent exists and has been accepted by its own reconciler.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Extension {
    pub accepted: bool,
}
