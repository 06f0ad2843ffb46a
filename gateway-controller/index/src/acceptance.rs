//! Acceptance validation for gateways and routes.
//!
//! Route acceptance walks an ordered set of checks per parent ref; the first
//! failing check decides the reason. The outcome also records which listeners
//! the route attached to and the hostname intersection, which the compiler
//! consumes via the relation store.

use regex::Regex;
use std::fmt;
use std::net::IpAddr;

use gateway_controller_core::{
    condition::{self, Condition, ConditionStatus},
    gateway::Gateway,
    route::{HttpFilter, ParentRef, RouteSpec},
    ObjectRef, ResourceKey, ResourceKind,
};
use gateway_controller_status::{GatewayStatus, ListenerStatus};

use crate::{
    cluster_config::ClusterConfig,
    relations::{Attachment, GatewayState, RelationStore},
    resources::ResourceCache,
};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AcceptanceReason {
    Accepted,
    NotFound,
    WrongController,
    TenantMismatch,
    Pending,
    NoMatchingParent,
    NotAllowedByListeners,
    NoMatchingListenerHostname,
    UnsupportedFilter,
    DuplicateFilter,
    ExtensionNotReady,
}

impl AcceptanceReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Accepted => "Accepted",
            Self::NotFound => "NotFound",
            Self::WrongController => "WrongController",
            Self::TenantMismatch => "TenantMismatch",
            Self::Pending => "Pending",
            Self::NoMatchingParent => "NoMatchingParent",
            Self::NotAllowedByListeners => "NotAllowedByListeners",
            Self::NoMatchingListenerHostname => "NoMatchingListenerHostname",
            Self::UnsupportedFilter => "UnsupportedFilter",
            Self::DuplicateFilter => "DuplicateFilter",
            Self::ExtensionNotReady => "ExtensionNotReady",
        }
    }
}

impl fmt::Display for AcceptanceReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The acceptance outcome for one (route, parent ref) pair.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AcceptanceStatus {
    pub accepted: bool,
    pub reason: AcceptanceReason,
    pub message: String,
    pub matched_listeners: Vec<String>,
    pub matched_hostnames: Vec<String>,
}

impl AcceptanceStatus {
    fn rejected(reason: AcceptanceReason, message: impl ToString) -> Self {
        Self {
            accepted: false,
            reason,
            message: message.to_string(),
            matched_listeners: Vec::new(),
            matched_hostnames: Vec::new(),
        }
    }

    pub fn conditions(&self, generation: i64) -> Vec<Condition> {
        let status = if self.accepted {
            ConditionStatus::True
        } else {
            ConditionStatus::False
        };
        let mut conditions = Vec::new();
        Condition::new(condition::ACCEPTED)
            .status(status)
            .reason(self.reason)
            .message(&self.message)
            .observed_generation(generation)
            .set_in(&mut conditions);
        conditions
    }
}

/// Validates a route against every parent ref and records the resulting
/// attachments. Order of the output matches the parent ref declaration order.
pub fn validate_route(
    config: &ClusterConfig,
    cache: &ResourceCache,
    relations: &mut RelationStore,
    key: &ResourceKey,
    spec: &RouteSpec,
) -> Vec<(ParentRef, AcceptanceStatus)> {
    let mut out = Vec::with_capacity(spec.parent_refs().len());
    for parent in spec.parent_refs() {
        let gw = ObjectRef::new(
            parent.namespace.as_deref().unwrap_or(&key.namespace),
            &parent.name,
        );
        let status = validate_parent(config, cache, relations, key, spec, parent, &gw);
        if status.accepted {
            relations.set_attachment(
                gw.clone(),
                key.clone(),
                Attachment {
                    listeners: status.matched_listeners.clone(),
                    hostnames: status.matched_hostnames.clone(),
                },
            );
        } else {
            relations.clear_attachment(&gw, key);
        }
        tracing::debug!(route = %key, gateway = %gw, reason = %status.reason, "Validated parent ref");
        out.push((parent.clone(), status));
    }
    out
}

fn validate_parent(
    config: &ClusterConfig,
    cache: &ResourceCache,
    relations: &RelationStore,
    key: &ResourceKey,
    spec: &RouteSpec,
    parent: &ParentRef,
    gw: &ObjectRef,
) -> AcceptanceStatus {
    // 1. The parent gateway must exist and belong to this controller.
    let Some(gateway) = cache.gateway(gw) else {
        return AcceptanceStatus::rejected(
            AcceptanceReason::NotFound,
            format!("gateway {gw} not found"),
        );
    };
    match cache.gateway_class(&gateway.class_name) {
        None => {
            return AcceptanceStatus::rejected(
                AcceptanceReason::NotFound,
                format!("gateway class {} not found", gateway.class_name),
            );
        }
        Some(class) if class.controller_name != config.controller_name => {
            return AcceptanceStatus::rejected(
                AcceptanceReason::WrongController,
                format!(
                    "gateway class {} is managed by {}",
                    gateway.class_name, class.controller_name
                ),
            );
        }
        Some(_) => {}
    }

    // 2. When the parent ref names a section or port, it must select at
    //    least one listener.
    let selected: Vec<_> = gateway
        .listeners
        .iter()
        .filter(|listener| {
            parent
                .section_name
                .as_ref()
                .is_none_or(|section| &listener.name == section)
                && parent.port.is_none_or(|port| listener.port == port)
        })
        .collect();
    if selected.is_empty() {
        return AcceptanceStatus::rejected(
            AcceptanceReason::NoMatchingParent,
            "no listener matches the parent ref selection",
        );
    }

    // 3. Route and gateway must live in the same tenant.
    let route_tenant = cache.tenant_of(&key.namespace, &config.default_tenant);
    let gw_tenant = cache.tenant_of(&gw.namespace, &config.default_tenant);
    if route_tenant != gw_tenant {
        return AcceptanceStatus::rejected(
            AcceptanceReason::TenantMismatch,
            format!("route tenant {route_tenant} does not match gateway tenant {gw_tenant}"),
        );
    }

    // 4. The gateway itself must have passed validation.
    let state = match relations.gateway_state(gw) {
        Some(state) if state.accepted => state,
        Some(state) => {
            return AcceptanceStatus::rejected(
                AcceptanceReason::Pending,
                format!("gateway {gw} is not accepted: {}", state.message),
            );
        }
        None => {
            return AcceptanceStatus::rejected(
                AcceptanceReason::Pending,
                format!("gateway {gw} has not been validated yet"),
            );
        }
    };

    // 5. A selected, valid listener must admit the route's kind from the
    //    route's namespace.
    let mut admitted = Vec::new();
    for listener in selected {
        if !state.valid_listeners.contains(&listener.name) {
            continue;
        }
        if listener.allowed_routes.admits_kind(spec.kind())
            && listener
                .allowed_routes
                .admits_namespace(&gw.namespace, &key.namespace)
        {
            admitted.push(listener);
        }
    }
    if admitted.is_empty() {
        return AcceptanceStatus::rejected(
            AcceptanceReason::NotAllowedByListeners,
            "no valid listener admits this route",
        );
    }

    // 6. The hostname intersection must be non-empty.
    let mut matched_listeners = Vec::new();
    let mut matched_hostnames = Vec::new();
    for listener in admitted {
        let hosts = host_intersection(listener.hostname.as_deref(), spec.hostnames());
        if hosts.is_empty() {
            continue;
        }
        matched_listeners.push(listener.name.clone());
        for host in hosts {
            if !matched_hostnames.contains(&host) {
                matched_hostnames.push(host);
            }
        }
    }
    if matched_listeners.is_empty() {
        return AcceptanceStatus::rejected(
            AcceptanceReason::NoMatchingListenerHostname,
            "listener hostnames do not intersect the route hostnames",
        );
    }

    // 7. Extension filters must be legal and their referents ready.
    if let Err(status) = check_extension_filters(cache, key, spec) {
        return *status;
    }

    AcceptanceStatus {
        accepted: true,
        reason: AcceptanceReason::Accepted,
        message: "route accepted".to_string(),
        matched_listeners,
        matched_hostnames,
    }
}

/// Extension kinds a rule-level filter may reference.
const RULE_EXTENSION_KINDS: &[ResourceKind] = &[
    ResourceKind::ApplicationProfile,
    ResourceKind::L7Rule,
    ResourceKind::HealthMonitor,
];

/// Extension kinds a backend-level filter may reference.
const BACKEND_EXTENSION_KINDS: &[ResourceKind] = &[
    ResourceKind::RouteBackendExtension,
    ResourceKind::HealthMonitor,
];

fn check_extension_filters(
    cache: &ResourceCache,
    key: &ResourceKey,
    spec: &RouteSpec,
) -> Result<(), Box<AcceptanceStatus>> {
    let RouteSpec::Http(http) = spec;
    for rule in &http.rules {
        let mut seen = Vec::new();
        let rule_refs = rule.filters.iter().filter_map(|f| match f {
            HttpFilter::ExtensionRef(ext) => Some((ext, RULE_EXTENSION_KINDS)),
            _ => None,
        });
        let backend_refs = rule
            .backend_refs
            .iter()
            .flat_map(|b| &b.filters)
            .map(|ext| (ext, BACKEND_EXTENSION_KINDS));
        for (ext, allowed) in rule_refs.chain(backend_refs) {
            let kind = match ext.kind.parse::<ResourceKind>() {
                Ok(kind) if allowed.contains(&kind) => kind,
                _ => {
                    return Err(Box::new(AcceptanceStatus::rejected(
                        AcceptanceReason::UnsupportedFilter,
                        format!("unsupported extension filter kind {}", ext.kind),
                    )));
                }
            };
            // HealthMonitor may repeat; everything else is once per rule.
            if kind != ResourceKind::HealthMonitor {
                if seen.contains(&kind) {
                    return Err(Box::new(AcceptanceStatus::rejected(
                        AcceptanceReason::DuplicateFilter,
                        format!("extension filter kind {kind} appears more than once"),
                    )));
                }
                seen.push(kind);
            }
            let target = ResourceKey::new(kind, &key.namespace, &ext.name);
            match cache.extension(&target) {
                Some(ext) if ext.accepted => {}
                Some(_) => {
                    return Err(Box::new(AcceptanceStatus::rejected(
                        AcceptanceReason::ExtensionNotReady,
                        format!("{target} is not accepted yet"),
                    )));
                }
                None => {
                    return Err(Box::new(AcceptanceStatus::rejected(
                        AcceptanceReason::ExtensionNotReady,
                        format!("{target} not found"),
                    )));
                }
            }
        }
    }
    Ok(())
}

/// Validates a gateway and builds its status. Returns `None` for gateways
/// that are gone or belong to another controller; those get no status from
/// us.
pub fn validate_gateway(
    config: &ClusterConfig,
    cache: &ResourceCache,
    relations: &RelationStore,
    gw: &ObjectRef,
) -> Option<(GatewayState, GatewayStatus)> {
    let gateway = cache.gateway(gw)?;
    let class = cache.gateway_class(&gateway.class_name)?;
    if class.controller_name != config.controller_name {
        return None;
    }

    let mut errors = Vec::new();
    let mut addresses = Vec::new();
    if gateway.addresses.len() > 1 {
        errors.push("more than one static address".to_string());
    } else if let Some(addr) = gateway.addresses.first() {
        let typed_ip = addr.type_.as_deref().is_none_or(|t| t == "IPAddress");
        if typed_ip && addr.value.parse::<IpAddr>().is_ok() {
            addresses.push(addr.value.clone());
        } else {
            errors.push(format!("address {} is not an IP address", addr.value));
        }
    }
    if gateway.listeners.is_empty() {
        errors.push("gateway has no listeners".to_string());
    }

    let mut valid_listeners = Vec::new();
    let mut listener_statuses = Vec::new();
    for listener in &gateway.listeners {
        let problem = validate_listener(config, cache, gw, gateway, &listener.name);
        let mut conditions = Vec::new();
        match &problem {
            None => {
                valid_listeners.push(listener.name.clone());
                Condition::new(condition::ACCEPTED)
                    .status(ConditionStatus::True)
                    .reason("Accepted")
                    .observed_generation(gateway.generation)
                    .set_in(&mut conditions);
                Condition::new(condition::RESOLVED_REFS)
                    .status(ConditionStatus::True)
                    .reason("ResolvedRefs")
                    .observed_generation(gateway.generation)
                    .set_in(&mut conditions);
            }
            Some((reason, message)) => {
                Condition::new(condition::ACCEPTED)
                    .status(ConditionStatus::False)
                    .reason(*reason)
                    .message(message)
                    .observed_generation(gateway.generation)
                    .set_in(&mut conditions);
            }
        }
        listener_statuses.push(ListenerStatus {
            name: listener.name.clone(),
            attached_routes: relations.attached_count(gw, &listener.name),
            conditions,
        });
    }

    let accepted = errors.is_empty() && !valid_listeners.is_empty();
    let message = if accepted {
        "gateway accepted".to_string()
    } else if !errors.is_empty() {
        errors.join("; ")
    } else {
        "no valid listeners".to_string()
    };

    let mut conditions = Vec::new();
    let (status, reason) = if accepted {
        (ConditionStatus::True, "Accepted")
    } else {
        (ConditionStatus::False, "Invalid")
    };
    Condition::new(condition::ACCEPTED)
        .status(status)
        .reason(reason)
        .message(&message)
        .observed_generation(gateway.generation)
        .set_in(&mut conditions);
    Condition::new(condition::PROGRAMMED)
        .status(status)
        .reason(if accepted { "Programmed" } else { "Invalid" })
        .message(&message)
        .observed_generation(gateway.generation)
        .set_in(&mut conditions);

    let state = GatewayState {
        accepted,
        message,
        valid_listeners,
    };
    let status = GatewayStatus {
        conditions,
        addresses,
        listeners: listener_statuses,
    };
    Some((state, status))
}

/// One listener's validity problem, if any, as (reason, message).
fn validate_listener(
    config: &ClusterConfig,
    cache: &ResourceCache,
    gw: &ObjectRef,
    gateway: &Gateway,
    name: &str,
) -> Option<(&'static str, String)> {
    let listener = gateway.listeners.iter().find(|l| l.name == name)?;

    if !listener.protocol.is_supported() {
        return Some((
            "UnsupportedProtocol",
            format!("protocol {:?} is not supported", listener.protocol),
        ));
    }
    if listener
        .allowed_routes
        .kinds
        .iter()
        .any(|kind| *kind != ResourceKind::HttpRoute)
    {
        return Some((
            "InvalidRouteKinds",
            "only HTTPRoute may be allowed".to_string(),
        ));
    }
    if listener.protocol.requires_tls() {
        if listener.tls_cert_refs.is_empty() {
            return Some((
                "InvalidCertificateRef",
                "HTTPS listener has no certificate refs".to_string(),
            ));
        }
        for cert in &listener.tls_cert_refs {
            if cache.secret(cert).is_none() {
                return Some((
                    "InvalidCertificateRef",
                    format!("secret {cert} not found"),
                ));
            }
        }
    }

    // A hostname claimed verbatim by a sibling listener, or by a listener on
    // another gateway of ours, is a conflict.
    if let Some(hostname) = &listener.hostname {
        let same_gateway_dup = gateway
            .listeners
            .iter()
            .any(|other| other.name != listener.name && other.hostname.as_ref() == Some(hostname));
        let cross_gateway_dup = cache.gateways().any(|(other_ref, other)| {
            other_ref != gw
                && cache
                    .gateway_class(&other.class_name)
                    .is_some_and(|c| c.controller_name == config.controller_name)
                && other
                    .listeners
                    .iter()
                    .any(|l| l.hostname.as_ref() == Some(hostname))
        });
        if same_gateway_dup || cross_gateway_dup {
            return Some((
                "HostnameConflict",
                format!("hostname {hostname} is claimed by another listener"),
            ));
        }
    }
    None
}

// === hostname algebra ===

/// Intersects a listener hostname with a route's hostname set.
///
/// An unset or `*` listener hostname admits everything the route asks for; a
/// route without hostnames inherits the listener hostname. Wildcards narrow:
/// the more specific side wins.
pub fn host_intersection(listener: Option<&str>, route_hosts: &[String]) -> Vec<String> {
    match listener {
        None | Some("*") => {
            if route_hosts.is_empty() {
                vec!["*".to_string()]
            } else {
                route_hosts.to_vec()
            }
        }
        Some(lh) => {
            if route_hosts.is_empty() {
                return vec![lh.to_string()];
            }
            route_hosts
                .iter()
                .filter_map(|rh| narrower(lh, rh))
                .collect()
        }
    }
}

/// The narrower of two hostnames when they overlap, `None` otherwise.
fn narrower(listener: &str, route: &str) -> Option<String> {
    match (listener.starts_with("*."), route.starts_with("*.")) {
        (false, false) => (listener == route).then(|| route.to_string()),
        (true, false) => wildcard_matches(listener, route).then(|| route.to_string()),
        (false, true) => wildcard_matches(route, listener).then(|| listener.to_string()),
        (true, true) => {
            // Suffix containment either way; the longer pattern is narrower.
            let (ls, rs) = (&listener[1..], &route[1..]);
            if rs.ends_with(ls) {
                Some(route.to_string())
            } else if ls.ends_with(rs) {
                Some(listener.to_string())
            } else {
                None
            }
        }
    }
}

/// Whether a `*.suffix` pattern covers an exact hostname. The wildcard label
/// is matched as one or more DNS labels.
fn wildcard_matches(pattern: &str, host: &str) -> bool {
    let suffix = regex::escape(&pattern[2..]);
    Regex::new(&format!(r"^([a-zA-Z0-9-]+\.)+{suffix}$"))
        .map(|re| re.is_match(host))
        .unwrap_or(false)
}
