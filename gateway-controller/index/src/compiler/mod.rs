//! Compiles one gateway and its attached routes into a config graph.
//!
//! Compilation is a pure function of the caches, the relation store's
//! attachment state and the cluster config: every pass rebuilds the whole
//! graph for the gateway, so there is no incremental state to go stale.

mod dedicated;
mod shared;

use std::net::IpAddr;

use gateway_controller_core::{
    gateway::InfraSetting,
    graph::{
        CertificateNode, ConfigGraph, HeaderAction, OwnerMarkers, ParentListenerNode, PolicyNode,
        PoolGroupMember, PoolGroupNode, PoolNode, PortProtocol, RoutingNodes, VipNode,
    },
    route::{Filter, ParsedRoute, Redirect, Rewrite, RouteRule},
    ObjectRef, ResourceKey,
};

use crate::{
    cluster_config::ClusterConfig,
    names,
    parser::ParserRegistry,
    relations::{Attachment, RelationStore},
    resources::ResourceCache,
};

/// One attached route, parsed and paired with its hostname intersection.
pub(crate) struct AttachedRoute {
    pub key: ResourceKey,
    pub attachment: Attachment,
    pub parsed: ParsedRoute,
}

/// Builds the graph for a gateway, or `None` when the gateway is gone, not
/// ours, or has no valid listeners; `None` means the model entry is torn
/// down.
pub fn compile(
    config: &ClusterConfig,
    cache: &ResourceCache,
    relations: &RelationStore,
    registry: &ParserRegistry,
    gw: &ObjectRef,
) -> Option<ConfigGraph> {
    let gateway = cache.gateway(gw)?;
    let class = cache.gateway_class(&gateway.class_name)?;
    if class.controller_name != config.controller_name {
        return None;
    }
    let state = relations.gateway_state(gw)?.clone();
    if !state.accepted || state.valid_listeners.is_empty() {
        return None;
    }

    let tenant = cache
        .tenant_of(&gw.namespace, &config.default_tenant)
        .to_string();
    let parent_name = names::parent_name(config, gw);

    let mut port_protocols: Vec<PortProtocol> = gateway
        .listeners
        .iter()
        .filter(|l| state.valid_listeners.contains(&l.name))
        .map(|l| PortProtocol {
            port: l.port,
            protocol: l.protocol,
            enable_ssl: l.protocol.requires_tls(),
        })
        .collect();
    port_protocols.sort();
    port_protocols.dedup();

    let mut certificates = Vec::new();
    for listener in &gateway.listeners {
        if !state.valid_listeners.contains(&listener.name) || !listener.protocol.requires_tls() {
            continue;
        }
        for cert_ref in &listener.tls_cert_refs {
            let name = names::cert_name(config, gw, cert_ref);
            if certificates.iter().any(|c: &CertificateNode| c.name == name) {
                continue;
            }
            if let Some(secret) = cache.secret(cert_ref) {
                certificates.push(CertificateNode {
                    name,
                    tenant: tenant.clone(),
                    cert: secret.cert.clone(),
                    key: secret.key.clone(),
                    markers: OwnerMarkers::gateway(&gw.namespace, &gw.name),
                });
            }
        }
    }

    // Parse every attached route; attachment order is already deterministic.
    let routes: Vec<AttachedRoute> = relations
        .attachments_for(gw)
        .into_iter()
        .filter_map(|(key, attachment)| {
            let spec = cache.route(&key)?;
            let outcome = registry.parse(cache, &key, spec);
            Some(AttachedRoute {
                key,
                attachment,
                parsed: outcome.route,
            })
        })
        .collect();

    // The VIP answers for every concrete hostname the routes matched.
    let mut fqdns = Vec::new();
    for route in &routes {
        for host in &route.attachment.hostnames {
            if !host.starts_with('*') && !fqdns.contains(host) {
                fqdns.push(host.clone());
            }
        }
    }

    let infra = cache.infra_setting(&gw.namespace);
    let vip = VipNode {
        name: names::vip_name(config, gw),
        tenant: tenant.clone(),
        ip_address: gateway
            .addresses
            .first()
            .filter(|a| a.value.parse::<IpAddr>().is_ok())
            .map(|a| a.value.clone()),
        fqdns,
        t1_lr: infra.and_then(|i| i.t1_lr.clone()),
    };

    let routing = if config.dedicated_mode {
        RoutingNodes::Dedicated(dedicated::build(
            config,
            gw,
            &tenant,
            &parent_name,
            &routes,
            infra,
        ))
    } else {
        RoutingNodes::Children(shared::build(config, gw, &tenant, &routes, infra))
    };

    Some(ConfigGraph {
        parent: ParentListenerNode {
            name: parent_name,
            tenant,
            port_protocols,
            vip,
            certificates,
            routing,
            markers: OwnerMarkers::gateway(&gw.namespace, &gw.name),
        },
    })
}

/// Pools and the pool group for one rule's backends. Backends are already
/// resolved by the parser; weights become pool-group ratios verbatim.
pub(crate) fn build_pools(
    config: &ClusterConfig,
    gw: &ObjectRef,
    tenant: &str,
    route: &ResourceKey,
    token: &str,
    rule: &RouteRule,
    infra: Option<&InfraSetting>,
) -> (Vec<PoolNode>, Option<PoolGroupNode>) {
    let mut pools = Vec::new();
    let mut members = Vec::new();
    for backend in &rule.backends {
        let name = names::pool_name(config, gw, route, token, &backend.backend);
        pools.push(PoolNode {
            name: name.clone(),
            tenant: tenant.to_string(),
            port: backend.backend.port,
            target_port: backend.backend.target_port,
            port_name: backend.backend.port_name.clone(),
            t1_lr: infra.and_then(|i| i.t1_lr.clone()),
            network_placement: infra.and_then(|i| i.network_placement.clone()),
            markers: OwnerMarkers::gateway(&gw.namespace, &gw.name)
                .with_route(&route.namespace, &route.name)
                .with_rule(token)
                .with_backend(&backend.backend.namespace, &backend.backend.name),
        });
        members.push(PoolGroupMember {
            pool_name: name,
            ratio: backend.backend.weight,
        });
    }
    let group = (!members.is_empty()).then(|| PoolGroupNode {
        name: names::pool_group_name(config, gw, route, token),
        tenant: tenant.to_string(),
        members,
        markers: OwnerMarkers::gateway(&gw.namespace, &gw.name)
            .with_route(&route.namespace, &route.name)
            .with_rule(token),
    });
    (pools, group)
}

/// The request-side actions of a rule. A redirect wins outright: header
/// modifications and rewrites configured next to it are suppressed.
pub(crate) fn request_actions(
    rule: &RouteRule,
) -> (Option<Redirect>, Option<Rewrite>, Vec<HeaderAction>) {
    let redirect = rule.filters.iter().find_map(|f| match f {
        Filter::RequestRedirect(r) => Some(r.clone()),
        _ => None,
    });
    if let Some(redirect) = redirect {
        return (Some(redirect), None, Vec::new());
    }
    let rewrite = rule.filters.iter().find_map(|f| match f {
        Filter::UrlRewrite(r) => Some(r.clone()),
        _ => None,
    });
    let mut header_actions = Vec::new();
    for filter in &rule.filters {
        if let Filter::RequestHeaderModifier(m) = filter {
            header_actions.extend(HeaderAction::from_modifier(m));
        }
    }
    (None, rewrite, header_actions)
}

pub(crate) fn response_actions(rule: &RouteRule) -> Vec<HeaderAction> {
    let mut actions = Vec::new();
    for filter in &rule.filters {
        if let Filter::ResponseHeaderModifier(m) = filter {
            actions.extend(HeaderAction::from_modifier(m));
        }
    }
    actions
}

pub(crate) fn empty_policy(policy: &PolicyNode) -> bool {
    policy.is_empty()
}
