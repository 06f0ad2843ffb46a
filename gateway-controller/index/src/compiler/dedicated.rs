//! Dedicated topology: every rule of every attached route folds into a
//! single routing node on the parent, with one combined policy doing the
//! content switching.

use gateway_controller_core::{
    gateway::InfraSetting,
    graph::{DedicatedNode, OwnerMarkers, PersistenceNode, PolicyNode, RequestRule, ResponseRule},
    route::{PathMatch, RouteMatch},
    ObjectRef,
};

use super::AttachedRoute;
use crate::{cluster_config::ClusterConfig, names};

struct SwitchEntry {
    match_: RouteMatch,
    pool_group: Option<String>,
    redirect: Option<gateway_controller_core::route::Redirect>,
    rewrite: Option<gateway_controller_core::route::Rewrite>,
    header_actions: Vec<gateway_controller_core::graph::HeaderAction>,
    response_actions: Vec<gateway_controller_core::graph::HeaderAction>,
}

pub(crate) fn build(
    config: &ClusterConfig,
    gw: &ObjectRef,
    tenant: &str,
    parent_name: &str,
    routes: &[AttachedRoute],
    infra: Option<&InfraSetting>,
) -> DedicatedNode {
    let mut node = DedicatedNode::default();
    let mut entries = Vec::new();

    for route in routes {
        for rule in &route.parsed.rules {
            if rule.matches.is_empty() {
                continue;
            }
            let token = names::rule_token(rule);
            let (pools, pool_group) =
                super::build_pools(config, gw, tenant, &route.key, &token, rule, infra);
            node.pools.extend(pools);
            let pg_name = pool_group.as_ref().map(|pg| pg.name.clone());
            node.pool_groups.extend(pool_group);

            if let Some(p) = &rule.persistence {
                node.persistence.push(PersistenceNode {
                    name: names::persistence_name(config, gw, &route.key, &token),
                    tenant: tenant.to_string(),
                    cookie_name: p.cookie_name.clone(),
                    timeout_minutes: p.timeout_minutes,
                    markers: OwnerMarkers::gateway(&gw.namespace, &gw.name)
                        .with_route(&route.key.namespace, &route.key.name)
                        .with_rule(&token),
                });
            }

            let (redirect, rewrite, header_actions) = super::request_actions(rule);
            let response_actions = super::response_actions(rule);
            for match_ in &rule.matches {
                entries.push(SwitchEntry {
                    match_: match_.clone(),
                    pool_group: pg_name.clone(),
                    redirect: redirect.clone(),
                    rewrite: rewrite.clone(),
                    header_actions: header_actions.clone(),
                    response_actions: response_actions.clone(),
                });
            }
        }
    }

    // Longest-prefix-match order: exact beats prefix beats regex, longer
    // paths first; the sort is stable so declaration order breaks ties.
    entries.sort_by(|a, b| priority(&b.match_).cmp(&priority(&a.match_)));

    let has_root_match = entries.iter().any(|e| {
        matches!(
            e.match_.path.as_ref(),
            Some(PathMatch::Exact(p) | PathMatch::Prefix(p)) if p == "/"
        )
    });

    let mut request_rules = Vec::new();
    let mut response_rules = Vec::new();
    for (i, entry) in entries.into_iter().enumerate() {
        let index = i as u32;
        if !entry.response_actions.is_empty() {
            response_rules.push(ResponseRule {
                name: format!("{parent_name}-rs-{}", 1000 + response_rules.len()),
                index: 1000 + response_rules.len() as u32,
                match_: Some(entry.match_.clone()),
                header_actions: entry.response_actions,
            });
        }
        request_rules.push(RequestRule {
            name: format!("{parent_name}-rq-{index}"),
            index,
            match_: Some(entry.match_),
            // Redirects answer directly, so they never switch pools.
            switch_pool_group: if entry.redirect.is_some() {
                None
            } else {
                entry.pool_group
            },
            redirect: entry.redirect,
            rewrite: entry.rewrite,
            header_actions: entry.header_actions,
            local_response_status: None,
        });
    }

    // Anything that escapes every match gets a local 404.
    if !has_root_match {
        let index = request_rules.len() as u32;
        request_rules.push(RequestRule {
            name: format!("{parent_name}-default-404"),
            index,
            match_: Some(RouteMatch {
                path: Some(PathMatch::Prefix("/".to_string())),
                headers: Vec::new(),
            }),
            local_response_status: Some(404),
            ..RequestRule::default()
        });
    }

    node.policy = Some(PolicyNode {
        name: format!("{parent_name}-policy"),
        tenant: tenant.to_string(),
        request_rules,
        response_rules,
        markers: OwnerMarkers::gateway(&gw.namespace, &gw.name),
    })
    .filter(|p| !super::empty_policy(p));
    node
}

/// Sort key: higher compares first. Path kind outranks path length.
fn priority(m: &RouteMatch) -> (u8, usize) {
    match m.path.as_ref() {
        Some(PathMatch::Exact(p)) => (3, p.len()),
        Some(PathMatch::Prefix(p)) => (2, p.len()),
        Some(PathMatch::Regex(p)) => (1, p.len()),
        None => (0, 0),
    }
}
