//! Shared-parent topology: one child routing node per attached (route, rule).

use gateway_controller_core::{
    gateway::InfraSetting,
    graph::{
        ChildRoutingNode, OwnerMarkers, PersistenceNode, PolicyNode, RequestRule, ResponseRule,
    },
    ObjectRef,
};

use super::AttachedRoute;
use crate::{cluster_config::ClusterConfig, names};

pub(crate) fn build(
    config: &ClusterConfig,
    gw: &ObjectRef,
    tenant: &str,
    routes: &[AttachedRoute],
    infra: Option<&InfraSetting>,
) -> Vec<ChildRoutingNode> {
    let mut children = Vec::new();
    for route in routes {
        for rule in &route.parsed.rules {
            // A rule with no matches selects no traffic; it gets no child.
            if rule.matches.is_empty() {
                continue;
            }
            let token = names::rule_token(rule);
            let name = names::child_name(config, gw, &route.key, &token);
            let markers = OwnerMarkers::gateway(&gw.namespace, &gw.name)
                .with_route(&route.key.namespace, &route.key.name)
                .with_rule(&token);

            let (pools, pool_group) =
                super::build_pools(config, gw, tenant, &route.key, &token, rule, infra);

            let policy = build_policy(config, gw, tenant, route, &token, rule);

            let persistence = rule.persistence.as_ref().map(|p| PersistenceNode {
                name: names::persistence_name(config, gw, &route.key, &token),
                tenant: tenant.to_string(),
                cookie_name: p.cookie_name.clone(),
                timeout_minutes: p.timeout_minutes,
                markers: markers.clone(),
            });

            children.push(ChildRoutingNode {
                name,
                tenant: tenant.to_string(),
                hostnames: route.attachment.hostnames.clone(),
                matches: rule.matches.clone(),
                pools,
                pool_group,
                policy,
                persistence,
                markers,
            });
        }
    }
    children
}

/// The child's policy, carrying only what the rule's filters require. The
/// child node itself does the match-based routing, so these rules carry no
/// match of their own. Request indices count from 0, response from 1000.
fn build_policy(
    config: &ClusterConfig,
    gw: &ObjectRef,
    tenant: &str,
    route: &AttachedRoute,
    token: &str,
    rule: &gateway_controller_core::route::RouteRule,
) -> Option<PolicyNode> {
    let (redirect, rewrite, header_actions) = super::request_actions(rule);

    let mut request_rules = Vec::new();
    if redirect.is_some() || rewrite.is_some() || !header_actions.is_empty() {
        request_rules.push(RequestRule {
            name: format!("{token}-rq-0"),
            index: 0,
            redirect,
            rewrite,
            header_actions,
            ..RequestRule::default()
        });
    }

    let mut response_rules = Vec::new();
    let response = super::response_actions(rule);
    if !response.is_empty() {
        response_rules.push(ResponseRule {
            name: format!("{token}-rs-1000"),
            index: 1000,
            match_: None,
            header_actions: response,
        });
    }

    let policy = PolicyNode {
        name: names::policy_name(config, gw, &route.key, token),
        tenant: tenant.to_string(),
        request_rules,
        response_rules,
        markers: OwnerMarkers::gateway(&gw.namespace, &gw.name)
            .with_route(&route.key.namespace, &route.key.name)
            .with_rule(token),
    };
    (!super::empty_policy(&policy)).then_some(policy)
}
