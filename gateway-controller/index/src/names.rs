//! Derived object names.
//!
//! Parent-level names stay readable (`cluster--ns-name`); anything built per
//! (route, rule, backend) concatenates every contributing coordinate and is
//! hashed into a fixed-width encoded form so it stays under the backend's
//! name-length limit. All of it is pure: the same inputs always produce the
//! same names, across processes.

use sha2::{Digest, Sha256};

use gateway_controller_core::{
    route::{BackendRef, RouteMatch, RouteRule},
    ObjectRef, ResourceKey,
};

use crate::cluster_config::ClusterConfig;

pub fn parent_name(config: &ClusterConfig, gw: &ObjectRef) -> String {
    let name = format!("{}{}-{}", config.name_prefix(), gw.namespace, gw.name);
    check_len(config, &name);
    name
}

pub fn vip_name(config: &ClusterConfig, gw: &ObjectRef) -> String {
    format!("{}-vip", parent_name(config, gw))
}

pub fn model_key(tenant: &str, parent_name: &str) -> String {
    format!("{tenant}/{parent_name}")
}

/// The token distinguishing one rule inside a route: its name when declared,
/// otherwise a fingerprint of its match list.
pub fn rule_token(rule: &RouteRule) -> String {
    rule.name
        .clone()
        .unwrap_or_else(|| match_fingerprint(&rule.matches))
}

pub fn match_fingerprint(matches: &[RouteMatch]) -> String {
    let bytes = serde_json::to_vec(matches).unwrap_or_default();
    hex::encode(Sha256::digest(&bytes))[..10].to_string()
}

pub fn child_name(
    config: &ClusterConfig,
    gw: &ObjectRef,
    route: &ResourceKey,
    token: &str,
) -> String {
    encode(config, &scope_name(config, gw, route, token))
}

pub fn pool_group_name(
    config: &ClusterConfig,
    gw: &ObjectRef,
    route: &ResourceKey,
    token: &str,
) -> String {
    encode(config, &format!("{}-pg", scope_name(config, gw, route, token)))
}

pub fn pool_name(
    config: &ClusterConfig,
    gw: &ObjectRef,
    route: &ResourceKey,
    token: &str,
    backend: &BackendRef,
) -> String {
    encode(
        config,
        &format!(
            "{}-{}-{}-{}",
            scope_name(config, gw, route, token),
            backend.namespace,
            backend.name,
            backend.port
        ),
    )
}

pub fn persistence_name(
    config: &ClusterConfig,
    gw: &ObjectRef,
    route: &ResourceKey,
    token: &str,
) -> String {
    encode(
        config,
        &format!("{}-persist", scope_name(config, gw, route, token)),
    )
}

pub fn policy_name(
    config: &ClusterConfig,
    gw: &ObjectRef,
    route: &ResourceKey,
    token: &str,
) -> String {
    encode(config, &format!("{}-policy", scope_name(config, gw, route, token)))
}

pub fn cert_name(config: &ClusterConfig, gw: &ObjectRef, secret: &ObjectRef) -> String {
    let name = format!(
        "{}{}-{}-{}-{}",
        config.name_prefix(),
        gw.namespace,
        gw.name,
        secret.namespace,
        secret.name
    );
    check_len(config, &name);
    name
}

fn scope_name(config: &ClusterConfig, gw: &ObjectRef, route: &ResourceKey, token: &str) -> String {
    format!(
        "{}{}-{}-{}-{}-{}",
        config.name_prefix(),
        gw.namespace,
        gw.name,
        route.namespace,
        route.name,
        token
    )
}

fn encode(config: &ClusterConfig, raw: &str) -> String {
    format!("{}{}", config.name_prefix(), hex::encode(Sha256::digest(raw)))
}

fn check_len(config: &ClusterConfig, name: &str) {
    if name.len() > config.max_object_name_len {
        tracing::warn!(%name, limit = config.max_object_name_len, "Derived name exceeds length limit");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gateway_controller_core::route::PathMatch;

    fn rule(name: Option<&str>, path: &str) -> RouteRule {
        RouteRule {
            name: name.map(Into::into),
            matches: vec![RouteMatch {
                path: Some(PathMatch::Prefix(path.to_string())),
                headers: vec![],
            }],
            ..RouteRule::default()
        }
    }

    #[test]
    fn names_are_deterministic() {
        let config = ClusterConfig::default();
        let gw = ObjectRef::new("ns", "gw");
        let route = ResourceKey::http_route("apps", "shop");
        let token = rule_token(&rule(None, "/cart"));
        assert_eq!(
            child_name(&config, &gw, &route, &token),
            child_name(&config, &gw, &route, &token),
        );
    }

    #[test]
    fn named_rules_use_their_name() {
        assert_eq!(rule_token(&rule(Some("checkout"), "/cart")), "checkout");
    }

    #[test]
    fn unnamed_rules_fingerprint_their_matches() {
        let a = rule_token(&rule(None, "/cart"));
        let b = rule_token(&rule(None, "/cart"));
        let c = rule_token(&rule(None, "/browse"));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn scopes_never_collide_across_node_types() {
        let config = ClusterConfig::default();
        let gw = ObjectRef::new("ns", "gw");
        let route = ResourceKey::http_route("apps", "shop");
        let child = child_name(&config, &gw, &route, "r1");
        let pg = pool_group_name(&config, &gw, &route, "r1");
        let persist = persistence_name(&config, &gw, &route, "r1");
        assert_ne!(child, pg);
        assert_ne!(child, persist);
        assert_ne!(pg, persist);
    }

    #[test]
    fn parent_names_are_readable() {
        let config = ClusterConfig::default();
        assert_eq!(
            parent_name(&config, &ObjectRef::new("ns", "gw")),
            "cluster--ns-gw"
        );
    }
}
