//! Graph compilation details in both topologies.

use pretty_assertions::assert_eq;

use gateway_controller_core::{
    gateway::InfraSetting,
    graph::{HeaderOp, RoutingNodes},
    route::{
        HeaderModifier, HeaderValue, HttpFilter, HttpPathMatch, HttpRouteMatch, PathMatchType,
        RequestRedirect, SessionPersistenceConfig, UrlRewrite,
    },
    ObjectRef, ResourceKey,
};

use super::support::*;
use crate::cluster_config::ClusterConfig;

fn dedicated_harness() -> Harness {
    Harness::with_config(ClusterConfig {
        dedicated_mode: true,
        ..ClusterConfig::default()
    })
}

fn exact_match(path: &str) -> HttpRouteMatch {
    HttpRouteMatch {
        path: Some(HttpPathMatch {
            value: Some(path.to_string()),
            match_type: PathMatchType::Exact,
        }),
        headers: vec![],
    }
}

fn regex_match(path: &str) -> HttpRouteMatch {
    HttpRouteMatch {
        path: Some(HttpPathMatch {
            value: Some(path.to_string()),
            match_type: PathMatchType::RegularExpression,
        }),
        headers: vec![],
    }
}

fn seeded(h: &Harness) -> (ObjectRef, ResourceKey) {
    let gw = ObjectRef::new("ns", "gw");
    let route_key = ResourceKey::http_route("apps", "shop");
    h.seed_class();
    h.apply_gateway(&gw, gateway(vec![http_listener("http", 80, Some("*.example.com"))]));
    h.apply_service(&ObjectRef::new("apps", "reviews"), service(80));
    (gw, route_key)
}

fn graph_of(h: &Harness, key: &str) -> gateway_controller_core::graph::ConfigGraph {
    h.state
        .store
        .read()
        .get(key)
        .and_then(|e| e.graph.clone())
        .expect("graph")
}

fn header_modifier(name: &str, value: &str) -> HeaderModifier {
    HeaderModifier {
        set: vec![HeaderValue {
            name: name.to_string(),
            value: value.to_string(),
        }],
        add: vec![],
        remove: vec![],
    }
}

#[test]
fn redirect_suppresses_header_modify_and_rewrite() {
    let h = Harness::new();
    let (gw, route_key) = seeded(&h);

    let mut r = rule(vec![prefix_match("/old")], vec![backend("reviews", 80, 1)]);
    r.filters = vec![
        HttpFilter::RequestHeaderModifier(header_modifier("x-env", "prod")),
        HttpFilter::UrlRewrite(UrlRewrite {
            hostname: Some("new.example.com".to_string()),
            path: None,
        }),
        HttpFilter::RequestRedirect(RequestRedirect {
            hostname: Some("moved.example.com".to_string()),
            status_code: None,
        }),
    ];
    h.apply_route(&route_key, route(&gw, vec!["shop.example.com"], vec![r]));

    let graph = graph_of(&h, "admin/cluster--ns-gw");
    let RoutingNodes::Children(children) = &graph.parent.routing else {
        panic!("expected shared topology");
    };
    let policy = children[0].policy.as_ref().expect("policy");
    assert_eq!(policy.request_rules.len(), 1);
    let rq = &policy.request_rules[0];
    assert_eq!(rq.index, 0);
    let redirect = rq.redirect.as_ref().expect("redirect");
    assert_eq!(redirect.status_code, 302);
    assert!(rq.rewrite.is_none());
    assert!(rq.header_actions.is_empty());
}

#[test]
fn header_modifiers_become_indexed_policy_rules() {
    let h = Harness::new();
    let (gw, route_key) = seeded(&h);

    let mut r = rule(vec![prefix_match("/")], vec![backend("reviews", 80, 1)]);
    r.filters = vec![
        HttpFilter::RequestHeaderModifier(header_modifier("x-env", "prod")),
        HttpFilter::ResponseHeaderModifier(header_modifier("x-served-by", "gw")),
    ];
    h.apply_route(&route_key, route(&gw, vec!["shop.example.com"], vec![r]));

    let graph = graph_of(&h, "admin/cluster--ns-gw");
    let RoutingNodes::Children(children) = &graph.parent.routing else {
        panic!("expected shared topology");
    };
    let policy = children[0].policy.as_ref().expect("policy");
    assert_eq!(policy.request_rules[0].index, 0);
    assert_eq!(policy.request_rules[0].header_actions[0].op, HeaderOp::Replace);
    assert_eq!(policy.response_rules[0].index, 1000);
    assert_eq!(policy.response_rules[0].header_actions[0].name, "x-served-by");
}

#[test]
fn weights_become_pool_group_ratios() {
    let h = Harness::new();
    let (gw, route_key) = seeded(&h);
    h.apply_service(&ObjectRef::new("apps", "reviews-v2"), service(80));

    h.apply_route(
        &route_key,
        route(
            &gw,
            vec!["shop.example.com"],
            vec![rule(
                vec![prefix_match("/")],
                vec![backend("reviews", 80, 3), backend("reviews-v2", 80, 1)],
            )],
        ),
    );

    let graph = graph_of(&h, "admin/cluster--ns-gw");
    let RoutingNodes::Children(children) = &graph.parent.routing else {
        panic!("expected shared topology");
    };
    let pg = children[0].pool_group.as_ref().expect("pool group");
    let ratios: Vec<u32> = pg.members.iter().map(|m| m.ratio).collect();
    assert_eq!(ratios, vec![3, 1]);
}

#[test]
fn unresolvable_backend_is_skipped_not_fatal() {
    let h = Harness::new();
    let (gw, route_key) = seeded(&h);
    h.apply_route(
        &route_key,
        route(
            &gw,
            vec!["shop.example.com"],
            vec![rule(
                vec![prefix_match("/")],
                vec![backend("reviews", 80, 2), backend("ghost", 80, 5)],
            )],
        ),
    );

    let graph = graph_of(&h, "admin/cluster--ns-gw");
    let RoutingNodes::Children(children) = &graph.parent.routing else {
        panic!("expected shared topology");
    };
    let pg = children[0].pool_group.as_ref().expect("pool group");
    assert_eq!(pg.members.len(), 1);
    assert_eq!(pg.members[0].ratio, 2);
}

#[test]
fn persistence_timeouts_normalize_to_minutes() {
    let h = Harness::new();
    let (gw, route_key) = seeded(&h);
    let mut r = rule(vec![prefix_match("/")], vec![backend("reviews", 80, 1)]);
    r.session_persistence = Some(SessionPersistenceConfig {
        cookie_name: Some("session".to_string()),
        absolute_timeout: Some("90s".to_string()),
    });
    h.apply_route(&route_key, route(&gw, vec!["shop.example.com"], vec![r]));

    let graph = graph_of(&h, "admin/cluster--ns-gw");
    let RoutingNodes::Children(children) = &graph.parent.routing else {
        panic!("expected shared topology");
    };
    let persistence = children[0].persistence.as_ref().expect("persistence");
    assert_eq!(persistence.timeout_minutes, 2);
    assert_eq!(persistence.cookie_name.as_deref(), Some("session"));
}

#[test]
fn https_listeners_produce_certificates_and_ssl_ports() {
    let h = Harness::new();
    let gw = ObjectRef::new("ns", "gw");
    let secret = ObjectRef::new("ns", "tls-cert");
    h.seed_class();
    h.apply_secret(&secret);
    h.apply_gateway(
        &gw,
        gateway(vec![https_listener("https", 443, Some("*.example.com"), &secret)]),
    );

    let graph = graph_of(&h, "admin/cluster--ns-gw");
    assert_eq!(graph.parent.port_protocols.len(), 1);
    assert!(graph.parent.port_protocols[0].enable_ssl);
    assert_eq!(graph.parent.certificates.len(), 1);
    assert_eq!(graph.parent.certificates[0].cert, "cert-pem");
}

#[test]
fn infra_setting_overrides_pool_placement() {
    let h = Harness::new();
    let (gw, route_key) = seeded(&h);
    h.state.cache.write().apply_infra_setting(
        "ns",
        InfraSetting {
            t1_lr: Some("/infra/t1-lr".to_string()),
            network_placement: Some("net-a".to_string()),
            accepted: true,
        },
    );
    h.apply_route(
        &route_key,
        route(
            &gw,
            vec!["shop.example.com"],
            vec![rule(vec![prefix_match("/")], vec![backend("reviews", 80, 1)])],
        ),
    );

    let graph = graph_of(&h, "admin/cluster--ns-gw");
    assert_eq!(graph.parent.vip.t1_lr.as_deref(), Some("/infra/t1-lr"));
    let RoutingNodes::Children(children) = &graph.parent.routing else {
        panic!("expected shared topology");
    };
    assert_eq!(children[0].pools[0].t1_lr.as_deref(), Some("/infra/t1-lr"));
    assert_eq!(children[0].pools[0].network_placement.as_deref(), Some("net-a"));
}

// === dedicated topology ===

#[test]
fn dedicated_mode_sorts_matches_by_specificity() {
    let h = dedicated_harness();
    let (gw, route_key) = seeded(&h);
    h.apply_route(
        &route_key,
        route(
            &gw,
            vec!["shop.example.com"],
            vec![
                rule(vec![regex_match("/v[0-9]+")], vec![backend("reviews", 80, 1)]),
                rule(vec![prefix_match("/cart")], vec![backend("reviews", 80, 1)]),
                rule(
                    vec![exact_match("/cart/checkout")],
                    vec![backend("reviews", 80, 1)],
                ),
                rule(vec![prefix_match("/cart/items")], vec![backend("reviews", 80, 1)]),
            ],
        ),
    );

    let graph = graph_of(&h, "admin/cluster--ns-gw");
    let RoutingNodes::Dedicated(node) = &graph.parent.routing else {
        panic!("expected dedicated topology");
    };
    let policy = node.policy.as_ref().expect("policy");
    let paths: Vec<String> = policy
        .request_rules
        .iter()
        .filter_map(|r| r.match_.as_ref())
        .filter_map(|m| m.path.as_ref())
        .map(|p| p.value().to_string())
        .collect();
    // Exact first, then prefixes longest-first, then regex, then the 404.
    assert_eq!(paths, vec!["/cart/checkout", "/cart/items", "/cart", "/v[0-9]+", "/"]);

    let indices: Vec<u32> = policy.request_rules.iter().map(|r| r.index).collect();
    assert_eq!(indices, vec![0, 1, 2, 3, 4]);

    let last = policy.request_rules.last().unwrap();
    assert_eq!(last.local_response_status, Some(404));
    assert!(last.switch_pool_group.is_none());
}

#[test]
fn dedicated_mode_omits_the_404_when_a_root_match_exists() {
    let h = dedicated_harness();
    let (gw, route_key) = seeded(&h);
    h.apply_route(
        &route_key,
        route(
            &gw,
            vec!["shop.example.com"],
            vec![rule(vec![prefix_match("/")], vec![backend("reviews", 80, 1)])],
        ),
    );

    let graph = graph_of(&h, "admin/cluster--ns-gw");
    let RoutingNodes::Dedicated(node) = &graph.parent.routing else {
        panic!("expected dedicated topology");
    };
    let policy = node.policy.as_ref().expect("policy");
    assert_eq!(policy.request_rules.len(), 1);
    assert!(policy.request_rules[0].local_response_status.is_none());
    assert!(policy.request_rules[0].switch_pool_group.is_some());
}

#[test]
fn dedicated_mode_serves_404_with_no_attached_routes() {
    let h = dedicated_harness();
    seeded(&h);

    // An idle dedicated parent still answers, with a local 404.
    let graph = graph_of(&h, "admin/cluster--ns-gw");
    let RoutingNodes::Dedicated(node) = &graph.parent.routing else {
        panic!("expected dedicated topology");
    };
    assert!(node.pool_groups.is_empty());
    let policy = node.policy.as_ref().expect("policy");
    assert_eq!(policy.request_rules.len(), 1);
    let only = &policy.request_rules[0];
    assert_eq!(only.index, 0);
    assert_eq!(only.local_response_status, Some(404));
    assert!(only.switch_pool_group.is_none());
}

#[test]
fn dedicated_mode_builds_one_pool_group_per_rule() {
    let h = dedicated_harness();
    let (gw, route_key) = seeded(&h);
    h.apply_service(&ObjectRef::new("apps", "reviews-v2"), service(80));
    h.apply_route(
        &route_key,
        route(
            &gw,
            vec!["shop.example.com"],
            vec![
                rule(vec![prefix_match("/a")], vec![backend("reviews", 80, 1)]),
                rule(vec![prefix_match("/b")], vec![backend("reviews-v2", 80, 1)]),
            ],
        ),
    );

    let graph = graph_of(&h, "admin/cluster--ns-gw");
    let RoutingNodes::Dedicated(node) = &graph.parent.routing else {
        panic!("expected dedicated topology");
    };
    assert_eq!(node.pool_groups.len(), 2);
    assert_eq!(node.pools.len(), 2);
}
