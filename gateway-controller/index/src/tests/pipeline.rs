//! End-to-end pipeline scenarios: events in, model entries and publishes out.

use pretty_assertions::assert_eq;

use gateway_controller_core::{graph::RoutingNodes, ObjectRef, ResourceKey, ResourceKind};

use super::support::*;

fn seed_world(h: &Harness) -> (ObjectRef, ResourceKey) {
    let gw = ObjectRef::new("ns", "gw");
    let svc = ObjectRef::new("apps", "reviews");
    let route_key = ResourceKey::http_route("apps", "shop");

    h.seed_class();
    h.apply_gateway(&gw, gateway(vec![http_listener("http", 80, Some("*.example.com"))]));
    h.apply_service(&svc, service(80));
    h.apply_route(
        &route_key,
        route(
            &gw,
            vec!["shop.example.com"],
            vec![rule(
                vec![prefix_match("/cart")],
                vec![super::support::backend("reviews", 80, 1)],
            )],
        ),
    );
    (gw, route_key)
}

#[test]
fn builds_one_child_with_pool_group() {
    let mut h = Harness::new();
    let (_, _) = seed_world(&h);

    let store = h.state.store.read();
    let entry = store.get("admin/cluster--ns-gw").expect("model entry");
    let graph = entry.graph.as_ref().expect("graph");

    assert_eq!(graph.parent.name, "cluster--ns-gw");
    assert_eq!(graph.parent.vip.fqdns, vec!["shop.example.com".to_string()]);
    let RoutingNodes::Children(children) = &graph.parent.routing else {
        panic!("expected shared topology");
    };
    assert_eq!(children.len(), 1);
    let child = &children[0];
    assert_eq!(child.pools.len(), 1);
    let pg = child.pool_group.as_ref().expect("pool group");
    assert_eq!(pg.members.len(), 1);
    assert_eq!(pg.members[0].ratio, 1);
    assert!(child.policy.is_none());
    assert!(child.persistence.is_none());
    drop(store);

    // The world was built in four events; the route event published last.
    let publishes = h.drain_publishes();
    assert!(!publishes.is_empty());
    assert_eq!(publishes.last().unwrap().model_key, "admin/cluster--ns-gw");
}

#[test]
fn unchanged_input_is_not_republished() {
    let mut h = Harness::new();
    let (_, route_key) = seed_world(&h);
    h.drain_publishes();

    // Replaying the same route event changes nothing.
    h.process(route_key);
    assert_eq!(h.drain_publishes(), vec![]);
}

#[test]
fn gateway_deletion_tears_the_model_down_once() {
    let mut h = Harness::new();
    let (gw, _) = seed_world(&h);
    h.drain_publishes();

    h.state.cache.write().delete_gateway(&gw);
    h.process_delete(gw.with_kind(ResourceKind::Gateway));

    let publishes = h.drain_publishes();
    assert_eq!(publishes.len(), 1);
    assert_eq!(publishes[0].model_key, "admin/cluster--ns-gw");
    let store = h.state.store.read();
    let entry = store.get("admin/cluster--ns-gw").expect("tombstone entry");
    assert!(entry.graph.is_none());
    assert!(entry.checksum.is_none());
    drop(store);

    // A second delete event publishes nothing further.
    h.process_delete(gw.with_kind(ResourceKind::Gateway));
    assert_eq!(h.drain_publishes(), vec![]);
}

#[test]
fn tenant_move_abandons_the_old_entry() {
    let mut h = Harness::new();
    let (gw, _) = seed_world(&h);
    h.drain_publishes();

    h.state.cache.write().set_tenant("ns", "team-a");
    h.process(gw.with_kind(ResourceKind::Gateway));

    let publishes = h.drain_publishes();
    let keys: Vec<&str> = publishes.iter().map(|p| p.model_key.as_str()).collect();
    assert!(keys.contains(&"admin/cluster--ns-gw"), "old entry torn down");
    assert!(keys.contains(&"team-a/cluster--ns-gw"), "new entry published");

    let store = h.state.store.read();
    assert!(store.get("admin/cluster--ns-gw").unwrap().graph.is_none());
    assert!(store.get("team-a/cluster--ns-gw").unwrap().graph.is_some());
}

#[test]
fn backend_service_deletion_empties_the_pool_group() {
    let mut h = Harness::new();
    seed_world(&h);
    h.drain_publishes();

    let svc = ObjectRef::new("apps", "reviews");
    h.state.cache.write().delete_service(&svc);
    h.process_delete(svc.with_kind(ResourceKind::Service));

    let publishes = h.drain_publishes();
    assert_eq!(publishes.len(), 1);
    let store = h.state.store.read();
    let graph = store
        .get("admin/cluster--ns-gw")
        .and_then(|e| e.graph.as_ref())
        .expect("graph survives");
    let RoutingNodes::Children(children) = &graph.parent.routing else {
        panic!("expected shared topology");
    };
    assert!(children[0].pools.is_empty());
    assert!(children[0].pool_group.is_none());
}

#[test]
fn sync_disabled_blocks_publishes() {
    let mut h = Harness::new();
    h.state.store.write().set_sync_disabled(true);
    seed_world(&h);
    assert_eq!(h.drain_publishes(), vec![]);
    assert!(h.state.store.read().is_empty());
}

#[test]
fn route_statuses_are_emitted() {
    let mut h = Harness::new();
    let (_, route_key) = seed_world(&h);

    let statuses = h.drain_statuses();
    let route_patch = statuses
        .iter()
        .rev()
        .find(|u| u.key == route_key)
        .expect("route status patch");
    assert_eq!(
        route_patch.patch["status"]["parents"][0]["conditions"][0]["status"],
        "True"
    );
}
