//! The sharded work queue and the per-event pipeline.
//!
//! Events are sharded by resource key, so updates to one object are
//! processed in arrival order. Two keys feeding the same model entry may
//! land on different shards; that is fine because each event holds the
//! relation store's write lock for its whole pipeline and the caches are
//! applied before enqueue, so model saves are serialized and the checksum
//! gate makes the last write win. Nothing in the pipeline does blocking
//! I/O.

use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use gateway_controller_core::{
    condition::{self, Condition, ConditionStatus},
    ObjectRef, ResourceKey, ResourceKind,
};
use gateway_controller_status::{
    make_gateway_status_patch, make_route_status_patch, RouteParentStatus, Update, UpdateSender,
};

use crate::{
    acceptance,
    cluster_config::ClusterConfig,
    compiler,
    metrics::IndexMetrics,
    names,
    parser::ParserRegistry,
    relations::SharedRelations,
    resources::SharedCache,
    store::SharedStore,
};

/// The operation hint carried by a watch event. The caches are the source of
/// truth; the hint only informs logging.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Op {
    Add,
    Update,
    Delete,
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Add => f.write_str("add"),
            Self::Update => f.write_str("update"),
            Self::Delete => f.write_str("delete"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Event {
    pub key: ResourceKey,
    pub op: Op,
}

/// Notification that a model entry changed and should be pushed to the
/// backend sync layer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModelUpdate {
    pub model_key: String,
    /// The event that triggered the change.
    pub source: ResourceKey,
}

/// Everything a worker needs, cheaply cloneable.
#[derive(Clone)]
pub struct SharedState {
    pub config: Arc<ClusterConfig>,
    pub cache: SharedCache,
    pub relations: SharedRelations,
    pub store: SharedStore,
    pub parsers: Arc<ParserRegistry>,
    pub status: UpdateSender,
    pub publish: mpsc::UnboundedSender<ModelUpdate>,
    pub metrics: IndexMetrics,
}

/// Fans events out to worker shards by key hash.
#[derive(Clone)]
pub struct WorkQueue {
    shards: Vec<mpsc::UnboundedSender<Event>>,
}

impl WorkQueue {
    pub fn push(&self, event: Event) {
        let shard = shard_for(&event.key, self.shards.len());
        if self.shards[shard].send(event).is_err() {
            tracing::warn!(shard, "Worker is gone, dropping event");
        }
    }
}

/// Stable shard assignment for a key.
fn shard_for(key: &ResourceKey, shards: usize) -> usize {
    let digest = Sha256::digest(key.to_string().as_bytes());
    let mut hash = [0u8; 8];
    hash.copy_from_slice(&digest[..8]);
    (u64::from_be_bytes(hash) % shards as u64) as usize
}

/// Spawns the worker pool and returns the queue feeding it. Workers exit
/// when the queue is dropped.
pub fn spawn(state: SharedState, shards: usize) -> (WorkQueue, Vec<JoinHandle<()>>) {
    let shards = shards.max(1);
    let mut senders = Vec::with_capacity(shards);
    let mut handles = Vec::with_capacity(shards);
    for shard in 0..shards {
        let (tx, mut rx) = mpsc::unbounded_channel::<Event>();
        senders.push(tx);
        let state = state.clone();
        handles.push(tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                process_event(&state, event);
            }
            tracing::debug!(shard, "Worker shutting down");
        }));
    }
    (WorkQueue { shards: senders }, handles)
}

/// The full pipeline for one event: index refresh, fan-out, gateway and
/// route validation, compile, checksum-gated save, publish.
pub fn process_event(state: &SharedState, Event { key, op }: Event) {
    state.metrics.events.inc();
    tracing::debug!(%key, %op, "Processing event");

    let cache = state.cache.read();
    let mut relations = state.relations.write();
    let fan_out = relations.fan_out(&cache, &key);
    tracing::debug!(
        gateways = fan_out.gateways.len(),
        routes = fan_out.routes.len(),
        "Computed fan-out"
    );

    // Refresh gateway validity first so route acceptance sees it.
    for gw in &fan_out.gateways {
        match acceptance::validate_gateway(&state.config, &cache, &relations, gw) {
            Some((gw_state, _)) => relations.set_gateway_state(gw.clone(), gw_state),
            None => relations.remove_gateway_state(gw),
        }
    }

    for route in &fan_out.routes {
        let Some(spec) = cache.route(route) else {
            // Deleted: attachments were already dropped by the fan-out.
            continue;
        };
        if !state.parsers.supports(route.kind) {
            continue;
        }
        let statuses =
            acceptance::validate_route(&state.config, &cache, &mut relations, route, spec);
        let outcome = state.parsers.parse(&cache, route, spec);
        let parents: Vec<RouteParentStatus> = statuses
            .iter()
            .map(|(parent, status)| {
                let mut conditions = status.conditions(spec.generation());
                resolved_refs_condition(&outcome, spec.generation()).set_in(&mut conditions);
                RouteParentStatus {
                    parent_namespace: parent
                        .namespace
                        .clone()
                        .unwrap_or_else(|| route.namespace.clone()),
                    parent_name: parent.name.clone(),
                    controller_name: state.config.controller_name.clone(),
                    conditions,
                }
            })
            .collect();
        send_status(
            state,
            Update {
                key: route.clone(),
                patch: make_route_status_patch(&parents),
            },
        );
    }

    // Validation may have changed attachments, so gateway status is built
    // after the routes and compiled last.
    for gw in &fan_out.gateways {
        if let Some((gw_state, gw_status)) =
            acceptance::validate_gateway(&state.config, &cache, &relations, gw)
        {
            relations.set_gateway_state(gw.clone(), gw_state);
            send_status(
                state,
                Update {
                    key: ResourceKey::new(ResourceKind::Gateway, &gw.namespace, &gw.name),
                    patch: make_gateway_status_patch(&gw_status),
                },
            );
        }

        let graph = compiler::compile(
            &state.config,
            &cache,
            &relations,
            &state.parsers,
            gw,
        );
        state.metrics.compiles.inc();

        let mut store = state.store.write();
        if graph.is_some() {
            let tenant = cache.tenant_of(&gw.namespace, &state.config.default_tenant);
            let parent = names::parent_name(&state.config, gw);
            let model_key = names::model_key(tenant, &parent);
            // A tenant move abandons the old entry; tear it down first.
            if let Some(previous) = relations.set_model_key(gw.clone(), model_key.clone()) {
                save_and_publish(state, &mut store, &previous, None, &key);
            }
            save_and_publish(state, &mut store, &model_key, graph, &key);
        } else if let Some(model_key) = relations.take_model_key(gw) {
            save_and_publish(state, &mut store, &model_key, None, &key);
        } else {
            teardown_unknown(state, &mut store, &cache, gw, &key);
        }
    }
}

/// Teardown for a gateway that never recorded a model key, e.g. one deleted
/// before its first successful compile. Falls back to the name the entry
/// would have had in any tenant we know about.
fn teardown_unknown(
    state: &SharedState,
    store: &mut crate::store::ModelStore,
    cache: &crate::resources::ResourceCache,
    gw: &ObjectRef,
    source: &ResourceKey,
) {
    let tenant = cache.tenant_of(&gw.namespace, &state.config.default_tenant);
    let parent = names::parent_name(&state.config, gw);
    let model_key = names::model_key(tenant, &parent);
    save_and_publish(state, store, &model_key, None, source);
}

fn save_and_publish(
    state: &SharedState,
    store: &mut crate::store::ModelStore,
    model_key: &str,
    graph: Option<gateway_controller_core::graph::ConfigGraph>,
    source: &ResourceKey,
) {
    match store.save(model_key, graph) {
        Ok(true) => {
            state.metrics.publishes.inc();
            let update = ModelUpdate {
                model_key: model_key.to_string(),
                source: source.clone(),
            };
            if state.publish.send(update).is_err() {
                tracing::warn!(model = %model_key, "Publish channel closed, dropping update");
            }
        }
        Ok(false) => {
            state.metrics.saves_skipped.inc();
        }
        Err(error) => {
            tracing::error!(model = %model_key, %error, "Failed to checksum model");
        }
    }
}

/// Whether every backend ref of the route resolved against the caches.
fn resolved_refs_condition(outcome: &crate::parser::ParseOutcome, generation: i64) -> Condition {
    if outcome.resolved_refs {
        Condition::new(condition::RESOLVED_REFS)
            .status(ConditionStatus::True)
            .reason("ResolvedRefs")
            .observed_generation(generation)
    } else {
        Condition::new(condition::RESOLVED_REFS)
            .status(ConditionStatus::False)
            .reason("BackendNotFound")
            .message(outcome.problems.join("; "))
            .observed_generation(generation)
    }
}

fn send_status(state: &SharedState, update: Update) {
    if state.status.send(update).is_err() {
        tracing::warn!("Status channel closed, dropping patch");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shards_are_stable_and_in_range() {
        let key = ResourceKey::gateway("ns", "gw");
        let shard = shard_for(&key, 8);
        assert!(shard < 8);
        assert_eq!(shard, shard_for(&key, 8));
    }

    #[test]
    fn single_shard_takes_everything() {
        for name in ["a", "b", "c"] {
            assert_eq!(shard_for(&ResourceKey::gateway("ns", name), 1), 0);
        }
    }
}
