//! Process wiring: builds the shared state, spawns the worker pool and the
//! status controller, and tears everything down on shutdown.

#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub use gateway_controller_core as core;
pub use gateway_controller_index as index;
pub use gateway_controller_status as status;

mod args;
pub use self::args::Args;

use std::sync::Arc;

use prometheus_client::registry::Registry;
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{info_span, Instrument};

use index::{
    dispatcher::{self, ModelUpdate, SharedState},
    parser::ParserRegistry,
    ClusterConfig, IndexMetrics, ModelStore, RelationStore, ResourceCache,
};
use status::{Controller, ControllerMetrics, PatchApi};

/// A running controller: the queue feeding it and the state backing it.
///
/// Embedders apply watched objects to `state.cache` and push the matching
/// [`index::Event`] onto `queue`; changed models arrive on the receiver
/// returned by [`Runtime::spawn`].
pub struct Runtime {
    pub state: SharedState,
    pub queue: index::WorkQueue,
    workers: Vec<JoinHandle<()>>,
    status: JoinHandle<()>,
}

// === impl Runtime ===

impl Runtime {
    /// Wires the pipeline and spawns its tasks onto the current tokio
    /// runtime. Status patches flow through `api`.
    pub fn spawn<A: PatchApi>(
        config: ClusterConfig,
        api: A,
        prom: &mut Registry,
    ) -> (Self, mpsc::UnboundedReceiver<ModelUpdate>) {
        let (status_tx, status_rx) = mpsc::unbounded_channel();
        let (publish_tx, publish_rx) = mpsc::unbounded_channel();

        let metrics = IndexMetrics::register(prom.sub_registry_with_prefix("index"));
        let status_metrics = ControllerMetrics::register(prom.sub_registry_with_prefix("status"));

        let state = SharedState {
            config: Arc::new(config),
            cache: ResourceCache::shared(),
            relations: RelationStore::shared(),
            store: ModelStore::shared(),
            parsers: Arc::new(ParserRegistry::default()),
            status: status_tx,
            publish: publish_tx,
            metrics,
        };

        let shards = state.config.shards;
        let (queue, workers) = dispatcher::spawn(state.clone(), shards);

        let controller = Controller::new(api, status_rx, status_metrics);
        let status = tokio::spawn(controller.run().instrument(info_span!("status_controller")));

        let runtime = Self {
            state,
            queue,
            workers,
            status,
        };
        (runtime, publish_rx)
    }

    /// Stops accepting events and waits for in-flight work to drain. Workers
    /// exit once the queue is gone; the status controller follows once the
    /// last worker drops its patch sender.
    pub async fn shutdown(self) {
        let Self {
            state,
            queue,
            workers,
            status,
        } = self;
        drop(queue);
        futures::future::join_all(workers).await;
        drop(state);
        let _ = status.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gateway_controller_core::{ObjectRef, ResourceKey, ResourceKind};
    use index::{Event, Op};

    struct NullApi;

    #[async_trait::async_trait]
    impl PatchApi for NullApi {
        async fn get(&self, _: &ResourceKey) -> anyhow::Result<Option<serde_json::Value>> {
            Ok(Some(serde_json::Value::Null))
        }

        async fn patch_status(
            &self,
            _: &ResourceKey,
            _: serde_json::Value,
        ) -> anyhow::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn spawns_processes_and_drains() {
        let mut prom = <Registry>::default();
        let (runtime, mut models) = Runtime::spawn(ClusterConfig::default(), NullApi, &mut prom);

        let gw = ObjectRef::new("ns", "gw");
        runtime.state.cache.write().apply_gateway(
            gw.clone(),
            gateway_controller_core::gateway::Gateway {
                class_name: "gc".to_string(),
                listeners: vec![],
                addresses: vec![],
                generation: 1,
            },
        );
        runtime.queue.push(Event {
            key: gw.with_kind(ResourceKind::Gateway),
            op: Op::Add,
        });

        runtime.shutdown().await;
        // A gateway without a class compiles to nothing and publishes nothing.
        assert!(models.try_recv().is_err());
    }
}
