use prometheus_client::{metrics::counter::Counter, registry::Registry};

#[derive(Clone, Debug, Default)]
pub struct IndexMetrics {
    pub events: Counter,
    pub compiles: Counter,
    pub publishes: Counter,
    pub saves_skipped: Counter,
}

impl IndexMetrics {
    pub fn register(prom: &mut Registry) -> Self {
        let metrics = Self::default();
        prom.register(
            "events",
            "Count of watch events dispatched to workers",
            metrics.events.clone(),
        );
        prom.register(
            "compiles",
            "Count of gateway graph compilations",
            metrics.compiles.clone(),
        );
        prom.register(
            "publishes",
            "Count of model snapshots published downstream",
            metrics.publishes.clone(),
        );
        prom.register(
            "saves_skipped",
            "Count of model saves skipped for an unchanged checksum",
            metrics.saves_skipped.clone(),
        );
        metrics
    }
}
