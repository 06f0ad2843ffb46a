use gateway_controller_core::ResourceKey;
use prometheus_client::{metrics::counter::Counter, registry::Registry};

use crate::{Update, UpdateReceiver};

/// A patch is abandoned after this many read-patch attempts.
pub const MAX_PATCH_ATTEMPTS: u32 = 5;

/// The transport the controller patches through. The concrete implementation
/// lives with whoever embeds the controller; tests use in-memory fakes.
#[async_trait::async_trait]
pub trait PatchApi: Send + Sync + 'static {
    /// Fetches the current object, or `None` if it no longer exists.
    async fn get(&self, key: &ResourceKey) -> anyhow::Result<Option<serde_json::Value>>;

    async fn patch_status(&self, key: &ResourceKey, patch: serde_json::Value)
        -> anyhow::Result<()>;
}

/// Drains status updates and applies them with bounded retries.
pub struct Controller<A> {
    api: A,
    updates: UpdateReceiver,
    metrics: ControllerMetrics,
}

#[derive(Clone, Debug, Default)]
pub struct ControllerMetrics {
    patch_succeeded: Counter,
    patch_failed: Counter,
    patch_exhausted: Counter,
}

// === impl ControllerMetrics ===

impl ControllerMetrics {
    pub fn register(prom: &mut Registry) -> Self {
        let metrics = Self::default();
        prom.register(
            "patches",
            "Count of successful status patches",
            metrics.patch_succeeded.clone(),
        );
        prom.register(
            "patch_failures",
            "Count of failed status patch attempts",
            metrics.patch_failed.clone(),
        );
        prom.register(
            "patch_exhaustions",
            "Count of status updates dropped after exhausting retries",
            metrics.patch_exhausted.clone(),
        );
        metrics
    }
}

// === impl Controller ===

impl<A: PatchApi> Controller<A> {
    pub fn new(api: A, updates: UpdateReceiver, metrics: ControllerMetrics) -> Self {
        Self {
            api,
            updates,
            metrics,
        }
    }

    /// Runs until the update channel closes.
    pub async fn run(mut self) {
        while let Some(update) = self.updates.recv().await {
            self.apply(update).await;
        }
    }

    /// Applies one update: read the object fresh, then patch. A missing
    /// object drops the update; a failed patch retries with another fresh
    /// read, up to [`MAX_PATCH_ATTEMPTS`] attempts in total.
    async fn apply(&self, Update { key, patch }: Update) {
        for attempt in 1..=MAX_PATCH_ATTEMPTS {
            match self.api.get(&key).await {
                Ok(Some(_)) => {}
                Ok(None) => {
                    tracing::debug!(%key, "Skipping status patch, object is gone");
                    return;
                }
                Err(error) => {
                    self.metrics.patch_failed.inc();
                    tracing::warn!(%key, %attempt, %error, "Failed to read object for status patch");
                    continue;
                }
            }
            match self.api.patch_status(&key, patch.clone()).await {
                Ok(()) => {
                    self.metrics.patch_succeeded.inc();
                    tracing::debug!(%key, %attempt, "Patched status");
                    return;
                }
                Err(error) => {
                    self.metrics.patch_failed.inc();
                    tracing::warn!(%key, %attempt, %error, "Failed to patch status");
                }
            }
        }
        self.metrics.patch_exhausted.inc();
        tracing::error!(%key, attempts = MAX_PATCH_ATTEMPTS, "Giving up on status patch");
    }
}
