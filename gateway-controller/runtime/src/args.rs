use anyhow::Result;
use clap::Parser;
use prometheus_client::registry::Registry;

use crate::{index::ClusterConfig, status::PatchApi, Runtime};
use gateway_controller_core::ResourceKey;

#[derive(Debug, Parser)]
#[clap(name = "gateway-controller", about = "A gateway configuration controller")]
pub struct Args {
    #[clap(
        long,
        default_value = "gateway_controller=info,warn",
        env = "GATEWAY_CONTROLLER_LOG"
    )]
    log_level: String,

    /// Prefixed onto every object name derived for the backend.
    #[clap(long, default_value = "cluster", env = "CLUSTER_NAME")]
    cluster_name: String,

    /// The controller name gateway classes must reference.
    #[clap(long, default_value = "example.com/gateway-controller")]
    controller_name: String,

    /// Tenant for namespaces without an explicit mapping.
    #[clap(long, default_value = "admin", env = "DEFAULT_TENANT")]
    default_tenant: String,

    /// Provisions one dedicated parent per gateway instead of shared
    /// children per (route, rule).
    #[clap(long)]
    dedicated_mode: bool,

    /// Worker shards for the ingestion queue.
    #[clap(long, default_value = "8")]
    shards: usize,

    /// Derived names longer than this are warned about.
    #[clap(long, default_value = "255")]
    max_object_name_len: usize,

    /// Builds and checksums models but never publishes them downstream.
    #[clap(long)]
    sync_disabled: bool,
}

// === impl Args ===

impl Args {
    #[inline]
    pub async fn parse_and_run() -> Result<()> {
        Self::parse().run().await
    }

    pub async fn run(self) -> Result<()> {
        let Self {
            log_level,
            cluster_name,
            controller_name,
            default_tenant,
            dedicated_mode,
            shards,
            max_object_name_len,
            sync_disabled,
        } = self;

        tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::try_new(&log_level)?)
            .init();

        let config = ClusterConfig {
            cluster_name,
            controller_name,
            default_tenant,
            dedicated_mode,
            shards,
            max_object_name_len,
        };
        tracing::info!(
            cluster = %config.cluster_name,
            controller = %config.controller_name,
            dedicated = config.dedicated_mode,
            shards = config.shards,
            "Starting"
        );

        let mut prom = <Registry>::default();
        let (runtime, mut models) = Runtime::spawn(config, DryRunApi, &mut prom);
        if sync_disabled {
            tracing::warn!("Model publishing is disabled");
            runtime.state.store.write().set_sync_disabled(true);
        }

        // Without a sync transport wired in, published models are only
        // surfaced in the log.
        tokio::spawn(async move {
            while let Some(update) = models.recv().await {
                tracing::info!(model = %update.model_key, source = %update.source, "Model changed");
            }
        });

        tokio::signal::ctrl_c().await?;
        tracing::info!("Shutting down");
        runtime.shutdown().await;
        Ok(())
    }
}

/// Stands in for a status transport when the binary runs without one:
/// every patch is acknowledged and logged.
struct DryRunApi;

#[async_trait::async_trait]
impl PatchApi for DryRunApi {
    async fn get(&self, _: &ResourceKey) -> Result<Option<serde_json::Value>> {
        Ok(Some(serde_json::Value::Null))
    }

    async fn patch_status(&self, key: &ResourceKey, patch: serde_json::Value) -> Result<()> {
        tracing::debug!(%key, %patch, "Dropping status patch, no transport configured");
        Ok(())
    }
}
