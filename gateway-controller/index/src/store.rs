//! The model store: last-published graph per model key, gated by checksum.

use ahash::AHashMap;
use parking_lot::RwLock;
use std::sync::Arc;

use gateway_controller_core::graph::{Checksum, ConfigGraph};

pub type SharedStore = Arc<RwLock<ModelStore>>;

#[derive(Clone, Debug, Default)]
pub struct ModelEntry {
    /// `None` is a tombstone: the entry was torn down and published empty.
    pub graph: Option<ConfigGraph>,
    pub checksum: Option<Checksum>,
    /// Downstream publish attempts for this snapshot; reset on every
    /// accepted save.
    pub retry_count: u32,
}

#[derive(Default)]
pub struct ModelStore {
    entries: AHashMap<String, ModelEntry>,
    sync_disabled: bool,
}

impl ModelStore {
    pub fn shared() -> SharedStore {
        Arc::new(RwLock::new(Self::default()))
    }

    /// Saves a graph (or a teardown, for `None`) under a model key.
    ///
    /// Returns true when the entry changed and must be published downstream.
    /// An unchanged checksum, an empty save over a missing entry, or a
    /// disabled sync all return false.
    pub fn save(&mut self, key: &str, graph: Option<ConfigGraph>) -> anyhow::Result<bool> {
        if self.sync_disabled {
            tracing::warn!(model = %key, "Sync is disabled, dropping model save");
            return Ok(false);
        }

        let checksum = graph.as_ref().map(ConfigGraph::checksum).transpose()?;
        match self.entries.get(key) {
            Some(entry) if entry.checksum == checksum => {
                tracing::debug!(model = %key, "Checksum unchanged, skipping publish");
                return Ok(false);
            }
            None if graph.is_none() => return Ok(false),
            _ => {}
        }

        tracing::debug!(model = %key, empty = graph.is_none(), "Saving model");
        self.entries.insert(
            key.to_string(),
            ModelEntry {
                graph,
                checksum,
                retry_count: 0,
            },
        );
        Ok(true)
    }

    pub fn get(&self, key: &str) -> Option<&ModelEntry> {
        self.entries.get(key)
    }

    /// Bumps and returns the retry counter for a failed downstream publish.
    pub fn bump_retry(&mut self, key: &str) -> Option<u32> {
        let entry = self.entries.get_mut(key)?;
        entry.retry_count += 1;
        Some(entry.retry_count)
    }

    pub fn set_sync_disabled(&mut self, disabled: bool) {
        self.sync_disabled = disabled;
    }

    pub fn is_sync_disabled(&self) -> bool {
        self.sync_disabled
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gateway_controller_core::graph::{
        OwnerMarkers, ParentListenerNode, RoutingNodes, VipNode,
    };

    fn graph() -> ConfigGraph {
        ConfigGraph {
            parent: ParentListenerNode {
                name: "cluster--ns-gw".to_string(),
                tenant: "admin".to_string(),
                port_protocols: vec![],
                vip: VipNode {
                    name: "cluster--ns-gw-vip".to_string(),
                    tenant: "admin".to_string(),
                    ip_address: None,
                    fqdns: vec![],
                    t1_lr: None,
                },
                certificates: vec![],
                routing: RoutingNodes::Children(vec![]),
                markers: OwnerMarkers::gateway("ns", "gw"),
            },
        }
    }

    #[test]
    fn retries_bump_until_the_next_save_resets() {
        let mut store = ModelStore::default();
        assert!(store.save("admin/cluster--ns-gw", Some(graph())).unwrap());

        assert_eq!(store.bump_retry("admin/cluster--ns-gw"), Some(1));
        assert_eq!(store.bump_retry("admin/cluster--ns-gw"), Some(2));
        assert_eq!(store.bump_retry("missing"), None);

        // A teardown save replaces the snapshot and resets the counter.
        assert!(store.save("admin/cluster--ns-gw", None).unwrap());
        assert_eq!(store.get("admin/cluster--ns-gw").unwrap().retry_count, 0);
    }
}
