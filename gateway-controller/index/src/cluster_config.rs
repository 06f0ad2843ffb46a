/// Holds cluster-scoped controller configuration.
///
/// Built once at startup and shared by `Arc`; nothing in here changes at
/// runtime.
#[derive(Clone, Debug)]
pub struct ClusterConfig {
    /// Prefixed onto every derived object name.
    pub cluster_name: String,

    /// The controller name a `GatewayClass` must carry for its gateways to be
    /// ours, e.g. `"example.com/gateway-controller"`.
    pub controller_name: String,

    /// Tenant used for namespaces without an explicit mapping.
    pub default_tenant: String,

    /// One routing node per gateway instead of one child per (route, rule).
    pub dedicated_mode: bool,

    /// Worker shard count for the ingestion queue.
    pub shards: usize,

    /// Derived names longer than this are warned about.
    pub max_object_name_len: usize,
}

impl ClusterConfig {
    /// The `cluster--` prefix shared by all derived names.
    pub fn name_prefix(&self) -> String {
        format!("{}--", self.cluster_name)
    }
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            cluster_name: "cluster".to_string(),
            controller_name: "example.com/gateway-controller".to_string(),
            default_tenant: "admin".to_string(),
            dedicated_mode: false,
            shards: 8,
            max_object_name_len: 255,
        }
    }
}
