//! The dependency index: who depends on whom, and what to recompute when an
//! object changes.
//!
//! Every relationship is a symmetric pair of maps so both directions resolve
//! in one lookup. [`RelationStore::fan_out`] is the per-kind dispatch table
//! mapping one changed object to the set of gateways to recompile and routes
//! to revalidate; for a deleted object it answers from the edges recorded
//! before the deletion, exactly once, then drops them.

use ahash::{AHashMap, AHashSet};
use parking_lot::RwLock;
use std::sync::Arc;

use gateway_controller_core::{route::RouteSpec, ObjectRef, ResourceKey, ResourceKind};

use crate::resources::ResourceCache;

pub type SharedRelations = Arc<RwLock<RelationStore>>;

/// A bidirectional edge set between two families of keys.
#[derive(Debug, Default)]
struct EdgeMap {
    forward: AHashMap<ResourceKey, AHashSet<ResourceKey>>,
    reverse: AHashMap<ResourceKey, AHashSet<ResourceKey>>,
}

impl EdgeMap {
    /// Replaces all edges from `a`, keeping the reverse side consistent.
    fn replace(&mut self, a: ResourceKey, targets: AHashSet<ResourceKey>) {
        if let Some(old) = self.forward.remove(&a) {
            for b in old {
                if let Some(srcs) = self.reverse.get_mut(&b) {
                    srcs.remove(&a);
                    if srcs.is_empty() {
                        self.reverse.remove(&b);
                    }
                }
            }
        }
        for b in &targets {
            self.reverse.entry(b.clone()).or_default().insert(a.clone());
        }
        if !targets.is_empty() {
            self.forward.insert(a, targets);
        }
    }

    /// Drops all edges from `a` and returns the targets they pointed at.
    fn remove_all(&mut self, a: &ResourceKey) -> AHashSet<ResourceKey> {
        let targets = self.forward.remove(a).unwrap_or_default();
        for b in &targets {
            if let Some(srcs) = self.reverse.get_mut(b) {
                srcs.remove(a);
                if srcs.is_empty() {
                    self.reverse.remove(b);
                }
            }
        }
        targets
    }

    fn targets(&self, a: &ResourceKey) -> impl Iterator<Item = &ResourceKey> {
        self.forward.get(a).into_iter().flatten()
    }

    fn sources(&self, b: &ResourceKey) -> impl Iterator<Item = &ResourceKey> {
        self.reverse.get(b).into_iter().flatten()
    }
}

/// What one route matched on one gateway: set by the acceptance validator,
/// read by the compiler and the gateway status builder.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Attachment {
    /// Listener names the route attached to.
    pub listeners: Vec<String>,
    /// The listener/route hostname intersection.
    pub hostnames: Vec<String>,
}

/// Validation outcome for a gateway, kept between events so route acceptance
/// and compilation agree on listener validity.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GatewayState {
    pub accepted: bool,
    pub message: String,
    pub valid_listeners: Vec<String>,
}

/// The recompute set for one event.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FanOut {
    pub gateways: Vec<ObjectRef>,
    pub routes: Vec<ResourceKey>,
}

#[derive(Default)]
pub struct RelationStore {
    gateway_class: EdgeMap,
    gateway_secret: EdgeMap,
    route_gateway: EdgeMap,
    route_service: EdgeMap,
    route_extension: EdgeMap,
    pod_service: EdgeMap,

    attachments: AHashMap<(ObjectRef, ResourceKey), Attachment>,
    gateway_state: AHashMap<ObjectRef, GatewayState>,
    /// Last published model key per gateway; detects tenant moves.
    gateway_model: AHashMap<ObjectRef, String>,
}

impl RelationStore {
    pub fn shared() -> SharedRelations {
        Arc::new(RwLock::new(Self::default()))
    }

    /// Refreshes the changed object's edges and returns the gateways and
    /// routes the change touches.
    pub fn fan_out(&mut self, cache: &ResourceCache, key: &ResourceKey) -> FanOut {
        match key.kind {
            ResourceKind::Gateway => self.fan_out_gateway(cache, key),
            ResourceKind::GatewayClass => self.fan_out_gateway_class(key),
            ResourceKind::HttpRoute => self.fan_out_route(cache, key),
            ResourceKind::Service => self.fan_out_service(cache, key),
            ResourceKind::EndpointSlice => self.fan_out_endpoint_slice(cache, key),
            ResourceKind::Secret => self.fan_out_secret(key),
            ResourceKind::Pod => self.fan_out_pod(cache, key),
            ResourceKind::InfraSetting => self.fan_out_infra_setting(cache, key),
            ResourceKind::ApplicationProfile
            | ResourceKind::L7Rule
            | ResourceKind::HealthMonitor
            | ResourceKind::RouteBackendExtension
            | ResourceKind::SessionPersistence => self.fan_out_extension(key),
        }
    }

    fn fan_out_gateway(&mut self, cache: &ResourceCache, key: &ResourceKey) -> FanOut {
        let gw = key.obj_ref();
        if let Some(spec) = cache.gateway(&gw) {
            let class = std::iter::once(ResourceKey::new(
                ResourceKind::GatewayClass,
                "",
                &spec.class_name,
            ))
            .collect();
            self.gateway_class.replace(key.clone(), class);

            let secrets = spec
                .listeners
                .iter()
                .flat_map(|l| &l.tls_cert_refs)
                .map(|r| r.with_kind(ResourceKind::Secret))
                .collect();
            self.gateway_secret.replace(key.clone(), secrets);
        } else {
            self.gateway_class.remove_all(key);
            self.gateway_secret.remove_all(key);
            self.gateway_state.remove(&gw);
            self.attachments.retain(|(g, _), _| g != &gw);
        }

        let routes = self.route_gateway.sources(key).cloned().collect();
        normalized(vec![gw], routes)
    }

    fn fan_out_gateway_class(&mut self, key: &ResourceKey) -> FanOut {
        let gateways: Vec<ResourceKey> = self.gateway_class.sources(key).cloned().collect();
        let routes = gateways
            .iter()
            .flat_map(|gw| self.route_gateway.sources(gw))
            .cloned()
            .collect();
        normalized(gateways.iter().map(ResourceKey::obj_ref).collect(), routes)
    }

    fn fan_out_route(&mut self, cache: &ResourceCache, key: &ResourceKey) -> FanOut {
        if let Some(spec) = cache.route(key) {
            let gateways: AHashSet<ResourceKey> = spec
                .parent_refs()
                .iter()
                .map(|parent| {
                    ResourceKey::gateway(
                        parent.namespace.as_deref().unwrap_or(&key.namespace),
                        &parent.name,
                    )
                })
                .collect();
            let (services, extensions) = route_referents(key, spec);
            let touched = gateways.iter().map(ResourceKey::obj_ref).collect();
            self.route_gateway.replace(key.clone(), gateways);
            self.route_service.replace(key.clone(), services);
            self.route_extension.replace(key.clone(), extensions);
            normalized(touched, vec![key.clone()])
        } else {
            let gateways = self.route_gateway.remove_all(key);
            self.route_service.remove_all(key);
            self.route_extension.remove_all(key);
            self.attachments.retain(|(_, r), _| r != key);
            normalized(
                gateways.iter().map(ResourceKey::obj_ref).collect(),
                vec![key.clone()],
            )
        }
    }

    fn fan_out_service(&mut self, cache: &ResourceCache, key: &ResourceKey) -> FanOut {
        // Keep pod edges current from the service side as well, so pod
        // events resolve against services created later.
        let svc = key.obj_ref();
        if let Some(spec) = cache.service(&svc) {
            for (pod_ref, pod) in cache
                .pods()
                .filter(|(p, _)| p.namespace == key.namespace)
            {
                let pod_key = pod_ref.with_kind(ResourceKind::Pod);
                let mut services = self
                    .pod_service
                    .targets(&pod_key)
                    .cloned()
                    .collect::<AHashSet<_>>();
                if spec.selects(pod) {
                    services.insert(key.clone());
                } else {
                    services.remove(key);
                }
                self.pod_service.replace(pod_key, services);
            }
        } else {
            for pod_key in self
                .pod_service
                .sources(key)
                .cloned()
                .collect::<Vec<_>>()
            {
                let mut services = self
                    .pod_service
                    .targets(&pod_key)
                    .cloned()
                    .collect::<AHashSet<_>>();
                services.remove(key);
                self.pod_service.replace(pod_key, services);
            }
        }
        self.fan_out_to_routes(key)
    }

    fn fan_out_endpoint_slice(&mut self, cache: &ResourceCache, key: &ResourceKey) -> FanOut {
        match cache.endpoint_slice(&key.obj_ref()) {
            Some(slice) => {
                let service =
                    ResourceKey::service(&key.namespace, &slice.service_name);
                self.fan_out_to_routes(&service)
            }
            // A deleted slice cannot be resolved to its service anymore; the
            // service's own event covers the recompute.
            None => FanOut::default(),
        }
    }

    fn fan_out_secret(&mut self, key: &ResourceKey) -> FanOut {
        let gateways: Vec<ResourceKey> = self.gateway_secret.sources(key).cloned().collect();
        let routes = gateways
            .iter()
            .flat_map(|gw| self.route_gateway.sources(gw))
            .cloned()
            .collect();
        normalized(gateways.iter().map(ResourceKey::obj_ref).collect(), routes)
    }

    fn fan_out_pod(&mut self, cache: &ResourceCache, key: &ResourceKey) -> FanOut {
        let services = if let Some(pod) = cache.pod(&key.obj_ref()) {
            let services: AHashSet<ResourceKey> = cache
                .services()
                .filter(|(svc, spec)| svc.namespace == key.namespace && spec.selects(pod))
                .map(|(svc, _)| svc.with_kind(ResourceKind::Service))
                .collect();
            self.pod_service.replace(key.clone(), services.clone());
            services
        } else {
            self.pod_service.remove_all(key)
        };

        let mut out = FanOut::default();
        for service in &services {
            let fo = self.fan_out_to_routes(service);
            out.gateways.extend(fo.gateways);
            out.routes.extend(fo.routes);
        }
        normalized(out.gateways, out.routes)
    }

    fn fan_out_infra_setting(&mut self, cache: &ResourceCache, key: &ResourceKey) -> FanOut {
        let gateways = cache
            .gateways()
            .filter(|(gw, _)| gw.namespace == key.namespace)
            .map(|(gw, _)| gw.clone())
            .collect();
        normalized(gateways, Vec::new())
    }

    fn fan_out_extension(&mut self, key: &ResourceKey) -> FanOut {
        let routes: Vec<ResourceKey> = self.route_extension.sources(key).cloned().collect();
        let gateways = routes
            .iter()
            .flat_map(|route| self.route_gateway.targets(route))
            .map(ResourceKey::obj_ref)
            .collect();
        normalized(gateways, routes)
    }

    fn fan_out_to_routes(&self, service: &ResourceKey) -> FanOut {
        let routes: Vec<ResourceKey> = self.route_service.sources(service).cloned().collect();
        let gateways = routes
            .iter()
            .flat_map(|route| self.route_gateway.targets(route))
            .map(ResourceKey::obj_ref)
            .collect();
        normalized(gateways, routes)
    }

    // === attachment state ===

    pub fn set_attachment(&mut self, gw: ObjectRef, route: ResourceKey, attachment: Attachment) {
        self.attachments.insert((gw, route), attachment);
    }

    pub fn clear_attachment(&mut self, gw: &ObjectRef, route: &ResourceKey) {
        self.attachments.remove(&(gw.clone(), route.clone()));
    }

    pub fn attachment(&self, gw: &ObjectRef, route: &ResourceKey) -> Option<&Attachment> {
        self.attachments.get(&(gw.clone(), route.clone()))
    }

    /// Attached routes for a gateway, sorted for deterministic compile order.
    pub fn attachments_for(&self, gw: &ObjectRef) -> Vec<(ResourceKey, Attachment)> {
        let mut routes: Vec<_> = self
            .attachments
            .iter()
            .filter(|((g, _), _)| g == gw)
            .map(|((_, route), attachment)| (route.clone(), attachment.clone()))
            .collect();
        routes.sort_by(|(a, _), (b, _)| a.cmp(b));
        routes
    }

    /// How many routes attached to a listener.
    pub fn attached_count(&self, gw: &ObjectRef, listener: &str) -> u32 {
        self.attachments
            .iter()
            .filter(|((g, _), attachment)| {
                g == gw && attachment.listeners.iter().any(|l| l == listener)
            })
            .count() as u32
    }

    // === gateway validation state ===

    pub fn set_gateway_state(&mut self, gw: ObjectRef, state: GatewayState) {
        self.gateway_state.insert(gw, state);
    }

    pub fn gateway_state(&self, gw: &ObjectRef) -> Option<&GatewayState> {
        self.gateway_state.get(gw)
    }

    pub fn remove_gateway_state(&mut self, gw: &ObjectRef) {
        self.gateway_state.remove(gw);
    }

    // === model key tracking ===

    /// Records the model key a gateway compiles into. Returns the previous
    /// key when it differs, i.e. the entry to tear down after a tenant move.
    pub fn set_model_key(&mut self, gw: ObjectRef, model_key: String) -> Option<String> {
        match self.gateway_model.insert(gw, model_key.clone()) {
            Some(prev) if prev != model_key => Some(prev),
            _ => None,
        }
    }

    pub fn take_model_key(&mut self, gw: &ObjectRef) -> Option<String> {
        self.gateway_model.remove(gw)
    }
}

/// Services and extension objects a route references.
fn route_referents(
    key: &ResourceKey,
    spec: &RouteSpec,
) -> (AHashSet<ResourceKey>, AHashSet<ResourceKey>) {
    let mut services = AHashSet::new();
    let mut extensions = AHashSet::new();
    let RouteSpec::Http(http) = spec;
    for rule in &http.rules {
        for backend in &rule.backend_refs {
            services.insert(ResourceKey::service(
                backend.namespace.as_deref().unwrap_or(&key.namespace),
                &backend.name,
            ));
            for filter in &backend.filters {
                if let Ok(kind) = filter.kind.parse::<ResourceKind>() {
                    extensions.insert(ResourceKey::new(kind, &key.namespace, &filter.name));
                }
            }
        }
        for filter in &rule.filters {
            if let gateway_controller_core::route::HttpFilter::ExtensionRef(ext) = filter {
                if let Ok(kind) = ext.kind.parse::<ResourceKind>() {
                    extensions.insert(ResourceKey::new(kind, &key.namespace, &ext.name));
                }
            }
        }
    }
    (services, extensions)
}

fn normalized(mut gateways: Vec<ObjectRef>, mut routes: Vec<ResourceKey>) -> FanOut {
    gateways.sort();
    gateways.dedup();
    routes.sort();
    routes.dedup();
    FanOut { gateways, routes }
}
