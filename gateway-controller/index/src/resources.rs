//! Local caches of the watched objects.
//!
//! The ingestion layer applies/deletes objects here before enqueueing an
//! event; workers only ever read. "Not found" is an `Option`, never an error:
//! a lookup miss during event processing means the object was deleted and is
//! handled as a teardown.

use ahash::AHashMap;
use parking_lot::RwLock;
use std::sync::Arc;

use gateway_controller_core::{
    gateway::{EndpointSlice, Extension, Gateway, GatewayClass, InfraSetting, Pod, Secret, Service},
    route::RouteSpec,
    ObjectRef, ResourceKey,
};

pub type SharedCache = Arc<RwLock<ResourceCache>>;

#[derive(Default)]
pub struct ResourceCache {
    gateways: AHashMap<ObjectRef, Gateway>,
    // GatewayClass is cluster-scoped.
    gateway_classes: AHashMap<String, GatewayClass>,
    routes: AHashMap<ResourceKey, RouteSpec>,
    services: AHashMap<ObjectRef, Service>,
    endpoint_slices: AHashMap<ObjectRef, EndpointSlice>,
    secrets: AHashMap<ObjectRef, Secret>,
    pods: AHashMap<ObjectRef, Pod>,
    // Keyed by the namespace the setting applies to.
    infra_settings: AHashMap<String, InfraSetting>,
    extensions: AHashMap<ResourceKey, Extension>,
    // Namespace to tenant. Absent namespaces use the default tenant.
    tenants: AHashMap<String, String>,
}

impl ResourceCache {
    pub fn shared() -> SharedCache {
        Arc::new(RwLock::new(Self::default()))
    }

    pub fn apply_gateway(&mut self, gw: ObjectRef, spec: Gateway) {
        self.gateways.insert(gw, spec);
    }

    pub fn delete_gateway(&mut self, gw: &ObjectRef) {
        self.gateways.remove(gw);
    }

    pub fn gateway(&self, gw: &ObjectRef) -> Option<&Gateway> {
        self.gateways.get(gw)
    }

    pub fn gateways(&self) -> impl Iterator<Item = (&ObjectRef, &Gateway)> {
        self.gateways.iter()
    }

    pub fn apply_gateway_class(&mut self, name: impl ToString, spec: GatewayClass) {
        self.gateway_classes.insert(name.to_string(), spec);
    }

    pub fn delete_gateway_class(&mut self, name: &str) {
        self.gateway_classes.remove(name);
    }

    pub fn gateway_class(&self, name: &str) -> Option<&GatewayClass> {
        self.gateway_classes.get(name)
    }

    pub fn apply_route(&mut self, key: ResourceKey, spec: RouteSpec) {
        self.routes.insert(key, spec);
    }

    pub fn delete_route(&mut self, key: &ResourceKey) {
        self.routes.remove(key);
    }

    pub fn route(&self, key: &ResourceKey) -> Option<&RouteSpec> {
        self.routes.get(key)
    }

    pub fn apply_service(&mut self, svc: ObjectRef, spec: Service) {
        self.services.insert(svc, spec);
    }

    pub fn delete_service(&mut self, svc: &ObjectRef) {
        self.services.remove(svc);
    }

    pub fn service(&self, svc: &ObjectRef) -> Option<&Service> {
        self.services.get(svc)
    }

    pub fn services(&self) -> impl Iterator<Item = (&ObjectRef, &Service)> {
        self.services.iter()
    }

    pub fn apply_endpoint_slice(&mut self, slice: ObjectRef, spec: EndpointSlice) {
        self.endpoint_slices.insert(slice, spec);
    }

    pub fn delete_endpoint_slice(&mut self, slice: &ObjectRef) {
        self.endpoint_slices.remove(slice);
    }

    pub fn endpoint_slice(&self, slice: &ObjectRef) -> Option<&EndpointSlice> {
        self.endpoint_slices.get(slice)
    }

    pub fn apply_secret(&mut self, secret: ObjectRef, spec: Secret) {
        self.secrets.insert(secret, spec);
    }

    pub fn delete_secret(&mut self, secret: &ObjectRef) {
        self.secrets.remove(secret);
    }

    pub fn secret(&self, secret: &ObjectRef) -> Option<&Secret> {
        self.secrets.get(secret)
    }

    pub fn apply_pod(&mut self, pod: ObjectRef, spec: Pod) {
        self.pods.insert(pod, spec);
    }

    pub fn delete_pod(&mut self, pod: &ObjectRef) {
        self.pods.remove(pod);
    }

    pub fn pod(&self, pod: &ObjectRef) -> Option<&Pod> {
        self.pods.get(pod)
    }

    pub fn pods(&self) -> impl Iterator<Item = (&ObjectRef, &Pod)> {
        self.pods.iter()
    }

    pub fn apply_infra_setting(&mut self, namespace: impl ToString, spec: InfraSetting) {
        self.infra_settings.insert(namespace.to_string(), spec);
    }

    pub fn delete_infra_setting(&mut self, namespace: &str) {
        self.infra_settings.remove(namespace);
    }

    /// The accepted infra setting for a namespace, if any.
    pub fn infra_setting(&self, namespace: &str) -> Option<&InfraSetting> {
        self.infra_settings
            .get(namespace)
            .filter(|setting| setting.accepted)
    }

    pub fn apply_extension(&mut self, key: ResourceKey, spec: Extension) {
        self.extensions.insert(key, spec);
    }

    pub fn delete_extension(&mut self, key: &ResourceKey) {
        self.extensions.remove(key);
    }

    pub fn extension(&self, key: &ResourceKey) -> Option<&Extension> {
        self.extensions.get(key)
    }

    pub fn set_tenant(&mut self, namespace: impl ToString, tenant: impl ToString) {
        self.tenants
            .insert(namespace.to_string(), tenant.to_string());
    }

    pub fn clear_tenant(&mut self, namespace: &str) {
        self.tenants.remove(namespace);
    }

    pub fn tenant_of<'a>(&'a self, namespace: &str, default: &'a str) -> &'a str {
        self.tenants
            .get(namespace)
            .map(String::as_str)
            .unwrap_or(default)
    }
}
