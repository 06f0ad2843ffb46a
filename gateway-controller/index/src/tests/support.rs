//! Builders and a single-threaded harness for driving the event pipeline.

use std::sync::Arc;

use tokio::sync::mpsc;

use gateway_controller_core::{
    gateway::{
        AllowedRoutes, Gateway, GatewayClass, Listener, NamespaceScope, Protocol, Secret, Service,
        ServicePort,
    },
    route::{
        HttpBackendRef, HttpPathMatch, HttpRouteMatch, HttpRouteRule, HttpRouteSpec, ParentRef,
        PathMatchType, RouteSpec,
    },
    ObjectRef, ResourceKey, ResourceKind,
};
use gateway_controller_status::Update;

use crate::{
    cluster_config::ClusterConfig,
    dispatcher::{self, Event, ModelUpdate, Op, SharedState},
    metrics::IndexMetrics,
    parser::ParserRegistry,
    relations::RelationStore,
    resources::ResourceCache,
    store::ModelStore,
};

pub struct Harness {
    pub state: SharedState,
    pub status_rx: mpsc::UnboundedReceiver<Update>,
    pub publish_rx: mpsc::UnboundedReceiver<ModelUpdate>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(ClusterConfig::default())
    }

    pub fn with_config(config: ClusterConfig) -> Self {
        let (status_tx, status_rx) = mpsc::unbounded_channel();
        let (publish_tx, publish_rx) = mpsc::unbounded_channel();
        let state = SharedState {
            config: Arc::new(config),
            cache: ResourceCache::shared(),
            relations: RelationStore::shared(),
            store: ModelStore::shared(),
            parsers: Arc::new(ParserRegistry::default()),
            status: status_tx,
            publish: publish_tx,
            metrics: IndexMetrics::default(),
        };
        Self {
            state,
            status_rx,
            publish_rx,
        }
    }

    pub fn process(&self, key: ResourceKey) {
        dispatcher::process_event(&self.state, Event { key, op: Op::Update });
    }

    pub fn process_delete(&self, key: ResourceKey) {
        dispatcher::process_event(&self.state, Event { key, op: Op::Delete });
    }

    /// Installs the default gateway class and processes its event.
    pub fn seed_class(&self) {
        let controller = self.state.config.controller_name.clone();
        self.state
            .cache
            .write()
            .apply_gateway_class("gc", gateway_class(&controller));
        self.process(class_key());
    }

    pub fn apply_gateway(&self, gw: &ObjectRef, spec: Gateway) {
        self.state.cache.write().apply_gateway(gw.clone(), spec);
        self.process(gw.with_kind(ResourceKind::Gateway));
    }

    pub fn apply_route(&self, key: &ResourceKey, spec: RouteSpec) {
        self.state.cache.write().apply_route(key.clone(), spec);
        self.process(key.clone());
    }

    pub fn apply_service(&self, svc: &ObjectRef, spec: Service) {
        self.state.cache.write().apply_service(svc.clone(), spec);
        self.process(svc.with_kind(ResourceKind::Service));
    }

    pub fn apply_secret(&self, secret: &ObjectRef) {
        self.state.cache.write().apply_secret(
            secret.clone(),
            Secret {
                cert: "cert-pem".to_string(),
                key: "key-pem".to_string(),
            },
        );
        self.process(secret.with_kind(ResourceKind::Secret));
    }

    pub fn drain_publishes(&mut self) -> Vec<ModelUpdate> {
        let mut out = Vec::new();
        while let Ok(update) = self.publish_rx.try_recv() {
            out.push(update);
        }
        out
    }

    pub fn drain_statuses(&mut self) -> Vec<Update> {
        let mut out = Vec::new();
        while let Ok(update) = self.status_rx.try_recv() {
            out.push(update);
        }
        out
    }
}

pub fn class_key() -> ResourceKey {
    ResourceKey::new(ResourceKind::GatewayClass, "", "gc")
}

pub fn gateway_class(controller: &str) -> GatewayClass {
    GatewayClass {
        controller_name: controller.to_string(),
    }
}

pub fn http_listener(name: &str, port: u16, hostname: Option<&str>) -> Listener {
    Listener {
        name: name.to_string(),
        port,
        protocol: Protocol::Http,
        hostname: hostname.map(Into::into),
        tls_cert_refs: vec![],
        allowed_routes: AllowedRoutes {
            namespaces: NamespaceScope::All,
            kinds: vec![],
        },
    }
}

pub fn https_listener(name: &str, port: u16, hostname: Option<&str>, secret: &ObjectRef) -> Listener {
    Listener {
        name: name.to_string(),
        port,
        protocol: Protocol::Https,
        hostname: hostname.map(Into::into),
        tls_cert_refs: vec![secret.clone()],
        allowed_routes: AllowedRoutes {
            namespaces: NamespaceScope::All,
            kinds: vec![],
        },
    }
}

pub fn gateway(listeners: Vec<Listener>) -> Gateway {
    Gateway {
        class_name: "gc".to_string(),
        listeners,
        addresses: vec![],
        generation: 1,
    }
}

pub fn service(port: u16) -> Service {
    Service {
        ports: vec![ServicePort {
            name: Some("http".to_string()),
            port,
            target_port: Some(8080),
        }],
        selector: Default::default(),
    }
}

pub fn backend(name: &str, port: u16, weight: i32) -> HttpBackendRef {
    HttpBackendRef {
        namespace: None,
        name: name.to_string(),
        port: Some(port),
        weight: Some(weight),
        filters: vec![],
    }
}

pub fn prefix_match(path: &str) -> HttpRouteMatch {
    HttpRouteMatch {
        path: Some(HttpPathMatch {
            value: Some(path.to_string()),
            match_type: PathMatchType::PathPrefix,
        }),
        headers: vec![],
    }
}

pub fn rule(matches: Vec<HttpRouteMatch>, backends: Vec<HttpBackendRef>) -> HttpRouteRule {
    HttpRouteRule {
        name: None,
        matches,
        filters: vec![],
        backend_refs: backends,
        session_persistence: None,
    }
}

pub fn route(gw: &ObjectRef, hostnames: Vec<&str>, rules: Vec<HttpRouteRule>) -> RouteSpec {
    RouteSpec::Http(HttpRouteSpec {
        parent_refs: vec![ParentRef {
            namespace: Some(gw.namespace.clone()),
            name: gw.name.clone(),
            section_name: None,
            port: None,
        }],
        hostnames: hostnames.into_iter().map(Into::into).collect(),
        rules,
        generation: 1,
    })
}
