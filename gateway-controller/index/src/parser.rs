//! Lowers route specs into the normalized rule model.
//!
//! One parser per route kind, behind a registry; the compiler never looks at
//! a raw spec. Backend refs are resolved against the service cache here: an
//! unresolvable backend is dropped from the model and reported as a
//! `ResolvedRefs` problem, but the rest of the route still parses.

use gateway_controller_core::{
    duration::persistence_minutes,
    route::{
        BackendRef, Filter, HeaderMatch, HeaderMatchType, HttpBackend, HttpFilter, HttpRouteSpec,
        ParsedRoute, PathMatch, PathMatchType, Redirect, Rewrite, RouteMatch, RouteRule, RouteSpec,
        SessionPersistence,
    },
    ResourceKey, ResourceKind,
};

use crate::resources::ResourceCache;

const DEFAULT_REDIRECT_STATUS: u16 = 302;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ParseOutcome {
    pub route: ParsedRoute,
    /// False when any backend failed to resolve.
    pub resolved_refs: bool,
    pub problems: Vec<String>,
}

#[derive(Clone, Debug, Default)]
pub struct ParserRegistry {
    http: HttpRouteParser,
}

impl ParserRegistry {
    pub fn supports(&self, kind: ResourceKind) -> bool {
        matches!(kind, ResourceKind::HttpRoute)
    }

    pub fn parse(&self, cache: &ResourceCache, key: &ResourceKey, spec: &RouteSpec) -> ParseOutcome {
        match spec {
            RouteSpec::Http(http) => self.http.parse(cache, key, http),
        }
    }
}

#[derive(Clone, Debug, Default)]
struct HttpRouteParser;

impl HttpRouteParser {
    fn parse(&self, cache: &ResourceCache, key: &ResourceKey, spec: &HttpRouteSpec) -> ParseOutcome {
        let mut problems = Vec::new();
        let rules = spec
            .rules
            .iter()
            .map(|rule| RouteRule {
                name: rule.name.clone(),
                matches: rule.matches.iter().map(lower_match).collect(),
                filters: rule.filters.iter().map(lower_filter).collect(),
                backends: rule
                    .backend_refs
                    .iter()
                    .filter_map(|backend| {
                        resolve_backend(cache, key, backend).map_err(|e| problems.push(e)).ok()
                    })
                    .collect(),
                persistence: rule.session_persistence.as_ref().map(|sp| SessionPersistence {
                    cookie_name: sp.cookie_name.clone(),
                    timeout_minutes: sp
                        .absolute_timeout
                        .as_deref()
                        .map(persistence_minutes)
                        .unwrap_or(0),
                }),
            })
            .collect();

        ParseOutcome {
            route: ParsedRoute {
                hostnames: spec.hostnames.clone(),
                rules,
            },
            resolved_refs: problems.is_empty(),
            problems,
        }
    }
}

fn lower_match(m: &gateway_controller_core::route::HttpRouteMatch) -> RouteMatch {
    RouteMatch {
        path: m.path.as_ref().map(|path| {
            let value = path.value.clone().unwrap_or_else(|| "/".to_string());
            match path.match_type {
                PathMatchType::Exact => PathMatch::Exact(value),
                PathMatchType::PathPrefix => PathMatch::Prefix(value),
                PathMatchType::RegularExpression => PathMatch::Regex(value),
            }
        }),
        headers: m
            .headers
            .iter()
            .map(|h| HeaderMatch {
                name: h.name.clone(),
                value: h.value.clone(),
                regex: h.match_type == HeaderMatchType::RegularExpression,
            })
            .collect(),
    }
}

fn lower_filter(filter: &HttpFilter) -> Filter {
    match filter {
        HttpFilter::RequestHeaderModifier(m) => Filter::RequestHeaderModifier(m.clone()),
        HttpFilter::ResponseHeaderModifier(m) => Filter::ResponseHeaderModifier(m.clone()),
        HttpFilter::RequestRedirect(r) => Filter::RequestRedirect(Redirect {
            hostname: r.hostname.clone(),
            status_code: r.status_code.unwrap_or(DEFAULT_REDIRECT_STATUS),
        }),
        HttpFilter::UrlRewrite(r) => Filter::UrlRewrite(Rewrite {
            hostname: r.hostname.clone(),
            path: r.path.clone(),
        }),
        HttpFilter::ExtensionRef(ext) => Filter::ExtensionRef(ext.clone()),
    }
}

fn resolve_backend(
    cache: &ResourceCache,
    key: &ResourceKey,
    backend: &gateway_controller_core::route::HttpBackendRef,
) -> Result<HttpBackend, String> {
    let namespace = backend.namespace.as_deref().unwrap_or(&key.namespace);
    let Some(port) = backend.port else {
        return Err(format!("backend {namespace}/{} has no port", backend.name));
    };
    let svc_ref = gateway_controller_core::ObjectRef::new(namespace, &backend.name);
    let Some(service) = cache.service(&svc_ref) else {
        return Err(format!("service {svc_ref} not found"));
    };
    let Some(svc_port) = service.port(port) else {
        return Err(format!("service {svc_ref} has no port {port}"));
    };
    Ok(HttpBackend {
        backend: BackendRef {
            namespace: namespace.to_string(),
            name: backend.name.clone(),
            port,
            target_port: svc_port.target_port,
            port_name: svc_port.name.clone(),
            weight: backend.weight.unwrap_or(1).max(0) as u32,
        },
        filters: backend.filters.clone(),
    })
}
