//! Route specs and the normalized rule model the compiler consumes.
//!
//! The "spec" types mirror the loose, everything-optional shape of a route as
//! it arrives from the watch stream. The parser (in the index crate) lowers a
//! spec into the concrete model at the bottom of this module; defaults are
//! applied exactly once, there.

use crate::resource::ResourceKind;

/// Sum over the route kinds the controller understands. Adding a kind means
/// adding a variant and a parser for it; the compiler only ever sees the
/// normalized [`RouteRule`] model.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RouteSpec {
    Http(HttpRouteSpec),
}

impl RouteSpec {
    pub fn kind(&self) -> ResourceKind {
        match self {
            Self::Http(_) => ResourceKind::HttpRoute,
        }
    }

    pub fn parent_refs(&self) -> &[ParentRef] {
        match self {
            Self::Http(route) => &route.parent_refs,
        }
    }

    pub fn hostnames(&self) -> &[String] {
        match self {
            Self::Http(route) => &route.hostnames,
        }
    }

    pub fn generation(&self) -> i64 {
        match self {
            Self::Http(route) => route.generation,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HttpRouteSpec {
    pub parent_refs: Vec<ParentRef>,
    pub hostnames: Vec<String>,
    pub rules: Vec<HttpRouteRule>,
    pub generation: i64,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ParentRef {
    /// Defaults to the route's own namespace.
    pub namespace: Option<String>,
    pub name: String,
    /// Restricts the attachment to one listener by name.
    pub section_name: Option<String>,
    pub port: Option<u16>,
}

impl ParentRef {
    pub fn named(name: impl ToString) -> Self {
        Self {
            namespace: None,
            name: name.to_string(),
            section_name: None,
            port: None,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HttpRouteRule {
    pub name: Option<String>,
    pub matches: Vec<HttpRouteMatch>,
    pub filters: Vec<HttpFilter>,
    pub backend_refs: Vec<HttpBackendRef>,
    pub session_persistence: Option<SessionPersistenceConfig>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HttpRouteMatch {
    pub path: Option<HttpPathMatch>,
    pub headers: Vec<HttpHeaderMatch>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HttpPathMatch {
    /// Defaults to `/`.
    pub value: Option<String>,
    pub match_type: PathMatchType,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum PathMatchType {
    Exact,
    #[default]
    PathPrefix,
    RegularExpression,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HttpHeaderMatch {
    pub name: String,
    pub value: String,
    pub match_type: HeaderMatchType,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum HeaderMatchType {
    #[default]
    Exact,
    RegularExpression,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HttpFilter {
    RequestHeaderModifier(HeaderModifier),
    ResponseHeaderModifier(HeaderModifier),
    RequestRedirect(RequestRedirect),
    UrlRewrite(UrlRewrite),
    ExtensionRef(ExtensionRef),
}

#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub struct HeaderModifier {
    pub set: Vec<HeaderValue>,
    pub add: Vec<HeaderValue>,
    pub remove: Vec<String>,
}

impl HeaderModifier {
    pub fn is_empty(&self) -> bool {
        self.set.is_empty() && self.add.is_empty() && self.remove.is_empty()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct HeaderValue {
    pub name: String,
    pub value: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RequestRedirect {
    pub hostname: Option<String>,
    /// Defaults to 302.
    pub status_code: Option<u16>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UrlRewrite {
    pub hostname: Option<String>,
    pub path: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, serde::Serialize)]
pub struct ExtensionRef {
    pub kind: String,
    pub name: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HttpBackendRef {
    /// Defaults to the route's own namespace.
    pub namespace: Option<String>,
    pub name: String,
    pub port: Option<u16>,
    /// Defaults to 1. Zero removes the backend from rotation.
    pub weight: Option<i32>,
    /// Backend-level filters are extension refs only.
    pub filters: Vec<ExtensionRef>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SessionPersistenceConfig {
    pub cookie_name: Option<String>,
    /// Go-style duration string, e.g. `"30m"`.
    pub absolute_timeout: Option<String>,
}

// === the normalized model ===

/// A route spec after parsing: defaults resolved, backends bound to services,
/// rule and match order preserved.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ParsedRoute {
    pub hostnames: Vec<String>,
    pub rules: Vec<RouteRule>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RouteRule {
    pub name: Option<String>,
    pub matches: Vec<RouteMatch>,
    pub filters: Vec<Filter>,
    pub backends: Vec<HttpBackend>,
    pub persistence: Option<SessionPersistence>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub struct RouteMatch {
    pub path: Option<PathMatch>,
    pub headers: Vec<HeaderMatch>,
}

#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub enum PathMatch {
    Exact(String),
    Prefix(String),
    Regex(String),
}

impl PathMatch {
    pub fn value(&self) -> &str {
        match self {
            Self::Exact(p) | Self::Prefix(p) | Self::Regex(p) => p,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct HeaderMatch {
    pub name: String,
    pub value: String,
    pub regex: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Filter {
    RequestHeaderModifier(HeaderModifier),
    ResponseHeaderModifier(HeaderModifier),
    RequestRedirect(Redirect),
    UrlRewrite(Rewrite),
    ExtensionRef(ExtensionRef),
}

#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct Redirect {
    pub hostname: Option<String>,
    pub status_code: u16,
}

#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct Rewrite {
    pub hostname: Option<String>,
    pub path: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HttpBackend {
    pub backend: BackendRef,
    pub filters: Vec<ExtensionRef>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BackendRef {
    pub namespace: String,
    pub name: String,
    pub port: u16,
    pub target_port: Option<u16>,
    pub port_name: Option<String>,
    pub weight: u32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionPersistence {
    pub cookie_name: Option<String>,
    /// Whole minutes; 0 means "no timeout configured".
    pub timeout_minutes: u32,
}
