use std::fmt;
use std::str::FromStr;

/// Kinds of objects the controller ingests.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
pub enum ResourceKind {
    Gateway,
    GatewayClass,
    HttpRoute,
    Service,
    EndpointSlice,
    Secret,
    Pod,
    InfraSetting,
    ApplicationProfile,
    L7Rule,
    HealthMonitor,
    RouteBackendExtension,
    SessionPersistence,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gateway => "Gateway",
            Self::GatewayClass => "GatewayClass",
            Self::HttpRoute => "HTTPRoute",
            Self::Service => "Service",
            Self::EndpointSlice => "EndpointSlice",
            Self::Secret => "Secret",
            Self::Pod => "Pod",
            Self::InfraSetting => "InfraSetting",
            Self::ApplicationProfile => "ApplicationProfile",
            Self::L7Rule => "L7Rule",
            Self::HealthMonitor => "HealthMonitor",
            Self::RouteBackendExtension => "RouteBackendExtension",
            Self::SessionPersistence => "SessionPersistence",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = KeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Gateway" => Ok(Self::Gateway),
            "GatewayClass" => Ok(Self::GatewayClass),
            "HTTPRoute" => Ok(Self::HttpRoute),
            "Service" => Ok(Self::Service),
            "EndpointSlice" => Ok(Self::EndpointSlice),
            "Secret" => Ok(Self::Secret),
            "Pod" => Ok(Self::Pod),
            "InfraSetting" => Ok(Self::InfraSetting),
            "ApplicationProfile" => Ok(Self::ApplicationProfile),
            "L7Rule" => Ok(Self::L7Rule),
            "HealthMonitor" => Ok(Self::HealthMonitor),
            "RouteBackendExtension" => Ok(Self::RouteBackendExtension),
            "SessionPersistence" => Ok(Self::SessionPersistence),
            kind => Err(KeyParseError::UnknownKind(kind.to_string())),
        }
    }
}

/// Uniquely identifies an object of a known kind.
///
/// The canonical string form is `Kind/Namespace/Name`; `Display` and
/// `FromStr` round-trip it.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
pub struct ResourceKey {
    pub kind: ResourceKind,
    pub namespace: String,
    pub name: String,
}

/// A namespace/name pair for when the kind is implied by context.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
pub struct ObjectRef {
    pub namespace: String,
    pub name: String,
}

#[derive(Clone, Debug, thiserror::Error, PartialEq, Eq)]
pub enum KeyParseError {
    #[error("unknown resource kind: {0}")]
    UnknownKind(String),

    #[error("malformed resource key: {0}")]
    Malformed(String),
}

// === impl ResourceKey ===

impl ResourceKey {
    pub fn new(kind: ResourceKind, namespace: impl ToString, name: impl ToString) -> Self {
        Self {
            kind,
            namespace: namespace.to_string(),
            name: name.to_string(),
        }
    }

    pub fn gateway(namespace: impl ToString, name: impl ToString) -> Self {
        Self::new(ResourceKind::Gateway, namespace, name)
    }

    pub fn http_route(namespace: impl ToString, name: impl ToString) -> Self {
        Self::new(ResourceKind::HttpRoute, namespace, name)
    }

    pub fn service(namespace: impl ToString, name: impl ToString) -> Self {
        Self::new(ResourceKind::Service, namespace, name)
    }

    pub fn obj_ref(&self) -> ObjectRef {
        ObjectRef {
            namespace: self.namespace.clone(),
            name: self.name.clone(),
        }
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.kind, self.namespace, self.name)
    }
}

impl FromStr for ResourceKey {
    type Err = KeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(3, '/');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(kind), Some(namespace), Some(name)) if !name.is_empty() => Ok(Self {
                kind: kind.parse()?,
                namespace: namespace.to_string(),
                name: name.to_string(),
            }),
            _ => Err(KeyParseError::Malformed(s.to_string())),
        }
    }
}

// === impl ObjectRef ===

impl ObjectRef {
    pub fn new(namespace: impl ToString, name: impl ToString) -> Self {
        Self {
            namespace: namespace.to_string(),
            name: name.to_string(),
        }
    }

    pub fn with_kind(&self, kind: ResourceKind) -> ResourceKey {
        ResourceKey::new(kind, &self.namespace, &self.name)
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}
