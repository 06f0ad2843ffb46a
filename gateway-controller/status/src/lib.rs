//! Status reporting for gateways and routes.
//!
//! The index emits [`Update`]s onto an unbounded queue; the [`Controller`]
//! drains the queue and applies each patch through an injected [`PatchApi`],
//! retrying transient failures with a fresh read per attempt.

#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

mod controller;
mod patch;

pub use self::{
    controller::{Controller, ControllerMetrics, PatchApi, MAX_PATCH_ATTEMPTS},
    patch::{
        make_gateway_status_patch, make_route_status_patch, GatewayStatus, ListenerStatus,
        RouteParentStatus,
    },
};

use gateway_controller_core::ResourceKey;
use tokio::sync::mpsc;

/// A status patch bound for one object.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Update {
    pub key: ResourceKey,
    pub patch: serde_json::Value,
}

pub type UpdateSender = mpsc::UnboundedSender<Update>;
pub type UpdateReceiver = mpsc::UnboundedReceiver<Update>;
