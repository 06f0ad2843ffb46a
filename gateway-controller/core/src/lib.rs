//! Core domain types for the gateway controller.
//!
//! These types are deliberately free of any API-machinery dependency: the
//! ingestion layer hands the controller plain values describing gateways,
//! routes and their collaborators, and the compiler emits a serializable
//! object graph built from the node types in [`graph`].

#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod condition;
pub mod duration;
pub mod gateway;
pub mod graph;
pub mod resource;
pub mod route;

pub use self::{
    condition::{Condition, ConditionStatus},
    resource::{ObjectRef, ResourceKey, ResourceKind},
};
