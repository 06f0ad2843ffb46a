//! The controller's indexing core.
//!
//! Watch events arrive on a sharded work queue. For each event a worker:
//!
//! 1. refreshes the dependency index ([`relations`]) and computes the fan-out
//!    of gateways and routes the event touches,
//! 2. revalidates the touched routes and gateways ([`acceptance`]), queueing
//!    status patches,
//! 3. recompiles each touched gateway into a config graph ([`compiler`]),
//! 4. saves the graph into the model store ([`store`]); only a changed
//!    checksum is published downstream.
//!
//! ```text
//! [ Event ] -> [ RelationStore ] -> [ fan-out ] -> [ compile ] -> [ ModelStore ]
//!                                       `-> [ acceptance ] -> [ status patches ]
//! ```

#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod acceptance;
pub mod cluster_config;
pub mod compiler;
pub mod dispatcher;
pub mod metrics;
pub mod names;
pub mod parser;
pub mod relations;
pub mod resources;
pub mod store;

#[cfg(test)]
mod tests;

pub use self::{
    cluster_config::ClusterConfig,
    dispatcher::{Event, ModelUpdate, Op, SharedState, WorkQueue},
    metrics::IndexMetrics,
    relations::{RelationStore, SharedRelations},
    resources::{ResourceCache, SharedCache},
    store::{ModelEntry, ModelStore, SharedStore},
};
