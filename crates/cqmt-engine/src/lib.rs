//! Workflow layer of the competency-question / microtheory engine.
//!
//! [`Workbench`] owns the microtheory and question lifecycles and executes
//! questions. [`DependencyTracker`] records which ontology elements each
//! microtheory references, and [`ChangeDetector`] turns a proposed ontology
//! edit into a list of element changes plus the microtheories they touch.
//!
//! Everything is generic over a [`CatalogStore`](cqmt_core::store::CatalogStore)
//! for records and a [`SparqlEndpoint`](cqmt_sparql::SparqlEndpoint) for graph
//! content.
//!
//! # Caller-side serialisation
//!
//! The engine takes no locks. Operations that rewrite a microtheory's
//! graph or its dependency edges must not run concurrently for the same
//! microtheory; serialise them above this layer.

pub mod config;
pub mod detector;
pub mod error;
pub mod events;
pub mod tracker;
pub mod workbench;

pub use config::{EngineConfig, SparqlConfig};
pub use detector::{ChangeDetector, ChangeReport};
pub use error::{Error, Result};
pub use events::{BroadcastSink, NoopSink, PublishError, RunEventSink};
pub use tracker::DependencyTracker;
pub use workbench::{CqInput, RunRequest, Workbench, WorkbenchSettings};
