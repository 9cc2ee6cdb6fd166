//! Triplestore access for the competency-question engine.
//!
//! [`SparqlEndpoint`] is the protocol seam: [`HttpEndpoint`] speaks the
//! SPARQL 1.1 protocol to a remote store, [`MemoryEndpoint`] runs an
//! in-process oxigraph store. [`TriplestoreClient`] layers the graph-level
//! operations (create, drop, clone, count, dump, insert, replace) on top of
//! either. [`OxigraphTurtleParser`] reads proposed ontology documents with
//! the same Turtle grammar the store loads them with.

mod client;
mod endpoint;
mod http;
mod memory;
mod results;
mod turtle;

pub mod error;

pub use client::{SelectResult, TriplestoreClient};
pub use endpoint::{QueryResponse, SparqlEndpoint};
pub use error::{Error, Result};
pub use http::{HttpEndpoint, HttpEndpointConfig};
pub use memory::MemoryEndpoint;
pub use turtle::OxigraphTurtleParser;
