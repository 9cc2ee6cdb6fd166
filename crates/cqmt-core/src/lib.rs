//! Domain types and pure logic for the competency-question / microtheory
//! engine.
//!
//! Nothing here performs I/O. Query confinement, contract validation,
//! element classification, document parsing and element diffs are plain
//! functions; persistence is described by the [`store::CatalogStore`]
//! trait and implemented elsewhere.

pub mod contract;
pub mod diff;
pub mod document;
pub mod element;
pub mod error;
pub mod lex;
pub mod microtheory;
pub mod question;
pub mod rdf;
pub mod store;
pub mod template;

pub use error::{Error, Result};
