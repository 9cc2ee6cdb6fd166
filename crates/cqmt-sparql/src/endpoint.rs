//! The [`SparqlEndpoint`] trait.

use std::future::Future;

use cqmt_core::question::Row;

use crate::Result;

/// What a read query produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryResponse {
  /// `SELECT` results. Unbound variables are absent from their row.
  Solutions { columns: Vec<String>, rows: Vec<Row> },
  /// `ASK` result.
  Boolean(bool),
}

/// Something that evaluates SPARQL query and update text.
pub trait SparqlEndpoint: Send + Sync {
  fn query<'a>(
    &'a self,
    query: &'a str,
  ) -> impl Future<Output = Result<QueryResponse>> + Send + 'a;

  fn update<'a>(&'a self, update: &'a str) -> impl Future<Output = Result<()>> + Send + 'a;
}
