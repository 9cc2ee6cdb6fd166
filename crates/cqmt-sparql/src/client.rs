//! Graph-level operations over any [`SparqlEndpoint`].

use std::time::Instant;

use cqmt_core::{
  question::Row,
  rdf::{RdfTerm, Triple, is_absolute_iri},
};
use tracing::{debug, info};
use uuid::Uuid;

use crate::{Error, QueryResponse, Result, SparqlEndpoint};

/// Triples per `INSERT DATA` request.
const INSERT_CHUNK: usize = 500;

/// Rows and timing of one `SELECT`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectResult {
  pub columns:    Vec<String>,
  pub rows:       Vec<Row>,
  /// Wall-clock time from request to decoded response.
  pub latency_ms: u64,
}

/// The operations the engine performs against a triplestore.
///
/// Every failure is returned as an [`Error`]; nothing panics across this
/// boundary. Multi-request operations are not atomic unless stated.
#[derive(Debug, Clone)]
pub struct TriplestoreClient<E> {
  endpoint: E,
}

impl<E: SparqlEndpoint> TriplestoreClient<E> {
  pub fn new(endpoint: E) -> Self { Self { endpoint } }

  pub fn endpoint(&self) -> &E { &self.endpoint }

  /// Run a `SELECT`, measuring its latency.
  pub async fn select(&self, query: &str) -> Result<SelectResult> {
    let started = Instant::now();
    let response = self.endpoint.query(query).await?;
    let latency_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
    match response {
      QueryResponse::Solutions { columns, rows } => {
        debug!(rows = rows.len(), latency_ms, "select");
        Ok(SelectResult { columns, rows, latency_ms })
      }
      QueryResponse::Boolean(_) => Err(Error::UnexpectedResponse(
        "boolean result for a SELECT query".into(),
      )),
    }
  }

  pub async fn ask(&self, query: &str) -> Result<bool> {
    match self.endpoint.query(query).await? {
      QueryResponse::Boolean(value) => Ok(value),
      QueryResponse::Solutions { .. } => Err(Error::UnexpectedResponse(
        "solutions for an ASK query".into(),
      )),
    }
  }

  pub async fn update(&self, update: &str) -> Result<()> { self.endpoint.update(update).await }

  // ── Graphs ────────────────────────────────────────────────────────────

  /// Create an empty named graph. Fails if the store already has it.
  pub async fn create_graph(&self, graph: &str) -> Result<()> {
    check_graph(graph)?;
    self.update(&format!("CREATE GRAPH <{graph}>")).await
  }

  /// Drop a named graph. Dropping a graph that does not exist succeeds.
  pub async fn drop_graph(&self, graph: &str) -> Result<()> {
    check_graph(graph)?;
    self.update(&format!("DROP SILENT GRAPH <{graph}>")).await
  }

  /// Copy every triple of `source` into a newly created `destination`.
  /// Returns the number of triples copied.
  pub async fn clone_graph(&self, source: &str, destination: &str) -> Result<usize> {
    check_graph(source)?;
    self.create_graph(destination).await?;
    self.copy_triples(source, destination).await
  }

  /// Add every triple of `source` to the existing graph `destination`.
  ///
  /// Blank nodes are relabelled per insert request, so a blank node shared
  /// by triples in different chunks becomes two nodes in the copy.
  pub async fn copy_triples(&self, source: &str, destination: &str) -> Result<usize> {
    let triples = self.all_triples(source).await?;
    self.insert_triples(destination, &triples).await?;
    info!(source, destination, triples = triples.len(), "copied graph content");
    Ok(triples.len())
  }

  pub async fn count_triples(&self, graph: &str) -> Result<u64> {
    check_graph(graph)?;
    let result = self
      .select(&format!(
        "SELECT (COUNT(*) AS ?n) WHERE {{ GRAPH <{graph}> {{ ?s ?p ?o }} }}"
      ))
      .await?;
    let count = result
      .rows
      .first()
      .and_then(|row| row.get("n"))
      .ok_or_else(|| Error::UnexpectedResponse("count query returned no binding".into()))?;
    count
      .value()
      .parse()
      .map_err(|_| Error::UnexpectedResponse(format!("non-numeric count {count}")))
  }

  pub async fn all_triples(&self, graph: &str) -> Result<Vec<Triple>> {
    check_graph(graph)?;
    let result = self
      .select(&format!(
        "SELECT ?s ?p ?o WHERE {{ GRAPH <{graph}> {{ ?s ?p ?o }} }}"
      ))
      .await?;
    result.rows.into_iter().map(row_to_triple).collect()
  }

  /// Add triples to a graph with `INSERT DATA`, in chunks. An empty slice
  /// is a no-op.
  pub async fn insert_triples(&self, graph: &str, triples: &[Triple]) -> Result<()> {
    check_graph(graph)?;
    for chunk in triples.chunks(INSERT_CHUNK) {
      self.update(&insert_data(graph, chunk)).await?;
    }
    Ok(())
  }

  /// Replace the whole content of `graph` with `triples`.
  ///
  /// The new content is staged into a scratch graph first and then moved
  /// onto `graph` with a single `MOVE` update, so readers see either the
  /// old content or the new, never an empty or partial graph. If staging
  /// fails the target is untouched and the scratch graph is dropped.
  /// An empty `triples` clears the target.
  pub async fn replace_triples(&self, graph: &str, triples: &[Triple]) -> Result<()> {
    check_graph(graph)?;
    let scratch = format!("{graph}-staging-{}", Uuid::new_v4().simple());

    self.create_graph(&scratch).await?;
    if let Err(err) = self.insert_triples(&scratch, triples).await {
      if let Err(cleanup) = self.drop_graph(&scratch).await {
        debug!(%scratch, error = %cleanup, "dropping scratch graph failed");
      }
      return Err(err);
    }

    self
      .update(&format!(
        "MOVE SILENT GRAPH <{scratch}> TO GRAPH <{graph}> ;\nCREATE SILENT GRAPH <{graph}>"
      ))
      .await?;
    info!(graph, triples = triples.len(), "replaced graph content");
    Ok(())
  }
}

fn check_graph(graph: &str) -> Result<()> {
  if is_absolute_iri(graph) {
    Ok(())
  } else {
    Err(Error::InvalidGraphIri(graph.to_owned()))
  }
}

fn insert_data(graph: &str, triples: &[Triple]) -> String {
  let mut body = String::new();
  for triple in triples {
    body.push_str("    ");
    body.push_str(&triple.to_sparql());
    body.push('\n');
  }
  format!("INSERT DATA {{\n  GRAPH <{graph}> {{\n{body}  }}\n}}")
}

fn row_to_triple(mut row: Row) -> Result<Triple> {
  let mut take = |var: &str| -> Result<RdfTerm> {
    row
      .remove(var)
      .ok_or_else(|| Error::UnexpectedResponse(format!("triple row without ?{var}")))
  };
  Ok(Triple::new(take("s")?, take("p")?, take("o")?))
}
