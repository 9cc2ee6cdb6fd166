//! In-process triplestore backed by oxigraph.

use cqmt_core::{question::Row, rdf::RdfTerm};
use oxigraph::{
  io::{RdfFormat, RdfParser},
  model::{NamedNode, Term},
  sparql::QueryResults,
  store::Store,
};

use crate::{Error, QueryResponse, Result, SparqlEndpoint};

/// An in-memory oxigraph store behind the [`SparqlEndpoint`] interface.
///
/// Cloning shares the underlying store. Evaluation runs on the blocking
/// thread pool.
#[derive(Clone)]
pub struct MemoryEndpoint {
  store: Store,
}

impl MemoryEndpoint {
  pub fn new() -> Result<Self> {
    let store = Store::new().map_err(backend)?;
    Ok(Self { store })
  }

  /// Parse a Turtle document into the named graph `graph`.
  pub fn load_turtle(&self, graph: &str, document: &str) -> Result<()> {
    let graph =
      NamedNode::new(graph).map_err(|_| Error::InvalidGraphIri(graph.to_owned()))?;
    let parser = RdfParser::from_format(RdfFormat::Turtle).with_default_graph(graph);
    self
      .store
      .load_from_reader(parser, document.as_bytes())
      .map_err(backend)
  }

  async fn blocking<T, F>(&self, f: F) -> Result<T>
  where
    T: Send + 'static,
    F: FnOnce(Store) -> Result<T> + Send + 'static,
  {
    let store = self.store.clone();
    tokio::task::spawn_blocking(move || f(store))
      .await
      .map_err(backend)?
  }
}

fn backend(err: impl std::fmt::Display) -> Error { Error::Backend(err.to_string()) }

pub(crate) fn to_rdf_term(term: Term) -> Result<RdfTerm> {
  match term {
    Term::NamedNode(node) => Ok(RdfTerm::iri(node.into_string())),
    Term::BlankNode(node) => Ok(RdfTerm::blank(node.as_str())),
    Term::Literal(literal) => {
      let datatype = literal.datatype().as_str().to_owned();
      let language = literal.language().map(str::to_owned);
      Ok(RdfTerm::typed_literal(literal.value(), Some(datatype), language))
    }
    #[allow(unreachable_patterns)]
    other => Err(Error::UnexpectedResponse(format!("unsupported term {other}"))),
  }
}

impl SparqlEndpoint for MemoryEndpoint {
  async fn query(&self, query: &str) -> Result<QueryResponse> {
    let query = query.to_owned();
    self
      .blocking(move |store| match store.query(query.as_str()).map_err(backend)? {
        QueryResults::Solutions(solutions) => {
          let columns: Vec<String> =
            solutions.variables().iter().map(|v| v.as_str().to_owned()).collect();
          let mut rows = Vec::new();
          for solution in solutions {
            let solution = solution.map_err(backend)?;
            let mut row = Row::new();
            for (var, term) in solution.iter() {
              row.insert(var.as_str().to_owned(), to_rdf_term(term.clone())?);
            }
            rows.push(row);
          }
          Ok(QueryResponse::Solutions { columns, rows })
        }
        QueryResults::Boolean(value) => Ok(QueryResponse::Boolean(value)),
        QueryResults::Graph(_) => Err(Error::UnexpectedResponse(
          "graph results are not supported".into(),
        )),
      })
      .await
  }

  async fn update(&self, update: &str) -> Result<()> {
    let update = update.to_owned();
    self
      .blocking(move |store| store.update(update.as_str()).map_err(backend))
      .await
  }
}
