//! Turtle documents read with oxigraph's own parser.

use cqmt_core::{
  document::{DocumentError, DocumentParser, ElementMap, elements_from_triples},
  rdf::{RdfTerm, Triple},
};
use oxigraph::{
  io::{RdfFormat, RdfParser},
  model::Subject,
};

use crate::memory::to_rdf_term;

/// [`DocumentParser`] backed by oxigraph's Turtle parser.
///
/// Directives, relative IRIs, escapes, collections and blank-node property
/// lists follow the grammar exactly, so a document stored with
/// [`MemoryEndpoint::load_turtle`](crate::MemoryEndpoint::load_turtle) reads
/// back as the same elements. A syntax error anywhere fails the whole
/// document.
#[derive(Debug, Default, Clone, Copy)]
pub struct OxigraphTurtleParser;

impl DocumentParser for OxigraphTurtleParser {
  fn parse_document_elements(&self, document: &str) -> Result<ElementMap, DocumentError> {
    let mut triples = Vec::new();
    for quad in RdfParser::from_format(RdfFormat::Turtle).for_reader(document.as_bytes()) {
      let quad = quad.map_err(|err| DocumentError::Syntax(err.to_string()))?;
      let subject = match quad.subject {
        Subject::NamedNode(node) => RdfTerm::iri(node.into_string()),
        Subject::BlankNode(node) => RdfTerm::blank(node.as_str()),
        #[allow(unreachable_patterns)]
        _ => continue,
      };
      let object =
        to_rdf_term(quad.object).map_err(|err| DocumentError::Syntax(err.to_string()))?;
      triples.push(Triple::new(
        subject,
        RdfTerm::iri(quad.predicate.into_string()),
        object,
      ));
    }
    Ok(elements_from_triples(&triples))
  }
}
