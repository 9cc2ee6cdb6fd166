//! Blast radius of a proposed ontology edit.

use std::collections::BTreeSet;

use cqmt_core::{
  diff::{ChangeCounts, ElementChange, diff_elements},
  document::{DocumentParser, ElementCollector, ElementMap},
  element::ElementKind,
  rdf::{
    OWL_CLASS, OWL_DATATYPE_PROPERTY, OWL_NAMED_INDIVIDUAL, OWL_OBJECT_PROPERTY,
    RDF_TYPE, RDFS_COMMENT, RDFS_LABEL, RdfTerm,
  },
  store::CatalogStore,
};
use cqmt_sparql::{Error as SparqlError, OxigraphTurtleParser, SparqlEndpoint};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{Result, tracker::DependencyTracker};

/// Outcome of [`ChangeDetector::detect_changes`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeReport {
  pub ontology_graph: String,
  /// Ordered by element IRI.
  pub changes:        Vec<ElementChange>,
  /// Microtheories with an edge to any changed element, sorted.
  pub affected_mts:   Vec<String>,
  pub counts:         ChangeCounts,
}

/// Compares the elements an ontology graph holds with those a proposed
/// document declares.
///
/// Running it twice on the same document with no write in between reports
/// no changes the second time, provided the document has been stored.
/// Documents are read with [`OxigraphTurtleParser`] unless another
/// [`DocumentParser`] is supplied through [`ChangeDetector::with_parser`].
pub struct ChangeDetector<S, E, P = OxigraphTurtleParser> {
  tracker: DependencyTracker<S, E>,
  parser:  P,
}

impl<S, E> ChangeDetector<S, E>
where
  S: CatalogStore,
  E: SparqlEndpoint,
{
  pub fn new(tracker: DependencyTracker<S, E>) -> Self {
    Self { tracker, parser: OxigraphTurtleParser }
  }
}

impl<S, E, P> ChangeDetector<S, E, P>
where
  S: CatalogStore,
  E: SparqlEndpoint,
  P: DocumentParser,
{
  pub fn with_parser(tracker: DependencyTracker<S, E>, parser: P) -> Self {
    Self { tracker, parser }
  }

  pub fn tracker(&self) -> &DependencyTracker<S, E> { &self.tracker }

  /// Elements `ontology_graph` currently declares, under the same rules
  /// the document parser applies.
  pub async fn current_elements(&self, ontology_graph: &str) -> Result<ElementMap> {
    let query = format!(
      "SELECT ?e ?kind ?label ?comment WHERE {{
  GRAPH <{ontology_graph}> {{
    {{ ?e <{RDF_TYPE}> <{OWL_CLASS}> . BIND(\"class\" AS ?kind) }}
    UNION {{ ?e <{RDF_TYPE}> <{OWL_OBJECT_PROPERTY}> . BIND(\"object_property\" AS ?kind) }}
    UNION {{ ?e <{RDF_TYPE}> <{OWL_DATATYPE_PROPERTY}> . BIND(\"datatype_property\" AS ?kind) }}
    UNION {{ ?e <{RDF_TYPE}> <{OWL_NAMED_INDIVIDUAL}> . BIND(\"individual\" AS ?kind) }}
    UNION {{ ?e <{RDF_TYPE}> ?c . ?c <{RDF_TYPE}> <{OWL_CLASS}> . BIND(\"individual\" AS ?kind) }}
    FILTER(isIRI(?e))
    OPTIONAL {{ ?e <{RDFS_LABEL}> ?label }}
    OPTIONAL {{ ?e <{RDFS_COMMENT}> ?comment }}
  }}
}}"
    );

    let result = self.tracker.client().select(&query).await?;
    let mut collector = ElementCollector::new();
    for row in &result.rows {
      let Some(iri) = row.get("e").and_then(RdfTerm::as_iri) else {
        continue;
      };
      let Some(kind) = row.get("kind") else { continue };
      let kind: ElementKind = kind.value().parse().map_err(|_| {
        SparqlError::UnexpectedResponse(format!("unknown element kind {kind}"))
      })?;
      collector.observe_kind(iri, kind);
      if let Some(RdfTerm::Literal { value, .. }) = row.get("label") {
        collector.observe_label(iri, value);
      }
      if let Some(RdfTerm::Literal { value, .. }) = row.get("comment") {
        collector.observe_comment(iri, value);
      }
    }
    Ok(collector.finish())
  }

  /// Diff `ontology_graph` against `document` and collect the
  /// microtheories referencing any changed element.
  pub async fn detect_changes(
    &self,
    ontology_graph: &str,
    document: &str,
  ) -> Result<ChangeReport> {
    let proposed = self
      .parser
      .parse_document_elements(document)
      .map_err(cqmt_core::Error::from)?;
    let current = self.current_elements(ontology_graph).await?;
    let changes = diff_elements(&current, &proposed);

    let mut affected = BTreeSet::new();
    for change in &changes {
      affected.extend(
        self
          .tracker
          .get_affected_mts(ontology_graph, &change.iri)
          .await?,
      );
    }

    let counts = ChangeCounts::tally(&changes);
    info!(
      ontology_graph,
      added = counts.added,
      deleted = counts.deleted,
      modified = counts.modified,
      affected = affected.len(),
      "detected changes"
    );

    Ok(ChangeReport {
      ontology_graph: ontology_graph.to_owned(),
      changes,
      affected_mts: affected.into_iter().collect(),
      counts,
    })
  }
}
