//! Which ontology elements each microtheory references.

use std::{
  collections::{BTreeMap, BTreeSet},
  sync::Arc,
};

use chrono::Utc;
use cqmt_core::{
  element::{Dependency, DependencyEdge, DependencyReport, ElementKind, tracked_iri},
  rdf::{
    OWL_CLASS, OWL_DATATYPE_PROPERTY, OWL_NAMED_INDIVIDUAL, OWL_OBJECT_PROPERTY,
    RDF_TYPE, RDFS_CLASS, RDFS_SUBCLASS_OF,
  },
  store::{CatalogStore, ValidationMark},
};
use cqmt_sparql::{SparqlEndpoint, TriplestoreClient};
use tracing::{debug, info, warn};

use crate::{Result, error::store_error};

/// IRIs per type-lookup query.
const LOOKUP_CHUNK: usize = 200;

pub struct DependencyTracker<S, E> {
  store:  Arc<S>,
  client: TriplestoreClient<E>,
}

impl<S, E> DependencyTracker<S, E>
where
  S: CatalogStore,
  E: SparqlEndpoint,
{
  pub fn new(store: Arc<S>, client: TriplestoreClient<E>) -> Self { Self { store, client } }

  pub fn client(&self) -> &TriplestoreClient<E> { &self.client }

  /// Every ontology element the microtheory's triples reference, sorted by
  /// IRI with no duplicates.
  ///
  /// A triple position counts when it holds an absolute IRI; literals and
  /// blank nodes never do. Kinds come from the `rdf:type` asserted for the
  /// IRI in `ontology_graph`. IRIs the graph gives no type for, and every
  /// IRI when the lookup itself fails, are classified by
  /// [`ElementKind::from_iri_convention`].
  pub async fn extract_dependencies(
    &self,
    microtheory: &str,
    ontology_graph: &str,
  ) -> Result<Vec<Dependency>> {
    let triples = self.client.all_triples(microtheory).await?;

    let mut iris = BTreeSet::new();
    for triple in &triples {
      for term in [&triple.subject, &triple.predicate, &triple.object] {
        if let Some(iri) = tracked_iri(&term.to_sparql()) {
          iris.insert(iri.to_owned());
        }
      }
    }

    let asserted = match self.lookup_kinds(ontology_graph, &iris).await {
      Ok(kinds) => kinds,
      Err(err) => {
        warn!(
          ontology_graph,
          error = %err,
          "type lookup failed; classifying by IRI convention"
        );
        BTreeMap::new()
      }
    };

    let dependencies: Vec<Dependency> = iris
      .into_iter()
      .map(|iri| {
        let kind = asserted
          .get(&iri)
          .copied()
          .unwrap_or_else(|| ElementKind::from_iri_convention(&iri));
        Dependency { iri, kind }
      })
      .collect();

    debug!(
      microtheory,
      triples = triples.len(),
      dependencies = dependencies.len(),
      typed = asserted.len(),
      "extracted dependencies"
    );
    Ok(dependencies)
  }

  /// Asserted kind of each IRI that `ontology_graph` types. An instance of
  /// a class declared in the graph counts as an individual.
  async fn lookup_kinds(
    &self,
    ontology_graph: &str,
    iris: &BTreeSet<String>,
  ) -> Result<BTreeMap<String, ElementKind>> {
    let mut kinds: BTreeMap<String, ElementKind> = BTreeMap::new();
    let iris: Vec<&String> = iris.iter().collect();

    for chunk in iris.chunks(LOOKUP_CHUNK) {
      let values: String = chunk.iter().map(|iri| format!("<{iri}> ")).collect();
      let query = format!(
        "SELECT ?e ?t WHERE {{\n  VALUES ?e {{ {values}}}\n  GRAPH <{ontology_graph}> {{\n    \
         {{ ?e <{RDF_TYPE}> ?t }}\n    UNION\n    \
         {{ ?e <{RDF_TYPE}> ?c . ?c <{RDF_TYPE}> <{OWL_CLASS}> . BIND(<{OWL_NAMED_INDIVIDUAL}> AS ?t) }}\n  \
         }}\n}}"
      );
      let result = self.client.select(&query).await?;
      for row in result.rows {
        let (Some(element), Some(ty)) = (row.get("e"), row.get("t")) else {
          continue;
        };
        let (Some(element), Some(ty)) = (element.as_iri(), ty.as_iri()) else {
          continue;
        };
        let Some(kind) = ElementKind::from_asserted_type(ty) else {
          continue;
        };
        kinds
          .entry(element.to_owned())
          .and_modify(|k| {
            if kind.precedence() < k.precedence() {
              *k = kind;
            }
          })
          .or_insert(kind);
      }
    }
    Ok(kinds)
  }

  /// Replace the stored edges of `microtheory` with `dependencies`.
  ///
  /// Not safe to run concurrently for the same microtheory.
  pub async fn store_dependencies(
    &self,
    microtheory: &str,
    ontology_graph: &str,
    dependencies: &[Dependency],
  ) -> Result<Vec<DependencyEdge>> {
    let edges = self
      .store
      .replace_dependencies(microtheory, ontology_graph, dependencies)
      .await
      .map_err(store_error)?;
    info!(microtheory, ontology_graph, edges = edges.len(), "stored dependencies");
    Ok(edges)
  }

  /// Extract, then store. Not safe to run concurrently for the same
  /// microtheory.
  pub async fn refresh_dependencies(
    &self,
    microtheory: &str,
    ontology_graph: &str,
  ) -> Result<Vec<DependencyEdge>> {
    let dependencies = self.extract_dependencies(microtheory, ontology_graph).await?;
    self
      .store_dependencies(microtheory, ontology_graph, &dependencies)
      .await
  }

  /// Check every stored edge of `microtheory` against its ontology graph
  /// and record the outcome.
  ///
  /// If any check fails to execute nothing is recorded and the error is
  /// returned.
  pub async fn validate_dependencies(&self, microtheory: &str) -> Result<DependencyReport> {
    let edges = self.store.dependencies(microtheory).await.map_err(store_error)?;

    let mut marks = Vec::with_capacity(edges.len());
    for edge in &edges {
      let valid = self.client.ask(&existence_query(edge)).await?;
      marks.push(ValidationMark { edge_id: edge.edge_id, valid });
    }

    let checked_at = Utc::now();
    self
      .store
      .record_validations(&marks, checked_at)
      .await
      .map_err(store_error)?;

    let total = edges.len();
    let invalid: Vec<DependencyEdge> = edges
      .into_iter()
      .zip(&marks)
      .filter(|(_, mark)| !mark.valid)
      .map(|(mut edge, _)| {
        edge.valid = false;
        edge.last_validated_at = Some(checked_at);
        edge
      })
      .collect();

    let report = DependencyReport {
      microtheory: microtheory.to_owned(),
      valid: invalid.is_empty(),
      total,
      valid_count: total - invalid.len(),
      invalid_count: invalid.len(),
      invalid,
    };
    info!(
      microtheory,
      total = report.total,
      invalid = report.invalid_count,
      "validated dependencies"
    );
    Ok(report)
  }

  /// Microtheories with an edge to `element_iri` in `ontology_graph`,
  /// sorted.
  pub async fn get_affected_mts(
    &self,
    ontology_graph: &str,
    element_iri: &str,
  ) -> Result<Vec<String>> {
    self
      .store
      .microtheories_referencing(ontology_graph, element_iri)
      .await
      .map_err(store_error)
  }
}

/// `ASK` deciding whether the element of `edge` still exists in its
/// ontology graph.
fn existence_query(edge: &DependencyEdge) -> String {
  let element = &edge.element_iri;
  let pattern = match edge.kind {
    ElementKind::Class => format!(
      "{{ <{element}> <{RDF_TYPE}>/<{RDFS_SUBCLASS_OF}>* <{OWL_CLASS}> }} \
       UNION {{ <{element}> <{RDF_TYPE}> <{RDFS_CLASS}> }}"
    ),
    ElementKind::ObjectProperty => {
      format!("<{element}> <{RDF_TYPE}> <{OWL_OBJECT_PROPERTY}>")
    }
    ElementKind::DatatypeProperty => {
      format!("<{element}> <{RDF_TYPE}> <{OWL_DATATYPE_PROPERTY}>")
    }
    ElementKind::Individual | ElementKind::Other => format!(
      "{{ <{element}> ?p ?o }} UNION {{ ?s <{element}> ?o }} UNION {{ ?s ?p <{element}> }}"
    ),
  };
  format!("ASK {{ GRAPH <{}> {{ {pattern} }} }}", edge.ontology_graph)
}

#[cfg(test)]
mod tests {
  use chrono::Utc;
  use uuid::Uuid;

  use super::*;

  fn edge(kind: ElementKind) -> DependencyEdge {
    DependencyEdge {
      edge_id: Uuid::new_v4(),
      microtheory: "http://ex.org/mt/a".into(),
      ontology_graph: "http://ex.org/onto".into(),
      element_iri: "http://ex.org/onto#E".into(),
      kind,
      valid: true,
      first_seen_at: Utc::now(),
      last_validated_at: None,
    }
  }

  #[test]
  fn existence_queries_are_tailored_to_kind() {
    let class = existence_query(&edge(ElementKind::Class));
    assert!(class.starts_with("ASK { GRAPH <http://ex.org/onto> {"));
    assert!(class.contains("rdf-schema#subClassOf>*"));

    let property = existence_query(&edge(ElementKind::ObjectProperty));
    assert!(property.contains("owl#ObjectProperty"));
    assert!(!property.contains("UNION"));

    let other = existence_query(&edge(ElementKind::Other));
    assert_eq!(other.matches("UNION").count(), 2);
  }
}
