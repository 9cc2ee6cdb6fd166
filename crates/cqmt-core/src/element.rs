//! Ontology elements referenced by microtheories, and how their kind is
//! decided when the ontology itself cannot tell us.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

use crate::rdf::{
  OWL_CLASS, OWL_DATATYPE_PROPERTY, OWL_NAMED_INDIVIDUAL, OWL_OBJECT_PROPERTY,
  RDFS_CLASS, is_absolute_iri,
};

/// What sort of ontology element an IRI names.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
  Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ElementKind {
  Class,
  ObjectProperty,
  DatatypeProperty,
  Individual,
  Other,
}

impl ElementKind {
  /// Kind implied by an asserted `rdf:type` value, if that type is one the
  /// tracker distinguishes.
  pub fn from_asserted_type(type_iri: &str) -> Option<Self> {
    match type_iri {
      OWL_CLASS | RDFS_CLASS => Some(Self::Class),
      OWL_OBJECT_PROPERTY => Some(Self::ObjectProperty),
      OWL_DATATYPE_PROPERTY => Some(Self::DatatypeProperty),
      OWL_NAMED_INDIVIDUAL => Some(Self::Individual),
      _ => None,
    }
  }

  /// Fallback classification from the IRI's spelling alone.
  ///
  /// Used only when the ontology graph gives no type for the IRI (or cannot
  /// be asked). It is a naming-convention guess with known failure modes:
  ///
  /// * a class whose local name is lower-case (`ex#vehicle`) becomes `Other`;
  /// * any capitalised local name is taken for an individual, so an
  ///   untyped class `ex#Aircraft` is reported as `Individual`;
  /// * slash-style IRIs (`…/Aircraft`) have no `#` local name and become
  ///   `Other`.
  pub fn from_iri_convention(iri: &str) -> Self {
    if iri.contains("owl#Class") || iri.contains("rdf-schema#Class") {
      return Self::Class;
    }
    if iri.contains("owl#ObjectProperty") {
      return Self::ObjectProperty;
    }
    if iri.contains("owl#DatatypeProperty") {
      return Self::DatatypeProperty;
    }
    match iri.rsplit_once('#') {
      Some((_, local)) if local.starts_with(|c: char| c.is_uppercase()) => {
        Self::Individual
      }
      _ => Self::Other,
    }
  }

  /// Precedence when an element carries several recognised types.
  pub fn precedence(self) -> u8 {
    match self {
      Self::Class => 0,
      Self::ObjectProperty => 1,
      Self::DatatypeProperty => 2,
      Self::Individual => 3,
      Self::Other => 4,
    }
  }
}

/// Return the IRI a triple position contributes as a dependency, if any.
///
/// Accepts `<…>`-bracketed absolute IRIs and bare `http(s)://` IRIs.
/// Compact names (`ex:Thing`) are never tracked: without the prefix map in
/// force where they were written they cannot be resolved, and guessing
/// would record edges to elements that may not exist.
pub fn tracked_iri(raw: &str) -> Option<&str> {
  let raw = raw.trim();
  if let Some(inner) = raw.strip_prefix('<').and_then(|r| r.strip_suffix('>')) {
    return is_absolute_iri(inner).then_some(inner);
  }
  let bare_http = raw.starts_with("http://") || raw.starts_with("https://");
  (bare_http && is_absolute_iri(raw)).then_some(raw)
}

// ─── Dependencies ────────────────────────────────────────────────────────────

/// One ontology element referenced by a microtheory.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Dependency {
  pub iri:  String,
  pub kind: ElementKind,
}

/// A persisted dependency: microtheory → ontology element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyEdge {
  pub edge_id:           Uuid,
  pub microtheory:       String,
  pub ontology_graph:    String,
  pub element_iri:       String,
  pub kind:              ElementKind,
  /// Result of the most recent existence check; `true` until checked.
  pub valid:             bool,
  pub first_seen_at:     DateTime<Utc>,
  pub last_validated_at: Option<DateTime<Utc>>,
}

/// Outcome of re-checking every stored edge of a microtheory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencyReport {
  pub microtheory:   String,
  /// `true` when every edge still resolves.
  pub valid:         bool,
  pub total:         usize,
  pub valid_count:   usize,
  pub invalid_count: usize,
  pub invalid:       Vec<DependencyEdge>,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn convention_heuristic() {
    use ElementKind::*;
    let cases = [
      ("http://www.w3.org/2002/07/owl#Class", Class),
      ("http://www.w3.org/2000/01/rdf-schema#Class", Class),
      ("http://www.w3.org/2002/07/owl#ObjectProperty", ObjectProperty),
      ("http://www.w3.org/2002/07/owl#DatatypeProperty", DatatypeProperty),
      ("http://example.org/fleet#Boeing747", Individual),
      ("http://example.org/fleet#hasWing", Other),
      ("http://example.org/fleet/Aircraft", Other),
    ];
    for (iri, expected) in cases {
      assert_eq!(ElementKind::from_iri_convention(iri), expected, "{iri}");
    }
  }

  #[test]
  fn convention_heuristic_known_misses() {
    // Untyped classes with capitalised names look like individuals.
    assert_eq!(
      ElementKind::from_iri_convention("http://example.org/fleet#Aircraft"),
      ElementKind::Individual
    );
    // Lower-case class names fall through to Other.
    assert_eq!(
      ElementKind::from_iri_convention("http://example.org/fleet#vehicle"),
      ElementKind::Other
    );
  }

  #[test]
  fn asserted_types() {
    assert_eq!(
      ElementKind::from_asserted_type(OWL_OBJECT_PROPERTY),
      Some(ElementKind::ObjectProperty)
    );
    assert_eq!(ElementKind::from_asserted_type("http://example.org/T"), None);
  }

  #[test]
  fn tracked_positions() {
    assert_eq!(tracked_iri("<http://ex.org/a#B>"), Some("http://ex.org/a#B"));
    assert_eq!(tracked_iri("<urn:x:1>"), Some("urn:x:1"));
    assert_eq!(tracked_iri("<mailto:pilot@ex.org>"), Some("mailto:pilot@ex.org"));
    assert_eq!(tracked_iri("<tag:ex.org,2024:A>"), Some("tag:ex.org,2024:A"));
    assert_eq!(tracked_iri("https://ex.org/a"), Some("https://ex.org/a"));
    assert_eq!(tracked_iri("urn:x:1"), None);
    assert_eq!(tracked_iri("ex:Thing"), None);
    assert_eq!(tracked_iri("\"literal\""), None);
  }

  #[test]
  fn kind_strings() {
    assert_eq!(ElementKind::DatatypeProperty.to_string(), "datatype_property");
    assert_eq!(
      "object_property".parse::<ElementKind>().unwrap(),
      ElementKind::ObjectProperty
    );
  }
}
