//! Minimal RDF term model shared by the client, the tracker and the parser.
//!
//! Terms are kept in the shape a SPARQL results document reports them in,
//! which is also the shape needed to write them back with `INSERT DATA`.

use std::fmt;

use serde::{Deserialize, Serialize};

// ─── Vocabulary ──────────────────────────────────────────────────────────────

pub const RDF_TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";
pub const RDF_LANG_STRING: &str =
  "http://www.w3.org/1999/02/22-rdf-syntax-ns#langString";
pub const RDFS_CLASS: &str = "http://www.w3.org/2000/01/rdf-schema#Class";
pub const RDFS_LABEL: &str = "http://www.w3.org/2000/01/rdf-schema#label";
pub const RDFS_COMMENT: &str = "http://www.w3.org/2000/01/rdf-schema#comment";
pub const RDFS_SUBCLASS_OF: &str =
  "http://www.w3.org/2000/01/rdf-schema#subClassOf";
pub const OWL_CLASS: &str = "http://www.w3.org/2002/07/owl#Class";
pub const OWL_OBJECT_PROPERTY: &str =
  "http://www.w3.org/2002/07/owl#ObjectProperty";
pub const OWL_DATATYPE_PROPERTY: &str =
  "http://www.w3.org/2002/07/owl#DatatypeProperty";
pub const OWL_NAMED_INDIVIDUAL: &str =
  "http://www.w3.org/2002/07/owl#NamedIndividual";
pub const XSD_STRING: &str = "http://www.w3.org/2001/XMLSchema#string";

// ─── Terms ───────────────────────────────────────────────────────────────────

/// One RDF term as returned in a result binding.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RdfTerm {
  Iri { value: String },
  Literal {
    value:    String,
    /// `None` for plain `xsd:string` and language-tagged literals.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    datatype: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    language: Option<String>,
  },
  Blank { value: String },
}

impl RdfTerm {
  pub fn iri(value: impl Into<String>) -> Self {
    Self::Iri { value: value.into() }
  }

  pub fn literal(value: impl Into<String>) -> Self {
    Self::Literal { value: value.into(), datatype: None, language: None }
  }

  /// Build a literal, normalising the implicit `xsd:string` and
  /// `rdf:langString` datatypes away so terms compare equal regardless of
  /// which backend produced them.
  pub fn typed_literal(
    value: impl Into<String>,
    datatype: Option<String>,
    language: Option<String>,
  ) -> Self {
    let datatype = datatype
      .filter(|dt| dt != XSD_STRING && dt != RDF_LANG_STRING);
    Self::Literal { value: value.into(), datatype, language }
  }

  pub fn blank(value: impl Into<String>) -> Self {
    Self::Blank { value: value.into() }
  }

  /// The lexical value regardless of term type.
  pub fn value(&self) -> &str {
    match self {
      Self::Iri { value } | Self::Blank { value } => value,
      Self::Literal { value, .. } => value,
    }
  }

  pub fn as_iri(&self) -> Option<&str> {
    match self {
      Self::Iri { value } => Some(value),
      _ => None,
    }
  }

  /// Render in N-Triples / SPARQL syntax.
  pub fn to_sparql(&self) -> String {
    match self {
      Self::Iri { value } => format!("<{value}>"),
      Self::Blank { value } => format!("_:{value}"),
      Self::Literal { value, datatype, language } => {
        let quoted = quote_literal(value);
        match (language, datatype) {
          (Some(lang), _) => format!("{quoted}@{lang}"),
          (None, Some(dt)) => format!("{quoted}^^<{dt}>"),
          (None, None) => quoted,
        }
      }
    }
  }
}

impl fmt::Display for RdfTerm {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.to_sparql())
  }
}

/// Escape and double-quote a string for use as a SPARQL/Turtle literal.
pub fn quote_literal(value: &str) -> String {
  let mut out = String::with_capacity(value.len() + 2);
  out.push('"');
  for c in value.chars() {
    match c {
      '\\' => out.push_str("\\\\"),
      '"' => out.push_str("\\\""),
      '\n' => out.push_str("\\n"),
      '\r' => out.push_str("\\r"),
      '\t' => out.push_str("\\t"),
      other => out.push(other),
    }
  }
  out.push('"');
  out
}

/// An RDF triple. Ordering is derived so triple sets can be compared after
/// sorting.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Triple {
  pub subject:   RdfTerm,
  pub predicate: RdfTerm,
  pub object:    RdfTerm,
}

impl Triple {
  pub fn new(subject: RdfTerm, predicate: RdfTerm, object: RdfTerm) -> Self {
    Self { subject, predicate, object }
  }

  /// `<s> <p> <o> .`
  pub fn to_sparql(&self) -> String {
    format!(
      "{} {} {} .",
      self.subject.to_sparql(),
      self.predicate.to_sparql(),
      self.object.to_sparql()
    )
  }
}

/// True for an absolute IRI (RFC 3987): an ASCII scheme, a colon, and a
/// non-empty remainder with no characters that are forbidden inside `<…>`.
/// Non-hierarchical schemes such as `mailto:` and `tag:` count.
pub fn is_absolute_iri(candidate: &str) -> bool {
  let Some((scheme, rest)) = candidate.split_once(':') else {
    return false;
  };
  let mut scheme_chars = scheme.chars();
  let scheme_ok = scheme_chars.next().is_some_and(|c| c.is_ascii_alphabetic())
    && scheme_chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
  scheme_ok
    && !rest.is_empty()
    && !rest.chars().any(|c| {
      c.is_whitespace()
        || c.is_control()
        || matches!(c, '<' | '>' | '"' | '{' | '}' | '|' | '^' | '`' | '\\')
    })
}
