//! Decoding of the `application/sparql-results+json` format.

use std::collections::BTreeMap;

use cqmt_core::{question::Row, rdf::RdfTerm};
use serde::Deserialize;

use crate::{QueryResponse, Result};

#[derive(Debug, Deserialize)]
struct ResultsDocument {
  #[serde(default)]
  head:    Head,
  results: Option<Bindings>,
  boolean: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct Head {
  #[serde(default)]
  vars: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct Bindings {
  bindings: Vec<BTreeMap<String, JsonTerm>>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
enum JsonTerm {
  Uri {
    value: String,
  },
  Literal {
    value:    String,
    datatype: Option<String>,
    #[serde(rename = "xml:lang")]
    lang:     Option<String>,
  },
  /// Pre-2013 serialisation still emitted by some stores.
  TypedLiteral {
    value:    String,
    datatype: String,
  },
  Bnode {
    value: String,
  },
}

impl From<JsonTerm> for RdfTerm {
  fn from(term: JsonTerm) -> Self {
    match term {
      JsonTerm::Uri { value } => RdfTerm::iri(value),
      JsonTerm::Literal { value, datatype, lang } => {
        RdfTerm::typed_literal(value, datatype, lang)
      }
      JsonTerm::TypedLiteral { value, datatype } => {
        RdfTerm::typed_literal(value, Some(datatype), None)
      }
      JsonTerm::Bnode { value } => RdfTerm::blank(value),
    }
  }
}

/// Parse a SPARQL results JSON document.
pub(crate) fn decode(body: &str) -> Result<QueryResponse> {
  let doc: ResultsDocument = serde_json::from_str(body)?;

  if let Some(boolean) = doc.boolean {
    return Ok(QueryResponse::Boolean(boolean));
  }

  let rows = doc
    .results
    .map(|r| r.bindings)
    .unwrap_or_default()
    .into_iter()
    .map(|binding| {
      binding
        .into_iter()
        .map(|(var, term)| (var, RdfTerm::from(term)))
        .collect::<Row>()
    })
    .collect();

  Ok(QueryResponse::Solutions { columns: doc.head.vars, rows })
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::Error;

  #[test]
  fn select_document() {
    let body = r#"{
      "head": { "vars": ["aircraft", "label", "span"] },
      "results": { "bindings": [
        { "aircraft": { "type": "uri", "value": "http://ex.org/B747" },
          "label": { "type": "literal", "value": "Jumbo", "xml:lang": "en" },
          "span": { "type": "literal", "value": "64.4",
                    "datatype": "http://www.w3.org/2001/XMLSchema#decimal" } },
        { "aircraft": { "type": "bnode", "value": "b0" } }
      ] }
    }"#;

    let QueryResponse::Solutions { columns, rows } = decode(body).unwrap() else {
      panic!("expected solutions");
    };
    assert_eq!(columns, ["aircraft", "label", "span"]);
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["aircraft"], RdfTerm::iri("http://ex.org/B747"));
    assert_eq!(
      rows[0]["label"],
      RdfTerm::typed_literal("Jumbo", None, Some("en".into()))
    );
    assert_eq!(
      rows[0]["span"],
      RdfTerm::typed_literal(
        "64.4",
        Some("http://www.w3.org/2001/XMLSchema#decimal".into()),
        None
      )
    );
    // Unbound variables are simply missing.
    assert!(!rows[1].contains_key("label"));
    assert_eq!(rows[1]["aircraft"], RdfTerm::blank("b0"));
  }

  #[test]
  fn ask_document() {
    assert_eq!(
      decode(r#"{ "head": {}, "boolean": true }"#).unwrap(),
      QueryResponse::Boolean(true)
    );
  }

  #[test]
  fn legacy_typed_literal() {
    let body = r#"{ "head": { "vars": ["n"] }, "results": { "bindings": [
      { "n": { "type": "typed-literal", "value": "3",
               "datatype": "http://www.w3.org/2001/XMLSchema#integer" } } ] } }"#;
    let QueryResponse::Solutions { rows, .. } = decode(body).unwrap() else {
      panic!("expected solutions");
    };
    assert_eq!(rows[0]["n"].value(), "3");
  }

  #[test]
  fn empty_result_set() {
    let QueryResponse::Solutions { columns, rows } =
      decode(r#"{ "head": { "vars": ["x"] }, "results": { "bindings": [] } }"#).unwrap()
    else {
      panic!("expected solutions");
    };
    assert_eq!(columns, ["x"]);
    assert!(rows.is_empty());
  }

  #[test]
  fn malformed_json_is_a_decode_error() {
    assert!(matches!(decode("<html>502</html>"), Err(Error::Decode(_))));
    assert!(matches!(
      decode(r#"{ "head": {}, "results": { "bindings": [ { "x": { "type": "mystery", "value": "?" } } ] } }"#),
      Err(Error::Decode(_))
    ));
  }
}
