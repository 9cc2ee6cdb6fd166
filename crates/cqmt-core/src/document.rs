//! Ontology elements declared by a serialized document.
//!
//! Change detection compares the elements a graph holds now with the
//! elements a proposed document would declare. The document side goes
//! through [`DocumentParser`]; the default implementation lives next to the
//! oxigraph store, and [`StructuralTurtleParser`] here is the dependency-free
//! fallback.
//!
//! Every parser hands its triples to [`elements_from_triples`], which owns
//! the rules that make the two maps comparable: which types make an element,
//! kind precedence, and which label wins when there are several.

use std::{
  collections::{BTreeMap, BTreeSet},
  ops::Range,
  sync::LazyLock,
};

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
  element::ElementKind,
  lex::mask,
  rdf::{
    OWL_CLASS, OWL_DATATYPE_PROPERTY, OWL_NAMED_INDIVIDUAL, OWL_OBJECT_PROPERTY,
    RDF_TYPE, RDFS_COMMENT, RDFS_LABEL, RdfTerm, Triple,
  },
};

// ─── Element map ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementInfo {
  pub kind:    ElementKind,
  pub label:   Option<String>,
  pub comment: Option<String>,
}

/// Element IRI → what is known about it. Ordered for deterministic diffs.
pub type ElementMap = BTreeMap<String, ElementInfo>;

/// Accumulates observations about elements and resolves them into an
/// [`ElementMap`].
///
/// * An IRI with several kinds keeps the one with the lowest
///   [`ElementKind::precedence`].
/// * Several labels (or comments) resolve to the lexicographically smallest.
/// * Labels and comments on IRIs that never received a kind are dropped.
#[derive(Debug, Default)]
pub struct ElementCollector {
  kinds:    BTreeMap<String, ElementKind>,
  labels:   BTreeMap<String, BTreeSet<String>>,
  comments: BTreeMap<String, BTreeSet<String>>,
}

impl ElementCollector {
  pub fn new() -> Self { Self::default() }

  pub fn observe_kind(&mut self, iri: &str, kind: ElementKind) {
    self
      .kinds
      .entry(iri.to_owned())
      .and_modify(|k| {
        if kind.precedence() < k.precedence() {
          *k = kind;
        }
      })
      .or_insert(kind);
  }

  pub fn observe_label(&mut self, iri: &str, label: &str) {
    self.labels.entry(iri.to_owned()).or_default().insert(label.to_owned());
  }

  pub fn observe_comment(&mut self, iri: &str, comment: &str) {
    self
      .comments
      .entry(iri.to_owned())
      .or_default()
      .insert(comment.to_owned());
  }

  pub fn finish(self) -> ElementMap {
    let Self { kinds, labels, comments } = self;
    let first = |map: &BTreeMap<String, BTreeSet<String>>, iri: &str| {
      map.get(iri).and_then(|set| set.iter().next().cloned())
    };
    kinds
      .into_iter()
      .map(|(iri, kind)| {
        let info = ElementInfo {
          kind,
          label: first(&labels, &iri),
          comment: first(&comments, &iri),
        };
        (iri, info)
      })
      .collect()
  }
}

/// Apply the element rules to a document's triples.
///
/// An element is an IRI typed `owl:Class`, `owl:ObjectProperty`,
/// `owl:DatatypeProperty` or `owl:NamedIndividual`, or typed with a class
/// that is itself declared `owl:Class` in the same document. Blank-node
/// subjects never make an element.
pub fn elements_from_triples<'a>(triples: impl IntoIterator<Item = &'a Triple>) -> ElementMap {
  let mut types: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
  let mut collector = ElementCollector::new();

  for triple in triples {
    let (Some(subject), Some(predicate)) = (triple.subject.as_iri(), triple.predicate.as_iri())
    else {
      continue;
    };
    match (predicate, &triple.object) {
      (RDF_TYPE, RdfTerm::Iri { value }) => {
        types.entry(subject).or_default().insert(value);
      }
      (RDFS_LABEL, RdfTerm::Literal { value, .. }) => collector.observe_label(subject, value),
      (RDFS_COMMENT, RdfTerm::Literal { value, .. }) => collector.observe_comment(subject, value),
      _ => {}
    }
  }

  let declared_classes: BTreeSet<&str> = types
    .iter()
    .filter(|(_, tys)| tys.contains(OWL_CLASS))
    .map(|(iri, _)| *iri)
    .collect();

  for (iri, tys) in &types {
    for ty in tys {
      let kind = match *ty {
        OWL_CLASS => Some(ElementKind::Class),
        OWL_OBJECT_PROPERTY => Some(ElementKind::ObjectProperty),
        OWL_DATATYPE_PROPERTY => Some(ElementKind::DatatypeProperty),
        OWL_NAMED_INDIVIDUAL => Some(ElementKind::Individual),
        other if declared_classes.contains(other) => Some(ElementKind::Individual),
        _ => None,
      };
      if let Some(kind) = kind {
        collector.observe_kind(iri, kind);
      }
    }
  }

  collector.finish()
}

// ─── Parser seam ─────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum DocumentError {
  #[error("unterminated {0} in document")]
  Unterminated(&'static str),

  #[error("document is not valid Turtle: {0}")]
  Syntax(String),
}

/// Extracts declared ontology elements from serialized ontology text.
pub trait DocumentParser: Send + Sync {
  fn parse_document_elements(&self, document: &str) -> Result<ElementMap, DocumentError>;
}

// ─── Structural Turtle parser ────────────────────────────────────────────────

/// Best-effort Turtle reader, kept as a fallback for callers without an
/// RDF store at hand.
///
/// Handles `@prefix`/`PREFIX` (including the empty prefix), `@base`/`BASE`,
/// the `a` keyword, predicate lists (`;`), object lists (`,`), short and long
/// string literals with language tags or datatypes, and comments. Blank node
/// property lists and collections are skipped as opaque objects; statements
/// whose subject is a blank node are ignored. Names with an undeclared prefix
/// are not resolved. Directives take effect from where they appear, so a
/// redeclared prefix only changes the statements after it.
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuralTurtleParser;

static DIRECTIVE: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(
    r"(?i)(?:@prefix|\bPREFIX)\s+([A-Za-z][\w.-]*)?:\s*<[^<>]*>(?:\s*\.)?|(?:@base|\bBASE)\s+<[^<>]*>(?:\s*\.)?",
  )
  .expect("static directive pattern")
});

#[derive(Debug, Clone, PartialEq, Eq)]
enum Directive {
  Prefix { name: String, iri: String },
  Base(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Term {
  Iri(String),
  Literal(String),
  Opaque,
}

impl DocumentParser for StructuralTurtleParser {
  fn parse_document_elements(&self, document: &str) -> Result<ElementMap, DocumentError> {
    let masked = mask(document);

    let mut directives: Vec<(usize, Directive)> = Vec::new();
    let mut directive_spans: Vec<Range<usize>> = Vec::new();
    for caps in DIRECTIVE.captures_iter(&masked) {
      let Some(whole) = caps.get(0) else { continue };
      let text = &document[whole.range()];
      let Some(iri) = bracketed(text) else { continue };
      let lowered = text.trim_start().to_ascii_lowercase();
      let directive = if lowered.starts_with("@base") || lowered.starts_with("base") {
        Directive::Base(iri.to_owned())
      } else {
        let name = caps.get(1).map(|m| m.as_str()).unwrap_or("");
        Directive::Prefix { name: name.to_owned(), iri: iri.to_owned() }
      };
      directives.push((whole.start(), directive));
      directive_spans.push(whole.range());
    }

    // Blank the directives out so they do not read as statements.
    let mut body_masked = masked.clone().into_bytes();
    for span in &directive_spans {
      for b in &mut body_masked[span.clone()] {
        *b = b' ';
      }
    }
    let body_masked = String::from_utf8(body_masked)
      .map_err(|_| DocumentError::Unterminated("directive"))?;

    let mut prefixes: BTreeMap<String, String> = BTreeMap::new();
    let mut base: Option<String> = None;
    let mut pending = directives.into_iter().peekable();
    let mut found = Vec::new();

    for span in statements(&body_masked) {
      let text = &body_masked[span.clone()];
      let content_start = span.start + (text.len() - text.trim_start().len());
      while let Some((_, directive)) = pending.next_if(|(at, _)| *at < content_start) {
        match directive {
          Directive::Base(iri) => base = Some(iri),
          Directive::Prefix { name, iri } => {
            prefixes.insert(name, resolve_relative(&iri, base.as_deref()));
          }
        }
      }

      let resolver = Resolver { prefixes: &prefixes, base: base.as_deref() };
      let tokens = tokenize(&document[span.clone()], &body_masked[span])?;
      found.extend(triples(&tokens, &resolver));
    }

    Ok(elements_from_triples(&found))
  }
}

struct Resolver<'a> {
  prefixes: &'a BTreeMap<String, String>,
  base:     Option<&'a str>,
}

impl Resolver<'_> {
  fn resolve(&self, token: &str) -> Term {
    if token == "a" {
      return Term::Iri(RDF_TYPE.to_owned());
    }
    if token.starts_with('"') || token.starts_with('\'') {
      return literal_value(token).map(Term::Literal).unwrap_or(Term::Opaque);
    }
    if token.starts_with('<') {
      return match bracketed(token) {
        Some(iri) => Term::Iri(resolve_relative(iri, self.base)),
        None => Term::Opaque,
      };
    }
    if let Some((prefix, local)) = token.split_once(':')
      && !token.starts_with(['_', '[', '('])
      && let Some(ns) = self.prefixes.get(prefix)
    {
      return Term::Iri(format!("{ns}{}", unescape_local(local)));
    }
    Term::Opaque
  }
}

fn bracketed(text: &str) -> Option<&str> {
  let start = text.find('<')?;
  let end = start + text[start..].find('>')?;
  Some(&text[start + 1..end])
}

fn resolve_relative(iri: &str, base: Option<&str>) -> String {
  match base {
    Some(base) if !iri.contains(':') => format!("{base}{iri}"),
    _ => iri.to_owned(),
  }
}

fn unescape_local(local: &str) -> String { local.replace('\\', "") }

/// Byte ranges of statements: split at `.` that sits outside brackets and is
/// followed by whitespace or end of input. A trailing unterminated statement
/// is kept so that its errors surface.
fn statements(masked: &str) -> Vec<Range<usize>> {
  let bytes = masked.as_bytes();
  let mut spans = Vec::new();
  let mut depth = 0i32;
  let mut start = 0;
  for (i, &b) in bytes.iter().enumerate() {
    match b {
      b'[' | b'(' => depth += 1,
      b']' | b')' => depth -= 1,
      b'.' if depth == 0 => {
        let next = bytes.get(i + 1).copied();
        if next.is_none_or(|n| n.is_ascii_whitespace()) {
          if !masked[start..i].trim().is_empty() {
            spans.push(start..i);
          }
          start = i + 1;
        }
      }
      _ => {}
    }
  }
  if !masked[start..].trim().is_empty() {
    spans.push(start..masked.len());
  }
  spans
}

/// Split one statement into tokens. `original` and `masked` are the same
/// span of the document before and after masking.
fn tokenize<'a>(original: &'a str, masked: &str) -> Result<Vec<&'a str>, DocumentError> {
  let bytes = masked.as_bytes();
  let mut tokens = Vec::new();
  let mut i = 0;
  while i < bytes.len() {
    let b = bytes[i];
    if b.is_ascii_whitespace() {
      i += 1;
      continue;
    }
    let start = i;
    match b {
      b';' | b',' => i += 1,
      b'[' | b'(' => {
        let (open, close) = if b == b'[' { (b'[', b']') } else { (b'(', b')') };
        let mut depth = 0;
        loop {
          let Some(&c) = bytes.get(i) else {
            return Err(DocumentError::Unterminated("bracket"));
          };
          i += 1;
          if c == open {
            depth += 1;
          } else if c == close {
            depth -= 1;
            if depth == 0 {
              break;
            }
          }
        }
      }
      b'"' | b'\'' => {
        let long = bytes.get(i + 1) == Some(&b) && bytes.get(i + 2) == Some(&b);
        if long {
          let delimiter = if b == b'"' { "\"\"\"" } else { "'''" };
          let close = masked[i + 3..]
            .find(delimiter)
            .ok_or(DocumentError::Unterminated("string"))?;
          i = i + 3 + close + 3;
        } else {
          let close = masked[i + 1..]
            .find(b as char)
            .ok_or(DocumentError::Unterminated("string"))?;
          i = i + 1 + close + 1;
        }
        while i < bytes.len() && !bytes[i].is_ascii_whitespace() && !matches!(bytes[i], b';' | b',') {
          i += 1;
        }
      }
      b'<' => {
        let close = masked[i..].find('>').ok_or(DocumentError::Unterminated("IRI"))?;
        i += close + 1;
      }
      _ => {
        while i < bytes.len()
          && !bytes[i].is_ascii_whitespace()
          && !matches!(bytes[i], b';' | b',' | b'[' | b'(')
        {
          i += 1;
        }
      }
    }
    tokens.push(&original[start..i]);
  }
  Ok(tokens)
}

/// Expand a token list `s p o1, o2 ; p2 o3 .` into resolved triples.
/// Blank-node subjects, unresolved predicates and opaque objects are
/// skipped.
fn triples(tokens: &[&str], resolver: &Resolver<'_>) -> Vec<Triple> {
  let mut out = Vec::new();
  let Some((subject, rest)) = tokens.split_first() else {
    return out;
  };
  let Term::Iri(subject) = resolver.resolve(subject) else {
    return out;
  };

  for predicate_list in rest.split(|t| *t == ";") {
    let Some((predicate, objects)) = predicate_list.split_first() else {
      continue;
    };
    let Term::Iri(predicate) = resolver.resolve(predicate) else {
      continue;
    };
    for object in objects.split(|t| *t == ",") {
      let [single] = object else { continue };
      let object = match resolver.resolve(single) {
        Term::Iri(iri) => RdfTerm::iri(iri),
        Term::Literal(value) => RdfTerm::literal(value),
        Term::Opaque => continue,
      };
      out.push(Triple::new(
        RdfTerm::iri(subject.clone()),
        RdfTerm::iri(predicate.clone()),
        object,
      ));
    }
  }
  out
}

/// Lexical value of a quoted literal token, dropping any `@lang` or
/// `^^datatype` suffix.
fn literal_value(token: &str) -> Option<String> {
  let quote = token.chars().next()?;
  let long: String = std::iter::repeat_n(quote, 3).collect();
  let (open_len, close) = if token.starts_with(&long) {
    (3, token[3..].rfind(&long)? + 3)
  } else {
    let suffix_at = token
      .rfind(|c| c == quote)
      .filter(|&at| at > 0)?;
    (1, suffix_at)
  };
  Some(unescape_string(&token[open_len..close]))
}

fn unescape_string(raw: &str) -> String {
  let mut out = String::with_capacity(raw.len());
  let mut chars = raw.chars();
  while let Some(c) = chars.next() {
    if c != '\\' {
      out.push(c);
      continue;
    }
    match chars.next() {
      Some('n') => out.push('\n'),
      Some('t') => out.push('\t'),
      Some('r') => out.push('\r'),
      Some('b') => out.push('\u{8}'),
      Some('f') => out.push('\u{c}'),
      Some('u') => push_code_point(&mut out, &mut chars, 4),
      Some('U') => push_code_point(&mut out, &mut chars, 8),
      Some(other) => out.push(other),
      None => out.push('\\'),
    }
  }
  out
}

fn push_code_point(out: &mut String, chars: &mut std::str::Chars<'_>, len: usize) {
  let hex: String = chars.by_ref().take(len).collect();
  match u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
    Some(c) => out.push(c),
    None => {
      out.push('\\');
      out.push_str(&hex);
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  const DOC: &str = r#"
@prefix : <http://example.org/fleet#> .
@prefix owl: <http://www.w3.org/2002/07/owl#> .
@prefix rdfs: <http://www.w3.org/2000/01/rdf-schema#> .
PREFIX xsd: <http://www.w3.org/2001/XMLSchema#>

# Classes
:Aircraft a owl:Class ;
    rdfs:label "Aircraft"@en ;
    rdfs:comment """A powered, fixed-wing
vehicle. Not a "balloon".""" .

:Airliner a owl:Class ; rdfs:subClassOf :Aircraft ; rdfs:label "Airliner", "Jetliner" .

:hasWing a owl:ObjectProperty .
:wingspan a owl:DatatypeProperty ; rdfs:range xsd:decimal .

:B747 a :Airliner ; :wingspan 64.4 ; rdfs:label 'Jumbo \'747\'' .
<http://example.org/other#Thing> a owl:NamedIndividual .
:notAnElement rdfs:label "ignored" .
[] a owl:Class .
unknown:Prefixed a owl:Class .
"#;

  fn parse(doc: &str) -> ElementMap {
    StructuralTurtleParser.parse_document_elements(doc).unwrap()
  }

  #[test]
  fn extracts_declared_elements() {
    let elements = parse(DOC);
    let ns = "http://example.org/fleet#";
    let kinds: Vec<(String, ElementKind)> =
      elements.iter().map(|(iri, info)| (iri.clone(), info.kind)).collect();
    assert_eq!(
      kinds,
      vec![
        (format!("{ns}Aircraft"), ElementKind::Class),
        (format!("{ns}Airliner"), ElementKind::Class),
        (format!("{ns}B747"), ElementKind::Individual),
        (format!("{ns}hasWing"), ElementKind::ObjectProperty),
        (format!("{ns}wingspan"), ElementKind::DatatypeProperty),
        ("http://example.org/other#Thing".to_owned(), ElementKind::Individual),
      ]
    );
  }

  #[test]
  fn labels_and_comments() {
    let elements = parse(DOC);
    let aircraft = &elements["http://example.org/fleet#Aircraft"];
    assert_eq!(aircraft.label.as_deref(), Some("Aircraft"));
    assert_eq!(
      aircraft.comment.as_deref(),
      Some("A powered, fixed-wing\nvehicle. Not a \"balloon\".")
    );
    // Several labels: smallest wins.
    assert_eq!(
      elements["http://example.org/fleet#Airliner"].label.as_deref(),
      Some("Airliner")
    );
    assert_eq!(
      elements["http://example.org/fleet#B747"].label.as_deref(),
      Some("Jumbo '747'")
    );
    assert!(!elements.contains_key("http://example.org/fleet#notAnElement"));
  }

  #[test]
  fn sparql_style_and_base_directives() {
    let doc = "BASE <http://example.org/base#>\nPREFIX owl: <http://www.w3.org/2002/07/owl#>\n<Widget> a owl:Class .";
    let elements = parse(doc);
    assert!(elements.contains_key("http://example.org/base#Widget"));
  }

  #[test]
  fn redeclared_prefix_applies_from_where_it_appears() {
    let doc = "@prefix owl: <http://www.w3.org/2002/07/owl#> .\n\
               @prefix ex: <http://one.org/#> .\n\
               ex:A a owl:Class .\n\
               @prefix ex: <http://two.org/#> .\n\
               ex:B a owl:Class .\n\
               PREFIX ex: <http://three.org/#>\n\
               ex:C a owl:Class .";
    let iris: Vec<String> = parse(doc).into_keys().collect();
    assert_eq!(iris, vec!["http://one.org/#A", "http://three.org/#C", "http://two.org/#B"]);
  }

  #[test]
  fn rules_apply_to_any_triple_source() {
    let triples = [
      Triple::new(RdfTerm::iri("http://x/C"), RdfTerm::iri(RDF_TYPE), RdfTerm::iri(OWL_CLASS)),
      Triple::new(RdfTerm::iri("http://x/i"), RdfTerm::iri(RDF_TYPE), RdfTerm::iri("http://x/C")),
      Triple::new(RdfTerm::blank("b0"), RdfTerm::iri(RDF_TYPE), RdfTerm::iri(OWL_CLASS)),
      Triple::new(
        RdfTerm::iri("http://x/C"),
        RdfTerm::iri(RDFS_LABEL),
        RdfTerm::typed_literal("Cee", None, Some("en".into())),
      ),
    ];
    let map = elements_from_triples(&triples);
    assert_eq!(map.len(), 2);
    assert_eq!(map["http://x/C"].kind, ElementKind::Class);
    assert_eq!(map["http://x/C"].label.as_deref(), Some("Cee"));
    assert_eq!(map["http://x/i"].kind, ElementKind::Individual);
  }

  #[test]
  fn empty_document_has_no_elements() {
    assert!(parse("").is_empty());
    assert!(parse("# only a comment\n").is_empty());
  }

  #[test]
  fn unterminated_string_is_an_error() {
    let err = StructuralTurtleParser
      .parse_document_elements("<http://x/a> <http://x/p> \"open .\n")
      .unwrap_err();
    assert!(matches!(err, DocumentError::Unterminated(_)));
  }

  #[test]
  fn collector_precedence_and_label_choice() {
    let mut c = ElementCollector::new();
    c.observe_kind("http://x/a", ElementKind::Individual);
    c.observe_kind("http://x/a", ElementKind::Class);
    c.observe_label("http://x/a", "zeta");
    c.observe_label("http://x/a", "alpha");
    c.observe_label("http://x/unknown", "dropped");
    let map = c.finish();
    assert_eq!(map.len(), 1);
    assert_eq!(map["http://x/a"].kind, ElementKind::Class);
    assert_eq!(map["http://x/a"].label.as_deref(), Some("alpha"));
  }
}
