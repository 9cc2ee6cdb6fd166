//! Query templating and graph confinement.
//!
//! A competency question carries a SPARQL `SELECT` template with two
//! placeholder forms:
//!
//! * `{{iri name}}`: replaced by `<value>`; the value must be an absolute IRI.
//! * `{{name}}`: replaced by the value as an escaped string literal.
//!
//! IRI placeholders are resolved first, so a name used both ways binds
//! unambiguously. Placeholders inside comments and string literals are left
//! as written. The bound query is then rewritten so that its WHERE pattern
//! runs inside exactly one `GRAPH <iri> { … }` block, with `PREFIX`/`BASE`
//! declarations hoisted in front of it (they are not allowed inside a group
//! pattern).
//!
//! Templates are user-authored; [`validate_template`] is the only guard
//! against them smuggling in updates or reaching outside the target graph,
//! and it runs before any parameter is looked at.

use std::{collections::BTreeMap, ops::Range, sync::LazyLock};

use regex::{Captures, Regex};
use thiserror::Error;

use crate::{
  lex::{comment_ranges, mask, matching_brace},
  rdf::{is_absolute_iri, quote_literal},
};

/// Parameter values keyed by placeholder name.
pub type Params = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
  #[error("missing parameter: {0}")]
  MissingParameter(String),

  #[error("parameter {name} is not a valid IRI: {value:?}")]
  InvalidIriParameter { name: String, value: String },

  #[error("query must be a SELECT")]
  NotSelect,

  #[error("query has no WHERE clause")]
  MissingWhere,

  #[error("unbalanced braces")]
  UnbalancedBraces,

  #[error("disallowed keyword: {0}")]
  DisallowedKeyword(String),

  #[error("query may not address graphs or services itself: {0}")]
  ScopeEscape(String),

  #[error("invalid graph IRI: {0:?}")]
  InvalidGraphIri(String),

  #[error("malformed query: {0}")]
  MalformedQuery(String),
}

// ─── Patterns ────────────────────────────────────────────────────────────────

/// Keyword match that ignores variables (`?drop`), prefix names
/// (`drop:`) and any part of a local name (`ex:create`, `ex:to-delete`,
/// `ex:v1.load`). The keyword itself is capture group 1.
fn keyword_pattern(words: &str) -> Regex {
  Regex::new(&format!(r"(?i)(?:^|[^\w?$:.-])({words})(?:$|[^\w:-])"))
    .expect("static keyword pattern")
}

static MUTATING: LazyLock<Regex> =
  LazyLock::new(|| keyword_pattern("INSERT|DELETE|DROP|CLEAR|LOAD|CREATE"));
static SCOPE: LazyLock<Regex> = LazyLock::new(|| keyword_pattern("GRAPH|SERVICE"));
static SELECT: LazyLock<Regex> = LazyLock::new(|| keyword_pattern("SELECT"));
static WHERE: LazyLock<Regex> = LazyLock::new(|| keyword_pattern("WHERE"));

static IRI_PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r"\{\{\s*iri\s+([A-Za-z_][A-Za-z0-9_]*)\s*\}\}")
    .expect("static placeholder pattern")
});
static SCALAR_PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_]*)\s*\}\}")
    .expect("static placeholder pattern")
});
static ANY_PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r"\{\{\s*(?:iri\s+)?[A-Za-z_][A-Za-z0-9_]*\s*\}\}")
    .expect("static placeholder pattern")
});

/// `PREFIX p: <…>` or `BASE <…>`, matched against masked text.
static PROLOGUE: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r"(?i)\b(?:PREFIX\s+(?:[A-Za-z][\w.-]*)?:\s*<[^<>]*>|BASE\s+<[^<>]*>)")
    .expect("static prologue pattern")
});
/// Dataset clauses in the select clause.
static DATASET: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r"(?i)\bFROM\s+(?:NAMED\s+)?<[^<>]*>").expect("static dataset pattern")
});

// ─── Validation ──────────────────────────────────────────────────────────────

/// Structural checks on an unbound template.
///
/// Literals, IRIs, comments and placeholders are masked first so their
/// contents never trigger a keyword match.
pub fn validate_template(template: &str) -> Result<(), TemplateError> {
  let masked = ANY_PLACEHOLDER
    .replace_all(&mask(template), |caps: &Captures<'_>| " ".repeat(caps[0].len()))
    .into_owned();

  if let Some(caps) = MUTATING.captures(&masked) {
    return Err(TemplateError::DisallowedKeyword(caps[1].to_uppercase()));
  }
  if let Some(caps) = SCOPE.captures(&masked) {
    return Err(TemplateError::ScopeEscape(caps[1].to_uppercase()));
  }
  if !SELECT.is_match(&masked) {
    return Err(TemplateError::NotSelect);
  }
  if !WHERE.is_match(&masked) {
    return Err(TemplateError::MissingWhere);
  }

  let mut depth: i64 = 0;
  for b in masked.bytes() {
    match b {
      b'{' => depth += 1,
      b'}' => {
        depth -= 1;
        if depth < 0 {
          return Err(TemplateError::UnbalancedBraces);
        }
      }
      _ => {}
    }
  }
  if depth != 0 {
    return Err(TemplateError::UnbalancedBraces);
  }
  Ok(())
}

// ─── Binding ─────────────────────────────────────────────────────────────────

/// Substitute every placeholder outside comments and literals in
/// `template` from `params`.
pub fn bind(template: &str, params: &Params) -> Result<String, TemplateError> {
  let with_iris = replace_all(&IRI_PLACEHOLDER, template, |name| {
    let raw = params
      .get(name)
      .ok_or_else(|| TemplateError::MissingParameter(name.to_owned()))?;
    let trimmed = raw.trim();
    let bare = trimmed
      .strip_prefix('<')
      .and_then(|rest| rest.strip_suffix('>'))
      .unwrap_or(trimmed);
    if !is_absolute_iri(bare) {
      return Err(TemplateError::InvalidIriParameter {
        name:  name.to_owned(),
        value: raw.clone(),
      });
    }
    Ok(format!("<{bare}>"))
  })?;

  replace_all(&SCALAR_PLACEHOLDER, &with_iris, |name| {
    params
      .get(name)
      .map(|value| quote_literal(value))
      .ok_or_else(|| TemplateError::MissingParameter(name.to_owned()))
  })
}

/// Like `Regex::replace_all`, but the replacement may fail and matches are
/// looked for in the masked text only.
fn replace_all(
  pattern: &Regex,
  text: &str,
  mut replacement: impl FnMut(&str) -> Result<String, TemplateError>,
) -> Result<String, TemplateError> {
  let masked = mask(text);
  let mut out = String::with_capacity(text.len());
  let mut last = 0;
  for caps in pattern.captures_iter(&masked) {
    let whole = caps.get(0).map(|m| m.range()).unwrap_or(0..0);
    out.push_str(&text[last..whole.start]);
    out.push_str(&replacement(&caps[1])?);
    last = whole.end;
  }
  out.push_str(&text[last..]);
  Ok(out)
}

// ─── Confinement ─────────────────────────────────────────────────────────────

/// Rewrite a bound `SELECT` query so it only reads from `graph`.
///
/// Output shape:
///
/// ```text
/// PREFIX …
/// SELECT … WHERE { GRAPH <graph> { <original WHERE body> } } <modifiers>
/// ```
pub fn confine(query: &str, graph: &str) -> Result<String, TemplateError> {
  if !is_absolute_iri(graph) {
    return Err(TemplateError::InvalidGraphIri(graph.to_owned()));
  }

  let masked = mask(query);
  let prologue_spans: Vec<Range<usize>> =
    PROLOGUE.find_iter(&masked).map(|m| m.range()).collect();
  let prologue: Vec<&str> =
    prologue_spans.iter().map(|span| query[span.clone()].trim()).collect();

  let rest = remove_ranges(query, &prologue_spans);
  let rest_masked = remove_ranges(&masked, &prologue_spans);

  let mut out = String::new();
  for line in &prologue {
    out.push_str(line);
    out.push('\n');
  }

  match split_select(&rest, &rest_masked) {
    Some(parts) => {
      out.push_str(&format!(
        "{} WHERE {{ GRAPH <{graph}> {{ {}{} }}",
        parts.select,
        parts.body,
        close_group(parts.body)
      ));
      if !parts.modifiers.is_empty() {
        out.push(' ');
        out.push_str(parts.modifiers);
      }
    }
    None => {
      let body = fallback_body(&rest, &rest_masked).ok_or_else(|| {
        TemplateError::MalformedQuery("no group pattern found".into())
      })?;
      out.push_str(&format!(
        "SELECT * WHERE {{ GRAPH <{graph}> {{ {body}{} }}",
        close_group(body)
      ));
    }
  }

  Ok(out)
}

/// Validate, bind, then confine.
pub fn bind_and_confine(
  template: &str,
  params: &Params,
  graph: &str,
) -> Result<String, TemplateError> {
  validate_template(template)?;
  let bound = bind(template, params)?;
  confine(&bound, graph)
}

/// Closing brace of the inner group, on a fresh line when the body ends
/// inside a comment.
fn close_group(body: &str) -> &'static str {
  let ends_in_comment = comment_ranges(body)
    .last()
    .is_some_and(|range| range.end == body.len());
  if ends_in_comment { "\n}" } else { " }" }
}

struct SelectParts<'a> {
  select:    String,
  body:      &'a str,
  modifiers: &'a str,
}

fn split_select<'a>(query: &'a str, masked: &str) -> Option<SelectParts<'a>> {
  let select_at = SELECT.captures(masked)?.get(1)?.start();
  let where_match = WHERE.captures(&masked[select_at..])?.get(1)?;
  let where_start = select_at + where_match.start();
  let where_end = select_at + where_match.end();

  let open = where_end + masked[where_end..].find('{')?;
  if !masked[where_end..open].trim().is_empty() {
    return None;
  }
  let close = matching_brace(masked, open)?;

  // Dataset clauses and comments both go; the clause is re-joined on one
  // line.
  let mut dropped: Vec<Range<usize>> = DATASET
    .find_iter(&masked[select_at..where_start])
    .map(|m| m.start() + select_at..m.end() + select_at)
    .collect();
  dropped.extend(
    comment_ranges(&query[..where_start])
      .into_iter()
      .filter(|range| range.start >= select_at),
  );
  dropped.sort_by_key(|range| range.start);
  let select_text = remove_ranges(&query[..where_start], &dropped);
  let select = select_text[select_at..]
    .split_whitespace()
    .collect::<Vec<_>>()
    .join(" ");

  Some(SelectParts {
    select,
    body: query[open + 1..close].trim(),
    modifiers: query[close + 1..].trim(),
  })
}

fn fallback_body<'a>(query: &'a str, masked: &str) -> Option<&'a str> {
  let open = masked.find('{')?;
  let close = matching_brace(masked, open)?;
  Some(query[open + 1..close].trim())
}

/// Remove sorted, non-overlapping byte ranges from `text`.
fn remove_ranges(text: &str, ranges: &[Range<usize>]) -> String {
  let mut out = String::with_capacity(text.len());
  let mut last = 0;
  for range in ranges {
    out.push_str(&text[last..range.start]);
    last = range.end;
  }
  out.push_str(&text[last..]);
  out
}
