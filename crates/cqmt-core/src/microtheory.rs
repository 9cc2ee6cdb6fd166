//! Microtheories: named graphs holding one test fixture each.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Registry record for a microtheory. The triples themselves live in the
/// triplestore under the named graph `iri`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Microtheory {
  pub iri:        String,
  pub project_id: Uuid,
  pub label:      String,
  /// The microtheory this one was cloned from, if any.
  pub parent_iri: Option<String>,
  /// At most one microtheory per project is the default.
  pub is_default: bool,
  pub created_by: Option<String>,
  pub created_at: DateTime<Utc>,
}

/// Input to microtheory creation. The IRI and timestamp are assigned by the
/// engine.
#[derive(Debug, Clone)]
pub struct NewMicrotheory {
  pub project_id:   Uuid,
  pub label:        String,
  /// Clone this microtheory's triples into the new graph.
  pub parent_iri:   Option<String>,
  pub make_default: bool,
  pub created_by:   Option<String>,
}

impl NewMicrotheory {
  pub fn new(project_id: Uuid, label: impl Into<String>) -> Self {
    Self {
      project_id,
      label: label.into(),
      parent_iri: None,
      make_default: false,
      created_by: None,
    }
  }
}

/// Build the IRI of a new microtheory graph under `base`.
pub fn microtheory_iri(base: &str, project_id: Uuid, id: Uuid) -> String {
  format!(
    "{}/projects/{}/mt/{}",
    base.trim_end_matches('/'),
    project_id.hyphenated(),
    id.hyphenated()
  )
}
