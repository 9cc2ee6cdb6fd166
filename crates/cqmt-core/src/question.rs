//! Competency questions, their runs, and the event emitted after a run.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

use crate::{contract::Contract, rdf::RdfTerm, template::Params};

/// Lifecycle status of a competency question.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display,
  EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum CqStatus {
  #[default]
  Draft,
  Active,
  Deprecated,
}

/// A parameterised query with a pass/fail contract. Unique by
/// `(project_id, name)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompetencyQuestion {
  pub cq_id:      Uuid,
  pub project_id: Uuid,
  pub name:       String,
  /// Natural-language statement of what the question checks.
  pub problem:    String,
  pub template:   String,
  /// Declared parameter names, informational.
  pub parameters: Vec<String>,
  pub contract:   Contract,
  pub default_mt: Option<String>,
  pub status:     CqStatus,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

/// Input to [`crate::store::CatalogStore::upsert_cq`].
#[derive(Debug, Clone)]
pub struct NewCompetencyQuestion {
  pub project_id: Uuid,
  pub name:       String,
  pub problem:    String,
  pub template:   String,
  pub parameters: Vec<String>,
  pub contract:   Contract,
  pub default_mt: Option<String>,
  pub status:     CqStatus,
}

/// A result row: column name → bound term. Unbound columns are absent.
pub type Row = BTreeMap<String, RdfTerm>;

/// Immutable record of one CQ execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CqRun {
  pub run_id:      Uuid,
  pub cq_id:       Uuid,
  pub project_id:  Uuid,
  pub microtheory: String,
  pub params:      Params,
  pub pass:        bool,
  /// `pass`, a contract violation code, `compile_error: …` or
  /// `execution_error: …`.
  pub reason:      String,
  pub columns:     Vec<String>,
  pub row_count:   u64,
  /// The first few result rows.
  pub preview:     Vec<Row>,
  pub latency_ms:  u64,
  pub executed_by: Option<String>,
  pub executed_at: DateTime<Utc>,
}

/// Published after a run has been persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunCompleted {
  pub project_id:  Uuid,
  pub cq_id:       Uuid,
  pub cq_name:     String,
  pub run_id:      Uuid,
  pub microtheory: String,
  pub pass:        bool,
  pub reason:      String,
  pub latency_ms:  u64,
}

impl RunCompleted {
  pub fn from_run(run: &CqRun, cq_name: &str) -> Self {
    Self {
      project_id:  run.project_id,
      cq_id:       run.cq_id,
      cq_name:     cq_name.to_owned(),
      run_id:      run.run_id,
      microtheory: run.microtheory.clone(),
      pass:        run.pass,
      reason:      run.reason.clone(),
      latency_ms:  run.latency_ms,
    }
  }
}
