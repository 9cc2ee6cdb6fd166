//! Encoding and decoding helpers between domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are RFC 3339 strings with fixed microsecond precision, so
//! that text order is time order. Contracts, parameter maps, column lists
//! and previews are compact JSON. Enums use their `strum` names.

use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use cqmt_core::{
  element::{DependencyEdge, ElementKind},
  microtheory::Microtheory,
  question::{CompetencyQuestion, CqRun, CqStatus},
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Scalars ─────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

fn decode_enum<T: FromStr>(column: &'static str, s: &str) -> Result<T> {
  s.parse().map_err(|_| Error::UnknownVariant { column, value: s.to_owned() })
}

pub fn encode_u64(v: u64) -> Result<i64> {
  i64::try_from(v).map_err(|_| Error::OutOfRange("u64"))
}

fn decode_u64(column: &'static str, v: i64) -> Result<u64> {
  u64::try_from(v).map_err(|_| Error::OutOfRange(column))
}

// ─── Raw rows ────────────────────────────────────────────────────────────────

/// Columns of a `microtheories` row, in `SELECT` order.
pub const MICROTHEORY_COLUMNS: &str =
  "iri, project_id, label, parent_iri, is_default, created_by, created_at";

pub struct RawMicrotheory {
  pub iri:        String,
  pub project_id: String,
  pub label:      String,
  pub parent_iri: Option<String>,
  pub is_default: bool,
  pub created_by: Option<String>,
  pub created_at: String,
}

impl RawMicrotheory {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      iri:        row.get(0)?,
      project_id: row.get(1)?,
      label:      row.get(2)?,
      parent_iri: row.get(3)?,
      is_default: row.get(4)?,
      created_by: row.get(5)?,
      created_at: row.get(6)?,
    })
  }

  pub fn into_microtheory(self) -> Result<Microtheory> {
    Ok(Microtheory {
      iri:        self.iri,
      project_id: decode_uuid(&self.project_id)?,
      label:      self.label,
      parent_iri: self.parent_iri,
      is_default: self.is_default,
      created_by: self.created_by,
      created_at: decode_dt(&self.created_at)?,
    })
  }
}

pub const QUESTION_COLUMNS: &str = "cq_id, project_id, name, problem, template, \
  parameters, contract, default_mt, status, created_at, updated_at";

pub struct RawQuestion {
  pub cq_id:      String,
  pub project_id: String,
  pub name:       String,
  pub problem:    String,
  pub template:   String,
  pub parameters: String,
  pub contract:   String,
  pub default_mt: Option<String>,
  pub status:     String,
  pub created_at: String,
  pub updated_at: String,
}

impl RawQuestion {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      cq_id:      row.get(0)?,
      project_id: row.get(1)?,
      name:       row.get(2)?,
      problem:    row.get(3)?,
      template:   row.get(4)?,
      parameters: row.get(5)?,
      contract:   row.get(6)?,
      default_mt: row.get(7)?,
      status:     row.get(8)?,
      created_at: row.get(9)?,
      updated_at: row.get(10)?,
    })
  }

  pub fn into_question(self) -> Result<CompetencyQuestion> {
    Ok(CompetencyQuestion {
      cq_id:      decode_uuid(&self.cq_id)?,
      project_id: decode_uuid(&self.project_id)?,
      name:       self.name,
      problem:    self.problem,
      template:   self.template,
      parameters: serde_json::from_str(&self.parameters)?,
      contract:   serde_json::from_str(&self.contract)?,
      default_mt: self.default_mt,
      status:     decode_enum::<CqStatus>("status", &self.status)?,
      created_at: decode_dt(&self.created_at)?,
      updated_at: decode_dt(&self.updated_at)?,
    })
  }
}

pub const RUN_COLUMNS: &str = "run_id, cq_id, project_id, microtheory, params, pass, \
  reason, columns, row_count, preview, latency_ms, executed_by, executed_at";

pub struct RawRun {
  pub run_id:      String,
  pub cq_id:       String,
  pub project_id:  String,
  pub microtheory: String,
  pub params:      String,
  pub pass:        bool,
  pub reason:      String,
  pub columns:     String,
  pub row_count:   i64,
  pub preview:     String,
  pub latency_ms:  i64,
  pub executed_by: Option<String>,
  pub executed_at: String,
}

impl RawRun {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      run_id:      row.get(0)?,
      cq_id:       row.get(1)?,
      project_id:  row.get(2)?,
      microtheory: row.get(3)?,
      params:      row.get(4)?,
      pass:        row.get(5)?,
      reason:      row.get(6)?,
      columns:     row.get(7)?,
      row_count:   row.get(8)?,
      preview:     row.get(9)?,
      latency_ms:  row.get(10)?,
      executed_by: row.get(11)?,
      executed_at: row.get(12)?,
    })
  }

  pub fn encode(run: &CqRun) -> Result<Self> {
    Ok(Self {
      run_id:      encode_uuid(run.run_id),
      cq_id:       encode_uuid(run.cq_id),
      project_id:  encode_uuid(run.project_id),
      microtheory: run.microtheory.clone(),
      params:      serde_json::to_string(&run.params)?,
      pass:        run.pass,
      reason:      run.reason.clone(),
      columns:     serde_json::to_string(&run.columns)?,
      row_count:   encode_u64(run.row_count)?,
      preview:     serde_json::to_string(&run.preview)?,
      latency_ms:  encode_u64(run.latency_ms)?,
      executed_by: run.executed_by.clone(),
      executed_at: encode_dt(run.executed_at),
    })
  }

  pub fn into_run(self) -> Result<CqRun> {
    Ok(CqRun {
      run_id:      decode_uuid(&self.run_id)?,
      cq_id:       decode_uuid(&self.cq_id)?,
      project_id:  decode_uuid(&self.project_id)?,
      microtheory: self.microtheory,
      params:      serde_json::from_str(&self.params)?,
      pass:        self.pass,
      reason:      self.reason,
      columns:     serde_json::from_str(&self.columns)?,
      row_count:   decode_u64("row_count", self.row_count)?,
      preview:     serde_json::from_str(&self.preview)?,
      latency_ms:  decode_u64("latency_ms", self.latency_ms)?,
      executed_by: self.executed_by,
      executed_at: decode_dt(&self.executed_at)?,
    })
  }
}

pub const EDGE_COLUMNS: &str = "edge_id, microtheory, ontology_graph, element_iri, \
  kind, valid, first_seen_at, last_validated_at";

pub struct RawEdge {
  pub edge_id:           String,
  pub microtheory:       String,
  pub ontology_graph:    String,
  pub element_iri:       String,
  pub kind:              String,
  pub valid:             bool,
  pub first_seen_at:     String,
  pub last_validated_at: Option<String>,
}

impl RawEdge {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      edge_id:           row.get(0)?,
      microtheory:       row.get(1)?,
      ontology_graph:    row.get(2)?,
      element_iri:       row.get(3)?,
      kind:              row.get(4)?,
      valid:             row.get(5)?,
      first_seen_at:     row.get(6)?,
      last_validated_at: row.get(7)?,
    })
  }

  pub fn into_edge(self) -> Result<DependencyEdge> {
    Ok(DependencyEdge {
      edge_id:           decode_uuid(&self.edge_id)?,
      microtheory:       self.microtheory,
      ontology_graph:    self.ontology_graph,
      element_iri:       self.element_iri,
      kind:              decode_enum::<ElementKind>("kind", &self.kind)?,
      valid:             self.valid,
      first_seen_at:     decode_dt(&self.first_seen_at)?,
      last_validated_at: self.last_validated_at.as_deref().map(decode_dt).transpose()?,
    })
  }
}
