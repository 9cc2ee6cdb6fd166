//! [`SqliteStore`], the SQLite implementation of [`CatalogStore`].

use std::{collections::HashMap, path::Path};

use chrono::{DateTime, Utc};
use rusqlite::OptionalExtension as _;
use uuid::Uuid;

use cqmt_core::{
  element::{Dependency, DependencyEdge},
  microtheory::Microtheory,
  question::{CompetencyQuestion, CqRun, NewCompetencyQuestion},
  store::{CatalogStore, ValidationMark},
};

use crate::{
  Result,
  encode::{
    EDGE_COLUMNS, MICROTHEORY_COLUMNS, QUESTION_COLUMNS, RUN_COLUMNS, RawEdge,
    RawMicrotheory, RawQuestion, RawRun, encode_dt, encode_uuid,
  },
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A record store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, for tests and throwaway sessions.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Fetch at most one microtheory matching `filter`, which binds `?1`.
  async fn query_microtheory(
    &self,
    filter: &'static str,
    key: String,
  ) -> Result<Option<Microtheory>> {
    let raw: Option<RawMicrotheory> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {MICROTHEORY_COLUMNS} FROM microtheories WHERE {filter}"),
              rusqlite::params![key],
              RawMicrotheory::from_row,
            )
            .optional()?,
        )
      })
      .await?;
    raw.map(RawMicrotheory::into_microtheory).transpose()
  }
}

// ─── CatalogStore impl ───────────────────────────────────────────────────────

impl CatalogStore for SqliteStore {
  type Error = crate::Error;

  // ── Microtheories ─────────────────────────────────────────────────────────

  async fn insert_microtheory(&self, mt: Microtheory) -> Result<Microtheory> {
    let iri        = mt.iri.clone();
    let project    = encode_uuid(mt.project_id);
    let label      = mt.label.clone();
    let parent     = mt.parent_iri.clone();
    let is_default = mt.is_default;
    let created_by = mt.created_by.clone();
    let created_at = encode_dt(mt.created_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO microtheories (
             iri, project_id, label, parent_iri, is_default, created_by, created_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
          rusqlite::params![
            iri, project, label, parent, is_default, created_by, created_at
          ],
        )?;
        Ok(())
      })
      .await?;

    Ok(mt)
  }

  async fn get_microtheory(&self, iri: &str) -> Result<Option<Microtheory>> {
    self.query_microtheory("iri = ?1", iri.to_owned()).await
  }

  async fn list_microtheories(&self, project_id: Uuid) -> Result<Vec<Microtheory>> {
    let project = encode_uuid(project_id);

    let raws: Vec<RawMicrotheory> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {MICROTHEORY_COLUMNS} FROM microtheories
           WHERE project_id = ?1 ORDER BY created_at, iri"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![project], RawMicrotheory::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawMicrotheory::into_microtheory).collect()
  }

  async fn delete_microtheory(&self, iri: &str) -> Result<bool> {
    let iri = iri.to_owned();
    let deleted = self
      .conn
      .call(move |conn| {
        Ok(conn.execute("DELETE FROM microtheories WHERE iri = ?1", rusqlite::params![iri])?)
      })
      .await?;
    Ok(deleted > 0)
  }

  async fn set_default_microtheory(&self, project_id: Uuid, iri: &str) -> Result<bool> {
    let project = encode_uuid(project_id);
    let iri = iri.to_owned();

    let changed = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let member = tx
          .query_row(
            "SELECT 1 FROM microtheories WHERE iri = ?1 AND project_id = ?2",
            rusqlite::params![iri, project],
            |_| Ok(true),
          )
          .optional()?
          .unwrap_or(false);
        if !member {
          return Ok(false);
        }
        tx.execute(
          "UPDATE microtheories SET is_default = 0 WHERE project_id = ?1 AND is_default = 1",
          rusqlite::params![project],
        )?;
        tx.execute(
          "UPDATE microtheories SET is_default = 1 WHERE iri = ?1",
          rusqlite::params![iri],
        )?;
        tx.commit()?;
        Ok(true)
      })
      .await?;

    Ok(changed)
  }

  async fn default_microtheory(&self, project_id: Uuid) -> Result<Option<Microtheory>> {
    self
      .query_microtheory("project_id = ?1 AND is_default = 1", encode_uuid(project_id))
      .await
  }

  // ── Competency questions ──────────────────────────────────────────────────

  async fn upsert_cq(&self, input: NewCompetencyQuestion) -> Result<CompetencyQuestion> {
    let new_id     = encode_uuid(Uuid::new_v4());
    let now        = encode_dt(Utc::now());
    let project    = encode_uuid(input.project_id);
    let name       = input.name;
    let problem    = input.problem;
    let template   = input.template;
    let parameters = serde_json::to_string(&input.parameters)?;
    let contract   = serde_json::to_string(&input.contract)?;
    let default_mt = input.default_mt;
    let status     = input.status.to_string();

    let raw: RawQuestion = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute(
          "INSERT INTO competency_questions (
             cq_id, project_id, name, problem, template, parameters, contract,
             default_mt, status, created_at, updated_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10)
           ON CONFLICT (project_id, name) DO UPDATE SET
             problem    = excluded.problem,
             template   = excluded.template,
             parameters = excluded.parameters,
             contract   = excluded.contract,
             default_mt = excluded.default_mt,
             status     = excluded.status,
             updated_at = excluded.updated_at",
          rusqlite::params![
            new_id, project, name, problem, template, parameters, contract,
            default_mt, status, now
          ],
        )?;
        let raw = tx.query_row(
          &format!(
            "SELECT {QUESTION_COLUMNS} FROM competency_questions
             WHERE project_id = ?1 AND name = ?2"
          ),
          rusqlite::params![project, name],
          RawQuestion::from_row,
        )?;
        tx.commit()?;
        Ok(raw)
      })
      .await?;

    raw.into_question()
  }

  async fn get_cq(&self, project_id: Uuid, name: &str) -> Result<Option<CompetencyQuestion>> {
    let project = encode_uuid(project_id);
    let name = name.to_owned();

    let raw: Option<RawQuestion> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {QUESTION_COLUMNS} FROM competency_questions
                 WHERE project_id = ?1 AND name = ?2"
              ),
              rusqlite::params![project, name],
              RawQuestion::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawQuestion::into_question).transpose()
  }

  async fn list_cqs(&self, project_id: Uuid) -> Result<Vec<CompetencyQuestion>> {
    let project = encode_uuid(project_id);

    let raws: Vec<RawQuestion> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {QUESTION_COLUMNS} FROM competency_questions
           WHERE project_id = ?1 ORDER BY name"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![project], RawQuestion::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawQuestion::into_question).collect()
  }

  async fn delete_cq(&self, project_id: Uuid, name: &str) -> Result<bool> {
    let project = encode_uuid(project_id);
    let name = name.to_owned();

    let deleted = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "DELETE FROM competency_questions WHERE project_id = ?1 AND name = ?2",
          rusqlite::params![project, name],
        )?)
      })
      .await?;
    Ok(deleted > 0)
  }

  // ── Runs ──────────────────────────────────────────────────────────────────

  async fn insert_run(&self, run: CqRun) -> Result<CqRun> {
    let raw = RawRun::encode(&run)?;

    self
      .conn
      .call(move |conn| {
        conn.execute(
          &format!(
            "INSERT INTO cq_runs ({RUN_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)"
          ),
          rusqlite::params![
            raw.run_id,
            raw.cq_id,
            raw.project_id,
            raw.microtheory,
            raw.params,
            raw.pass,
            raw.reason,
            raw.columns,
            raw.row_count,
            raw.preview,
            raw.latency_ms,
            raw.executed_by,
            raw.executed_at,
          ],
        )?;
        Ok(())
      })
      .await?;

    Ok(run)
  }

  async fn recent_runs(&self, cq_id: Uuid, limit: usize) -> Result<Vec<CqRun>> {
    let cq = encode_uuid(cq_id);
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);

    let raws: Vec<RawRun> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {RUN_COLUMNS} FROM cq_runs
           WHERE cq_id = ?1 ORDER BY executed_at DESC, rowid DESC LIMIT ?2"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![cq, limit], RawRun::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawRun::into_run).collect()
  }

  // ── Dependency edges ──────────────────────────────────────────────────────

  async fn replace_dependencies(
    &self,
    microtheory: &str,
    ontology_graph: &str,
    dependencies: &[Dependency],
  ) -> Result<Vec<DependencyEdge>> {
    let mt    = microtheory.to_owned();
    let graph = ontology_graph.to_owned();
    let now   = encode_dt(Utc::now());
    let deps: Vec<(String, String)> = dependencies
      .iter()
      .map(|d| (d.iri.clone(), d.kind.to_string()))
      .collect();

    let raws: Vec<RawEdge> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let first_seen: HashMap<String, String> = {
          let mut stmt = tx.prepare(
            "SELECT element_iri, first_seen_at FROM dependency_edges WHERE microtheory = ?1",
          )?;
          stmt
            .query_map(rusqlite::params![mt], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<rusqlite::Result<_>>()?
        };

        tx.execute(
          "DELETE FROM dependency_edges WHERE microtheory = ?1",
          rusqlite::params![mt],
        )?;

        let mut raws = Vec::with_capacity(deps.len());
        {
          let mut stmt = tx.prepare(&format!(
            "INSERT INTO dependency_edges ({EDGE_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6, NULL)"
          ))?;
          for (iri, kind) in deps {
            let raw = RawEdge {
              edge_id:           encode_uuid(Uuid::new_v4()),
              microtheory:       mt.clone(),
              ontology_graph:    graph.clone(),
              first_seen_at:     first_seen.get(&iri).cloned().unwrap_or_else(|| now.clone()),
              element_iri:       iri,
              kind,
              valid:             true,
              last_validated_at: None,
            };
            stmt.execute(rusqlite::params![
              raw.edge_id,
              raw.microtheory,
              raw.ontology_graph,
              raw.element_iri,
              raw.kind,
              raw.first_seen_at,
            ])?;
            raws.push(raw);
          }
        }

        tx.commit()?;
        Ok(raws)
      })
      .await?;

    let mut edges = raws
      .into_iter()
      .map(RawEdge::into_edge)
      .collect::<Result<Vec<_>>>()?;
    edges.sort_by(|a, b| a.element_iri.cmp(&b.element_iri));
    Ok(edges)
  }

  async fn dependencies(&self, microtheory: &str) -> Result<Vec<DependencyEdge>> {
    let mt = microtheory.to_owned();

    let raws: Vec<RawEdge> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {EDGE_COLUMNS} FROM dependency_edges
           WHERE microtheory = ?1 ORDER BY element_iri"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![mt], RawEdge::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawEdge::into_edge).collect()
  }

  async fn record_validations(
    &self,
    marks: &[ValidationMark],
    checked_at: DateTime<Utc>,
  ) -> Result<()> {
    let at = encode_dt(checked_at);
    let marks: Vec<(String, bool)> =
      marks.iter().map(|m| (encode_uuid(m.edge_id), m.valid)).collect();

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        {
          let mut stmt = tx.prepare(
            "UPDATE dependency_edges SET valid = ?1, last_validated_at = ?2 WHERE edge_id = ?3",
          )?;
          for (edge_id, valid) in marks {
            stmt.execute(rusqlite::params![valid, at, edge_id])?;
          }
        }
        tx.commit()?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn microtheories_referencing(
    &self,
    ontology_graph: &str,
    element_iri: &str,
  ) -> Result<Vec<String>> {
    let graph = ontology_graph.to_owned();
    let element = element_iri.to_owned();

    let mts = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT DISTINCT microtheory FROM dependency_edges
           WHERE ontology_graph = ?1 AND element_iri = ?2
           ORDER BY microtheory",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![graph, element], |row| row.get(0))?
          .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(rows)
      })
      .await?;
    Ok(mts)
  }
}
