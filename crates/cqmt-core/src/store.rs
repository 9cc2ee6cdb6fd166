//! The `CatalogStore` trait: persistence for microtheory, competency
//! question, run-history and dependency-edge records.
//!
//! Graph contents live in the triplestore; this trait covers only the
//! records the engine keeps about them. Implemented by
//! `cqmt-store-sqlite`.

use std::future::Future;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
  element::{Dependency, DependencyEdge},
  microtheory::Microtheory,
  question::{CompetencyQuestion, CqRun, NewCompetencyQuestion},
};

/// Outcome of one existence check, applied by
/// [`CatalogStore::record_validations`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidationMark {
  pub edge_id: Uuid,
  pub valid:   bool,
}

/// Abstraction over the record store.
///
/// All methods return `Send` futures so the engine can be driven from a
/// multi-threaded runtime.
pub trait CatalogStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Microtheories ─────────────────────────────────────────────────────

  /// Persist a new microtheory record. Fails if the IRI is already taken
  /// or if the record claims to be the default while another one is.
  fn insert_microtheory(
    &self,
    mt: Microtheory,
  ) -> impl Future<Output = Result<Microtheory, Self::Error>> + Send + '_;

  fn get_microtheory<'a>(
    &'a self,
    iri: &'a str,
  ) -> impl Future<Output = Result<Option<Microtheory>, Self::Error>> + Send + 'a;

  /// All microtheories of a project, oldest first.
  fn list_microtheories(
    &self,
    project_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Microtheory>, Self::Error>> + Send + '_;

  /// Delete the record and every dependency edge it owns. Returns `false`
  /// if there was nothing to delete.
  fn delete_microtheory<'a>(
    &'a self,
    iri: &'a str,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a;

  /// Make `iri` the single default of `project_id`.
  ///
  /// Clears the flag on every sibling and sets it on `iri` in one
  /// transaction. Returns `false`, changing nothing, if `iri` is not a
  /// microtheory of that project.
  fn set_default_microtheory<'a>(
    &'a self,
    project_id: Uuid,
    iri: &'a str,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a;

  fn default_microtheory(
    &self,
    project_id: Uuid,
  ) -> impl Future<Output = Result<Option<Microtheory>, Self::Error>> + Send + '_;

  // ── Competency questions ──────────────────────────────────────────────

  /// Insert or update by `(project_id, name)`. An update keeps the
  /// existing `cq_id` and `created_at`.
  fn upsert_cq(
    &self,
    input: NewCompetencyQuestion,
  ) -> impl Future<Output = Result<CompetencyQuestion, Self::Error>> + Send + '_;

  fn get_cq<'a>(
    &'a self,
    project_id: Uuid,
    name: &'a str,
  ) -> impl Future<Output = Result<Option<CompetencyQuestion>, Self::Error>> + Send + 'a;

  /// All questions of a project, by name.
  fn list_cqs(
    &self,
    project_id: Uuid,
  ) -> impl Future<Output = Result<Vec<CompetencyQuestion>, Self::Error>> + Send + '_;

  /// Delete a question and its run history.
  fn delete_cq<'a>(
    &'a self,
    project_id: Uuid,
    name: &'a str,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a;

  // ── Runs ──────────────────────────────────────────────────────────────

  /// Append a run record. Runs are never updated.
  fn insert_run(
    &self,
    run: CqRun,
  ) -> impl Future<Output = Result<CqRun, Self::Error>> + Send + '_;

  /// The `limit` most recent runs of a question, newest first.
  fn recent_runs(
    &self,
    cq_id: Uuid,
    limit: usize,
  ) -> impl Future<Output = Result<Vec<CqRun>, Self::Error>> + Send + '_;

  // ── Dependency edges ──────────────────────────────────────────────────

  /// Replace every edge of `microtheory` with one edge per dependency, in
  /// one transaction. Elements that were already tracked keep their
  /// `first_seen_at`; all edges start out valid.
  ///
  /// Two concurrent replacements for the same microtheory may interleave
  /// at the transaction boundary; callers serialise per microtheory.
  fn replace_dependencies<'a>(
    &'a self,
    microtheory: &'a str,
    ontology_graph: &'a str,
    dependencies: &'a [Dependency],
  ) -> impl Future<Output = Result<Vec<DependencyEdge>, Self::Error>> + Send + 'a;

  /// Stored edges of a microtheory, by element IRI.
  fn dependencies<'a>(
    &'a self,
    microtheory: &'a str,
  ) -> impl Future<Output = Result<Vec<DependencyEdge>, Self::Error>> + Send + 'a;

  /// Apply a batch of validity flags, stamping each edge with `checked_at`.
  fn record_validations<'a>(
    &'a self,
    marks: &'a [ValidationMark],
    checked_at: DateTime<Utc>,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  /// IRIs of microtheories with an edge to `element_iri` in
  /// `ontology_graph`. Distinct and sorted.
  fn microtheories_referencing<'a>(
    &'a self,
    ontology_graph: &'a str,
    element_iri: &'a str,
  ) -> impl Future<Output = Result<Vec<String>, Self::Error>> + Send + 'a;
}
