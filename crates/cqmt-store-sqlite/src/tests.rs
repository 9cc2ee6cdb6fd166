//! Integration tests for `SqliteStore` against an in-memory database.

use std::collections::BTreeMap;

use chrono::{Duration, Utc};
use cqmt_core::{
  contract::Contract,
  element::{Dependency, ElementKind},
  microtheory::Microtheory,
  question::{CompetencyQuestion, CqRun, CqStatus, NewCompetencyQuestion},
  rdf::RdfTerm,
  store::{CatalogStore, ValidationMark},
};
use uuid::Uuid;

use crate::SqliteStore;

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn mt(project_id: Uuid, name: &str) -> Microtheory {
  Microtheory {
    iri: format!("http://example.org/mt/{name}"),
    project_id,
    label: name.to_owned(),
    parent_iri: None,
    is_default: false,
    created_by: Some("tester".into()),
    created_at: Utc::now(),
  }
}

fn question(project_id: Uuid, name: &str) -> NewCompetencyQuestion {
  NewCompetencyQuestion {
    project_id,
    name: name.to_owned(),
    problem: "Which aircraft are there?".into(),
    template: "SELECT ?aircraft WHERE { ?aircraft a <http://ex.org/Aircraft> }".into(),
    parameters: vec![],
    contract: Contract {
      require_columns: vec!["aircraft".into()],
      min_rows: Some(1),
      max_latency_ms: None,
    },
    default_mt: None,
    status: CqStatus::Draft,
  }
}

fn run(cq: &CompetencyQuestion, microtheory: &str, at: chrono::DateTime<Utc>) -> CqRun {
  let mut row = BTreeMap::new();
  row.insert("aircraft".to_owned(), RdfTerm::iri("http://ex.org/B747"));
  CqRun {
    run_id: Uuid::new_v4(),
    cq_id: cq.cq_id,
    project_id: cq.project_id,
    microtheory: microtheory.to_owned(),
    params: BTreeMap::from([("x".to_owned(), "y".to_owned())]),
    pass: true,
    reason: "pass".into(),
    columns: vec!["aircraft".into()],
    row_count: 1,
    preview: vec![row],
    latency_ms: 12,
    executed_by: None,
    executed_at: at,
  }
}

fn dep(local: &str, kind: ElementKind) -> Dependency {
  Dependency { iri: format!("http://ex.org/onto#{local}"), kind }
}

const ONTO: &str = "http://ex.org/onto";

// ─── Microtheories ───────────────────────────────────────────────────────────

#[tokio::test]
async fn insert_and_get_microtheory() {
  let s = store().await;
  let project = Uuid::new_v4();

  let inserted = s.insert_microtheory(mt(project, "a")).await.unwrap();
  let fetched = s.get_microtheory(&inserted.iri).await.unwrap().unwrap();

  assert_eq!(fetched.iri, inserted.iri);
  assert_eq!(fetched.project_id, project);
  assert_eq!(fetched.created_by.as_deref(), Some("tester"));
  assert!(!fetched.is_default);
  assert!(s.get_microtheory("http://example.org/mt/none").await.unwrap().is_none());
}

#[tokio::test]
async fn duplicate_microtheory_iri_errors() {
  let s = store().await;
  let project = Uuid::new_v4();
  s.insert_microtheory(mt(project, "a")).await.unwrap();
  assert!(s.insert_microtheory(mt(project, "a")).await.is_err());
}

#[tokio::test]
async fn list_is_scoped_to_project() {
  let s = store().await;
  let p1 = Uuid::new_v4();
  let p2 = Uuid::new_v4();
  s.insert_microtheory(mt(p1, "a")).await.unwrap();
  s.insert_microtheory(mt(p1, "b")).await.unwrap();
  s.insert_microtheory(mt(p2, "c")).await.unwrap();

  let listed = s.list_microtheories(p1).await.unwrap();
  assert_eq!(listed.len(), 2);
  assert!(listed.iter().all(|m| m.project_id == p1));
}

#[tokio::test]
async fn set_default_keeps_a_single_default() {
  let s = store().await;
  let project = Uuid::new_v4();
  let a = s.insert_microtheory(mt(project, "a")).await.unwrap();
  let b = s.insert_microtheory(mt(project, "b")).await.unwrap();

  assert!(s.default_microtheory(project).await.unwrap().is_none());

  assert!(s.set_default_microtheory(project, &a.iri).await.unwrap());
  assert_eq!(s.default_microtheory(project).await.unwrap().unwrap().iri, a.iri);

  assert!(s.set_default_microtheory(project, &b.iri).await.unwrap());
  let defaults: Vec<String> = s
    .list_microtheories(project)
    .await
    .unwrap()
    .into_iter()
    .filter(|m| m.is_default)
    .map(|m| m.iri)
    .collect();
  assert_eq!(defaults, vec![b.iri.clone()]);
}

#[tokio::test]
async fn set_default_rejects_foreign_microtheory() {
  let s = store().await;
  let p1 = Uuid::new_v4();
  let p2 = Uuid::new_v4();
  let a = s.insert_microtheory(mt(p1, "a")).await.unwrap();
  let other = s.insert_microtheory(mt(p2, "other")).await.unwrap();
  s.set_default_microtheory(p1, &a.iri).await.unwrap();

  assert!(!s.set_default_microtheory(p1, &other.iri).await.unwrap());
  assert_eq!(s.default_microtheory(p1).await.unwrap().unwrap().iri, a.iri);
}

#[tokio::test]
async fn second_default_insert_is_rejected_by_index() {
  let s = store().await;
  let project = Uuid::new_v4();
  let mut a = mt(project, "a");
  a.is_default = true;
  let mut b = mt(project, "b");
  b.is_default = true;
  s.insert_microtheory(a).await.unwrap();
  assert!(s.insert_microtheory(b).await.is_err());
}

#[tokio::test]
async fn delete_microtheory_cascades_edges() {
  let s = store().await;
  let project = Uuid::new_v4();
  let a = s.insert_microtheory(mt(project, "a")).await.unwrap();
  s.replace_dependencies(&a.iri, ONTO, &[dep("Aircraft", ElementKind::Class)])
    .await
    .unwrap();

  assert!(s.delete_microtheory(&a.iri).await.unwrap());
  assert!(!s.delete_microtheory(&a.iri).await.unwrap());
  assert!(s.dependencies(&a.iri).await.unwrap().is_empty());
  assert!(
    s.microtheories_referencing(ONTO, "http://ex.org/onto#Aircraft")
      .await
      .unwrap()
      .is_empty()
  );
}

// ─── Competency questions ────────────────────────────────────────────────────

#[tokio::test]
async fn upsert_inserts_then_updates_in_place() {
  let s = store().await;
  let project = Uuid::new_v4();

  let first = s.upsert_cq(question(project, "aircraft")).await.unwrap();
  assert_eq!(first.status, CqStatus::Draft);

  let mut changed = question(project, "aircraft");
  changed.status = CqStatus::Active;
  changed.contract.require_columns.push("label".into());
  let second = s.upsert_cq(changed).await.unwrap();

  assert_eq!(second.cq_id, first.cq_id);
  assert_eq!(second.created_at, first.created_at);
  assert_eq!(second.status, CqStatus::Active);
  assert_eq!(second.contract.require_columns, ["aircraft", "label"]);
  assert_eq!(s.list_cqs(project).await.unwrap().len(), 1);
}

#[tokio::test]
async fn get_cq_by_project_and_name() {
  let s = store().await;
  let p1 = Uuid::new_v4();
  let p2 = Uuid::new_v4();
  s.upsert_cq(question(p1, "q")).await.unwrap();

  assert!(s.get_cq(p1, "q").await.unwrap().is_some());
  assert!(s.get_cq(p2, "q").await.unwrap().is_none());
}

#[tokio::test]
async fn default_mt_is_cleared_when_microtheory_goes() {
  let s = store().await;
  let project = Uuid::new_v4();
  let a = s.insert_microtheory(mt(project, "a")).await.unwrap();
  let mut input = question(project, "q");
  input.default_mt = Some(a.iri.clone());
  s.upsert_cq(input).await.unwrap();

  s.delete_microtheory(&a.iri).await.unwrap();

  assert_eq!(s.get_cq(project, "q").await.unwrap().unwrap().default_mt, None);
}

// ─── Runs ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn runs_newest_first_with_limit() {
  let s = store().await;
  let project = Uuid::new_v4();
  let cq = s.upsert_cq(question(project, "q")).await.unwrap();
  let base = Utc::now();

  let mut ids = Vec::new();
  for i in 0..5 {
    let r = s
      .insert_run(run(&cq, "http://example.org/mt/a", base + Duration::seconds(i)))
      .await
      .unwrap();
    ids.push(r.run_id);
  }

  let recent = s.recent_runs(cq.cq_id, 3).await.unwrap();
  let recent_ids: Vec<Uuid> = recent.iter().map(|r| r.run_id).collect();
  assert_eq!(recent_ids, vec![ids[4], ids[3], ids[2]]);
  assert_eq!(recent[0].preview[0]["aircraft"], RdfTerm::iri("http://ex.org/B747"));
  assert_eq!(recent[0].params["x"], "y");
}

#[tokio::test]
async fn deleting_cq_cascades_runs() {
  let s = store().await;
  let project = Uuid::new_v4();
  let cq = s.upsert_cq(question(project, "q")).await.unwrap();
  s.insert_run(run(&cq, "http://example.org/mt/a", Utc::now())).await.unwrap();

  assert!(s.delete_cq(project, "q").await.unwrap());
  assert!(s.recent_runs(cq.cq_id, 10).await.unwrap().is_empty());
  assert!(!s.delete_cq(project, "q").await.unwrap());
}

// ─── Dependency edges ────────────────────────────────────────────────────────

#[tokio::test]
async fn replace_dependencies_replaces_wholesale() {
  let s = store().await;
  let project = Uuid::new_v4();
  let a = s.insert_microtheory(mt(project, "a")).await.unwrap();

  let first = s
    .replace_dependencies(&a.iri, ONTO, &[
      dep("Aircraft", ElementKind::Class),
      dep("hasWing", ElementKind::ObjectProperty),
    ])
    .await
    .unwrap();
  let aircraft_seen = first[0].first_seen_at;

  let second = s
    .replace_dependencies(&a.iri, ONTO, &[
      dep("Aircraft", ElementKind::Class),
      dep("wingspan", ElementKind::DatatypeProperty),
    ])
    .await
    .unwrap();

  let stored = s.dependencies(&a.iri).await.unwrap();
  let iris: Vec<&str> = stored.iter().map(|e| e.element_iri.as_str()).collect();
  assert_eq!(iris, [
    "http://ex.org/onto#Aircraft",
    "http://ex.org/onto#wingspan"
  ]);
  assert_eq!(second[0].first_seen_at, aircraft_seen);
  assert_eq!(stored[0].first_seen_at, aircraft_seen);
  assert!(stored.iter().all(|e| e.valid && e.last_validated_at.is_none()));
}

#[tokio::test]
async fn validations_are_recorded() {
  let s = store().await;
  let project = Uuid::new_v4();
  let a = s.insert_microtheory(mt(project, "a")).await.unwrap();
  let edges = s
    .replace_dependencies(&a.iri, ONTO, &[
      dep("Aircraft", ElementKind::Class),
      dep("Gone", ElementKind::Class),
    ])
    .await
    .unwrap();

  let marks: Vec<ValidationMark> = edges
    .iter()
    .map(|e| ValidationMark { edge_id: e.edge_id, valid: !e.element_iri.ends_with("Gone") })
    .collect();
  let at = Utc::now();
  s.record_validations(&marks, at).await.unwrap();

  let stored = s.dependencies(&a.iri).await.unwrap();
  assert!(stored[0].valid);
  assert!(!stored[1].valid);
  assert!(stored.iter().all(|e| e.last_validated_at.is_some()));
}

#[tokio::test]
async fn reverse_lookup_is_distinct_and_sorted() {
  let s = store().await;
  let project = Uuid::new_v4();
  let b = s.insert_microtheory(mt(project, "b")).await.unwrap();
  let a = s.insert_microtheory(mt(project, "a")).await.unwrap();
  let c = s.insert_microtheory(mt(project, "c")).await.unwrap();
  let deps = [dep("Aircraft", ElementKind::Class)];
  s.replace_dependencies(&b.iri, ONTO, &deps).await.unwrap();
  s.replace_dependencies(&a.iri, ONTO, &deps).await.unwrap();
  s.replace_dependencies(&c.iri, "http://ex.org/other", &deps).await.unwrap();

  let affected = s
    .microtheories_referencing(ONTO, "http://ex.org/onto#Aircraft")
    .await
    .unwrap();
  assert_eq!(affected, vec![a.iri, b.iri]);
}
