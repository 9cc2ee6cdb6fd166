//! Microtheory and question lifecycles, and question execution.

use std::sync::Arc;

use chrono::Utc;
use cqmt_core::{
  contract::{Contract, ResultSummary, validate},
  microtheory::{Microtheory, NewMicrotheory, microtheory_iri},
  question::{CompetencyQuestion, CqRun, CqStatus, NewCompetencyQuestion, Row, RunCompleted},
  rdf::Triple,
  store::CatalogStore,
  template::{Params, bind_and_confine},
};
use cqmt_sparql::{SparqlEndpoint, TriplestoreClient};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
  Error, Result,
  error::store_error,
  events::{NoopSink, RunEventSink},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkbenchSettings {
  pub iri_base:     String,
  pub preview_rows: usize,
}

impl Default for WorkbenchSettings {
  fn default() -> Self {
    Self { iri_base: "http://example.org/cqmt".to_owned(), preview_rows: 10 }
  }
}

/// A question as submitted for upsert. The contract is loose JSON and is
/// checked before anything is stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CqInput {
  pub project_id: Uuid,
  pub name:       String,
  #[serde(default)]
  pub problem:    String,
  pub template:   String,
  #[serde(default)]
  pub parameters: Vec<String>,
  pub contract:   serde_json::Value,
  #[serde(default)]
  pub default_mt: Option<String>,
  #[serde(default)]
  pub status:     CqStatus,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunRequest {
  pub project_id:  Uuid,
  pub cq_name:     String,
  /// Overrides the question's and the project's default microtheory.
  #[serde(default)]
  pub microtheory: Option<String>,
  #[serde(default)]
  pub params:      Params,
  #[serde(default)]
  pub executed_by: Option<String>,
}

/// Result of executing a question, before it becomes a run record.
struct Outcome {
  pass:       bool,
  reason:     String,
  columns:    Vec<String>,
  row_count:  u64,
  preview:    Vec<Row>,
  latency_ms: u64,
}

impl Outcome {
  fn failed(reason: String) -> Self {
    Self {
      pass: false,
      reason,
      columns: Vec::new(),
      row_count: 0,
      preview: Vec::new(),
      latency_ms: 0,
    }
  }
}

pub struct Workbench<S, E> {
  store:    Arc<S>,
  client:   TriplestoreClient<E>,
  events:   Arc<dyn RunEventSink>,
  settings: WorkbenchSettings,
}

impl<S, E> Workbench<S, E>
where
  S: CatalogStore,
  E: SparqlEndpoint,
{
  pub fn new(store: Arc<S>, client: TriplestoreClient<E>, settings: WorkbenchSettings) -> Self {
    Self { store, client, events: Arc::new(NoopSink), settings }
  }

  /// Publish run events to `sink` instead of discarding them.
  pub fn with_events(mut self, sink: Arc<dyn RunEventSink>) -> Self {
    self.events = sink;
    self
  }

  pub fn store(&self) -> &S { &self.store }

  pub fn client(&self) -> &TriplestoreClient<E> { &self.client }

  // ── Microtheories ─────────────────────────────────────────────────────

  /// Create a microtheory: its named graph first, then its record.
  ///
  /// With a parent, the parent's triples are copied in afterwards. The copy
  /// is best-effort: a failure is logged and the new, possibly partial,
  /// microtheory is still returned.
  pub async fn create_microtheory(&self, input: NewMicrotheory) -> Result<Microtheory> {
    if let Some(parent) = &input.parent_iri {
      self.project_microtheory(input.project_id, parent).await?;
    }

    let iri = microtheory_iri(&self.settings.iri_base, input.project_id, Uuid::new_v4());
    self.client.create_graph(&iri).await?;

    let record = Microtheory {
      iri:        iri.clone(),
      project_id: input.project_id,
      label:      input.label,
      parent_iri: input.parent_iri,
      is_default: false,
      created_by: input.created_by,
      created_at: Utc::now(),
    };
    let mut mt = match self.store.insert_microtheory(record).await {
      Ok(mt) => mt,
      Err(err) => {
        if let Err(cleanup) = self.client.drop_graph(&iri).await {
          warn!(%iri, error = %cleanup, "dropping orphaned graph failed");
        }
        return Err(store_error(err));
      }
    };

    if let Some(parent) = &mt.parent_iri {
      match self.client.copy_triples(parent, &mt.iri).await {
        Ok(copied) => debug!(%parent, iri = %mt.iri, copied, "cloned parent"),
        Err(err) => warn!(
          %parent,
          iri = %mt.iri,
          error = %err,
          "cloning parent failed; microtheory created without its triples"
        ),
      }
    }

    if input.make_default {
      self
        .store
        .set_default_microtheory(mt.project_id, &mt.iri)
        .await
        .map_err(store_error)?;
      mt.is_default = true;
    }

    info!(iri = %mt.iri, project_id = %mt.project_id, "created microtheory");
    Ok(mt)
  }

  pub async fn get_microtheory(&self, iri: &str) -> Result<Microtheory> {
    self
      .store
      .get_microtheory(iri)
      .await
      .map_err(store_error)?
      .ok_or_else(|| Error::MicrotheoryNotFound(iri.to_owned()))
  }

  pub async fn list_microtheories(&self, project_id: Uuid) -> Result<Vec<Microtheory>> {
    self.store.list_microtheories(project_id).await.map_err(store_error)
  }

  /// Swap the whole triple set of a microtheory.
  ///
  /// Readers see the old set or the new one. Concurrent replacements of
  /// the same microtheory must be serialised by the caller.
  pub async fn replace_microtheory_triples(&self, iri: &str, triples: &[Triple]) -> Result<()> {
    self.get_microtheory(iri).await?;
    self.client.replace_triples(iri, triples).await?;
    Ok(())
  }

  pub async fn microtheory_triples(&self, iri: &str) -> Result<Vec<Triple>> {
    self.get_microtheory(iri).await?;
    Ok(self.client.all_triples(iri).await?)
  }

  /// Drop the graph, then the record and its dependency edges.
  pub async fn delete_microtheory(&self, iri: &str) -> Result<()> {
    self.get_microtheory(iri).await?;
    self.client.drop_graph(iri).await?;
    self.store.delete_microtheory(iri).await.map_err(store_error)?;
    info!(iri, "deleted microtheory");
    Ok(())
  }

  /// Make `iri` the only default microtheory of `project_id`.
  pub async fn set_default_microtheory(&self, project_id: Uuid, iri: &str) -> Result<()> {
    let changed = self
      .store
      .set_default_microtheory(project_id, iri)
      .await
      .map_err(store_error)?;
    if !changed {
      return Err(Error::MicrotheoryNotFound(iri.to_owned()));
    }
    Ok(())
  }

  async fn project_microtheory(&self, project_id: Uuid, iri: &str) -> Result<Microtheory> {
    let mt = self.get_microtheory(iri).await?;
    if mt.project_id != project_id {
      return Err(Error::ForeignMicrotheory { iri: iri.to_owned(), project_id });
    }
    Ok(mt)
  }

  // ── Competency questions ──────────────────────────────────────────────

  /// Insert or update a question by `(project_id, name)`.
  ///
  /// The contract is validated first; a malformed one stores nothing.
  pub async fn upsert_cq(&self, input: CqInput) -> Result<CompetencyQuestion> {
    let contract = Contract::from_value(input.contract).map_err(cqmt_core::Error::from)?;
    if let Some(default_mt) = &input.default_mt {
      self.project_microtheory(input.project_id, default_mt).await?;
    }

    let cq = self
      .store
      .upsert_cq(NewCompetencyQuestion {
        project_id: input.project_id,
        name: input.name,
        problem: input.problem,
        template: input.template,
        parameters: input.parameters,
        contract,
        default_mt: input.default_mt,
        status: input.status,
      })
      .await
      .map_err(store_error)?;
    info!(cq_id = %cq.cq_id, name = %cq.name, "upserted competency question");
    Ok(cq)
  }

  pub async fn get_cq(&self, project_id: Uuid, name: &str) -> Result<CompetencyQuestion> {
    self
      .store
      .get_cq(project_id, name)
      .await
      .map_err(store_error)?
      .ok_or_else(|| Error::QuestionNotFound(name.to_owned()))
  }

  /// Delete a question together with its run history.
  pub async fn delete_cq(&self, project_id: Uuid, name: &str) -> Result<()> {
    let deleted = self.store.delete_cq(project_id, name).await.map_err(store_error)?;
    if !deleted {
      return Err(Error::QuestionNotFound(name.to_owned()));
    }
    Ok(())
  }

  pub async fn recent_runs(&self, project_id: Uuid, name: &str, limit: usize) -> Result<Vec<CqRun>> {
    let cq = self.get_cq(project_id, name).await?;
    self.store.recent_runs(cq.cq_id, limit).await.map_err(store_error)
  }

  // ── Runs ──────────────────────────────────────────────────────────────

  /// Execute a question against one microtheory and persist the run.
  ///
  /// Template and binding failures become a failed run with reason
  /// `compile_error: …`, triplestore failures one with
  /// `execution_error: …`; only a successful query reaches the contract.
  /// Either way the run is persisted and then announced. Failing to
  /// persist is returned as an error; failing to announce is only logged.
  pub async fn run_cq(&self, request: RunRequest) -> Result<CqRun> {
    let cq = self.get_cq(request.project_id, &request.cq_name).await?;
    let target = self.resolve_target(&cq, request.microtheory.as_deref()).await?;

    let outcome = self.execute(&cq, &target, &request.params).await;

    let run = CqRun {
      run_id:      Uuid::new_v4(),
      cq_id:       cq.cq_id,
      project_id:  cq.project_id,
      microtheory: target,
      params:      request.params,
      pass:        outcome.pass,
      reason:      outcome.reason,
      columns:     outcome.columns,
      row_count:   outcome.row_count,
      preview:     outcome.preview,
      latency_ms:  outcome.latency_ms,
      executed_by: request.executed_by,
      executed_at: Utc::now(),
    };
    let run = self.store.insert_run(run).await.map_err(store_error)?;

    info!(
      cq = %cq.name,
      microtheory = %run.microtheory,
      pass = run.pass,
      reason = %run.reason,
      latency_ms = run.latency_ms,
      "ran competency question"
    );

    if let Err(err) = self.events.publish(&RunCompleted::from_run(&run, &cq.name)) {
      warn!(run_id = %run.run_id, error = %err, "run event not published");
    }
    Ok(run)
  }

  /// Explicit microtheory, else the question's default, else the
  /// project's default.
  async fn resolve_target(&self, cq: &CompetencyQuestion, explicit: Option<&str>) -> Result<String> {
    if let Some(iri) = explicit {
      return Ok(self.project_microtheory(cq.project_id, iri).await?.iri);
    }
    if let Some(iri) = &cq.default_mt {
      return Ok(iri.clone());
    }
    match self
      .store
      .default_microtheory(cq.project_id)
      .await
      .map_err(store_error)?
    {
      Some(mt) => Ok(mt.iri),
      None => Err(Error::NoTargetMicrotheory(cq.name.clone())),
    }
  }

  async fn execute(&self, cq: &CompetencyQuestion, target: &str, params: &Params) -> Outcome {
    let query = match bind_and_confine(&cq.template, params, target) {
      Ok(query) => query,
      Err(err) => return Outcome::failed(format!("compile_error: {err}")),
    };
    debug!(cq = %cq.name, %query, "confined query");

    let result = match self.client.select(&query).await {
      Ok(result) => result,
      Err(err) => return Outcome::failed(format!("execution_error: {err}")),
    };

    let row_count = result.rows.len() as u64;
    let verdict = validate(
      &ResultSummary {
        columns: result.columns.clone(),
        row_count,
        latency_ms: result.latency_ms,
      },
      &cq.contract,
    );

    Outcome {
      pass: verdict.passed(),
      reason: verdict.reason(),
      columns: result.columns,
      row_count,
      preview: result.rows.into_iter().take(self.settings.preview_rows).collect(),
      latency_ms: result.latency_ms,
    }
  }
}
