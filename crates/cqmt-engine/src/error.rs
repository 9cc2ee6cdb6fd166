//! Error type for `cqmt-engine`.

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum Error {
  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),

  #[error(transparent)]
  Triplestore(#[from] cqmt_sparql::Error),

  #[error(transparent)]
  Core(#[from] cqmt_core::Error),

  #[error("microtheory not found: {0}")]
  MicrotheoryNotFound(String),

  #[error("microtheory {iri} does not belong to project {project_id}")]
  ForeignMicrotheory { iri: String, project_id: Uuid },

  #[error("competency question not found: {0:?}")]
  QuestionNotFound(String),

  /// No microtheory was given, the question has no default and the
  /// project has no default either.
  #[error("no target microtheory for question {0:?}")]
  NoTargetMicrotheory(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

pub(crate) fn store_error<E>(err: E) -> Error
where
  E: std::error::Error + Send + Sync + 'static,
{
  Error::Store(Box::new(err))
}
