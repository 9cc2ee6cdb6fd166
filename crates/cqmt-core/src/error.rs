//! Error types for `cqmt-core`.

use thiserror::Error;

use crate::{contract::ContractError, document::DocumentError, template::TemplateError};

#[derive(Debug, Error)]
pub enum Error {
  #[error(transparent)]
  Template(#[from] TemplateError),

  #[error("invalid contract: {0}")]
  Contract(#[from] ContractError),

  #[error("unreadable ontology document: {0}")]
  Document(#[from] DocumentError),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
