//! Error type for `cqmt-sparql`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("triplestore request failed: {0}")]
  Transport(#[from] reqwest::Error),

  #[error("triplestore returned HTTP {status}: {body}")]
  Status { status: u16, body: String },

  #[error("malformed SPARQL results: {0}")]
  Decode(#[from] serde_json::Error),

  /// Failure reported by an in-process store.
  #[error("triplestore error: {0}")]
  Backend(String),

  #[error("unexpected triplestore response: {0}")]
  UnexpectedResponse(String),

  #[error("invalid graph IRI: {0:?}")]
  InvalidGraphIri(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
