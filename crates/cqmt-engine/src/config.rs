//! Engine configuration, deserialised by the binary from TOML and the
//! environment.

use std::{path::PathBuf, time::Duration};

use cqmt_sparql::HttpEndpointConfig;
use serde::{Deserialize, Serialize};

use crate::workbench::WorkbenchSettings;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
  pub sparql:       SparqlConfig,
  /// SQLite file holding microtheory, question, run and edge records.
  pub store_path:   PathBuf,
  /// Prefix of generated microtheory IRIs.
  #[serde(default = "default_iri_base")]
  pub iri_base:     String,
  /// Rows kept in each run's preview.
  #[serde(default = "default_preview_rows")]
  pub preview_rows: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SparqlConfig {
  pub query_url:    String,
  pub update_url:   String,
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs: u64,
  #[serde(default)]
  pub username:     Option<String>,
  #[serde(default)]
  pub password:     Option<String>,
}

fn default_iri_base() -> String { "http://example.org/cqmt".to_owned() }

fn default_preview_rows() -> usize { 10 }

fn default_timeout_secs() -> u64 { 30 }

impl SparqlConfig {
  pub fn endpoint_config(&self) -> HttpEndpointConfig {
    HttpEndpointConfig {
      query_url:  self.query_url.clone(),
      update_url: self.update_url.clone(),
      timeout:    Duration::from_secs(self.timeout_secs),
      username:   self.username.clone(),
      password:   self.password.clone(),
    }
  }
}

impl EngineConfig {
  pub fn workbench_settings(&self) -> WorkbenchSettings {
    WorkbenchSettings {
      iri_base:     self.iri_base.clone(),
      preview_rows: self.preview_rows,
    }
  }
}
