//! SPARQL 1.1 protocol over HTTP.

use std::time::Duration;

use reqwest::{
  Client, RequestBuilder,
  header::{ACCEPT, CONTENT_TYPE},
};
use tracing::debug;

use crate::{Error, QueryResponse, Result, SparqlEndpoint, results};

const SPARQL_QUERY: &str = "application/sparql-query";
const SPARQL_UPDATE: &str = "application/sparql-update";
const SPARQL_RESULTS_JSON: &str = "application/sparql-results+json";

/// Connection settings for a remote triplestore.
#[derive(Debug, Clone)]
pub struct HttpEndpointConfig {
  pub query_url:  String,
  pub update_url: String,
  /// Applied to each request on its own.
  pub timeout:    Duration,
  pub username:   Option<String>,
  pub password:   Option<String>,
}

/// A remote triplestore reached over HTTP.
///
/// Cheap to clone; the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Debug, Clone)]
pub struct HttpEndpoint {
  client: Client,
  config: HttpEndpointConfig,
}

impl HttpEndpoint {
  pub fn new(config: HttpEndpointConfig) -> Result<Self> {
    let client = Client::builder().timeout(config.timeout).build()?;
    Ok(Self { client, config })
  }

  fn auth(&self, req: RequestBuilder) -> RequestBuilder {
    match &self.config.username {
      Some(username) => req.basic_auth(username, self.config.password.as_ref()),
      None => req,
    }
  }

  async fn post(&self, url: &str, content_type: &str, body: &str) -> Result<String> {
    let resp = self
      .auth(self.client.post(url))
      .timeout(self.config.timeout)
      .header(CONTENT_TYPE, content_type)
      .header(ACCEPT, SPARQL_RESULTS_JSON)
      .body(body.to_owned())
      .send()
      .await?;

    let status = resp.status();
    let text = resp.text().await?;
    if !status.is_success() {
      return Err(Error::Status { status: status.as_u16(), body: text });
    }
    Ok(text)
  }
}

impl SparqlEndpoint for HttpEndpoint {
  async fn query(&self, query: &str) -> Result<QueryResponse> {
    debug!(url = %self.config.query_url, "sparql query");
    let body = self.post(&self.config.query_url, SPARQL_QUERY, query).await?;
    results::decode(&body)
  }

  async fn update(&self, update: &str) -> Result<()> {
    debug!(url = %self.config.update_url, "sparql update");
    self
      .post(&self.config.update_url, SPARQL_UPDATE, update)
      .await?;
    Ok(())
  }
}
