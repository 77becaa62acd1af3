//! HTTP client for the inventory query service

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, instrument};
use url::Url;

use crate::error::InventoryError;
use crate::query::Query;
use crate::traits::InventoryQuery;

const QUERY_PATH: &str = "pdb/query/v4";

#[derive(Serialize)]
struct QueryBody<'a> {
    query: &'a str,
}

/// Inventory client speaking the PQL-over-HTTP query API
#[derive(Debug, Clone)]
pub struct HttpInventoryClient {
    client: Client,
    base_url: Url,
}

impl HttpInventoryClient {
    /// Create a new client with a request timeout
    ///
    /// # Errors
    /// Returns an error if the base URL is invalid or the HTTP client cannot
    /// be constructed.
    pub fn new(base_url: impl AsRef<str>, timeout: Duration) -> Result<Self, InventoryError> {
        let client = Client::builder().timeout(timeout).build()?;
        Self::with_client(base_url, client)
    }

    /// Create a new client with custom `reqwest::Client`
    ///
    /// # Errors
    /// Returns an error if the base URL is invalid.
    pub fn with_client(base_url: impl AsRef<str>, client: Client) -> Result<Self, InventoryError> {
        let base_url = Url::parse(base_url.as_ref())?;
        Ok(Self { client, base_url })
    }
}

#[async_trait]
impl InventoryQuery for HttpInventoryClient {
    #[instrument(skip(self, query), fields(pql = %query))]
    async fn query(&self, query: &Query) -> Result<Vec<String>, InventoryError> {
        let url = self.base_url.join(QUERY_PATH)?;
        let pql = query.build();

        let response = self
            .client
            .post(url)
            .json(&QueryBody { query: &pql })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(InventoryError::Api { status, message });
        }

        let rows: Vec<Value> = response.json().await?;
        let ids = extract_identifiers(rows, query.key_field().unwrap_or("certname"))?;
        debug!(rows = ids.len(), "inventory query completed");
        Ok(ids)
    }
}

/// Pull `field` out of every row, failing on rows that lack it
fn extract_identifiers(rows: Vec<Value>, field: &str) -> Result<Vec<String>, InventoryError> {
    rows.into_iter()
        .map(|row| match row.get(field) {
            Some(Value::String(s)) => Ok(s.clone()),
            _ => Err(InventoryError::ParseError(format!(
                "row missing string field `{field}`: {row}"
            ))),
        })
        .collect()
}
