//! Table endpoints.

use reqwest::Method;
use serde_json::Value;

use cb_core::error::{CbError, CbResult};

use crate::client::ApiClient;
use crate::query::TableQuery;
use crate::response::ErrorSource;

impl ApiClient {
    /// Run a read query. A single-row query yields a one-element list.
    pub async fn select_rows(&self, query: &TableQuery) -> CbResult<Vec<Value>> {
        let builder = self
            .rest_request(Method::GET, &query.table, query.single)
            .await
            .query(&query.to_select_params());

        let body = self.send_json(builder, ErrorSource::Table).await?;
        rows_from_body(body, query.single)
    }

    /// Insert one row or an array of rows.
    ///
    /// With `returning`, the inserted rows are returned restricted to those
    /// columns; without it the backend returns nothing.
    pub async fn insert_rows(
        &self,
        table: &str,
        rows: &Value,
        returning: Option<&str>,
    ) -> CbResult<Vec<Value>> {
        let mut builder = self.rest_request(Method::POST, table, false).await.json(rows);
        builder = match returning {
            Some(columns) => builder
                .header("prefer", "return=representation")
                .query(&[("select", columns)]),
            None => builder.header("prefer", "return=minimal"),
        };

        let body = self.send_json(builder, ErrorSource::Table).await?;
        if returning.is_none() {
            return Ok(Vec::new());
        }
        rows_from_body(body, false)
    }

    /// Delete the rows matched by the query filters.
    pub async fn delete_rows(&self, query: &TableQuery) -> CbResult<()> {
        if query.filters.is_empty() {
            return Err(CbError::Internal(format!(
                "refusing unfiltered delete on {}",
                query.table
            )));
        }
        let builder = self
            .rest_request(Method::DELETE, &query.table, false)
            .await
            .query(&query.filter_params());
        self.send(builder, ErrorSource::Table).await?;
        Ok(())
    }
}

fn rows_from_body(body: Value, single: bool) -> CbResult<Vec<Value>> {
    match body {
        Value::Array(rows) => Ok(rows),
        Value::Null => Ok(Vec::new()),
        obj @ Value::Object(_) if single => Ok(vec![obj]),
        other => Err(CbError::Serialization(format!(
            "unexpected table response: {other}"
        ))),
    }
}
