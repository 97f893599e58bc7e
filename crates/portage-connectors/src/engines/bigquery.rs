//! BigQuery connector
//!
//! Talks to BigQuery through the REST API. Retrieval is iterator-shaped:
//! the query response carries the schema up front and rows arrive in pages
//! chained by a continuation token, whose absence is the explicit
//! end-of-data sentinel. Loading streams one `insertAll` call per row.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::VecDeque;

use portage_common::error::{Result, TransferError};
use portage_common::types::{CanonicalValue, ExtractRequest, LoadRequest, RowSet};

use crate::normalize::bigquery::normalize_cell;
use crate::registry::{Extractor, Loader};
use crate::source::{normalize_rows, RowSource};

const DEFAULT_ENDPOINT: &str = "https://bigquery.googleapis.com/bigquery/v2";

/// Per-call long-poll window for query completion, in milliseconds.
const POLL_TIMEOUT_MS: u32 = 10_000;

/// Attempts before an incomplete job is given up on.
const MAX_POLL_ATTEMPTS: usize = 60;

/// Connector for the BigQuery analytical service.
///
/// The descriptor's `database` field is the GCP project id and `password`
/// carries the bearer credential; `host` and `port` are not used.
#[derive(Debug, Clone, Default)]
pub struct BigQueryConnector {
    endpoint: Option<String>,
}

impl BigQueryConnector {
    pub fn new() -> Self {
        Self { endpoint: None }
    }

    pub fn with_endpoint(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: Some(endpoint.into()),
        }
    }

    fn base_url(&self) -> String {
        self.endpoint
            .clone()
            .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string())
            .trim_end_matches('/')
            .to_string()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryResponse {
    #[serde(default)]
    job_complete: Option<bool>,
    schema: Option<Schema>,
    #[serde(default)]
    rows: Vec<ResultRow>,
    page_token: Option<String>,
    job_reference: Option<JobReference>,
}

#[derive(Debug, Deserialize)]
struct Schema {
    fields: Vec<Field>,
}

#[derive(Debug, Deserialize)]
struct Field {
    name: String,
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Debug, Deserialize)]
struct ResultRow {
    #[serde(default)]
    f: Vec<Cell>,
}

#[derive(Debug, Deserialize)]
struct Cell {
    #[serde(default)]
    v: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobReference {
    job_id: String,
    location: Option<String>,
}

#[derive(Debug, Deserialize)]
struct InsertAllResponse {
    #[serde(default, rename = "insertErrors")]
    insert_errors: Vec<Value>,
}

#[async_trait]
impl Extractor for BigQueryConnector {
    async fn extract(&self, req: &ExtractRequest) -> Result<RowSet> {
        let client = reqwest::Client::new();
        let base = self.base_url();
        let project = &req.database;

        let mut response = submit_query(&client, &base, project, &req.password, &req.query).await?;

        // The job may still be running; keep long-polling its results until
        // it completes.
        let mut attempts = 0;
        while response.job_complete == Some(false) {
            attempts += 1;
            if attempts > MAX_POLL_ATTEMPTS {
                return Err(TransferError::Query("query did not complete in time".to_string()));
            }
            let job = response.job_reference.as_ref().ok_or_else(|| {
                TransferError::Query("incomplete job carries no job reference".to_string())
            })?;
            response = fetch_results(&client, &base, project, &req.password, job, None).await?;
        }

        let schema = response.schema.ok_or_else(|| {
            TransferError::SchemaUnavailable("query result carries no schema".to_string())
        })?;

        let source = PagedSource {
            client,
            base,
            project: project.clone(),
            token: req.password.clone(),
            job: response.job_reference,
            fields: schema.fields,
            buffer: rows_to_cells(response.rows),
            page_token: response.page_token,
        };
        normalize_rows(source, |(kind, cell)| normalize_cell(&kind, &cell)).await
    }
}

#[async_trait]
impl Loader for BigQueryConnector {
    async fn load(&self, req: &LoadRequest, data: &RowSet) -> Result<()> {
        let client = reqwest::Client::new();
        let base = self.base_url();
        let (dataset, table) = req.table.split_once('.').ok_or_else(|| {
            TransferError::Insert(format!(
                "BigQuery table must be qualified as dataset.table, got '{}'",
                req.table
            ))
        })?;
        let url = format!(
            "{}/projects/{}/datasets/{}/tables/{}/insertAll",
            base, req.database, dataset, table
        );

        for row in &data.rows {
            let body = json!({"rows": [{"json": row_to_json(&data.columns, row)}]});
            let response = client
                .post(&url)
                .bearer_auth(&req.password)
                .json(&body)
                .send()
                .await
                .map_err(|e| TransferError::Connect(e.to_string()))?;

            if !response.status().is_success() {
                let status = response.status();
                let detail = response.text().await.unwrap_or_default();
                return Err(TransferError::Insert(format!("{}: {}", status, detail.trim())));
            }
            let outcome: InsertAllResponse = response
                .json()
                .await
                .map_err(|e| TransferError::Insert(e.to_string()))?;
            if !outcome.insert_errors.is_empty() {
                return Err(TransferError::Insert(format!(
                    "row rejected: {}",
                    Value::Array(outcome.insert_errors)
                )));
            }
        }
        Ok(())
    }
}

async fn submit_query(
    client: &reqwest::Client,
    base: &str,
    project: &str,
    token: &str,
    query: &str,
) -> Result<QueryResponse> {
    let response = client
        .post(format!("{}/projects/{}/queries", base, project))
        .bearer_auth(token)
        .json(&json!({
            "query": query,
            "useLegacySql": false,
            "timeoutMs": POLL_TIMEOUT_MS,
        }))
        .send()
        .await
        .map_err(|e| TransferError::Connect(e.to_string()))?;

    if !response.status().is_success() {
        let status = response.status();
        let detail = response.text().await.unwrap_or_default();
        return Err(TransferError::Query(format!("{}: {}", status, detail.trim())));
    }
    response
        .json()
        .await
        .map_err(|e| TransferError::Query(e.to_string()))
}

async fn fetch_results(
    client: &reqwest::Client,
    base: &str,
    project: &str,
    token: &str,
    job: &JobReference,
    page_token: Option<&str>,
) -> Result<QueryResponse> {
    let mut request = client
        .get(format!("{}/projects/{}/queries/{}", base, project, job.job_id))
        .bearer_auth(token)
        .query(&[("timeoutMs", POLL_TIMEOUT_MS.to_string())]);
    if let Some(location) = &job.location {
        request = request.query(&[("location", location.as_str())]);
    }
    if let Some(token) = page_token {
        request = request.query(&[("pageToken", token)]);
    }

    let response = request
        .send()
        .await
        .map_err(|e| TransferError::Query(e.to_string()))?;
    if !response.status().is_success() {
        let status = response.status();
        let detail = response.text().await.unwrap_or_default();
        return Err(TransferError::Query(format!("{}: {}", status, detail.trim())));
    }
    response
        .json()
        .await
        .map_err(|e| TransferError::Query(e.to_string()))
}

fn rows_to_cells(rows: Vec<ResultRow>) -> VecDeque<Vec<Value>> {
    rows.into_iter()
        .map(|row| row.f.into_iter().map(|cell| cell.v).collect())
        .collect()
}

/// Paged iterator wrapped as a [`RowSource`]. Exhaustion is the explicit
/// sentinel: a drained buffer with no continuation token.
struct PagedSource {
    client: reqwest::Client,
    base: String,
    project: String,
    token: String,
    job: Option<JobReference>,
    fields: Vec<Field>,
    buffer: VecDeque<Vec<Value>>,
    page_token: Option<String>,
}

#[async_trait]
impl RowSource for PagedSource {
    type Native = (String, Value);

    async fn columns(&mut self) -> Result<Vec<String>> {
        Ok(self.fields.iter().map(|f| f.name.clone()).collect())
    }

    async fn next_row(&mut self) -> Result<Option<Vec<(String, Value)>>> {
        loop {
            if let Some(row) = self.buffer.pop_front() {
                let paired = row
                    .into_iter()
                    .enumerate()
                    .map(|(idx, cell)| {
                        let kind = self
                            .fields
                            .get(idx)
                            .map(|f| f.kind.clone())
                            .unwrap_or_default();
                        (kind, cell)
                    })
                    .collect();
                return Ok(Some(paired));
            }
            let Some(token) = self.page_token.take() else {
                return Ok(None);
            };
            let job = self.job.as_ref().ok_or_else(|| {
                TransferError::Query("continuation token without a job reference".to_string())
            })?;
            let page = fetch_results(
                &self.client,
                &self.base,
                &self.project,
                &self.token,
                job,
                Some(&token),
            )
            .await?;
            self.buffer = rows_to_cells(page.rows);
            self.page_token = page.page_token;
        }
    }
}

/// One canonical row as the `insertAll` JSON object, keyed by column name.
fn row_to_json(columns: &[String], row: &[CanonicalValue]) -> Value {
    let mut map = serde_json::Map::new();
    for (column, value) in columns.iter().zip(row) {
        let cell = match value {
            CanonicalValue::Null => Value::Null,
            CanonicalValue::Integer(v) => json!(v),
            CanonicalValue::Float(v) => serde_json::Number::from_f64(*v)
                .map(Value::Number)
                .unwrap_or_else(|| Value::String(v.to_string())),
            CanonicalValue::Boolean(v) => json!(v),
            CanonicalValue::String(v)
            | CanonicalValue::Binary(v)
            | CanonicalValue::Timestamp(v)
            | CanonicalValue::Date(v)
            | CanonicalValue::Time(v)
            | CanonicalValue::DateTime(v)
            | CanonicalValue::Decimal(v) => Value::String(v.clone()),
        };
        map.insert(column.clone(), cell);
    }
    Value::Object(map)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn extract_request() -> ExtractRequest {
        ExtractRequest {
            kind: portage_common::types::EngineKind::BigQuery,
            host: String::new(),
            port: 0,
            database: "my-project".to_string(),
            username: String::new(),
            password: "token".to_string(),
            query: "SELECT id, name FROM ds.t".to_string(),
        }
    }

    fn load_request(table: &str) -> LoadRequest {
        LoadRequest {
            kind: portage_common::types::EngineKind::BigQuery,
            host: String::new(),
            port: 0,
            database: "my-project".to_string(),
            username: String::new(),
            password: "token".to_string(),
            table: table.to_string(),
        }
    }

    fn cell(v: &str) -> Value {
        json!({"v": v})
    }

    #[test]
    fn rows_map_to_column_keyed_json() {
        let body = row_to_json(
            &["id".to_string(), "name".to_string(), "note".to_string()],
            &[
                CanonicalValue::Integer(1),
                CanonicalValue::String("a".to_string()),
                CanonicalValue::Null,
            ],
        );
        assert_eq!(body, json!({"id": 1, "name": "a", "note": null}));
    }

    #[tokio::test]
    async fn extract_follows_the_continuation_token_to_the_sentinel() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/projects/my-project/queries"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jobComplete": true,
                "jobReference": {"jobId": "job-1", "location": "US"},
                "schema": {"fields": [
                    {"name": "id", "type": "INTEGER"},
                    {"name": "name", "type": "STRING"}
                ]},
                "rows": [
                    {"f": [cell("1"), cell("a")]},
                    {"f": [cell("2"), cell("b")]}
                ],
                "pageToken": "page-2"
            })))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/projects/my-project/queries/job-1"))
            .and(query_param("pageToken", "page-2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jobComplete": true,
                "rows": [{"f": [cell("3"), cell("c")]}]
            })))
            .mount(&server)
            .await;

        let set = BigQueryConnector::with_endpoint(server.uri())
            .extract(&extract_request())
            .await
            .unwrap();

        assert_eq!(set.columns, vec!["id", "name"]);
        assert_eq!(set.rows.len(), 3);
        assert_eq!(
            set.rows[0],
            vec![
                CanonicalValue::Integer(1),
                CanonicalValue::String("a".to_string())
            ]
        );
        assert_eq!(
            set.rows[2],
            vec![
                CanonicalValue::Integer(3),
                CanonicalValue::String("c".to_string())
            ]
        );
    }

    #[tokio::test]
    async fn a_schemaless_result_is_schema_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jobComplete": true,
                "rows": []
            })))
            .mount(&server)
            .await;

        let err = BigQueryConnector::with_endpoint(server.uri())
            .extract(&extract_request())
            .await
            .unwrap_err();
        assert!(matches!(err, TransferError::SchemaUnavailable(_)));
    }

    #[tokio::test]
    async fn load_requires_a_qualified_table() {
        let err = BigQueryConnector::new()
            .load(&load_request("unqualified"), &RowSet::new(vec!["id".to_string()]))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("dataset.table"));
    }

    #[tokio::test]
    async fn load_stops_at_the_first_rejected_row() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/projects/my-project/datasets/ds/tables/t2/insertAll"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/projects/my-project/datasets/ds/tables/t2/insertAll"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "insertErrors": [{"index": 0, "errors": [{"message": "no such field"}]}]
            })))
            .mount(&server)
            .await;

        let mut data = RowSet::new(vec!["id".to_string()]);
        for id in 1..=3 {
            data.push_row(vec![CanonicalValue::Integer(id)]).unwrap();
        }

        let err = BigQueryConnector::with_endpoint(server.uri())
            .load(&load_request("ds.t2"), &data)
            .await
            .unwrap_err();
        assert!(matches!(err, TransferError::Insert(_)));

        let received = server.received_requests().await.unwrap_or_default();
        assert_eq!(received.len(), 2);
    }
}
