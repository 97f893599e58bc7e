//! Snowflake connector
//!
//! Talks to Snowflake through the SQL REST API. Result values arrive
//! string-encoded in Snowflake's internal representations (epoch-based
//! temporals, hex binary); the decoder maps them into the cursor family's
//! native union. Results larger than one partition are fetched lazily,
//! which keeps the handle cursor-shaped.

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveTime};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::str::FromStr;

use portage_common::error::{Result, TransferError};
use portage_common::types::{CanonicalValue, ExtractRequest, LoadRequest, RowSet};

use crate::normalize::sql::{normalize, SqlValue};
use crate::registry::{Extractor, Loader};
use crate::source::{normalize_rows, RowSource};

/// Statement timeout passed to the SQL API, in seconds.
const STATEMENT_TIMEOUT_SECS: u32 = 300;

/// Connector for Snowflake over the SQL REST API.
///
/// The account endpoint is derived from the request's host and port; tests
/// override it with [`SnowflakeConnector::with_endpoint`].
#[derive(Debug, Clone, Default)]
pub struct SnowflakeConnector {
    endpoint: Option<String>,
}

impl SnowflakeConnector {
    pub fn new() -> Self {
        Self { endpoint: None }
    }

    pub fn with_endpoint(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: Some(endpoint.into()),
        }
    }

    fn base_url(&self, host: &str, port: u16) -> String {
        match &self.endpoint {
            Some(endpoint) => endpoint.trim_end_matches('/').to_string(),
            None => format!("https://{}:{}", host, port),
        }
    }

    async fn submit(
        &self,
        client: &reqwest::Client,
        base: &str,
        token: &str,
        body: Value,
    ) -> Result<StatementResponse> {
        let response = client
            .post(format!("{}/api/v2/statements", base))
            .bearer_auth(token)
            .header("X-Snowflake-Authorization-Token-Type", "OAUTH")
            .json(&body)
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
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatementResponse {
    result_set_meta_data: Option<ResultSetMetaData>,
    #[serde(default)]
    data: Vec<Vec<Value>>,
    statement_handle: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResultSetMetaData {
    row_type: Vec<RowType>,
    #[serde(default)]
    partition_info: Vec<PartitionInfo>,
}

#[derive(Debug, Deserialize)]
struct RowType {
    name: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    scale: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct PartitionInfo {}

#[async_trait]
impl Extractor for SnowflakeConnector {
    async fn extract(&self, req: &ExtractRequest) -> Result<RowSet> {
        let client = reqwest::Client::new();
        let base = self.base_url(&req.host, req.port);

        let response = self
            .submit(
                &client,
                &base,
                &req.password,
                json!({
                    "statement": req.query,
                    "database": req.database,
                    "timeout": STATEMENT_TIMEOUT_SECS,
                }),
            )
            .await?;

        let meta = response.result_set_meta_data.ok_or_else(|| {
            TransferError::SchemaUnavailable("result set metadata missing".to_string())
        })?;

        let source = PartitionedSource {
            client,
            base,
            token: req.password.clone(),
            handle: response.statement_handle.unwrap_or_default(),
            columns: meta.row_type.iter().map(|c| c.name.clone()).collect(),
            types: meta.row_type,
            buffer: response.data.into(),
            next_partition: 1,
            partition_count: meta_partitions(&meta.partition_info),
        };
        normalize_rows(source, normalize).await
    }
}

fn meta_partitions(info: &[PartitionInfo]) -> usize {
    // An absent partitionInfo means a single inline partition.
    info.len().max(1)
}

#[async_trait]
impl Loader for SnowflakeConnector {
    async fn load(&self, req: &LoadRequest, data: &RowSet) -> Result<()> {
        let client = reqwest::Client::new();
        let base = self.base_url(&req.host, req.port);
        let statement = insert_statement(&req.table, &data.columns);

        for row in &data.rows {
            let result = self
                .submit(
                    &client,
                    &base,
                    &req.password,
                    json!({
                        "statement": statement,
                        "database": req.database,
                        "bindings": bindings(row),
                        "timeout": STATEMENT_TIMEOUT_SECS,
                    }),
                )
                .await;
            if let Err(e) = result {
                return Err(TransferError::Insert(e.to_string()));
            }
        }
        Ok(())
    }
}

/// Row source over the statement's partitions. The first partition arrives
/// inline with the statement response; the rest are fetched on demand.
struct PartitionedSource {
    client: reqwest::Client,
    base: String,
    token: String,
    handle: String,
    columns: Vec<String>,
    types: Vec<RowType>,
    buffer: VecDeque<Vec<Value>>,
    next_partition: usize,
    partition_count: usize,
}

#[async_trait]
impl RowSource for PartitionedSource {
    type Native = SqlValue;

    async fn columns(&mut self) -> Result<Vec<String>> {
        Ok(self.columns.clone())
    }

    async fn next_row(&mut self) -> Result<Option<Vec<SqlValue>>> {
        loop {
            if let Some(row) = self.buffer.pop_front() {
                let decoded = row
                    .iter()
                    .enumerate()
                    .map(|(idx, cell)| match self.types.get(idx) {
                        Some(rt) => decode_cell(rt, cell),
                        None => SqlValue::Other(cell_text(cell)),
                    })
                    .collect();
                return Ok(Some(decoded));
            }
            if self.next_partition >= self.partition_count {
                return Ok(None);
            }
            let partition = self.next_partition;
            self.next_partition += 1;
            self.fetch_partition(partition).await?;
        }
    }
}

impl PartitionedSource {
    async fn fetch_partition(&mut self, partition: usize) -> Result<()> {
        let response = self
            .client
            .get(format!("{}/api/v2/statements/{}", self.base, self.handle))
            .query(&[("partition", partition.to_string())])
            .bearer_auth(&self.token)
            .header("X-Snowflake-Authorization-Token-Type", "OAUTH")
            .send()
            .await
            .map_err(|e| TransferError::Query(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(TransferError::Query(format!(
                "partition {} fetch failed: {}",
                partition, status
            )));
        }

        let page: StatementResponse = response
            .json()
            .await
            .map_err(|e| TransferError::Query(e.to_string()))?;
        self.buffer.extend(page.data);
        Ok(())
    }
}

/// Decode one jsonv2 cell by its declared row type.
///
/// Snowflake returns internal representations: `fixed` is decimal text
/// (scale 0 means integral), temporals are epoch-based, `binary` is hex.
/// Anything unparseable or outside the table keeps its textual form.
fn decode_cell(row_type: &RowType, cell: &Value) -> SqlValue {
    if cell.is_null() {
        return SqlValue::Null;
    }
    let text = cell_text(cell);
    match row_type.kind.as_str() {
        "fixed" => {
            if row_type.scale.unwrap_or(0) == 0 {
                match text.parse::<i64>() {
                    Ok(v) => SqlValue::Int(v),
                    // Precision beyond 64 bits stays exact as a decimal
                    Err(_) => decimal_or_other(&text),
                }
            } else {
                decimal_or_other(&text)
            }
        },
        "real" => match text.parse::<f64>() {
            Ok(v) => SqlValue::Float(v),
            Err(_) => SqlValue::Other(text),
        },
        "text" => SqlValue::Text(text),
        "boolean" => match text.as_str() {
            "true" => SqlValue::Bool(true),
            "false" => SqlValue::Bool(false),
            _ => SqlValue::Other(text),
        },
        "binary" => match hex::decode(&text) {
            Ok(bytes) => SqlValue::Bytes(bytes),
            Err(_) => SqlValue::Other(text),
        },
        "date" => match text
            .parse::<i64>()
            .ok()
            .and_then(date_from_epoch_days)
        {
            Some(d) => SqlValue::Date(d),
            None => SqlValue::Other(text),
        },
        "time" => match time_from_seconds(&text) {
            Some(t) => SqlValue::Time(t),
            None => SqlValue::Other(text),
        },
        "timestamp_ntz" => match instant_from_epoch(&text) {
            Some(ts) => SqlValue::DateTime(ts.naive_utc()),
            None => SqlValue::Other(text),
        },
        "timestamp_ltz" => match instant_from_epoch(&text) {
            Some(ts) => SqlValue::Timestamp(ts.fixed_offset()),
            None => SqlValue::Other(text),
        },
        "timestamp_tz" => match zoned_from_epoch(&text) {
            Some(ts) => SqlValue::Timestamp(ts),
            None => SqlValue::Other(text),
        },
        _ => SqlValue::Other(text),
    }
}

fn decimal_or_other(text: &str) -> SqlValue {
    match BigDecimal::from_str(text) {
        Ok(v) => SqlValue::Numeric(v),
        Err(_) => SqlValue::Other(text.to_string()),
    }
}

fn cell_text(cell: &Value) -> String {
    match cell {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn date_from_epoch_days(days: i64) -> Option<NaiveDate> {
    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1)?;
    epoch.checked_add_signed(Duration::try_days(days)?)
}

fn time_from_seconds(raw: &str) -> Option<NaiveTime> {
    let (secs, nanos) = epoch_parts(raw)?;
    NaiveTime::from_num_seconds_from_midnight_opt(u32::try_from(secs).ok()?, nanos)
}

fn instant_from_epoch(raw: &str) -> Option<DateTime<chrono::Utc>> {
    let (secs, nanos) = epoch_parts(raw)?;
    DateTime::from_timestamp(secs, nanos)
}

/// `timestamp_tz` cells carry "epoch.fraction offset" where the offset is
/// minutes shifted by 1440.
fn zoned_from_epoch(raw: &str) -> Option<DateTime<FixedOffset>> {
    let mut parts = raw.split_whitespace();
    let instant = instant_from_epoch(parts.next()?)?;
    let offset_minutes = parts.next()?.parse::<i32>().ok()? - 1440;
    let offset = FixedOffset::east_opt(offset_minutes * 60)?;
    Some(instant.with_timezone(&offset))
}

/// Split "1674659380.123456789" into whole seconds and nanoseconds.
fn epoch_parts(raw: &str) -> Option<(i64, u32)> {
    let mut it = raw.splitn(2, '.');
    let secs: i64 = it.next()?.parse().ok()?;
    let nanos = match it.next() {
        Some(frac) => {
            let frac = &frac[..frac.len().min(9)];
            let parsed: u32 = frac.parse().ok()?;
            parsed * 10u32.pow(9 - frac.len() as u32)
        },
        None => 0,
    };
    Some((secs, nanos))
}

/// `INSERT INTO t ("C1", "C2") VALUES (?, ?)` with positional bindings.
fn insert_statement(table: &str, columns: &[String]) -> String {
    let cols = columns
        .iter()
        .map(|c| quote_ident(c))
        .collect::<Vec<_>>()
        .join(", ");
    let placeholders = vec!["?"; columns.len()].join(", ");
    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        quote_table(table),
        cols,
        placeholders
    )
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn quote_table(table: &str) -> String {
    table
        .split('.')
        .map(quote_ident)
        .collect::<Vec<_>>()
        .join(".")
}

/// Positional bindings for one row, 1-indexed as the SQL API expects.
/// Integer, float, and boolean kinds bind typed; everything else binds as
/// text and the engine coerces it to the column type.
fn bindings(row: &[CanonicalValue]) -> Value {
    let mut map = serde_json::Map::new();
    for (idx, value) in row.iter().enumerate() {
        let (kind, bound) = match value {
            CanonicalValue::Null => ("TEXT", Value::Null),
            CanonicalValue::Integer(v) => ("FIXED", Value::String(v.to_string())),
            CanonicalValue::Float(v) => ("REAL", Value::String(v.to_string())),
            CanonicalValue::Boolean(v) => ("BOOLEAN", Value::String(v.to_string())),
            CanonicalValue::String(v)
            | CanonicalValue::Binary(v)
            | CanonicalValue::Timestamp(v)
            | CanonicalValue::Date(v)
            | CanonicalValue::Time(v)
            | CanonicalValue::DateTime(v)
            | CanonicalValue::Decimal(v) => ("TEXT", Value::String(v.clone())),
        };
        map.insert(
            (idx + 1).to_string(),
            json!({"type": kind, "value": bound}),
        );
    }
    Value::Object(map)
}
