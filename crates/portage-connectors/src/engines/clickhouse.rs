//! ClickHouse connector
//!
//! Talks to ClickHouse over its HTTP interface. Extraction appends
//! `FORMAT JSONCompact` to the source query so results arrive positionally
//! with column metadata up front; loading sends one INSERT statement per
//! row and aborts on the first rejection.

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{NaiveDate, NaiveDateTime};
use serde::Deserialize;
use std::str::FromStr;

use portage_common::error::{Result, TransferError};
use portage_common::types::{CanonicalValue, ExtractRequest, LoadRequest, RowSet};

use crate::normalize::sql::{normalize, SqlValue};
use crate::registry::{Extractor, Loader};
use crate::source::{normalize_rows, RowSource};

/// Connector for ClickHouse over HTTP.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClickhouseConnector;

impl ClickhouseConnector {
    pub fn new() -> Self {
        Self
    }
}

#[derive(Debug, Deserialize)]
struct ResultPayload {
    meta: Vec<ColumnMeta>,
    data: Vec<Vec<serde_json::Value>>,
}

#[derive(Debug, Deserialize)]
struct ColumnMeta {
    name: String,
    #[serde(rename = "type")]
    kind: String,
}

#[async_trait]
impl Extractor for ClickhouseConnector {
    async fn extract(&self, req: &ExtractRequest) -> Result<RowSet> {
        let client = reqwest::Client::new();
        let url = endpoint(&req.host, req.port);
        let body = format!("{} FORMAT JSONCompact", req.query.trim_end_matches(';'));

        let response = client
            .post(&url)
            .query(&[("database", req.database.as_str())])
            .header("X-ClickHouse-User", req.username.as_str())
            .header("X-ClickHouse-Key", req.password.as_str())
            .body(body)
            .send()
            .await
            .map_err(|e| TransferError::Connect(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            return Err(TransferError::Query(format!("{}: {}", status, detail.trim())));
        }

        let payload: ResultPayload = response
            .json()
            .await
            .map_err(|e| TransferError::SchemaUnavailable(e.to_string()))?;

        normalize_rows(BufferedSource::new(payload), normalize).await
    }
}

#[async_trait]
impl Loader for ClickhouseConnector {
    async fn load(&self, req: &LoadRequest, data: &RowSet) -> Result<()> {
        let client = reqwest::Client::new();
        let url = endpoint(&req.host, req.port);

        for row in &data.rows {
            let statement = insert_statement(&req.table, &data.columns, row);
            let response = client
                .post(&url)
                .query(&[("database", req.database.as_str())])
                .header("X-ClickHouse-User", req.username.as_str())
                .header("X-ClickHouse-Key", req.password.as_str())
                .body(statement)
                .send()
                .await
                .map_err(|e| TransferError::Connect(e.to_string()))?;

            if !response.status().is_success() {
                let status = response.status();
                let detail = response.text().await.unwrap_or_default();
                return Err(TransferError::Insert(format!("{}: {}", status, detail.trim())));
            }
        }
        Ok(())
    }
}

fn endpoint(host: &str, port: u16) -> String {
    format!("http://{}:{}/", host, port)
}

/// The HTTP interface returns the whole result in one payload; the source
/// replays it row by row with the declared column types alongside.
struct BufferedSource {
    columns: Vec<String>,
    types: Vec<String>,
    rows: std::vec::IntoIter<Vec<serde_json::Value>>,
}

impl BufferedSource {
    fn new(payload: ResultPayload) -> Self {
        let (columns, types) = payload
            .meta
            .into_iter()
            .map(|c| (c.name, c.kind))
            .unzip();
        Self {
            columns,
            types,
            rows: payload.data.into_iter(),
        }
    }
}

#[async_trait]
impl RowSource for BufferedSource {
    type Native = SqlValue;

    async fn columns(&mut self) -> Result<Vec<String>> {
        Ok(self.columns.clone())
    }

    async fn next_row(&mut self) -> Result<Option<Vec<SqlValue>>> {
        Ok(self.rows.next().map(|row| {
            row.iter()
                .enumerate()
                .map(|(idx, cell)| {
                    let kind = self.types.get(idx).map(String::as_str).unwrap_or("");
                    decode_cell(kind, cell)
                })
                .collect()
        }))
    }
}

/// Decode one JSONCompact cell by its declared ClickHouse type.
///
/// 64-bit integers arrive quoted as strings (the interface's default),
/// smaller ones as JSON numbers; both are handled. Types outside the table
/// degrade to their textual form.
fn decode_cell(ch_type: &str, cell: &serde_json::Value) -> SqlValue {
    if cell.is_null() {
        return SqlValue::Null;
    }
    let base = base_type(ch_type);

    if base.starts_with("Int") || base.starts_with("UInt") {
        return match int_cell(cell) {
            Some(v) => SqlValue::Int(v),
            None => SqlValue::Other(cell_text(cell)),
        };
    }
    if base.starts_with("Float") {
        return match float_cell(cell) {
            Some(v) => SqlValue::Float(v),
            None => SqlValue::Other(cell_text(cell)),
        };
    }
    if base.starts_with("Decimal") {
        return match BigDecimal::from_str(&cell_text(cell)) {
            Ok(v) => SqlValue::Numeric(v),
            Err(_) => SqlValue::Other(cell_text(cell)),
        };
    }
    if base.starts_with("DateTime") {
        return match NaiveDateTime::parse_from_str(&cell_text(cell), "%Y-%m-%d %H:%M:%S%.f") {
            Ok(v) => SqlValue::DateTime(v),
            Err(_) => SqlValue::Other(cell_text(cell)),
        };
    }
    if base.starts_with("FixedString") {
        return SqlValue::Text(cell_text(cell));
    }

    match base {
        "Bool" => match cell.as_bool() {
            Some(v) => SqlValue::Bool(v),
            None => match cell_text(cell).as_str() {
                "true" | "1" => SqlValue::Bool(true),
                "false" | "0" => SqlValue::Bool(false),
                _ => SqlValue::Other(cell_text(cell)),
            },
        },
        "String" => SqlValue::Text(cell_text(cell)),
        "Date" | "Date32" => match NaiveDate::parse_from_str(&cell_text(cell), "%Y-%m-%d") {
            Ok(v) => SqlValue::Date(v),
            Err(_) => SqlValue::Other(cell_text(cell)),
        },
        _ => SqlValue::Other(cell_text(cell)),
    }
}

/// Strip `Nullable(...)` and `LowCardinality(...)` wrappers.
fn base_type(ch_type: &str) -> &str {
    let mut t = ch_type.trim();
    loop {
        if let Some(inner) = t
            .strip_prefix("Nullable(")
            .and_then(|s| s.strip_suffix(')'))
        {
            t = inner;
            continue;
        }
        if let Some(inner) = t
            .strip_prefix("LowCardinality(")
            .and_then(|s| s.strip_suffix(')'))
        {
            t = inner;
            continue;
        }
        return t;
    }
}

fn int_cell(cell: &serde_json::Value) -> Option<i64> {
    cell.as_i64().or_else(|| cell.as_str()?.parse().ok())
}

fn float_cell(cell: &serde_json::Value) -> Option<f64> {
    cell.as_f64().or_else(|| cell.as_str()?.parse().ok())
}

fn cell_text(cell: &serde_json::Value) -> String {
    match cell {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// `INSERT INTO` statement with inline literals; the HTTP interface takes
/// one full statement per request.
fn insert_statement(table: &str, columns: &[String], row: &[CanonicalValue]) -> String {
    let cols = columns
        .iter()
        .map(|c| quote_ident(c))
        .collect::<Vec<_>>()
        .join(", ");
    let values = row
        .iter()
        .map(sql_literal)
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        quote_table(table),
        cols,
        values
    )
}

fn quote_ident(name: &str) -> String {
    format!("`{}`", name.replace('\\', "\\\\").replace('`', "\\`"))
}

fn quote_table(table: &str) -> String {
    table
        .split('.')
        .map(quote_ident)
        .collect::<Vec<_>>()
        .join(".")
}

/// Render one canonical value as a ClickHouse SQL literal. Numeric kinds
/// render bare only when they re-parse as numbers; everything else is a
/// quoted, escaped string and the engine coerces it to the column type.
fn sql_literal(value: &CanonicalValue) -> String {
    match value {
        CanonicalValue::Null => "NULL".to_string(),
        CanonicalValue::Integer(v) => v.to_string(),
        CanonicalValue::Float(v) => v.to_string(),
        CanonicalValue::Boolean(v) => if *v { "true" } else { "false" }.to_string(),
        CanonicalValue::Decimal(v) => {
            if BigDecimal::from_str(v).is_ok() {
                v.clone()
            } else {
                quote_literal(v)
            }
        },
        CanonicalValue::String(v)
        | CanonicalValue::Binary(v)
        | CanonicalValue::Timestamp(v)
        | CanonicalValue::Date(v)
        | CanonicalValue::Time(v)
        | CanonicalValue::DateTime(v) => quote_literal(v),
    }
}

fn quote_literal(text: &str) -> String {
    format!("'{}'", text.replace('\\', "\\\\").replace('\'', "\\'"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request_for(server: &MockServer) -> ExtractRequest {
        let uri: reqwest::Url = server.uri().parse().unwrap();
        ExtractRequest {
            kind: portage_common::types::EngineKind::Clickhouse,
            host: uri.host_str().unwrap_or("127.0.0.1").to_string(),
            port: uri.port().unwrap_or(80),
            database: "analytics".to_string(),
            username: "default".to_string(),
            password: String::new(),
            query: "SELECT id, name FROM t".to_string(),
        }
    }

    fn load_request_for(server: &MockServer) -> LoadRequest {
        let extract = request_for(server);
        LoadRequest {
            kind: portage_common::types::EngineKind::Clickhouse,
            host: extract.host,
            port: extract.port,
            database: extract.database,
            username: extract.username,
            password: extract.password,
            table: "t2".to_string(),
        }
    }

    #[test]
    fn strips_type_wrappers() {
        assert_eq!(base_type("Nullable(Int64)"), "Int64");
        assert_eq!(base_type("LowCardinality(Nullable(String))"), "String");
        assert_eq!(base_type("Decimal(18, 4)"), "Decimal(18, 4)");
    }

    #[test]
    fn decodes_cells_by_declared_type() {
        assert_eq!(decode_cell("UInt16", &json!(7)), SqlValue::Int(7));
        // 64-bit integers arrive quoted
        assert_eq!(decode_cell("Int64", &json!("-9000000000")), SqlValue::Int(-9_000_000_000));
        assert_eq!(decode_cell("Float64", &json!(2.5)), SqlValue::Float(2.5));
        assert_eq!(
            decode_cell("Nullable(String)", &serde_json::Value::Null),
            SqlValue::Null
        );
        assert_eq!(
            decode_cell("Date", &json!("2024-01-18")),
            SqlValue::Date(NaiveDate::from_ymd_opt(2024, 1, 18).unwrap())
        );
        assert_eq!(
            decode_cell("DateTime", &json!("2024-01-18 12:30:45")),
            SqlValue::DateTime(
                NaiveDate::from_ymd_opt(2024, 1, 18)
                    .unwrap()
                    .and_hms_opt(12, 30, 45)
                    .unwrap()
            )
        );
        assert_eq!(
            decode_cell("Decimal(9, 2)", &json!("12345.67")),
            SqlValue::Numeric(BigDecimal::from_str("12345.67").unwrap())
        );
        // Outside the table: keep the textual form
        assert_eq!(
            decode_cell("IPv4", &json!("10.0.0.1")),
            SqlValue::Other("10.0.0.1".to_string())
        );
    }

    #[test]
    fn literals_are_escaped() {
        assert_eq!(
            sql_literal(&CanonicalValue::String("it's".to_string())),
            "'it\\'s'"
        );
        assert_eq!(sql_literal(&CanonicalValue::Null), "NULL");
        assert_eq!(sql_literal(&CanonicalValue::Integer(5)), "5");
        // A decimal that is not numeric text cannot sneak into the
        // statement unquoted
        assert_eq!(
            sql_literal(&CanonicalValue::Decimal("1; DROP TABLE t".to_string())),
            "'1; DROP TABLE t'"
        );
    }

    #[test]
    fn insert_statement_inlines_one_row() {
        let statement = insert_statement(
            "t2",
            &["id".to_string(), "name".to_string()],
            &[
                CanonicalValue::Integer(1),
                CanonicalValue::String("a".to_string()),
            ],
        );
        assert_eq!(statement, "INSERT INTO `t2` (`id`, `name`) VALUES (1, 'a')");
    }

    #[tokio::test]
    async fn extract_normalizes_a_jsoncompact_result() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/"))
            .and(body_string_contains("FORMAT JSONCompact"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "meta": [
                    {"name": "id", "type": "UInt32"},
                    {"name": "name", "type": "String"}
                ],
                "data": [[1, "a"], [2, "b"]],
                "rows": 2
            })))
            .mount(&server)
            .await;

        let set = ClickhouseConnector::new()
            .extract(&request_for(&server))
            .await
            .unwrap();

        assert_eq!(set.columns, vec!["id", "name"]);
        assert_eq!(
            set.rows,
            vec![
                vec![
                    CanonicalValue::Integer(1),
                    CanonicalValue::String("a".to_string())
                ],
                vec![
                    CanonicalValue::Integer(2),
                    CanonicalValue::String("b".to_string())
                ],
            ]
        );
    }

    #[tokio::test]
    async fn extract_surfaces_engine_errors_as_query_failures() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(404).set_body_string("Unknown table t"))
            .mount(&server)
            .await;

        let err = ClickhouseConnector::new()
            .extract(&request_for(&server))
            .await
            .unwrap_err();
        assert!(matches!(err, TransferError::Query(_)));
        assert!(err.to_string().contains("Unknown table"));
    }

    #[tokio::test]
    async fn load_aborts_on_the_first_rejected_row() {
        let server = MockServer::start().await;
        // First row is accepted, the second rejected; the third must never
        // be sent.
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("Cannot parse"))
            .mount(&server)
            .await;

        let mut data = RowSet::new(vec!["id".to_string()]);
        for id in 1..=3 {
            data.push_row(vec![CanonicalValue::Integer(id)]).unwrap();
        }

        let err = ClickhouseConnector::new()
            .load(&load_request_for(&server), &data)
            .await
            .unwrap_err();
        assert!(matches!(err, TransferError::Insert(_)));

        let received = server.received_requests().await.unwrap_or_default();
        assert_eq!(received.len(), 2);
    }
}
