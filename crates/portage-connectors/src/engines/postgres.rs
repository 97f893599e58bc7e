//! Postgres and Redshift connector
//!
//! Both engines speak the Postgres wire protocol; Redshift additionally
//! requires TLS. Extraction resolves the result schema with a prepared
//! `describe` before streaming rows through the driver cursor; loading runs
//! one positional INSERT per row and aborts on the first rejected row.

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use futures::stream::BoxStream;
use futures::TryStreamExt;
use sqlx::postgres::{PgArguments, PgConnectOptions, PgRow, PgSslMode};
use sqlx::query::Query;
use sqlx::{Column, Connection, Executor, PgConnection, Postgres, Row, TypeInfo};
use std::str::FromStr;

use portage_common::error::{Result, TransferError};
use portage_common::types::{CanonicalValue, ExtractRequest, LoadRequest, RowSet};

use crate::normalize::sql::{normalize, SqlValue};
use crate::registry::{Extractor, Loader};
use crate::source::{normalize_rows, RowSource};

/// Connector for the Postgres-wire engines.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresConnector {
    require_tls: bool,
}

impl PostgresConnector {
    pub fn new() -> Self {
        Self { require_tls: false }
    }

    /// Redshift endpoints only accept TLS connections.
    pub fn require_tls() -> Self {
        Self { require_tls: true }
    }

    async fn connect(
        &self,
        host: &str,
        port: u16,
        database: &str,
        username: &str,
        password: &str,
    ) -> Result<PgConnection> {
        let options = PgConnectOptions::new()
            .host(host)
            .port(port)
            .database(database)
            .username(username)
            .password(password)
            .ssl_mode(if self.require_tls {
                PgSslMode::Require
            } else {
                PgSslMode::Prefer
            });

        PgConnection::connect_with(&options)
            .await
            .map_err(|e| TransferError::Connect(e.to_string()))
    }
}

#[async_trait]
impl Extractor for PostgresConnector {
    async fn extract(&self, req: &ExtractRequest) -> Result<RowSet> {
        let mut conn = self
            .connect(&req.host, req.port, &req.database, &req.username, &req.password)
            .await?;
        let result = run_extract(&mut conn, &req.query).await;
        // The connection is engine-side and finite; release it on every
        // exit path before handing control back.
        let _ = conn.close().await;
        result
    }
}

#[async_trait]
impl Loader for PostgresConnector {
    async fn load(&self, req: &LoadRequest, data: &RowSet) -> Result<()> {
        let mut conn = self
            .connect(&req.host, req.port, &req.database, &req.username, &req.password)
            .await?;
        let result = run_load(&mut conn, &req.table, data).await;
        let _ = conn.close().await;
        result
    }
}

async fn run_extract(conn: &mut PgConnection, query: &str) -> Result<RowSet> {
    let describe = (&mut *conn)
        .describe(query)
        .await
        .map_err(|e| TransferError::SchemaUnavailable(e.to_string()))?;
    let columns: Vec<String> = describe
        .columns()
        .iter()
        .map(|c| c.name().to_string())
        .collect();

    let stream = sqlx::query(query).fetch(&mut *conn);
    normalize_rows(PgRowSource { columns, stream }, normalize).await
}

async fn run_load(conn: &mut PgConnection, table: &str, data: &RowSet) -> Result<()> {
    let statement = insert_statement(table, &data.columns);
    for row in &data.rows {
        let mut insert = sqlx::query(&statement);
        for value in row {
            insert = bind_value(insert, value);
        }
        insert
            .execute(&mut *conn)
            .await
            .map_err(|e| TransferError::Insert(e.to_string()))?;
    }
    Ok(())
}

/// Driver cursor wrapped as a [`RowSource`]. Exhaustion is the driver's own
/// no-more-rows signal on the fetch stream.
struct PgRowSource<'a> {
    columns: Vec<String>,
    stream: BoxStream<'a, std::result::Result<PgRow, sqlx::Error>>,
}

#[async_trait]
impl RowSource for PgRowSource<'_> {
    type Native = SqlValue;

    async fn columns(&mut self) -> Result<Vec<String>> {
        Ok(self.columns.clone())
    }

    async fn next_row(&mut self) -> Result<Option<Vec<SqlValue>>> {
        match self.stream.try_next().await {
            Ok(Some(row)) => Ok(Some(decode_row(&row))),
            Ok(None) => Ok(None),
            Err(e) => Err(TransferError::Query(e.to_string())),
        }
    }
}

fn decode_row(row: &PgRow) -> Vec<SqlValue> {
    (0..row.columns().len())
        .map(|idx| decode_value(row, idx))
        .collect()
}

/// Decode one column position into the cursor family's native union.
///
/// Total: a native type outside the table degrades to its textual form (or
/// a type-name placeholder when even that fails), never an error.
fn decode_value(row: &PgRow, idx: usize) -> SqlValue {
    let type_name = row.column(idx).type_info().name().to_string();
    match type_name.as_str() {
        "BOOL" => typed(row, idx, SqlValue::Bool),
        "INT2" => typed(row, idx, |v: i16| SqlValue::Int(v.into())),
        "INT4" => typed(row, idx, |v: i32| SqlValue::Int(v.into())),
        "INT8" => typed(row, idx, SqlValue::Int),
        "FLOAT4" => typed(row, idx, |v: f32| SqlValue::Float(v.into())),
        "FLOAT8" => typed(row, idx, SqlValue::Float),
        "NUMERIC" => typed(row, idx, SqlValue::Numeric),
        "TEXT" | "VARCHAR" | "CHAR" | "BPCHAR" | "NAME" => typed(row, idx, SqlValue::Text),
        "BYTEA" => typed(row, idx, SqlValue::Bytes),
        "TIMESTAMPTZ" => typed(row, idx, |v: DateTime<FixedOffset>| SqlValue::Timestamp(v)),
        "TIMESTAMP" => typed(row, idx, SqlValue::DateTime),
        "DATE" => typed(row, idx, SqlValue::Date),
        "TIME" => typed(row, idx, SqlValue::Time),
        "UUID" => typed(row, idx, |v: sqlx::types::Uuid| SqlValue::Other(v.to_string())),
        "JSON" | "JSONB" => {
            typed(row, idx, |v: serde_json::Value| SqlValue::Other(v.to_string()))
        },
        _ => text_fallback(row, idx),
    }
}

fn typed<'r, T>(row: &'r PgRow, idx: usize, wrap: impl FnOnce(T) -> SqlValue) -> SqlValue
where
    T: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
{
    match row.try_get::<Option<T>, _>(idx) {
        Ok(Some(v)) => wrap(v),
        Ok(None) => SqlValue::Null,
        Err(_) => text_fallback(row, idx),
    }
}

fn text_fallback(row: &PgRow, idx: usize) -> SqlValue {
    match row.try_get_unchecked::<Option<String>, _>(idx) {
        Ok(Some(v)) => SqlValue::Other(v),
        Ok(None) => SqlValue::Null,
        Err(_) => SqlValue::Other(format!("<{}>", row.column(idx).type_info().name())),
    }
}

/// `INSERT INTO "t" ("c1", "c2") VALUES ($1, $2)`
fn insert_statement(table: &str, columns: &[String]) -> String {
    let cols = columns
        .iter()
        .map(|c| quote_ident(c))
        .collect::<Vec<_>>()
        .join(", ");
    let placeholders = (1..=columns.len())
        .map(|i| format!("${}", i))
        .collect::<Vec<_>>()
        .join(", ");
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

/// Quote a possibly schema-qualified table name segment by segment.
fn quote_table(table: &str) -> String {
    table
        .split('.')
        .map(quote_ident)
        .collect::<Vec<_>>()
        .join(".")
}

/// Bind one canonical value back to a typed SQL argument. Temporal and
/// decimal kinds are parsed from their canonical textual forms; anything
/// that does not parse binds as text and leaves the cast to the engine.
fn bind_value<'q>(
    query: Query<'q, Postgres, PgArguments>,
    value: &CanonicalValue,
) -> Query<'q, Postgres, PgArguments> {
    match value {
        CanonicalValue::Null => query.bind(None::<String>),
        CanonicalValue::Integer(v) => query.bind(*v),
        CanonicalValue::Float(v) => query.bind(*v),
        CanonicalValue::Boolean(v) => query.bind(*v),
        CanonicalValue::String(v) => query.bind(v.clone()),
        CanonicalValue::Binary(v) => query.bind(v.clone().into_bytes()),
        CanonicalValue::Timestamp(v) => match DateTime::parse_from_rfc3339(v) {
            Ok(ts) => query.bind(ts),
            Err(_) => query.bind(v.clone()),
        },
        CanonicalValue::Date(v) => match NaiveDate::parse_from_str(v, "%Y-%m-%d") {
            Ok(d) => query.bind(d),
            Err(_) => query.bind(v.clone()),
        },
        CanonicalValue::Time(v) => match NaiveTime::parse_from_str(v, "%H:%M:%S%.f") {
            Ok(t) => query.bind(t),
            Err(_) => query.bind(v.clone()),
        },
        CanonicalValue::DateTime(v) => {
            match NaiveDateTime::parse_from_str(v, "%Y-%m-%dT%H:%M:%S%.f") {
                Ok(dt) => query.bind(dt),
                Err(_) => query.bind(v.clone()),
            }
        },
        CanonicalValue::Decimal(v) => match BigDecimal::from_str(v) {
            Ok(d) => query.bind(d),
            Err(_) => query.bind(v.clone()),
        },
    }
}
