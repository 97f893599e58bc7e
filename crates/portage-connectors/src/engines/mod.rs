//! Engine connectors
//!
//! One extractor/loader pair per engine kind. Each connector establishes
//! its own connection per call and releases it on every exit path; nothing
//! is shared across requests.
//!
//! - [`postgres`]: Postgres and Redshift over the Postgres wire protocol
//!   (Redshift requires TLS but is otherwise the same connector)
//! - [`clickhouse`]: ClickHouse over its HTTP interface
//! - [`snowflake`]: Snowflake over the SQL REST API
//! - [`bigquery`]: BigQuery over the REST API, with paginated retrieval

pub mod bigquery;
pub mod clickhouse;
pub mod postgres;
pub mod snowflake;

pub use bigquery::BigQueryConnector;
pub use clickhouse::ClickhouseConnector;
pub use postgres::PostgresConnector;
pub use snowflake::SnowflakeConnector;
