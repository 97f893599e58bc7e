//! Value normalizers
//!
//! One normalizer per engine family, selected by the connector that owns the
//! row source:
//!
//! - [`sql`] covers the row-cursor engines (Postgres, Redshift, ClickHouse,
//!   Snowflake). Their drivers decode into the shared [`sql::SqlValue`]
//!   native union, and [`sql::normalize`] maps that union to canonical
//!   values.
//! - [`bigquery`] covers the analytical service. Cells arrive as REST JSON
//!   alongside a schema-declared field type, and
//!   [`bigquery::normalize_cell`] maps the pair to canonical values.
//!
//! Both normalizers are pure and total: every native value maps to exactly
//! one canonical kind, and anything outside the known mapping tables falls
//! back to the `string` kind rather than failing.

pub mod bigquery;
pub mod sql;
