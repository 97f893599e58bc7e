//! Supported warehouse engine kinds

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::TransferError;

/// The closed set of supported warehouse engines.
///
/// Four of them speak a row-cursor SQL protocol; BigQuery is a columnar
/// analytical service with paginated result retrieval. Validation happens in
/// exactly one place, [`EngineKind::from_str`]; request deserialization goes
/// through it via `try_from`, so an unknown identifier is rejected before
/// any connection is attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum EngineKind {
    Postgres,
    Clickhouse,
    Snowflake,
    Redshift,
    BigQuery,
}

impl EngineKind {
    /// All members of the closed set, in wire-name order.
    pub const ALL: [EngineKind; 5] = [
        EngineKind::Postgres,
        EngineKind::Clickhouse,
        EngineKind::Snowflake,
        EngineKind::Redshift,
        EngineKind::BigQuery,
    ];

    /// Wire identifier for this engine kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            EngineKind::Postgres => "postgres",
            EngineKind::Clickhouse => "clickhouse",
            EngineKind::Snowflake => "snowflake",
            EngineKind::Redshift => "redshift",
            EngineKind::BigQuery => "bigquery",
        }
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EngineKind {
    type Err = TransferError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "postgres" => Ok(EngineKind::Postgres),
            "clickhouse" => Ok(EngineKind::Clickhouse),
            "snowflake" => Ok(EngineKind::Snowflake),
            "redshift" => Ok(EngineKind::Redshift),
            "bigquery" => Ok(EngineKind::BigQuery),
            other => Err(TransferError::UnsupportedEngine(other.to_string())),
        }
    }
}

impl TryFrom<String> for EngineKind {
    type Error = TransferError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}
