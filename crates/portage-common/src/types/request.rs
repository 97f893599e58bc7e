//! Transfer request descriptors

use serde::{Deserialize, Serialize};

use crate::types::EngineKind;

/// Describes where to extract rows from.
///
/// For BigQuery the fields are reinterpreted the way the analytical service
/// expects: `database` is the GCP project id and `password` carries the
/// bearer credential for the REST API; `host` and `port` are ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractRequest {
    #[serde(rename = "type")]
    pub kind: EngineKind,
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: String,
    pub password: String,
    /// Source query to run against the engine.
    pub query: String,
}

/// Describes where to load rows into.
///
/// `table` is the destination table name; for BigQuery it is
/// `dataset.table`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadRequest {
    #[serde(rename = "type")]
    pub kind: EngineKind,
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: String,
    pub password: String,
    pub table: String,
}

/// One logical move of data: extract from `source`, load into
/// `destination`. All-or-nothing from the caller's point of view, though no
/// cross-engine atomicity is guaranteed (a failed load can leave the
/// destination partially populated).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferRequest {
    pub source: ExtractRequest,
    pub destination: LoadRequest,
}

/// Terminal outcome of a successful transfer. A status marker only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferOutcome {
    pub status: String,
}

impl TransferOutcome {
    pub fn success() -> Self {
        Self {
            status: "success".to_string(),
        }
    }
}
