//! Connector registry
//!
//! Maps an engine kind to its extract/load capabilities. The kind is a
//! closed enum validated centrally at descriptor parse time, so resolution
//! here is a total match; an identifier outside the set never reaches the
//! registry, let alone a connection attempt.

use async_trait::async_trait;

use portage_common::error::Result;
use portage_common::types::{EngineKind, ExtractRequest, LoadRequest, RowSet};

use crate::engines::{BigQueryConnector, ClickhouseConnector, PostgresConnector, SnowflakeConnector};

/// Capability to read rows out of one engine kind.
#[async_trait]
pub trait Extractor: Send + Sync {
    /// Run the descriptor's query and return the normalized result.
    ///
    /// The connection is acquired for this call only and released on every
    /// exit path before the method returns.
    async fn extract(&self, req: &ExtractRequest) -> Result<RowSet>;
}

/// Capability to write rows into one engine kind.
#[async_trait]
pub trait Loader: Send + Sync {
    /// Insert every row of `data` into the descriptor's table, binding
    /// columns positionally. Fail-fast: the first rejected row aborts the
    /// rest; rows already written are not rolled back.
    async fn load(&self, req: &LoadRequest, data: &RowSet) -> Result<()>;
}

/// Resolves engine kinds to their connector implementations.
#[derive(Debug, Clone)]
pub struct Registry {
    postgres: PostgresConnector,
    redshift: PostgresConnector,
    clickhouse: ClickhouseConnector,
    snowflake: SnowflakeConnector,
    bigquery: BigQueryConnector,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    pub fn new() -> Self {
        Self {
            postgres: PostgresConnector::new(),
            // Redshift is the Postgres wire protocol behind mandatory TLS.
            redshift: PostgresConnector::require_tls(),
            clickhouse: ClickhouseConnector::new(),
            snowflake: SnowflakeConnector::new(),
            bigquery: BigQueryConnector::new(),
        }
    }

    pub fn extractor(&self, kind: EngineKind) -> &dyn Extractor {
        match kind {
            EngineKind::Postgres => &self.postgres,
            EngineKind::Redshift => &self.redshift,
            EngineKind::Clickhouse => &self.clickhouse,
            EngineKind::Snowflake => &self.snowflake,
            EngineKind::BigQuery => &self.bigquery,
        }
    }

    pub fn loader(&self, kind: EngineKind) -> &dyn Loader {
        match kind {
            EngineKind::Postgres => &self.postgres,
            EngineKind::Redshift => &self.redshift,
            EngineKind::Clickhouse => &self.clickhouse,
            EngineKind::Snowflake => &self.snowflake,
            EngineKind::BigQuery => &self.bigquery,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use portage_common::error::TransferError;

    #[test]
    fn every_engine_kind_resolves_to_both_capabilities() {
        let registry = Registry::new();
        for kind in EngineKind::ALL {
            let _ = registry.extractor(kind);
            let _ = registry.loader(kind);
        }
    }

    #[test]
    fn identifiers_outside_the_closed_set_never_reach_the_registry() {
        // Validation happens once, at parse; resolution is total over the
        // closed enum.
        let err = "mysql".parse::<EngineKind>().unwrap_err();
        assert!(matches!(err, TransferError::UnsupportedEngine(_)));
    }
}
