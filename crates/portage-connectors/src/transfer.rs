//! Transfer orchestrator
//!
//! Combines one extract with one load. Extraction completes fully, with the
//! whole row set buffered in memory, before loading begins; a failed
//! extract means the load is never attempted. There is no rollback of rows
//! committed before a load failure; the destination may be left partially
//! populated and the caller sees `LoadFailed`.

use tracing::{info, Instrument};
use uuid::Uuid;

use portage_common::error::{Result, TransferError};
use portage_common::types::{TransferOutcome, TransferRequest};

use crate::registry::{Extractor, Loader, Registry};

/// Move the requested rows from source to destination.
///
/// Errors are tagged with the failing side: `ExtractFailed` or
/// `LoadFailed`, each carrying the underlying cause.
pub async fn transfer(registry: &Registry, request: &TransferRequest) -> Result<TransferOutcome> {
    let transfer_id = Uuid::new_v4();
    let span = tracing::info_span!(
        "transfer",
        %transfer_id,
        source = %request.source.kind,
        destination = %request.destination.kind,
    );

    let extractor = registry.extractor(request.source.kind);
    let loader = registry.loader(request.destination.kind);
    run(extractor, loader, request).instrument(span).await
}

async fn run(
    extractor: &dyn Extractor,
    loader: &dyn Loader,
    request: &TransferRequest,
) -> Result<TransferOutcome> {
    let data = extractor
        .extract(&request.source)
        .await
        .map_err(TransferError::extract_failed)?;
    info!(rows = data.len(), columns = data.width(), "extract completed");

    loader
        .load(&request.destination, &data)
        .await
        .map_err(TransferError::load_failed)?;
    info!(rows = data.len(), "load completed");

    Ok(TransferOutcome::success())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use portage_common::types::{CanonicalValue, EngineKind, ExtractRequest, LoadRequest, RowSet};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    struct StubExtractor {
        fail: bool,
    }

    #[async_trait]
    impl Extractor for StubExtractor {
        async fn extract(&self, _req: &ExtractRequest) -> Result<RowSet> {
            if self.fail {
                return Err(TransferError::Connect("source down".to_string()));
            }
            let mut set = RowSet::new(vec!["id".to_string()]);
            set.push_row(vec![CanonicalValue::Integer(1)])?;
            Ok(set)
        }
    }

    struct RecordingLoader {
        called: AtomicBool,
        rows_seen: AtomicUsize,
        fail: bool,
    }

    impl RecordingLoader {
        fn new(fail: bool) -> Self {
            Self {
                called: AtomicBool::new(false),
                rows_seen: AtomicUsize::new(0),
                fail,
            }
        }
    }

    #[async_trait]
    impl Loader for RecordingLoader {
        async fn load(&self, _req: &LoadRequest, data: &RowSet) -> Result<()> {
            self.called.store(true, Ordering::SeqCst);
            self.rows_seen.store(data.len(), Ordering::SeqCst);
            if self.fail {
                return Err(TransferError::Insert("constraint violation".to_string()));
            }
            Ok(())
        }
    }

    fn request() -> TransferRequest {
        TransferRequest {
            source: ExtractRequest {
                kind: EngineKind::Postgres,
                host: "src".to_string(),
                port: 5432,
                database: "d".to_string(),
                username: "u".to_string(),
                password: "p".to_string(),
                query: "SELECT id FROM t".to_string(),
            },
            destination: LoadRequest {
                kind: EngineKind::Clickhouse,
                host: "dst".to_string(),
                port: 8123,
                database: "d".to_string(),
                username: "u".to_string(),
                password: "p".to_string(),
                table: "t2".to_string(),
            },
        }
    }

    #[tokio::test]
    async fn success_returns_a_status_marker() {
        let loader = RecordingLoader::new(false);
        let outcome = run(&StubExtractor { fail: false }, &loader, &request())
            .await
            .unwrap();
        assert_eq!(outcome.status, "success");
        assert_eq!(loader.rows_seen.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn a_failed_extract_never_attempts_the_load() {
        let loader = RecordingLoader::new(false);
        let err = run(&StubExtractor { fail: true }, &loader, &request())
            .await
            .unwrap_err();

        assert!(matches!(err, TransferError::ExtractFailed(_)));
        assert!(err.to_string().contains("source down"));
        assert!(!loader.called.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn a_failed_load_is_tagged_as_the_load_side() {
        let loader = RecordingLoader::new(true);
        let err = run(&StubExtractor { fail: false }, &loader, &request())
            .await
            .unwrap_err();

        assert!(matches!(err, TransferError::LoadFailed(_)));
        assert!(err.to_string().contains("constraint violation"));
        assert!(loader.called.load(Ordering::SeqCst));
    }
}
