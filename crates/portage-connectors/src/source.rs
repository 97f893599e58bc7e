//! Row sources and the row-source normalizer
//!
//! The supported engines retrieve result rows through two different
//! protocols: a synchronous cursor that advances row-by-row until the
//! driver reports no more rows, and a paginated iterator that yields pages
//! until an explicit end-of-data sentinel. [`RowSource`] unifies both behind
//! one pull interface, and [`normalize_rows`] drains a source into a
//! canonical [`RowSet`].

use async_trait::async_trait;
use portage_common::error::{Result, TransferError};
use portage_common::types::{CanonicalValue, RowSet};

/// An engine-specific handle for retrieving result rows.
///
/// `Native` is the engine family's native value representation, normalized
/// by the caller-supplied function in [`normalize_rows`]. Implementations
/// own whatever connection or pagination state the retrieval needs and
/// release it when dropped.
#[async_trait]
pub trait RowSource: Send {
    type Native: Send;

    /// Column names in retrieval order, resolved from the source's schema
    /// metadata before any row is consumed.
    ///
    /// # Errors
    ///
    /// `SchemaUnavailable` when the metadata cannot be retrieved.
    async fn columns(&mut self) -> Result<Vec<String>>;

    /// Advance to the next row. `Ok(None)` signals normal exhaustion; both
    /// the cursor's no-more-rows signal and the iterator's end-of-data
    /// sentinel surface here, and an exhausted source keeps returning
    /// `Ok(None)`. An error is a genuine mid-stream read failure, never the
    /// end of data.
    async fn next_row(&mut self) -> Result<Option<Vec<Self::Native>>>;
}

/// Drain a row source to exhaustion into a canonical row set.
///
/// Column order always matches the order reported by the source's own
/// schema. All-or-nothing: a failure at row N surfaces as `RowRead` (or
/// `ShapeMismatch`) and no rows are returned at all.
pub async fn normalize_rows<S>(
    mut source: S,
    normalize: impl Fn(S::Native) -> CanonicalValue + Send,
) -> Result<RowSet>
where
    S: RowSource,
{
    let columns = source.columns().await?;
    let mut set = RowSet::new(columns);

    loop {
        match source.next_row().await {
            Ok(Some(native_row)) => {
                let row = native_row.into_iter().map(&normalize).collect();
                set.push_row(row)?;
            },
            Ok(None) => break,
            Err(TransferError::RowRead { rows_read, message }) => {
                return Err(TransferError::RowRead { rows_read, message });
            },
            Err(other) => {
                return Err(TransferError::RowRead {
                    rows_read: set.len(),
                    message: other.to_string(),
                });
            },
        }
    }

    Ok(set)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::normalize::sql::{normalize, SqlValue};
    use std::collections::VecDeque;

    /// In-memory row source standing in for a driver cursor.
    struct VecSource {
        columns: Option<Vec<String>>,
        rows: VecDeque<Vec<SqlValue>>,
        fail_after: Option<usize>,
        served: usize,
    }

    impl VecSource {
        fn new(columns: &[&str], rows: Vec<Vec<SqlValue>>) -> Self {
            Self {
                columns: Some(columns.iter().map(|c| c.to_string()).collect()),
                rows: rows.into(),
                fail_after: None,
                served: 0,
            }
        }

        fn failing_after(mut self, rows: usize) -> Self {
            self.fail_after = Some(rows);
            self
        }

        fn without_schema(mut self) -> Self {
            self.columns = None;
            self
        }
    }

    #[async_trait]
    impl RowSource for VecSource {
        type Native = SqlValue;

        async fn columns(&mut self) -> Result<Vec<String>> {
            self.columns
                .clone()
                .ok_or_else(|| TransferError::SchemaUnavailable("metadata missing".to_string()))
        }

        async fn next_row(&mut self) -> Result<Option<Vec<SqlValue>>> {
            if self.fail_after == Some(self.served) {
                return Err(TransferError::Query("connection reset".to_string()));
            }
            self.served += 1;
            Ok(self.rows.pop_front())
        }
    }

    fn two_rows() -> Vec<Vec<SqlValue>> {
        vec![
            vec![SqlValue::Int(1), SqlValue::Text("a".to_string())],
            vec![SqlValue::Int(2), SqlValue::Text("b".to_string())],
        ]
    }

    #[tokio::test]
    async fn columns_keep_retrieval_order_and_rows_align() {
        let source = VecSource::new(&["id", "name"], two_rows());
        let set = normalize_rows(source, normalize).await.unwrap();

        assert_eq!(set.columns, vec!["id", "name"]);
        assert_eq!(set.rows.len(), 2);
        assert_eq!(
            set.rows[0],
            vec![
                CanonicalValue::Integer(1),
                CanonicalValue::String("a".to_string())
            ]
        );
        assert_eq!(
            set.rows[1],
            vec![
                CanonicalValue::Integer(2),
                CanonicalValue::String("b".to_string())
            ]
        );
    }

    #[tokio::test]
    async fn an_exhausted_source_yields_an_empty_set() {
        let mut source = VecSource::new(&["id"], vec![vec![SqlValue::Int(1)]]);
        while source.next_row().await.unwrap().is_some() {}

        let set = normalize_rows(source, normalize).await.unwrap();
        assert_eq!(set.columns, vec!["id"]);
        assert!(set.is_empty());
    }

    #[tokio::test]
    async fn missing_schema_fails_before_any_row_is_read() {
        let source = VecSource::new(&["id"], two_rows()).without_schema();
        let err = normalize_rows(source, normalize).await.unwrap_err();
        assert!(matches!(err, TransferError::SchemaUnavailable(_)));
    }

    #[tokio::test]
    async fn mid_stream_failure_surfaces_zero_rows() {
        let source = VecSource::new(&["id", "name"], two_rows()).failing_after(1);
        let err = normalize_rows(source, normalize).await.unwrap_err();

        match err {
            TransferError::RowRead { rows_read, message } => {
                assert_eq!(rows_read, 1);
                assert!(message.contains("connection reset"));
            },
            other => panic!("expected RowRead, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn a_short_row_is_a_shape_mismatch() {
        let source = VecSource::new(&["id", "name"], vec![vec![SqlValue::Int(1)]]);
        let err = normalize_rows(source, normalize).await.unwrap_err();
        assert!(matches!(
            err,
            TransferError::ShapeMismatch {
                expected: 2,
                actual: 1
            }
        ));
    }
}
