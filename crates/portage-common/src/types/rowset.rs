//! Canonical row sets

use serde::{Deserialize, Serialize};

use crate::error::TransferError;
use crate::types::CanonicalValue;

/// An ordered set of canonical rows.
///
/// Column order is the retrieval order reported by the source, never
/// reordered. Every row holds exactly `columns.len()` values, positionally
/// aligned with the column names; [`RowSet::push_row`] enforces this at
/// construction time. A row set is built once per extract, immutable
/// afterwards, and consumed once by a load.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RowSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<CanonicalValue>>,
}

impl RowSet {
    /// Create an empty row set with a fixed column list.
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Number of columns; fixed at construction.
    pub fn width(&self) -> usize {
        self.columns.len()
    }

    /// Number of rows accumulated so far.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Append one row, rejecting it if its width does not match the column
    /// count.
    pub fn push_row(&mut self, row: Vec<CanonicalValue>) -> Result<(), TransferError> {
        if row.len() != self.columns.len() {
            return Err(TransferError::ShapeMismatch {
                expected: self.columns.len(),
                actual: row.len(),
            });
        }
        self.rows.push(row);
        Ok(())
    }

    /// Check the shape invariant over an already-built set. Used on row sets
    /// that arrive over the wire rather than through [`RowSet::push_row`].
    pub fn validate(&self) -> Result<(), TransferError> {
        for row in &self.rows {
            if row.len() != self.columns.len() {
                return Err(TransferError::ShapeMismatch {
                    expected: self.columns.len(),
                    actual: row.len(),
                });
            }
        }
        Ok(())
    }
}
