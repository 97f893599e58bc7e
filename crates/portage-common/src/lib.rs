//! Portage Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared types, error handling, and logging for the portage workspace.
//!
//! # Overview
//!
//! This crate provides the pieces every portage workspace member agrees on:
//!
//! - **Canonical Row Model**: the warehouse-agnostic column/row/value shape
//!   all connectors produce and consume
//! - **Engine Kinds**: the closed set of supported warehouse engines
//! - **Error Handling**: the transfer error taxonomy
//! - **Logging**: tracing subscriber initialization
//!
//! # Example
//!
//! ```no_run
//! use portage_common::types::{CanonicalValue, RowSet};
//!
//! let mut set = RowSet::new(vec!["id".to_string(), "name".to_string()]);
//! set.push_row(vec![
//!     CanonicalValue::Integer(1),
//!     CanonicalValue::String("a".to_string()),
//! ]).unwrap();
//! assert_eq!(set.rows.len(), 1);
//! ```

pub mod error;
pub mod logging;
pub mod types;

// Re-export commonly used types
pub use error::{Result, TransferError};
pub use types::{CanonicalValue, EngineKind, ExtractRequest, LoadRequest, RowSet, TransferRequest};
