//! Portage Connectors
//!
//! Engine connectors and the normalization layer that reconciles their
//! native type systems into the canonical row model.
//!
//! # Overview
//!
//! - **normalize**: per-family value normalizers (SQL cursor engines and the
//!   BigQuery analytical service) producing [`CanonicalValue`]s
//! - **source**: the [`RowSource`] abstraction unifying row-cursor and
//!   paginated-iterator retrieval, and the row-source normalizer that drains
//!   one into a [`RowSet`]
//! - **engines**: one extractor/loader pair per engine kind, each owning its
//!   connection for the duration of a single call
//! - **registry**: dispatch from [`EngineKind`] to the engine's capabilities
//! - **transfer**: the orchestrator combining one extract with one load
//!
//! [`CanonicalValue`]: portage_common::types::CanonicalValue
//! [`RowSet`]: portage_common::types::RowSet
//! [`EngineKind`]: portage_common::types::EngineKind
//! [`RowSource`]: crate::source::RowSource

pub mod engines;
pub mod normalize;
pub mod registry;
pub mod source;
pub mod transfer;

// Re-export commonly used items
pub use registry::{Extractor, Loader, Registry};
pub use source::{normalize_rows, RowSource};
pub use transfer::transfer;
