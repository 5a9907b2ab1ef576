//! Strata Metadata Store - redb-backed persistence for the metabase
//!
//! This crate owns the on-disk tables for objects, the stream index and
//! segments, and exposes them through read and write transactions.

pub mod store;
pub mod tables;
pub mod types;

// Re-exports
pub use store::{MetaStore, MetaStoreError, MetaStoreResult, ReadTxn, StoreRead, WriteTxn};
pub use types::{SegmentState, StoredObject, StoredSegment, StreamEntry};
