//! Strata Metabase - object/segment commit protocol and listing engine
//!
//! The [`Metabase`] handle exposes three groups of operations, each running
//! in exactly one store transaction:
//!
//! - object lifecycle: begin (next or exact version), commit, delete, get
//! - segment lifecycle: begin, commit, get by position
//! - listing: segments, stream positions (optionally by plain byte range)
//!   and segments of several objects at once
//!
//! Plain offsets are never trusted from writers; they are derived from the
//! committed segments in position order whenever a segment is returned.

pub mod db;
pub mod listing;
pub mod object;
pub mod segment;
mod validate;

#[cfg(test)]
mod testing;

pub use db::Metabase;
pub use listing::{
    ListObjectsSegments, ListObjectsSegmentsResult, ListSegments, ListSegmentsResult,
    ListStreamPositions, ListStreamPositionsResult, SegmentPositionInfo, StreamRange,
};
pub use object::{
    BeginObjectExactVersion, BeginObjectNextVersion, CommitObject, DeleteObjectResult,
    DeletedSegmentInfo, Object,
};
pub use segment::{BeginSegment, CommitSegment, Segment};
