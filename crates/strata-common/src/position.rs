//! Segment position codec
//!
//! A segment is addressed by `(part, index)`. The pair is packed into a single
//! `u64` whose natural order matches the lexicographic order of the pair, so
//! that the store can index segments with one integer key.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Position of a segment within a (possibly multipart) upload
#[derive(
    Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct SegmentPosition {
    /// Part number, groups segments uploaded together
    pub part: u32,
    /// Index of the segment within its part
    pub index: u32,
}

impl SegmentPosition {
    /// Create a new position
    #[must_use]
    pub const fn new(part: u32, index: u32) -> Self {
        Self { part, index }
    }

    /// Encode into the order key used by the segments table
    #[must_use]
    pub const fn encode(self) -> u64 {
        ((self.part as u64) << 32) | self.index as u64
    }

    /// Decode an order key produced by [`SegmentPosition::encode`]
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn decode(key: u64) -> Self {
        Self {
            part: (key >> 32) as u32,
            index: key as u32,
        }
    }
}

impl From<u64> for SegmentPosition {
    fn from(key: u64) -> Self {
        Self::decode(key)
    }
}

impl From<SegmentPosition> for u64 {
    fn from(pos: SegmentPosition) -> Self {
        pos.encode()
    }
}

impl fmt::Debug for SegmentPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SegmentPosition({}:{})", self.part, self.index)
    }
}

impl fmt::Display for SegmentPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.part, self.index)
    }
}
