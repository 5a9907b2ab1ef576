//! Stored types for metadata persistence.
//!
//! These types are serialized to redb via bincode. They are the rows of the
//! `objects`, `streams` and `segments` tables; the metabase engine builds its
//! caller-facing views from them.

use serde::{Deserialize, Serialize};
use strata_common::{
    BucketName, EncryptionParameters, ObjectKey, ObjectLocation, ObjectStatus, ObjectStream,
    PieceId, Pieces, ProjectId, RedundancyScheme, SegmentPosition, StreamId, Version,
};

// ---- Objects ----

/// One object version
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredObject {
    pub stream: ObjectStream,
    pub status: ObjectStatus,
    pub created_at: u64,
    pub committed_at: Option<u64>,
    pub encryption: EncryptionParameters,

    // Rolled up from the persisted segments at commit time
    pub segment_count: u32,
    pub total_plain_size: i64,
    pub total_encrypted_size: i64,
    /// Plain size shared by every segment but the last, -1 when sizes vary
    pub fixed_segment_size: i32,

    pub encrypted_metadata_nonce: Vec<u8>,
    pub encrypted_metadata: Vec<u8>,
    pub encrypted_metadata_encrypted_key: Vec<u8>,
}

impl StoredObject {
    /// Fresh pending row for a newly begun object
    #[must_use]
    pub fn pending(stream: ObjectStream, encryption: EncryptionParameters, now: u64) -> Self {
        Self {
            stream,
            status: ObjectStatus::Pending,
            created_at: now,
            committed_at: None,
            encryption,
            segment_count: 0,
            total_plain_size: 0,
            total_encrypted_size: 0,
            fixed_segment_size: 0,
            encrypted_metadata_nonce: Vec::new(),
            encrypted_metadata: Vec::new(),
            encrypted_metadata_encrypted_key: Vec::new(),
        }
    }

    #[must_use]
    pub const fn is_pending(&self) -> bool {
        matches!(self.status, ObjectStatus::Pending)
    }

    #[must_use]
    pub const fn is_committed(&self) -> bool {
        matches!(self.status, ObjectStatus::Committed)
    }
}

// ---- Stream index ----

/// Back-pointer from a stream id to its objects row
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamEntry {
    pub project_id: ProjectId,
    pub bucket_name: BucketName,
    pub object_key: ObjectKey,
    pub version: Version,
}

impl StreamEntry {
    /// Location of the object owning the stream
    #[must_use]
    pub fn location(&self) -> ObjectLocation {
        ObjectLocation {
            project_id: self.project_id,
            bucket_name: self.bucket_name.clone(),
            object_key: self.object_key.clone(),
        }
    }
}

impl From<&ObjectStream> for StreamEntry {
    fn from(stream: &ObjectStream) -> Self {
        Self {
            project_id: stream.project_id,
            bucket_name: stream.bucket_name.clone(),
            object_key: stream.object_key.clone(),
            version: stream.version,
        }
    }
}

// ---- Segments ----

/// Upload state of a segment row
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SegmentState {
    /// Begun, pieces are still being uploaded
    #[default]
    Pending,
    /// Pieces and sizes are final
    Committed,
}

/// One segment of a stream
///
/// The plain offset is not stored: it is derived from the plain sizes of the
/// committed segments in position order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredSegment {
    pub stream_id: StreamId,
    pub position: SegmentPosition,
    pub state: SegmentState,
    pub created_at: u64,

    pub root_piece_id: PieceId,
    pub encrypted_key_nonce: Vec<u8>,
    pub encrypted_key: Vec<u8>,
    pub encrypted_etag: Vec<u8>,

    pub encrypted_size: i32,
    pub plain_size: i32,

    pub redundancy: RedundancyScheme,
    pub pieces: Pieces,
}

impl StoredSegment {
    #[must_use]
    pub const fn is_committed(&self) -> bool {
        matches!(self.state, SegmentState::Committed)
    }

    /// Compare everything a client supplies on commit, ignoring bookkeeping
    #[must_use]
    pub fn same_payload(&self, other: &Self) -> bool {
        self.root_piece_id == other.root_piece_id
            && self.encrypted_key_nonce == other.encrypted_key_nonce
            && self.encrypted_key == other.encrypted_key
            && self.encrypted_etag == other.encrypted_etag
            && self.encrypted_size == other.encrypted_size
            && self.plain_size == other.plain_size
            && self.redundancy == other.redundancy
            && self.pieces == other.pieces
    }
}
