//! Segment lifecycle: staging and finalizing the segments of a pending object
//!
//! `begin_segment` reserves a position with a pending row; `commit_segment`
//! fixes the pieces and byte accounting of that row. Segments of one object
//! may be committed in any order. Writers pass a plain offset for
//! compatibility but it is never stored: offsets are derived from position
//! order when segments are read.

use crate::db::{Metabase, WithOp};
use crate::object::pending_object;
use crate::validate;
use std::ops::ControlFlow;
use strata_common::{
    Error, ObjectStream, PieceId, Pieces, RedundancyScheme, Result, SegmentPosition, StreamId,
    current_timestamp,
};
use strata_meta_store::{SegmentState, StoreRead, StoredSegment};
use tracing::{debug, warn};

/// Committed segment with its derived plain offset
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Segment {
    pub stream_id: StreamId,
    pub position: SegmentPosition,
    pub created_at: u64,

    pub root_piece_id: PieceId,
    pub encrypted_key_nonce: Vec<u8>,
    pub encrypted_key: Vec<u8>,
    pub encrypted_etag: Vec<u8>,

    pub encrypted_size: i32,
    pub plain_offset: i64,
    pub plain_size: i32,

    pub redundancy: RedundancyScheme,
    pub pieces: Pieces,
}

impl Segment {
    pub(crate) fn from_stored(segment: StoredSegment, plain_offset: i64) -> Self {
        Self {
            stream_id: segment.stream_id,
            position: segment.position,
            created_at: segment.created_at,
            root_piece_id: segment.root_piece_id,
            encrypted_key_nonce: segment.encrypted_key_nonce,
            encrypted_key: segment.encrypted_key,
            encrypted_etag: segment.encrypted_etag,
            encrypted_size: segment.encrypted_size,
            plain_offset,
            plain_size: segment.plain_size,
            redundancy: segment.redundancy,
            pieces: segment.pieces,
        }
    }
}

/// Reserve a segment position of a pending object
#[derive(Clone, Debug, Default)]
pub struct BeginSegment {
    pub object_stream: ObjectStream,
    pub position: SegmentPosition,
    pub root_piece_id: PieceId,
    pub pieces: Pieces,
    pub redundancy: RedundancyScheme,
    /// Replace an existing row at the position instead of failing
    pub overwrite: bool,
}

/// Finalize a begun segment
#[derive(Clone, Debug, Default)]
pub struct CommitSegment {
    pub object_stream: ObjectStream,
    pub position: SegmentPosition,
    pub root_piece_id: PieceId,
    pub pieces: Pieces,

    pub encrypted_key_nonce: Vec<u8>,
    pub encrypted_key: Vec<u8>,
    pub encrypted_etag: Vec<u8>,

    pub encrypted_size: i32,
    /// Writer's idea of the offset, checked for sign only
    pub plain_offset: i64,
    pub plain_size: i32,

    pub redundancy: RedundancyScheme,
}

impl CommitSegment {
    fn validate(&self) -> Result<()> {
        validate::object_stream(&self.object_stream)?;
        validate::root_piece_id(&self.root_piece_id)?;
        validate::pieces(&self.pieces)?;

        if self.encrypted_key.is_empty() {
            return Err(Error::invalid_request("EncryptedKey missing"));
        }
        if self.encrypted_key_nonce.is_empty() {
            return Err(Error::invalid_request("EncryptedKeyNonce missing"));
        }
        if self.encrypted_size <= 0 {
            return Err(Error::invalid_request("EncryptedSize negative or zero"));
        }
        if self.plain_size <= 0 {
            return Err(Error::invalid_request("PlainSize negative or zero"));
        }
        if self.plain_offset < 0 {
            return Err(Error::invalid_request("PlainOffset negative"));
        }

        validate::redundancy(&self.redundancy)?;
        validate::pieces_fit(&self.pieces, &self.redundancy)?;
        validate::enough_pieces(&self.pieces, &self.redundancy)
    }
}

impl Metabase {
    /// Insert a pending segment row for a pending object
    pub fn begin_segment(&self, opts: BeginSegment) -> Result<()> {
        validate::object_stream(&opts.object_stream)?;
        validate::root_piece_id(&opts.root_piece_id)?;
        validate::pieces(&opts.pieces)?;
        validate::redundancy(&opts.redundancy)?;
        validate::pieces_fit(&opts.pieces, &opts.redundancy)?;

        let op = "begin_segment";
        let stream = &opts.object_stream;
        let txn = self.write(op)?;

        if pending_object(&txn, stream).with_op(op)?.is_none() {
            return Err(Error::ObjectNotFound("pending object missing".to_string()));
        }

        if let Some(existing) = txn
            .get_segment(stream.stream_id, opts.position)
            .with_op(op)?
        {
            if !opts.overwrite {
                warn!(
                    "Segment {} of {} already exists ({:?})",
                    opts.position, stream, existing.state
                );
                return Err(Error::SegmentAlreadyExists(format!(
                    "position {}",
                    opts.position
                )));
            }
            debug!("Overwriting segment {} of {}", opts.position, stream);
        }

        txn.put_segment(&StoredSegment {
            stream_id: stream.stream_id,
            position: opts.position,
            state: SegmentState::Pending,
            created_at: current_timestamp(),
            root_piece_id: opts.root_piece_id,
            encrypted_key_nonce: Vec::new(),
            encrypted_key: Vec::new(),
            encrypted_etag: Vec::new(),
            encrypted_size: 0,
            plain_size: 0,
            redundancy: opts.redundancy,
            pieces: opts.pieces,
        })
        .with_op(op)?;
        txn.commit().with_op(op)?;

        debug!("Began segment {} of {}", opts.position, stream);
        Ok(())
    }

    /// Finalize the pieces and sizes of a begun segment
    ///
    /// Repeating a commit with the same payload succeeds without changes.
    pub fn commit_segment(&self, opts: CommitSegment) -> Result<()> {
        opts.validate()?;

        let op = "commit_segment";
        let stream = &opts.object_stream;
        let txn = self.write(op)?;

        if pending_object(&txn, stream).with_op(op)?.is_none() {
            return Err(Error::ObjectNotFound("pending object missing".to_string()));
        }

        let Some(existing) = txn
            .get_segment(stream.stream_id, opts.position)
            .with_op(op)?
        else {
            return Err(Error::SegmentNotFound(format!(
                "pending segment {} missing",
                opts.position
            )));
        };

        let segment = StoredSegment {
            stream_id: stream.stream_id,
            position: opts.position,
            state: SegmentState::Committed,
            created_at: existing.created_at,
            root_piece_id: opts.root_piece_id,
            encrypted_key_nonce: opts.encrypted_key_nonce,
            encrypted_key: opts.encrypted_key,
            encrypted_etag: opts.encrypted_etag,
            encrypted_size: opts.encrypted_size,
            plain_size: opts.plain_size,
            redundancy: opts.redundancy,
            pieces: opts.pieces,
        };

        if existing.is_committed() {
            if existing.same_payload(&segment) {
                debug!("Segment {} of {} already committed", opts.position, stream);
                return txn.abort().with_op(op);
            }
            warn!(
                "Segment {} of {} re-committed with different content",
                opts.position, stream
            );
            return Err(Error::conflict(format!(
                "segment {} already committed with different content",
                opts.position
            )));
        }

        txn.put_segment(&segment).with_op(op)?;
        txn.commit().with_op(op)?;

        debug!(
            "Committed segment {} of {} ({} bytes)",
            segment.position, stream, segment.plain_size
        );
        Ok(())
    }

    /// Committed segment at a position, with its derived plain offset
    pub fn get_segment_by_position(
        &self,
        stream_id: StreamId,
        position: SegmentPosition,
    ) -> Result<Segment> {
        validate::stream_id(stream_id)?;

        let op = "get_segment_by_position";
        let txn = self.read(op)?;

        let mut offset = 0i64;
        let mut found = None;
        txn.scan_segments(stream_id, &mut |segment| {
            if segment.position > position {
                return ControlFlow::Break(());
            }
            if !segment.is_committed() {
                return ControlFlow::Continue(());
            }
            if segment.position == position {
                found = Some(Segment::from_stored(segment, offset));
                return ControlFlow::Break(());
            }
            offset += i64::from(segment.plain_size);
            ControlFlow::Continue(())
        })
        .with_op(op)?;

        found.ok_or_else(|| Error::SegmentNotFound(format!("segment {position} missing")))
    }
}
