//! Listing and pagination over committed segments
//!
//! Every listing walks the segment rows of a stream in encoded position
//! order inside one read snapshot. Only committed rows are visible. The plain
//! offset of each row is the running sum of the plain sizes before it, so the
//! offsets are gapless regardless of the order in which parts were committed.
//!
//! Pagination uses a position cursor (exclusive) and a limit; `limit == 0`
//! returns every row. One extra row is read to report `more`.

use crate::db::{Metabase, WithOp};
use crate::segment::Segment;
use crate::validate;
use std::ops::ControlFlow;
use strata_common::{Error, Result, SegmentPosition, StreamId};
use strata_meta_store::{MetaStoreResult, StoreRead, StoredSegment};
use tracing::debug;

/// List the committed segments of one stream
#[derive(Clone, Debug, Default)]
pub struct ListSegments {
    pub stream_id: StreamId,
    /// Return positions strictly after this one, from the start when `None`
    pub cursor: Option<SegmentPosition>,
    pub limit: i32,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ListSegmentsResult {
    pub segments: Vec<Segment>,
    pub more: bool,
}

/// Half-open plain byte range `[plain_start, plain_limit)`
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StreamRange {
    pub plain_start: i64,
    pub plain_limit: i64,
}

impl StreamRange {
    /// Whether a segment at `offset` with `size` plain bytes overlaps the range
    #[must_use]
    pub const fn overlaps(&self, offset: i64, size: i64) -> bool {
        offset < self.plain_limit && offset + size > self.plain_start
    }
}

/// List segment positions of one stream, optionally within a plain byte range
#[derive(Clone, Debug, Default)]
pub struct ListStreamPositions {
    pub stream_id: StreamId,
    pub cursor: Option<SegmentPosition>,
    pub limit: i32,
    pub range: Option<StreamRange>,
}

/// Segment view without piece placement
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SegmentPositionInfo {
    pub position: SegmentPosition,
    pub plain_size: i32,
    pub plain_offset: i64,
    pub created_at: u64,
    pub encrypted_key_nonce: Vec<u8>,
    pub encrypted_key: Vec<u8>,
    pub encrypted_etag: Vec<u8>,
}

impl SegmentPositionInfo {
    fn from_stored(segment: StoredSegment, plain_offset: i64) -> Self {
        Self {
            position: segment.position,
            plain_size: segment.plain_size,
            plain_offset,
            created_at: segment.created_at,
            encrypted_key_nonce: segment.encrypted_key_nonce,
            encrypted_key: segment.encrypted_key,
            encrypted_etag: segment.encrypted_etag,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ListStreamPositionsResult {
    pub segments: Vec<SegmentPositionInfo>,
    pub more: bool,
}

/// List the committed segments of several streams in one snapshot
#[derive(Clone, Debug, Default)]
pub struct ListObjectsSegments {
    pub stream_ids: Vec<StreamId>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ListObjectsSegmentsResult {
    pub segments: Vec<Segment>,
}

/// Collect one page of committed segments of a stream
///
/// `select` sees every committed row after the cursor together with its
/// derived offset and decides whether it belongs to the page. With a limit,
/// the walk stops at the first selected row past the page and reports `more`.
fn scan_page<T>(
    txn: &impl StoreRead,
    stream_id: StreamId,
    cursor: Option<SegmentPosition>,
    limit: Option<usize>,
    mut select: impl FnMut(StoredSegment, i64) -> Option<T>,
) -> MetaStoreResult<(Vec<T>, bool)> {
    let mut page = Vec::new();
    let mut more = false;
    let mut offset = 0i64;

    txn.scan_segments(stream_id, &mut |segment| {
        if !segment.is_committed() {
            return ControlFlow::Continue(());
        }
        let segment_offset = offset;
        offset += i64::from(segment.plain_size);

        if cursor.is_some_and(|c| segment.position <= c) {
            return ControlFlow::Continue(());
        }
        let Some(item) = select(segment, segment_offset) else {
            return ControlFlow::Continue(());
        };
        if limit.is_some_and(|l| page.len() >= l) {
            more = true;
            return ControlFlow::Break(());
        }
        page.push(item);
        ControlFlow::Continue(())
    })?;

    Ok((page, more))
}

impl Metabase {
    /// Committed segments of a stream, ordered by position
    pub fn list_segments(&self, opts: ListSegments) -> Result<ListSegmentsResult> {
        validate::stream_id(opts.stream_id)?;
        validate::limit(opts.limit)?;

        let op = "list_segments";
        let txn = self.read(op)?;
        let (segments, more) = scan_page(
            &txn,
            opts.stream_id,
            opts.cursor,
            self.page_limit(opts.limit),
            |segment, offset| Some(Segment::from_stored(segment, offset)),
        )
        .with_op(op)?;

        debug!(
            "Listed {} segments of {} (more={})",
            segments.len(),
            opts.stream_id,
            more
        );
        Ok(ListSegmentsResult { segments, more })
    }

    /// Committed segment positions of a stream, optionally restricted to the
    /// segments overlapping a plain byte range
    pub fn list_stream_positions(
        &self,
        opts: ListStreamPositions,
    ) -> Result<ListStreamPositionsResult> {
        validate::stream_id(opts.stream_id)?;
        validate::limit(opts.limit)?;
        if let Some(range) = opts.range
            && range.plain_start > range.plain_limit
        {
            return Err(Error::invalid_request(format!(
                "invalid range: {}:{}",
                range.plain_start, range.plain_limit
            )));
        }

        let op = "list_stream_positions";
        let txn = self.read(op)?;
        let (segments, more) = scan_page(
            &txn,
            opts.stream_id,
            opts.cursor,
            self.page_limit(opts.limit),
            |segment, offset| {
                let in_range = opts
                    .range
                    .is_none_or(|r| r.overlaps(offset, i64::from(segment.plain_size)));
                in_range.then(|| SegmentPositionInfo::from_stored(segment, offset))
            },
        )
        .with_op(op)?;

        debug!(
            "Listed {} positions of {} (range={:?}, more={})",
            segments.len(),
            opts.stream_id,
            opts.range,
            more
        );
        Ok(ListStreamPositionsResult { segments, more })
    }

    /// Committed segments of several streams
    ///
    /// Stream ids are visited in byte order and de-duplicated; each stream's
    /// segments carry offsets relative to that stream.
    pub fn list_objects_segments(
        &self,
        opts: ListObjectsSegments,
    ) -> Result<ListObjectsSegmentsResult> {
        if opts.stream_ids.is_empty() {
            return Err(Error::invalid_request("StreamIDs list is empty"));
        }
        if let Some(index) = opts.stream_ids.iter().position(StreamId::is_nil) {
            return Err(Error::invalid_request(format!(
                "StreamID missing: index {index}"
            )));
        }

        let mut stream_ids = opts.stream_ids;
        stream_ids.sort_unstable();
        stream_ids.dedup();

        let op = "list_objects_segments";
        let txn = self.read(op)?;
        let mut segments = Vec::new();
        for stream_id in &stream_ids {
            let (page, _) = scan_page(&txn, *stream_id, None, None, |segment, offset| {
                Some(Segment::from_stored(segment, offset))
            })
            .with_op(op)?;
            segments.extend(page);
        }

        debug!(
            "Listed {} segments of {} streams",
            segments.len(),
            stream_ids.len()
        );
        Ok(ListObjectsSegmentsResult { segments })
    }
}
