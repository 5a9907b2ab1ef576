//! Object lifecycle: begin, commit, delete and lookup of object versions
//!
//! An object is begun as `Pending`, receives segments through the segment
//! engine and becomes visible only when [`Metabase::commit_object`] flips it
//! to `Committed`. The commit recomputes every rollup from the persisted
//! segments and replaces any other committed version at the location in the
//! same transaction, so readers see either the old version or the new one.

use crate::db::{Metabase, WithOp};
use crate::validate;
use strata_common::config::PendingObjectPolicy;
use strata_common::{
    EncryptionParameters, Error, ObjectLocation, ObjectStatus, ObjectStream, PieceId, Pieces,
    Result, StreamId, Version, current_timestamp,
};
use strata_meta_store::{StoreRead, StoredObject, StoredSegment, StreamEntry, WriteTxn};
use tracing::{debug, info, warn};

/// Object version as returned to callers
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Object {
    pub stream: ObjectStream,
    pub status: ObjectStatus,
    pub created_at: u64,
    pub committed_at: Option<u64>,
    pub encryption: EncryptionParameters,
    pub segment_count: u32,
    pub total_plain_size: i64,
    pub total_encrypted_size: i64,
    pub fixed_segment_size: i32,
    pub encrypted_metadata_nonce: Vec<u8>,
    pub encrypted_metadata: Vec<u8>,
    pub encrypted_metadata_encrypted_key: Vec<u8>,
}

impl From<StoredObject> for Object {
    fn from(o: StoredObject) -> Self {
        Self {
            stream: o.stream,
            status: o.status,
            created_at: o.created_at,
            committed_at: o.committed_at,
            encryption: o.encryption,
            segment_count: o.segment_count,
            total_plain_size: o.total_plain_size,
            total_encrypted_size: o.total_encrypted_size,
            fixed_segment_size: o.fixed_segment_size,
            encrypted_metadata_nonce: o.encrypted_metadata_nonce,
            encrypted_metadata: o.encrypted_metadata,
            encrypted_metadata_encrypted_key: o.encrypted_metadata_encrypted_key,
        }
    }
}

/// Begin an object at the version after the highest one at the location
#[derive(Clone, Debug, Default)]
pub struct BeginObjectNextVersion {
    pub location: ObjectLocation,
    pub stream_id: StreamId,
    pub encryption: EncryptionParameters,
}

/// Begin an object at a caller-chosen version
#[derive(Clone, Debug, Default)]
pub struct BeginObjectExactVersion {
    pub object_stream: ObjectStream,
    pub encryption: EncryptionParameters,
}

/// Commit a pending object
#[derive(Clone, Debug, Default)]
pub struct CommitObject {
    pub object_stream: ObjectStream,
    /// Minimum number of committed segments the writer uploaded
    pub expected_segment_count: Option<u32>,

    pub encrypted_metadata_nonce: Vec<u8>,
    pub encrypted_metadata: Vec<u8>,
    pub encrypted_metadata_encrypted_key: Vec<u8>,
}

/// Pieces of a deleted segment, left for an external collector to reclaim
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeletedSegmentInfo {
    pub root_piece_id: PieceId,
    pub pieces: Pieces,
}

impl From<StoredSegment> for DeletedSegmentInfo {
    fn from(segment: StoredSegment) -> Self {
        Self {
            root_piece_id: segment.root_piece_id,
            pieces: segment.pieces,
        }
    }
}

/// Everything removed by a delete operation
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DeleteObjectResult {
    pub objects: Vec<Object>,
    pub segments: Vec<DeletedSegmentInfo>,
}

impl DeleteObjectResult {
    fn push(&mut self, object: StoredObject, segments: Vec<StoredSegment>) {
        self.objects.push(object.into());
        self.segments
            .extend(segments.into_iter().map(DeletedSegmentInfo::from));
    }
}

const PENDING_MISSING: &str = "object with specified version and pending status is missing";

/// Plain size shared by all segments, the last one may be shorter
///
/// 0 for an empty object, -1 when the sizes are irregular.
fn fixed_segment_size(segments: &[StoredSegment]) -> i32 {
    let Some((last, rest)) = segments.split_last() else {
        return 0;
    };
    let Some(first) = rest.first() else {
        return last.plain_size;
    };
    let size = first.plain_size;
    if rest.iter().any(|s| s.plain_size != size) || last.plain_size > size {
        return -1;
    }
    size
}

/// Pending object of `stream`, matching both the version and the stream id
pub(crate) fn pending_object(
    txn: &impl StoreRead,
    stream: &ObjectStream,
) -> strata_meta_store::MetaStoreResult<Option<StoredObject>> {
    Ok(txn
        .get_object(&stream.location(), stream.version)?
        .filter(|o| o.is_pending() && o.stream.stream_id == stream.stream_id))
}

impl Metabase {
    /// Begin a new pending object at the next free version of its location
    pub fn begin_object_next_version(&self, opts: BeginObjectNextVersion) -> Result<Object> {
        validate::object_location(&opts.location)?;
        validate::stream_id(opts.stream_id)?;
        validate::encryption(&opts.encryption)?;

        let op = "begin_object_next_version";
        let txn = self.write(op)?;
        ensure_stream_unused(&txn, opts.stream_id)?;

        let existing = txn.objects_at(&opts.location).with_op(op)?;
        if self.config().pending_object_policy == PendingObjectPolicy::SinglePending
            && let Some(pending) = existing.iter().find(|o| o.is_pending())
        {
            warn!(
                "Rejecting begin at {}: version {} is already pending",
                opts.location, pending.stream.version
            );
            return Err(Error::conflict(format!(
                "pending object already exists at version {}",
                pending.stream.version
            )));
        }

        let version = match existing.last() {
            None => Version::new(1),
            Some(o) if o.stream.version.get() == i64::MAX => {
                return Err(Error::conflict("no versions left at location"));
            }
            Some(o) => o.stream.version.next(),
        };

        let stream = opts.location.with_version(version, opts.stream_id);
        let object = insert_pending(&txn, stream, opts.encryption, op)?;
        txn.commit().with_op(op)?;

        debug!("Began object {}", object.stream);
        Ok(object.into())
    }

    /// Begin a new pending object at an exact version
    ///
    /// The pending-object policy does not apply. The version may be lower or
    /// higher than the existing ones but must not be taken.
    pub fn begin_object_exact_version(&self, opts: BeginObjectExactVersion) -> Result<Object> {
        validate::object_stream(&opts.object_stream)?;
        validate::encryption(&opts.encryption)?;

        let op = "begin_object_exact_version";
        let stream = opts.object_stream;
        let txn = self.write(op)?;
        ensure_stream_unused(&txn, stream.stream_id)?;

        if txn
            .get_object(&stream.location(), stream.version)
            .with_op(op)?
            .is_some()
        {
            warn!("Rejecting exact begin of {}: version taken", stream);
            return Err(Error::ObjectAlreadyExists(format!("version {}", stream.version)));
        }

        let object = insert_pending(&txn, stream, opts.encryption, op)?;
        txn.commit().with_op(op)?;

        debug!("Began object {} (exact version)", object.stream);
        Ok(object.into())
    }

    /// Commit a pending object, making it the visible version of its location
    pub fn commit_object(&self, opts: CommitObject) -> Result<Object> {
        validate::object_stream(&opts.object_stream)?;
        validate::encrypted_metadata(
            &opts.encrypted_metadata,
            &opts.encrypted_metadata_nonce,
            &opts.encrypted_metadata_encrypted_key,
        )?;

        let op = "commit_object";
        let stream = &opts.object_stream;
        let txn = self.write(op)?;

        let Some(mut object) = pending_object(&txn, stream).with_op(op)? else {
            return Err(Error::ObjectNotFound(PENDING_MISSING.to_string()));
        };

        let segments = txn.segments(stream.stream_id).with_op(op)?;
        if let Some(pending) = segments.iter().find(|s| !s.is_committed()) {
            warn!(
                "Commit of {} blocked by pending segment {}",
                stream, pending.position
            );
            return Err(Error::conflict(format!(
                "segment {} is still being uploaded",
                pending.position
            )));
        }

        let segment_count = u32::try_from(segments.len())
            .map_err(|_| Error::internal("segment count overflows u32"))?;
        if let Some(expected) = opts.expected_segment_count
            && segment_count < expected
        {
            warn!(
                "Commit of {} is incomplete: {} of {} segments",
                stream, segment_count, expected
            );
            return Err(Error::conflict(format!(
                "object is not complete: expected {expected} segments, found {segment_count}"
            )));
        }

        object.segment_count = segment_count;
        object.total_plain_size = segments.iter().map(|s| i64::from(s.plain_size)).sum();
        object.total_encrypted_size = segments.iter().map(|s| i64::from(s.encrypted_size)).sum();
        object.fixed_segment_size = fixed_segment_size(&segments);

        // Replace whatever was visible at the location
        let location = stream.location();
        let mut replaced = 0usize;
        for other in txn.objects_at(&location).with_op(op)? {
            if other.is_committed() && other.stream.version != stream.version {
                txn.remove_object_cascade(&location, other.stream.version)
                    .with_op(op)?;
                replaced += 1;
            }
        }

        object.status = ObjectStatus::Committed;
        object.committed_at = Some(current_timestamp());
        object.encrypted_metadata_nonce = opts.encrypted_metadata_nonce;
        object.encrypted_metadata = opts.encrypted_metadata;
        object.encrypted_metadata_encrypted_key = opts.encrypted_metadata_encrypted_key;
        txn.put_object(&object).with_op(op)?;
        txn.commit().with_op(op)?;

        info!(
            "Committed object {} ({} segments, {} bytes, replaced {})",
            object.stream, object.segment_count, object.total_plain_size, replaced
        );
        Ok(object.into())
    }

    /// Delete one exact version, pending or committed
    pub fn delete_object_exact_version(
        &self,
        location: &ObjectLocation,
        version: Version,
    ) -> Result<DeleteObjectResult> {
        validate::object_location(location)?;
        validate::version(version)?;

        let op = "delete_object_exact_version";
        let txn = self.write(op)?;
        let Some((object, segments)) = txn
            .remove_object_cascade(location, version)
            .with_op(op)?
        else {
            return Err(Error::ObjectNotFound(format!(
                "object {location} version {version} not found"
            )));
        };
        txn.commit().with_op(op)?;

        info!("Deleted object {} ({} segments)", object.stream, segments.len());
        let mut result = DeleteObjectResult::default();
        result.push(object, segments);
        Ok(result)
    }

    /// Abandon a pending upload
    pub fn delete_pending_object(&self, stream: &ObjectStream) -> Result<DeleteObjectResult> {
        validate::object_stream(stream)?;

        let op = "delete_pending_object";
        let txn = self.write(op)?;
        if pending_object(&txn, stream).with_op(op)?.is_none() {
            return Err(Error::ObjectNotFound(PENDING_MISSING.to_string()));
        }
        let Some((object, segments)) = txn
            .remove_object_cascade(&stream.location(), stream.version)
            .with_op(op)?
        else {
            return Err(Error::ObjectNotFound(PENDING_MISSING.to_string()));
        };
        txn.commit().with_op(op)?;

        info!(
            "Deleted pending object {} ({} segments)",
            object.stream,
            segments.len()
        );
        let mut result = DeleteObjectResult::default();
        result.push(object, segments);
        Ok(result)
    }

    /// Delete the visible (highest committed) version at a location
    pub fn delete_object_latest_version(
        &self,
        location: &ObjectLocation,
    ) -> Result<DeleteObjectResult> {
        validate::object_location(location)?;

        let op = "delete_object_latest_version";
        let txn = self.write(op)?;
        let latest = latest_committed(&txn, location, op)?;
        let Some((object, segments)) = txn
            .remove_object_cascade(location, latest.stream.version)
            .with_op(op)?
        else {
            return Err(Error::ObjectNotFound(format!("object {location} not found")));
        };
        txn.commit().with_op(op)?;

        info!("Deleted object {} ({} segments)", object.stream, segments.len());
        let mut result = DeleteObjectResult::default();
        result.push(object, segments);
        Ok(result)
    }

    /// Object at an exact version, pending or committed
    pub fn get_object_exact_version(
        &self,
        location: &ObjectLocation,
        version: Version,
    ) -> Result<Object> {
        validate::object_location(location)?;
        validate::version(version)?;

        let op = "get_object_exact_version";
        let txn = self.read(op)?;
        txn.get_object(location, version)
            .with_op(op)?
            .map(Object::from)
            .ok_or_else(|| {
                Error::ObjectNotFound(format!("object {location} version {version} not found"))
            })
    }

    /// Visible committed object at a location
    pub fn get_object_latest_version(&self, location: &ObjectLocation) -> Result<Object> {
        validate::object_location(location)?;

        let op = "get_object_latest_version";
        let txn = self.read(op)?;
        latest_committed(&txn, location, op).map(Object::from)
    }
}

fn ensure_stream_unused(txn: &WriteTxn, stream_id: StreamId) -> Result<()> {
    if txn.stream_entry(stream_id).with_op("stream_entry")?.is_some() {
        warn!("Rejecting begin: stream {} already in use", stream_id);
        return Err(Error::conflict(format!("stream {stream_id} already in use")));
    }
    Ok(())
}

fn insert_pending(
    txn: &WriteTxn,
    stream: ObjectStream,
    encryption: EncryptionParameters,
    op: &'static str,
) -> Result<StoredObject> {
    let object = StoredObject::pending(stream, encryption, current_timestamp());
    txn.put_object(&object).with_op(op)?;
    txn.put_stream_entry(object.stream.stream_id, &StreamEntry::from(&object.stream))
        .with_op(op)?;
    Ok(object)
}

fn latest_committed(
    txn: &impl StoreRead,
    location: &ObjectLocation,
    op: &'static str,
) -> Result<StoredObject> {
    txn.objects_at(location)
        .with_op(op)?
        .into_iter()
        .rev()
        .find(StoredObject::is_committed)
        .ok_or_else(|| Error::ObjectNotFound(format!("object {location} not found")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{self, test_metabase, test_metabase_with};
    use strata_common::{CipherSuite, SegmentPosition};

    fn begin_next(db: &Metabase, location: &ObjectLocation) -> Result<Object> {
        db.begin_object_next_version(BeginObjectNextVersion {
            location: location.clone(),
            stream_id: StreamId::new(),
            encryption: testing::default_encryption(),
        })
    }

    fn begin_exact(db: &Metabase, stream: &ObjectStream) -> Result<Object> {
        db.begin_object_exact_version(BeginObjectExactVersion {
            object_stream: stream.clone(),
            encryption: testing::default_encryption(),
        })
    }

    #[test]
    fn test_begin_next_version_validation() {
        let (_dir, db) = test_metabase();
        let location = testing::random_location();

        let mut opts = BeginObjectNextVersion {
            location: location.clone(),
            stream_id: StreamId::nil(),
            encryption: testing::default_encryption(),
        };
        let err = db.begin_object_next_version(opts.clone()).unwrap_err();
        assert!(err.is_invalid_request());
        assert_eq!(err.message(), "StreamID missing");

        opts.stream_id = StreamId::new();
        opts.encryption = EncryptionParameters::new(CipherSuite::AesGcm, 0);
        let err = db.begin_object_next_version(opts).unwrap_err();
        assert_eq!(err.message(), "Encryption.BlockSize is negative or zero");

        assert!(db.store().begin_read().unwrap().all_objects().unwrap().is_empty());
    }

    #[test]
    fn test_begin_next_version_assigns_versions() {
        let (_dir, db) = test_metabase_with(PendingObjectPolicy::MultiplePending);
        let location = testing::random_location();

        let first = begin_next(&db, &location).unwrap();
        assert_eq!(first.stream.version, Version::new(1));
        assert_eq!(first.status, ObjectStatus::Pending);
        assert_eq!(first.committed_at, None);

        let second = begin_next(&db, &location).unwrap();
        assert_eq!(second.stream.version, Version::new(2));

        // Versions continue after an exact one
        let exact = location.with_version(Version::new(10), StreamId::new());
        begin_exact(&db, &exact).unwrap();
        assert_eq!(
            begin_next(&db, &location).unwrap().stream.version,
            Version::new(11)
        );
    }

    #[test]
    fn test_single_pending_policy() {
        let (_dir, db) = test_metabase();
        let location = testing::random_location();

        begin_next(&db, &location).unwrap();
        let err = begin_next(&db, &location).unwrap_err();
        assert!(err.is_conflict(), "{err}");

        // Exact versions bypass the policy
        let exact = location.with_version(Version::new(5), StreamId::new());
        begin_exact(&db, &exact).unwrap();

        // Another location is unaffected
        begin_next(&db, &testing::random_location()).unwrap();
    }

    #[test]
    fn test_begin_rejects_reused_stream_id() {
        let (_dir, db) = test_metabase_with(PendingObjectPolicy::MultiplePending);
        let stream = testing::random_object_stream();
        begin_exact(&db, &stream).unwrap();

        let err = db
            .begin_object_next_version(BeginObjectNextVersion {
                location: testing::random_location(),
                stream_id: stream.stream_id,
                encryption: testing::default_encryption(),
            })
            .unwrap_err();
        assert!(err.is_conflict());
    }

    #[test]
    fn test_begin_exact_version() {
        let (_dir, db) = test_metabase();
        let mut stream = testing::random_object_stream();

        stream.version = Version::new(0);
        let err = begin_exact(&db, &stream).unwrap_err();
        assert_eq!(err.message(), "Version invalid: 0");

        stream.version = Version::new(100);
        let object = begin_exact(&db, &stream).unwrap();
        assert_eq!(object.stream, stream);

        let mut taken = stream.clone();
        taken.stream_id = StreamId::new();
        let err = begin_exact(&db, &taken).unwrap_err();
        assert!(err.is_conflict());
        assert_eq!(err.message(), "object already exists: version 100");
        assert_eq!(err.to_string(), err.message());

        // Lower versions are allowed
        let mut lower = stream;
        lower.version = Version::new(3);
        lower.stream_id = StreamId::new();
        begin_exact(&db, &lower).unwrap();
    }

    #[test]
    fn test_commit_object_rollup() {
        let (_dir, db) = test_metabase();
        let stream = testing::random_object_stream();
        testing::begin_object(&db, &stream);
        testing::upload_segment(&db, &stream, SegmentPosition::new(0, 1), 300);
        testing::upload_segment(&db, &stream, SegmentPosition::new(0, 0), 512);
        testing::upload_segment(&db, &stream, SegmentPosition::new(0, 2), 512);

        let object = db
            .commit_object(CommitObject {
                object_stream: stream.clone(),
                expected_segment_count: Some(3),
                encrypted_metadata_nonce: vec![1],
                encrypted_metadata: vec![2],
                encrypted_metadata_encrypted_key: vec![3],
            })
            .unwrap();

        assert_eq!(object.status, ObjectStatus::Committed);
        assert!(object.committed_at.is_some());
        assert_eq!(object.segment_count, 3);
        assert_eq!(object.total_plain_size, 1324);
        assert_eq!(object.total_encrypted_size, 3 * 1024);
        assert_eq!(object.fixed_segment_size, -1);
        assert_eq!(object.encrypted_metadata, vec![2]);

        let stored = db
            .get_object_exact_version(&stream.location(), stream.version)
            .unwrap();
        assert_eq!(stored, object);
    }

    #[test]
    fn test_commit_object_fixed_segment_size() {
        let (_dir, db) = test_metabase();
        let stream = testing::random_object_stream();
        let object = testing::create_object(&db, &stream, 4);
        assert_eq!(object.fixed_segment_size, 512);
        assert_eq!(object.total_plain_size, 4 * 512);

        let empty = testing::create_object(&db, &testing::random_object_stream(), 0);
        assert_eq!(empty.segment_count, 0);
        assert_eq!(empty.fixed_segment_size, 0);
    }

    #[test]
    fn test_fixed_segment_size_rules() {
        let sized = |sizes: &[i32]| -> Vec<StoredSegment> {
            sizes
                .iter()
                .enumerate()
                .map(|(i, size)| {
                    let mut s = testing::stored_segment(
                        StreamId::new(),
                        SegmentPosition::new(0, u32::try_from(i).unwrap()),
                    );
                    s.plain_size = *size;
                    s
                })
                .collect()
        };
        assert_eq!(fixed_segment_size(&sized(&[])), 0);
        assert_eq!(fixed_segment_size(&sized(&[7])), 7);
        assert_eq!(fixed_segment_size(&sized(&[8, 8, 3])), 8);
        assert_eq!(fixed_segment_size(&sized(&[8, 8, 8])), 8);
        assert_eq!(fixed_segment_size(&sized(&[8, 8, 9])), -1);
        assert_eq!(fixed_segment_size(&sized(&[8, 7, 3])), -1);
    }

    #[test]
    fn test_commit_object_not_found() {
        let (_dir, db) = test_metabase();
        let stream = testing::random_object_stream();

        let err = db.commit_object(testing::commit_opts(&stream, None)).unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(err.message(), PENDING_MISSING);

        // Stream id mismatch
        testing::begin_object(&db, &stream);
        let mut other = stream.clone();
        other.stream_id = StreamId::new();
        let err = db.commit_object(testing::commit_opts(&other, None)).unwrap_err();
        assert!(err.is_not_found());

        // Already committed
        db.commit_object(testing::commit_opts(&stream, None)).unwrap();
        let err = db.commit_object(testing::commit_opts(&stream, None)).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_commit_object_with_pending_segment() {
        let (_dir, db) = test_metabase();
        let stream = testing::random_object_stream();
        testing::begin_object(&db, &stream);
        testing::upload_segment(&db, &stream, SegmentPosition::new(0, 0), 512);
        db.begin_segment(testing::begin_segment_opts(&stream, SegmentPosition::new(0, 1)))
            .unwrap();

        let err = db.commit_object(testing::commit_opts(&stream, None)).unwrap_err();
        assert!(err.is_conflict(), "{err}");

        // Still pending and retryable once the segment lands
        let object = db
            .get_object_exact_version(&stream.location(), stream.version)
            .unwrap();
        assert_eq!(object.status, ObjectStatus::Pending);

        testing::commit_segment(&db, &stream, SegmentPosition::new(0, 1), 512);
        let object = db.commit_object(testing::commit_opts(&stream, Some(2))).unwrap();
        assert_eq!(object.segment_count, 2);
    }

    #[test]
    fn test_commit_object_expected_count_shortfall() {
        let (_dir, db) = test_metabase();
        let stream = testing::random_object_stream();
        testing::begin_object(&db, &stream);
        testing::upload_segment(&db, &stream, SegmentPosition::new(0, 0), 512);

        let err = db.commit_object(testing::commit_opts(&stream, Some(2))).unwrap_err();
        assert!(err.is_conflict());
        assert_eq!(
            err.message(),
            "object is not complete: expected 2 segments, found 1"
        );

        testing::upload_segment(&db, &stream, SegmentPosition::new(0, 1), 512);
        db.commit_object(testing::commit_opts(&stream, Some(2))).unwrap();
    }

    #[test]
    fn test_commit_replaces_committed_version() {
        let (_dir, db) = test_metabase();
        let location = testing::random_location();

        let first = location.with_version(Version::new(1), StreamId::new());
        testing::create_object(&db, &first, 2);

        let second = location.with_version(Version::new(2), StreamId::new());
        testing::begin_object(&db, &second);
        testing::upload_segment(&db, &second, SegmentPosition::new(0, 0), 100);

        // Old version stays visible until the new commit
        assert_eq!(
            db.get_object_latest_version(&location).unwrap().stream,
            first
        );

        db.commit_object(testing::commit_opts(&second, None)).unwrap();
        let latest = db.get_object_latest_version(&location).unwrap();
        assert_eq!(latest.stream, second);
        assert!(db
            .get_object_exact_version(&location, Version::new(1))
            .unwrap_err()
            .is_not_found());

        let read = db.store().begin_read().unwrap();
        assert!(read.segments(first.stream_id).unwrap().is_empty());
        assert!(read.stream_entry(first.stream_id).unwrap().is_none());
        assert_eq!(read.all_objects().unwrap().len(), 1);
    }

    #[test]
    fn test_commit_exact_lower_version_replaces_higher() {
        let (_dir, db) = test_metabase();
        let location = testing::random_location();

        let high = location.with_version(Version::new(10), StreamId::new());
        testing::create_object(&db, &high, 1);
        let low = location.with_version(Version::new(3), StreamId::new());
        testing::create_object(&db, &low, 1);

        let objects = db.store().begin_read().unwrap().objects_at(&location).unwrap();
        assert_eq!(objects.len(), 1);
        assert_eq!(objects[0].stream, low);
    }

    #[test]
    fn test_commit_keeps_other_pending_uploads() {
        let (_dir, db) = test_metabase_with(PendingObjectPolicy::MultiplePending);
        let location = testing::random_location();

        let a = begin_next(&db, &location).unwrap().stream;
        let b = begin_next(&db, &location).unwrap().stream;
        testing::upload_segment(&db, &b, SegmentPosition::new(0, 0), 10);
        db.commit_object(testing::commit_opts(&b, None)).unwrap();

        // Last commit wins, the other upload may still complete
        let pending = db.get_object_exact_version(&location, a.version).unwrap();
        assert_eq!(pending.status, ObjectStatus::Pending);
        db.commit_object(testing::commit_opts(&a, None)).unwrap();
        assert_eq!(db.get_object_latest_version(&location).unwrap().stream, a);
    }

    #[test]
    fn test_delete_exact_version() {
        let (_dir, db) = test_metabase();
        let stream = testing::random_object_stream();
        testing::create_object(&db, &stream, 3);

        let result = db
            .delete_object_exact_version(&stream.location(), stream.version)
            .unwrap();
        assert_eq!(result.objects.len(), 1);
        assert_eq!(result.objects[0].stream, stream);
        assert_eq!(result.segments.len(), 3);
        assert_eq!(result.segments[0].root_piece_id, testing::root_piece_id());

        let read = db.store().begin_read().unwrap();
        assert!(read.all_objects().unwrap().is_empty());
        assert!(read.all_segments().unwrap().is_empty());
        assert!(read.stream_entry(stream.stream_id).unwrap().is_none());

        let err = db
            .delete_object_exact_version(&stream.location(), stream.version)
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_delete_pending_object() {
        let (_dir, db) = test_metabase();
        let stream = testing::random_object_stream();
        testing::begin_object(&db, &stream);
        testing::upload_segment(&db, &stream, SegmentPosition::new(0, 0), 512);
        db.begin_segment(testing::begin_segment_opts(&stream, SegmentPosition::new(0, 1)))
            .unwrap();

        let mut wrong = stream.clone();
        wrong.stream_id = StreamId::new();
        assert!(db.delete_pending_object(&wrong).unwrap_err().is_not_found());

        let result = db.delete_pending_object(&stream).unwrap();
        assert_eq!(result.segments.len(), 2);
        assert!(db.store().begin_read().unwrap().all_segments().unwrap().is_empty());

        // A committed object cannot be abandoned
        let committed = testing::random_object_stream();
        testing::create_object(&db, &committed, 1);
        let err = db.delete_pending_object(&committed).unwrap_err();
        assert_eq!(err.message(), PENDING_MISSING);
    }

    #[test]
    fn test_delete_latest_version() {
        let (_dir, db) = test_metabase_with(PendingObjectPolicy::MultiplePending);
        let location = testing::random_location();

        assert!(db
            .delete_object_latest_version(&location)
            .unwrap_err()
            .is_not_found());

        let committed = location.with_version(Version::new(1), StreamId::new());
        testing::create_object(&db, &committed, 2);
        let pending = location.with_version(Version::new(2), StreamId::new());
        testing::begin_object(&db, &pending);

        let result = db.delete_object_latest_version(&location).unwrap();
        assert_eq!(result.objects[0].stream, committed);

        // The pending upload survives
        let object = db.get_object_exact_version(&location, pending.version).unwrap();
        assert_eq!(object.status, ObjectStatus::Pending);
        assert!(db.get_object_latest_version(&location).unwrap_err().is_not_found());
    }
}
