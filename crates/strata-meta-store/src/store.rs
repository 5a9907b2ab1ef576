//! Persistent metadata store backed by redb.
//!
//! Every metabase operation runs inside exactly one [`ReadTxn`] or
//! [`WriteTxn`]. redb serializes write transactions and serves reads from
//! MVCC snapshots, so an operation never observes a partially applied
//! sibling. A [`WriteTxn`] dropped before [`WriteTxn::commit`] is rolled back.

use crate::tables;
use crate::types::{StoredObject, StoredSegment, StreamEntry};
use redb::{Database, ReadableTable};
use std::ops::ControlFlow;
use std::path::Path;
use strata_common::config::Durability;
use strata_common::{ObjectLocation, SegmentPosition, StreamId, Version};
use tracing::{debug, error};

/// Error type for metadata store operations
#[derive(Debug, thiserror::Error)]
pub enum MetaStoreError {
    #[error("redb error: {0}")]
    Redb(#[from] redb::DatabaseError),
    #[error("redb storage error: {0}")]
    Storage(#[from] redb::StorageError),
    #[error("redb table error: {0}")]
    Table(#[from] redb::TableError),
    #[error("redb transaction error: {0}")]
    Transaction(Box<redb::TransactionError>),
    #[error("redb commit error: {0}")]
    Commit(#[from] redb::CommitError),
    #[error("bincode error: {0}")]
    Bincode(#[from] bincode::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<redb::TransactionError> for MetaStoreError {
    fn from(e: redb::TransactionError) -> Self {
        Self::Transaction(Box::new(e))
    }
}

impl From<MetaStoreError> for strata_common::Error {
    fn from(e: MetaStoreError) -> Self {
        match e {
            MetaStoreError::Bincode(e) => Self::Serialization(e.to_string()),
            MetaStoreError::Io(e) => Self::DiskIo(e),
            other => Self::Storage(other.to_string()),
        }
    }
}

pub type MetaStoreResult<T> = Result<T, MetaStoreError>;

type ObjectKeyRef<'a> = (u128, &'a str, &'a [u8], i64);

fn object_key(location: &ObjectLocation, version: Version) -> ObjectKeyRef<'_> {
    (
        location.project_id.as_u128(),
        location.bucket_name.as_str(),
        location.object_key.as_bytes(),
        version.get(),
    )
}

const fn segment_key(stream_id: StreamId, position: SegmentPosition) -> (u128, u64) {
    (stream_id.as_u128(), position.encode())
}

/// Persistent metadata store backed by redb.
pub struct MetaStore {
    db: Database,
    durability: Durability,
}

impl MetaStore {
    /// Open (or create) the redb database at the given path.
    pub fn open(path: impl AsRef<Path>, durability: Durability) -> MetaStoreResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = Database::create(path)?;

        // Create all tables eagerly so later read txns don't fail
        let write_txn = db.begin_write()?;
        {
            let _t = write_txn.open_table(tables::OBJECTS)?;
            let _t = write_txn.open_table(tables::STREAMS)?;
            let _t = write_txn.open_table(tables::SEGMENTS)?;
        }
        write_txn.commit()?;

        debug!("Opened metabase store at {}", path.display());
        Ok(Self { db, durability })
    }

    /// Begin a snapshot read transaction
    pub fn begin_read(&self) -> MetaStoreResult<ReadTxn> {
        Ok(ReadTxn {
            txn: self.db.begin_read()?,
        })
    }

    /// Begin a write transaction, blocking while another writer is active
    pub fn begin_write(&self) -> MetaStoreResult<WriteTxn> {
        let mut txn = self.db.begin_write()?;
        txn.set_durability(match self.durability {
            Durability::Immediate => redb::Durability::Immediate,
            Durability::Eventual => redb::Durability::Eventual,
            Durability::None => redb::Durability::None,
        });
        Ok(WriteTxn { txn })
    }
}

/// Read access shared by read and write transactions
pub trait StoreRead {
    /// Object row at an exact version
    fn get_object(
        &self,
        location: &ObjectLocation,
        version: Version,
    ) -> MetaStoreResult<Option<StoredObject>>;

    /// All versions at a location, ascending by version
    fn objects_at(&self, location: &ObjectLocation) -> MetaStoreResult<Vec<StoredObject>>;

    /// Stream index entry
    fn stream_entry(&self, stream_id: StreamId) -> MetaStoreResult<Option<StreamEntry>>;

    /// Segment row at an exact position
    fn get_segment(
        &self,
        stream_id: StreamId,
        position: SegmentPosition,
    ) -> MetaStoreResult<Option<StoredSegment>>;

    /// Visit the segment rows of a stream in position order until `visit` breaks
    fn scan_segments(
        &self,
        stream_id: StreamId,
        visit: &mut dyn FnMut(StoredSegment) -> ControlFlow<()>,
    ) -> MetaStoreResult<()>;

    /// Every object row, in key order
    fn all_objects(&self) -> MetaStoreResult<Vec<StoredObject>>;

    /// Every segment row, in key order
    fn all_segments(&self) -> MetaStoreResult<Vec<StoredSegment>>;

    /// All segment rows of a stream, in position order
    fn segments(&self, stream_id: StreamId) -> MetaStoreResult<Vec<StoredSegment>> {
        let mut result = Vec::new();
        self.scan_segments(stream_id, &mut |segment| {
            result.push(segment);
            ControlFlow::Continue(())
        })?;
        Ok(result)
    }
}

// ---- Generic table helpers ----

fn read_object<T>(
    table: &T,
    location: &ObjectLocation,
    version: Version,
) -> MetaStoreResult<Option<StoredObject>>
where
    T: ReadableTable<(u128, &'static str, &'static [u8], i64), &'static [u8]>,
{
    match table.get(object_key(location, version))? {
        Some(val) => Ok(Some(bincode::deserialize(val.value())?)),
        None => Ok(None),
    }
}

fn read_objects_at<T>(table: &T, location: &ObjectLocation) -> MetaStoreResult<Vec<StoredObject>>
where
    T: ReadableTable<(u128, &'static str, &'static [u8], i64), &'static [u8]>,
{
    let start = object_key(location, Version::new(i64::MIN));
    let end = object_key(location, Version::new(i64::MAX));
    let mut result = Vec::new();
    for entry in table.range(start..=end)? {
        let entry = entry?;
        result.push(bincode::deserialize(entry.1.value())?);
    }
    Ok(result)
}

fn read_stream_entry<T>(table: &T, stream_id: StreamId) -> MetaStoreResult<Option<StreamEntry>>
where
    T: ReadableTable<u128, &'static [u8]>,
{
    match table.get(stream_id.as_u128())? {
        Some(val) => Ok(Some(bincode::deserialize(val.value())?)),
        None => Ok(None),
    }
}

fn read_segment<T>(
    table: &T,
    stream_id: StreamId,
    position: SegmentPosition,
) -> MetaStoreResult<Option<StoredSegment>>
where
    T: ReadableTable<(u128, u64), &'static [u8]>,
{
    match table.get(segment_key(stream_id, position))? {
        Some(val) => Ok(Some(bincode::deserialize(val.value())?)),
        None => Ok(None),
    }
}

fn visit_segments<T>(
    table: &T,
    stream_id: StreamId,
    visit: &mut dyn FnMut(StoredSegment) -> ControlFlow<()>,
) -> MetaStoreResult<()>
where
    T: ReadableTable<(u128, u64), &'static [u8]>,
{
    let sid = stream_id.as_u128();
    for entry in table.range((sid, 0u64)..=(sid, u64::MAX))? {
        let entry = entry?;
        let segment: StoredSegment = bincode::deserialize(entry.1.value())?;
        if visit(segment).is_break() {
            break;
        }
    }
    Ok(())
}

fn decode_all<K, T, R>(table: &T) -> MetaStoreResult<Vec<R>>
where
    K: redb::Key + 'static,
    T: ReadableTable<K, &'static [u8]>,
    R: serde::de::DeserializeOwned,
{
    let mut result = Vec::new();
    for entry in table.iter()? {
        let entry = entry?;
        match bincode::deserialize::<R>(entry.1.value()) {
            Ok(val) => result.push(val),
            Err(e) => {
                error!("Failed to decode entry: {}", e);
                return Err(e.into());
            }
        }
    }
    Ok(result)
}

// ---- Read transaction ----

/// Snapshot read transaction
pub struct ReadTxn {
    txn: redb::ReadTransaction,
}

impl StoreRead for ReadTxn {
    fn get_object(
        &self,
        location: &ObjectLocation,
        version: Version,
    ) -> MetaStoreResult<Option<StoredObject>> {
        read_object(&self.txn.open_table(tables::OBJECTS)?, location, version)
    }

    fn objects_at(&self, location: &ObjectLocation) -> MetaStoreResult<Vec<StoredObject>> {
        read_objects_at(&self.txn.open_table(tables::OBJECTS)?, location)
    }

    fn stream_entry(&self, stream_id: StreamId) -> MetaStoreResult<Option<StreamEntry>> {
        read_stream_entry(&self.txn.open_table(tables::STREAMS)?, stream_id)
    }

    fn get_segment(
        &self,
        stream_id: StreamId,
        position: SegmentPosition,
    ) -> MetaStoreResult<Option<StoredSegment>> {
        read_segment(&self.txn.open_table(tables::SEGMENTS)?, stream_id, position)
    }

    fn scan_segments(
        &self,
        stream_id: StreamId,
        visit: &mut dyn FnMut(StoredSegment) -> ControlFlow<()>,
    ) -> MetaStoreResult<()> {
        visit_segments(&self.txn.open_table(tables::SEGMENTS)?, stream_id, visit)
    }

    fn all_objects(&self) -> MetaStoreResult<Vec<StoredObject>> {
        decode_all(&self.txn.open_table(tables::OBJECTS)?)
    }

    fn all_segments(&self) -> MetaStoreResult<Vec<StoredSegment>> {
        decode_all(&self.txn.open_table(tables::SEGMENTS)?)
    }
}

// ---- Write transaction ----

/// Serializable write transaction
///
/// Tables are opened per call; redb allows one open handle per table at a
/// time, which this keeps trivially true.
pub struct WriteTxn {
    txn: redb::WriteTransaction,
}

impl WriteTxn {
    /// Insert or replace an object row
    pub fn put_object(&self, object: &StoredObject) -> MetaStoreResult<()> {
        let bytes = bincode::serialize(object)?;
        let location = object.stream.location();
        let mut table = self.txn.open_table(tables::OBJECTS)?;
        table.insert(object_key(&location, object.stream.version), bytes.as_slice())?;
        Ok(())
    }

    /// Remove an object row, returning it if present
    pub fn remove_object(
        &self,
        location: &ObjectLocation,
        version: Version,
    ) -> MetaStoreResult<Option<StoredObject>> {
        let mut table = self.txn.open_table(tables::OBJECTS)?;
        let removed = table.remove(object_key(location, version))?;
        match removed {
            Some(val) => Ok(Some(bincode::deserialize(val.value())?)),
            None => Ok(None),
        }
    }

    /// Insert or replace a stream index entry
    pub fn put_stream_entry(&self, stream_id: StreamId, entry: &StreamEntry) -> MetaStoreResult<()> {
        let bytes = bincode::serialize(entry)?;
        let mut table = self.txn.open_table(tables::STREAMS)?;
        table.insert(stream_id.as_u128(), bytes.as_slice())?;
        Ok(())
    }

    /// Remove a stream index entry
    pub fn remove_stream_entry(&self, stream_id: StreamId) -> MetaStoreResult<()> {
        let mut table = self.txn.open_table(tables::STREAMS)?;
        table.remove(stream_id.as_u128())?;
        Ok(())
    }

    /// Insert or replace a segment row
    pub fn put_segment(&self, segment: &StoredSegment) -> MetaStoreResult<()> {
        let bytes = bincode::serialize(segment)?;
        let mut table = self.txn.open_table(tables::SEGMENTS)?;
        table.insert(
            segment_key(segment.stream_id, segment.position),
            bytes.as_slice(),
        )?;
        Ok(())
    }

    /// Remove every segment row of a stream, returning the removed rows
    pub fn remove_segments(&self, stream_id: StreamId) -> MetaStoreResult<Vec<StoredSegment>> {
        // Collect first, the range borrows the table
        let removed = self.segments(stream_id)?;
        if !removed.is_empty() {
            let mut table = self.txn.open_table(tables::SEGMENTS)?;
            for segment in &removed {
                table.remove(segment_key(stream_id, segment.position))?;
            }
        }
        Ok(removed)
    }

    /// Remove an object row together with its stream entry and segments
    pub fn remove_object_cascade(
        &self,
        location: &ObjectLocation,
        version: Version,
    ) -> MetaStoreResult<Option<(StoredObject, Vec<StoredSegment>)>> {
        let Some(object) = self.remove_object(location, version)? else {
            return Ok(None);
        };
        self.remove_stream_entry(object.stream.stream_id)?;
        let segments = self.remove_segments(object.stream.stream_id)?;
        Ok(Some((object, segments)))
    }

    /// Commit the transaction
    pub fn commit(self) -> MetaStoreResult<()> {
        self.txn.commit()?;
        Ok(())
    }

    /// Roll back the transaction explicitly
    pub fn abort(self) -> MetaStoreResult<()> {
        self.txn.abort()?;
        Ok(())
    }
}

impl StoreRead for WriteTxn {
    fn get_object(
        &self,
        location: &ObjectLocation,
        version: Version,
    ) -> MetaStoreResult<Option<StoredObject>> {
        read_object(&self.txn.open_table(tables::OBJECTS)?, location, version)
    }

    fn objects_at(&self, location: &ObjectLocation) -> MetaStoreResult<Vec<StoredObject>> {
        read_objects_at(&self.txn.open_table(tables::OBJECTS)?, location)
    }

    fn stream_entry(&self, stream_id: StreamId) -> MetaStoreResult<Option<StreamEntry>> {
        read_stream_entry(&self.txn.open_table(tables::STREAMS)?, stream_id)
    }

    fn get_segment(
        &self,
        stream_id: StreamId,
        position: SegmentPosition,
    ) -> MetaStoreResult<Option<StoredSegment>> {
        read_segment(&self.txn.open_table(tables::SEGMENTS)?, stream_id, position)
    }

    fn scan_segments(
        &self,
        stream_id: StreamId,
        visit: &mut dyn FnMut(StoredSegment) -> ControlFlow<()>,
    ) -> MetaStoreResult<()> {
        visit_segments(&self.txn.open_table(tables::SEGMENTS)?, stream_id, visit)
    }

    fn all_objects(&self) -> MetaStoreResult<Vec<StoredObject>> {
        decode_all(&self.txn.open_table(tables::OBJECTS)?)
    }

    fn all_segments(&self) -> MetaStoreResult<Vec<StoredSegment>> {
        decode_all(&self.txn.open_table(tables::SEGMENTS)?)
    }
}
