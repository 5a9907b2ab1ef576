//! Redb table definitions for persistent metadata storage.

use redb::TableDefinition;

// Key: (project_id, bucket_name, encrypted object key, version), Value: bincode StoredObject
pub const OBJECTS: TableDefinition<(u128, &str, &[u8], i64), &[u8]> =
    TableDefinition::new("objects");

// Key: stream_id, Value: bincode StreamEntry pointing back at the objects row
pub const STREAMS: TableDefinition<u128, &[u8]> = TableDefinition::new("streams");

// Key: (stream_id, encoded segment position), Value: bincode StoredSegment
pub const SEGMENTS: TableDefinition<(u128, u64), &[u8]> = TableDefinition::new("segments");
