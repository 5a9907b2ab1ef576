//! Fixtures shared by the engine tests

use crate::listing::ListSegments;
use crate::object::{BeginObjectExactVersion, CommitObject, Object};
use crate::segment::{BeginSegment, CommitSegment, Segment};
use crate::Metabase;
use rand::Rng;
use strata_common::config::{Durability, MetabaseConfig, PendingObjectPolicy};
use strata_common::{
    BucketName, CipherSuite, EncryptionParameters, NodeId, ObjectKey, ObjectLocation,
    ObjectStream, Piece, PieceId, Pieces, ProjectId, RedundancyScheme, SegmentPosition, StreamId,
    Version,
};
use strata_meta_store::{SegmentState, StoredSegment};
use tempfile::TempDir;

pub fn test_metabase() -> (TempDir, Metabase) {
    test_metabase_with(PendingObjectPolicy::SinglePending)
}

pub fn test_metabase_with(policy: PendingObjectPolicy) -> (TempDir, Metabase) {
    let dir = tempfile::tempdir().unwrap();
    let config = MetabaseConfig {
        pending_object_policy: policy,
        durability: Durability::None,
        ..MetabaseConfig::default()
    };
    let db = Metabase::open_path(dir.path().join("metabase.redb"), config).unwrap();
    (dir, db)
}

pub fn random_location() -> ObjectLocation {
    let mut rng = rand::thread_rng();
    let key: [u8; 16] = rng.r#gen();
    ObjectLocation {
        project_id: ProjectId::from_uuid(uuid::Uuid::new_v4()),
        bucket_name: BucketName::new(format!("bucket-{}", rng.gen_range(0..1000))),
        object_key: ObjectKey::new(key.to_vec()),
    }
}

pub fn random_object_stream() -> ObjectStream {
    random_location().with_version(Version::new(1), StreamId::new())
}

pub const fn default_redundancy() -> RedundancyScheme {
    RedundancyScheme::reed_solomon(2048, 1, 1, 1, 1)
}

pub const fn default_encryption() -> EncryptionParameters {
    EncryptionParameters::new(CipherSuite::AesGcm, 29 * 256)
}

pub fn root_piece_id() -> PieceId {
    let mut bytes = [0u8; 32];
    bytes[0] = 1;
    PieceId::from_bytes(bytes)
}

pub fn default_pieces() -> Pieces {
    let mut node = [0u8; 16];
    node[0] = 2;
    vec![Piece::new(0, NodeId::from_bytes(node))]
}

pub fn begin_object(db: &Metabase, stream: &ObjectStream) -> Object {
    db.begin_object_exact_version(BeginObjectExactVersion {
        object_stream: stream.clone(),
        encryption: default_encryption(),
    })
    .unwrap()
}

pub fn begin_segment_opts(stream: &ObjectStream, position: SegmentPosition) -> BeginSegment {
    BeginSegment {
        object_stream: stream.clone(),
        position,
        root_piece_id: root_piece_id(),
        pieces: default_pieces(),
        redundancy: default_redundancy(),
        overwrite: false,
    }
}

pub fn commit_segment_opts(
    stream: &ObjectStream,
    position: SegmentPosition,
    plain_size: i32,
) -> CommitSegment {
    CommitSegment {
        object_stream: stream.clone(),
        position,
        root_piece_id: root_piece_id(),
        pieces: default_pieces(),
        encrypted_key_nonce: vec![4],
        encrypted_key: vec![3],
        encrypted_etag: vec![5],
        encrypted_size: 1024,
        plain_offset: 0,
        plain_size,
        redundancy: default_redundancy(),
    }
}

pub fn commit_segment(
    db: &Metabase,
    stream: &ObjectStream,
    position: SegmentPosition,
    plain_size: i32,
) {
    db.commit_segment(commit_segment_opts(stream, position, plain_size))
        .unwrap();
}

/// Begin and commit one segment
pub fn upload_segment(
    db: &Metabase,
    stream: &ObjectStream,
    position: SegmentPosition,
    plain_size: i32,
) {
    db.begin_segment(begin_segment_opts(stream, position))
        .unwrap();
    commit_segment(db, stream, position, plain_size);
}

pub fn commit_opts(stream: &ObjectStream, expected_segment_count: Option<u32>) -> CommitObject {
    CommitObject {
        object_stream: stream.clone(),
        expected_segment_count,
        ..CommitObject::default()
    }
}

/// Committed object with `segments` segments of 512 bytes in part 0
pub fn create_object(db: &Metabase, stream: &ObjectStream, segments: u32) -> Object {
    begin_object(db, stream);
    for index in 0..segments {
        upload_segment(db, stream, SegmentPosition::new(0, index), 512);
    }
    db.commit_object(commit_opts(stream, Some(segments)))
        .unwrap()
}

pub fn list_all(db: &Metabase, stream_id: StreamId) -> Vec<Segment> {
    db.list_segments(ListSegments {
        stream_id,
        cursor: None,
        limit: 0,
    })
    .unwrap()
    .segments
}

pub fn stored_segment(stream_id: StreamId, position: SegmentPosition) -> StoredSegment {
    StoredSegment {
        stream_id,
        position,
        state: SegmentState::Committed,
        created_at: 0,
        root_piece_id: root_piece_id(),
        encrypted_key_nonce: vec![4],
        encrypted_key: vec![3],
        encrypted_etag: vec![5],
        encrypted_size: 1024,
        plain_size: 512,
        redundancy: default_redundancy(),
        pieces: default_pieces(),
    }
}
