//! Core type definitions for the Strata metabase
//!
//! This module defines the identifiers, object addressing and erasure-coding
//! descriptors shared by the store and the metabase engine.

use derive_more::{Display, From, Into};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identifier joining an object version to its segments
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, From, Into)]
pub struct StreamId(Uuid);

impl StreamId {
    /// Generate a new random stream ID
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// The zero value, never valid in a request
    #[must_use]
    pub const fn nil() -> Self {
        Self(Uuid::nil())
    }

    /// Create from existing UUID
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Create from the integer form used as a table key
    #[must_use]
    pub const fn from_u128(value: u128) -> Self {
        Self(Uuid::from_u128(value))
    }

    /// Integer form, ordered like the big-endian bytes
    #[must_use]
    pub const fn as_u128(&self) -> u128 {
        self.0.as_u128()
    }

    /// Check for the zero value
    #[must_use]
    pub const fn is_nil(&self) -> bool {
        self.0.is_nil()
    }

    /// Get as bytes
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }
}

impl Default for StreamId {
    fn default() -> Self {
        Self::nil()
    }
}

impl fmt::Debug for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StreamId({})", self.0)
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of the project owning a bucket
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, From, Into)]
pub struct ProjectId(Uuid);

impl ProjectId {
    /// Generate a new random project ID
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create from existing UUID
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Create from the integer form used as a table key
    #[must_use]
    pub const fn from_u128(value: u128) -> Self {
        Self(Uuid::from_u128(value))
    }

    /// Integer form, ordered like the big-endian bytes
    #[must_use]
    pub const fn as_u128(&self) -> u128 {
        self.0.as_u128()
    }

    /// Check for the zero value
    #[must_use]
    pub const fn is_nil(&self) -> bool {
        self.0.is_nil()
    }
}

impl Default for ProjectId {
    fn default() -> Self {
        Self(Uuid::nil())
    }
}

impl fmt::Debug for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ProjectId({})", self.0)
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a storage node
///
/// Opaque to the metabase: the node registry owns liveness and addressing.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, From, Into)]
pub struct NodeId(Uuid);

impl NodeId {
    /// Generate a new random node ID
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create from existing UUID
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Create from bytes
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(Uuid::from_bytes(bytes))
    }

    /// Get as bytes
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }

    /// Check for the zero value
    #[must_use]
    pub const fn is_nil(&self) -> bool {
        self.0.is_nil()
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self(Uuid::nil())
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self.0)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Root identifier from which every piece id of a segment is derived
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, From, Into)]
pub struct PieceId([u8; 32]);

impl PieceId {
    /// Create from bytes
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get as bytes
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Check for the zero value
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|b| *b == 0)
    }
}

impl fmt::Debug for PieceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PieceId({})", hex::encode(self.0))
    }
}

impl fmt::Display for PieceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

/// Bucket name within a project
#[derive(Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display)]
#[display("{_0}")]
pub struct BucketName(String);

impl BucketName {
    /// Create from a name; emptiness is checked by request validation
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Get the bucket name as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Check for the empty name
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for BucketName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BucketName({:?})", self.0)
    }
}

/// Encrypted object key (path within a bucket)
#[derive(Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, From, Into)]
pub struct ObjectKey(Vec<u8>);

impl ObjectKey {
    /// Create from encrypted key bytes
    #[must_use]
    pub fn new(key: impl Into<Vec<u8>>) -> Self {
        Self(key.into())
    }

    /// Get the raw key bytes
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Check for the empty key
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectKey({})", hex::encode(&self.0))
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(&self.0))
    }
}

/// Object version number, positive for every stored object
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
    Display, From, Into,
)]
pub struct Version(i64);

impl Version {
    /// Create a version number
    #[must_use]
    pub const fn new(version: i64) -> Self {
        Self(version)
    }

    /// Get the raw version number
    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }

    /// The version following this one
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

/// Logical address of an object, shared by all of its versions
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectLocation {
    pub project_id: ProjectId,
    pub bucket_name: BucketName,
    pub object_key: ObjectKey,
}

impl ObjectLocation {
    /// Address a specific version at this location
    #[must_use]
    pub fn with_version(&self, version: Version, stream_id: StreamId) -> ObjectStream {
        ObjectStream {
            project_id: self.project_id,
            bucket_name: self.bucket_name.clone(),
            object_key: self.object_key.clone(),
            version,
            stream_id,
        }
    }
}

impl fmt::Display for ObjectLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            self.project_id, self.bucket_name, self.object_key
        )
    }
}

/// One version of an object together with its stream
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectStream {
    pub project_id: ProjectId,
    pub bucket_name: BucketName,
    pub object_key: ObjectKey,
    pub version: Version,
    pub stream_id: StreamId,
}

impl ObjectStream {
    /// Location shared with the other versions
    #[must_use]
    pub fn location(&self) -> ObjectLocation {
        ObjectLocation {
            project_id: self.project_id,
            bucket_name: self.bucket_name.clone(),
            object_key: self.object_key.clone(),
        }
    }
}

impl fmt::Display for ObjectStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}@{} ({})",
            self.project_id, self.bucket_name, self.object_key, self.version, self.stream_id
        )
    }
}

/// One erasure-coded fragment of a segment
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Piece {
    /// Erasure share number
    pub number: u16,
    /// Node holding the piece
    pub storage_node: NodeId,
}

impl Piece {
    /// Create a new piece
    #[must_use]
    pub const fn new(number: u16, storage_node: NodeId) -> Self {
        Self {
            number,
            storage_node,
        }
    }
}

/// Pieces of one segment, stored inline
pub type Pieces = Vec<Piece>;

/// Erasure coding algorithm
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RedundancyAlgorithm {
    /// Reed-Solomon, any `required_shares` pieces reconstruct the segment
    #[default]
    ReedSolomon,
}

/// Erasure coding parameters of a segment
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RedundancyScheme {
    /// Erasure coding algorithm
    pub algorithm: RedundancyAlgorithm,
    /// Size of one erasure share in bytes
    pub share_size: i32,
    /// Pieces needed to reconstruct the segment
    pub required_shares: i16,
    /// Below this many healthy pieces the segment needs repair
    pub repair_shares: i16,
    /// Pieces an upload aims to store
    pub optimal_shares: i16,
    /// Pieces the encoder produces
    pub total_shares: i16,
}

impl RedundancyScheme {
    /// Create a Reed-Solomon scheme
    #[must_use]
    pub const fn reed_solomon(
        share_size: i32,
        required_shares: i16,
        repair_shares: i16,
        optimal_shares: i16,
        total_shares: i16,
    ) -> Self {
        Self {
            algorithm: RedundancyAlgorithm::ReedSolomon,
            share_size,
            required_shares,
            repair_shares,
            optimal_shares,
            total_shares,
        }
    }

    /// Check `0 < required <= repair <= optimal <= total` and a positive share size
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.share_size > 0
            && self.required_shares > 0
            && self.required_shares <= self.repair_shares
            && self.repair_shares <= self.optimal_shares
            && self.optimal_shares <= self.total_shares
    }

    /// Common 29/35/80/110 scheme with 256 byte shares
    pub const DEFAULT: Self = Self::reed_solomon(256, 29, 35, 80, 110);
}

/// Cipher used for segment and metadata encryption
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CipherSuite {
    /// Not specified by the client
    #[default]
    Unspecified,
    /// No encryption
    Null,
    /// AES-256 in GCM mode
    AesGcm,
    /// XSalsa20 with Poly1305
    SecretBox,
}

/// Encryption parameters of an object
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EncryptionParameters {
    pub cipher_suite: CipherSuite,
    pub block_size: i32,
}

impl EncryptionParameters {
    /// Create encryption parameters
    #[must_use]
    pub const fn new(cipher_suite: CipherSuite, block_size: i32) -> Self {
        Self {
            cipher_suite,
            block_size,
        }
    }
}

/// Lifecycle status of an object
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectStatus {
    /// Segments are still being uploaded
    #[default]
    Pending,
    /// Fully assembled and visible
    Committed,
}

impl fmt::Display for ObjectStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Committed => write!(f, "committed"),
        }
    }
}

/// Current unix time in seconds
#[must_use]
pub fn current_timestamp() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
