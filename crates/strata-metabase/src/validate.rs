//! Request validation shared by the engine operations
//!
//! All checks run before a transaction is opened, so a rejected request
//! never touches the store.

use std::collections::HashSet;
use strata_common::{
    CipherSuite, EncryptionParameters, Error, ObjectLocation, ObjectStream, Piece, PieceId,
    RedundancyScheme, Result, StreamId, Version,
};

pub fn object_location(location: &ObjectLocation) -> Result<()> {
    if location.project_id.is_nil() {
        return Err(Error::invalid_request("ProjectID missing"));
    }
    if location.bucket_name.is_empty() {
        return Err(Error::invalid_request("BucketName missing"));
    }
    if location.object_key.is_empty() {
        return Err(Error::invalid_request("ObjectKey missing"));
    }
    Ok(())
}

pub fn version(version: Version) -> Result<()> {
    if version.get() <= 0 {
        return Err(Error::invalid_request(format!("Version invalid: {version}")));
    }
    Ok(())
}

pub fn stream_id(stream_id: StreamId) -> Result<()> {
    if stream_id.is_nil() {
        return Err(Error::invalid_request("StreamID missing"));
    }
    Ok(())
}

pub fn object_stream(stream: &ObjectStream) -> Result<()> {
    object_location(&stream.location())?;
    version(stream.version)?;
    stream_id(stream.stream_id)
}

pub fn encryption(encryption: &EncryptionParameters) -> Result<()> {
    if encryption.cipher_suite != CipherSuite::Unspecified && encryption.block_size <= 0 {
        return Err(Error::invalid_request(
            "Encryption.BlockSize is negative or zero",
        ));
    }
    Ok(())
}

pub fn encrypted_metadata(metadata: &[u8], nonce: &[u8], encrypted_key: &[u8]) -> Result<()> {
    if metadata.is_empty() {
        if !nonce.is_empty() || !encrypted_key.is_empty() {
            return Err(Error::invalid_request(
                "EncryptedMetadataNonce and EncryptedMetadataEncryptedKey must be not set if EncryptedMetadata is not set",
            ));
        }
    } else if nonce.is_empty() || encrypted_key.is_empty() {
        return Err(Error::invalid_request(
            "EncryptedMetadataNonce and EncryptedMetadataEncryptedKey must be set if EncryptedMetadata is set",
        ));
    }
    Ok(())
}

pub fn root_piece_id(root_piece_id: &PieceId) -> Result<()> {
    if root_piece_id.is_zero() {
        return Err(Error::invalid_request("RootPieceID missing"));
    }
    Ok(())
}

/// Piece list on its own: non-empty, unique numbers, known nodes
pub fn pieces(pieces: &[Piece]) -> Result<()> {
    if pieces.is_empty() {
        return Err(Error::invalid_request("pieces missing"));
    }
    let mut seen = HashSet::with_capacity(pieces.len());
    for piece in pieces {
        if !seen.insert(piece.number) {
            return Err(Error::invalid_request(format!(
                "duplicated piece number {}",
                piece.number
            )));
        }
        if piece.storage_node.is_nil() {
            return Err(Error::invalid_request(format!(
                "piece number {} is missing storage node id",
                piece.number
            )));
        }
    }
    Ok(())
}

pub fn redundancy(redundancy: &RedundancyScheme) -> Result<()> {
    if !redundancy.is_valid() {
        return Err(Error::invalid_request("Redundancy invalid"));
    }
    Ok(())
}

/// Piece list against the scheme it was encoded with
pub fn pieces_fit(pieces: &[Piece], redundancy: &RedundancyScheme) -> Result<()> {
    let total = usize::try_from(redundancy.total_shares).unwrap_or_default();
    if pieces.len() > total {
        return Err(Error::invalid_request(format!(
            "number of pieces ({}) exceeds redundancy total shares ({total})",
            pieces.len()
        )));
    }
    if let Some(piece) = pieces.iter().find(|p| usize::from(p.number) >= total) {
        return Err(Error::invalid_request(format!(
            "piece number {} is out of range for {total} total shares",
            piece.number
        )));
    }
    Ok(())
}

pub fn enough_pieces(pieces: &[Piece], redundancy: &RedundancyScheme) -> Result<()> {
    let required = usize::try_from(redundancy.required_shares).unwrap_or_default();
    if pieces.len() < required {
        return Err(Error::invalid_request(format!(
            "number of pieces ({}) is less than redundancy required shares ({required})",
            pieces.len()
        )));
    }
    Ok(())
}

pub fn limit(limit: i32) -> Result<()> {
    if limit < 0 {
        return Err(Error::invalid_request(format!("Invalid limit: {limit}")));
    }
    Ok(())
}
