//! JSON rendering of engine results
//!
//! Binary fields (object keys, piece ids, encrypted material) are hex encoded.

use serde_json::{Value, json};
use strata_metabase::{DeleteObjectResult, ListStreamPositionsResult, Object, Segment};

pub fn object(o: &Object) -> Value {
    json!({
        "project_id": o.stream.project_id.to_string(),
        "bucket": o.stream.bucket_name.as_str(),
        "key": hex::encode(o.stream.object_key.as_bytes()),
        "version": o.stream.version.get(),
        "stream_id": o.stream.stream_id.to_string(),
        "status": o.status.to_string(),
        "created_at": o.created_at,
        "committed_at": o.committed_at,
        "segment_count": o.segment_count,
        "total_plain_size": o.total_plain_size,
        "total_encrypted_size": o.total_encrypted_size,
        "fixed_segment_size": o.fixed_segment_size,
        "cipher_suite": format!("{:?}", o.encryption.cipher_suite),
        "block_size": o.encryption.block_size,
        "encrypted_metadata": hex::encode(&o.encrypted_metadata),
    })
}

pub fn segment(s: &Segment) -> Value {
    let pieces: Vec<Value> = s
        .pieces
        .iter()
        .map(|p| json!({ "number": p.number, "node": p.storage_node.to_string() }))
        .collect();
    json!({
        "stream_id": s.stream_id.to_string(),
        "position": s.position.to_string(),
        "plain_offset": s.plain_offset,
        "plain_size": s.plain_size,
        "encrypted_size": s.encrypted_size,
        "created_at": s.created_at,
        "root_piece_id": s.root_piece_id.to_string(),
        "redundancy": {
            "share_size": s.redundancy.share_size,
            "required": s.redundancy.required_shares,
            "repair": s.redundancy.repair_shares,
            "optimal": s.redundancy.optimal_shares,
            "total": s.redundancy.total_shares,
        },
        "pieces": pieces,
    })
}

pub fn segments(segments: &[Segment], more: Option<bool>) -> Value {
    let list: Vec<Value> = segments.iter().map(segment).collect();
    match more {
        Some(more) => json!({ "segments": list, "more": more }),
        None => json!({ "segments": list }),
    }
}

pub fn positions(result: &ListStreamPositionsResult) -> Value {
    let list: Vec<Value> = result
        .segments
        .iter()
        .map(|p| {
            json!({
                "position": p.position.to_string(),
                "plain_offset": p.plain_offset,
                "plain_size": p.plain_size,
                "created_at": p.created_at,
                "encrypted_key": hex::encode(&p.encrypted_key),
                "encrypted_key_nonce": hex::encode(&p.encrypted_key_nonce),
                "encrypted_etag": hex::encode(&p.encrypted_etag),
            })
        })
        .collect();
    json!({ "segments": list, "more": result.more })
}

pub fn deleted(result: &DeleteObjectResult) -> Value {
    let objects: Vec<Value> = result.objects.iter().map(object).collect();
    let segments: Vec<Value> = result
        .segments
        .iter()
        .map(|s| {
            json!({
                "root_piece_id": s.root_piece_id.to_string(),
                "pieces": s.pieces.iter().map(|p| json!({
                    "number": p.number,
                    "node": p.storage_node.to_string(),
                })).collect::<Vec<_>>(),
            })
        })
        .collect();
    json!({ "objects": objects, "segments": segments })
}
