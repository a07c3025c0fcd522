//! Canonical CBOR encoding for membership snapshots.
//!
//! A snapshot is a single CBOR map:
//!
//! ```text
//! { [host: text, port: uint] => timestamp: int, ... }
//! ```
//!
//! The encoder follows RFC 8949 Core Deterministic Encoding:
//! - Map keys sorted by encoded byte comparison
//! - Integers use smallest valid encoding
//! - Definite lengths only
//!
//! so two replicas holding the same records produce identical bytes (and thus
//! identical digests). The decoder accepts keys in any order but rejects
//! duplicate identities, non-integer timestamps and trailing bytes.

use ciborium::value::Value;
use std::collections::BTreeMap;
use std::io::Cursor;

use crate::error::CoreError;
use crate::state::ReplicatedState;
use crate::types::{NodeIdentity, Timestamp};

/// CBOR major types used by the snapshot encoding.
mod major {
    pub const UNSIGNED: u8 = 0;
    pub const NEGATIVE: u8 = 1;
    pub const TEXT: u8 = 3;
    pub const ARRAY: u8 = 4;
    pub const MAP: u8 = 5;
}

/// Encode a snapshot to canonical CBOR bytes.
pub fn encode_state(state: &ReplicatedState) -> Vec<u8> {
    // Encode all keys first to sort by encoded bytes
    let mut pairs: Vec<(Vec<u8>, Timestamp)> = state
        .iter()
        .map(|(id, ts)| {
            let mut key_buf = Vec::new();
            encode_identity(&mut key_buf, id);
            (key_buf, ts)
        })
        .collect();

    pairs.sort_by(|a, b| a.0.cmp(&b.0));

    let mut buf = Vec::with_capacity(1 + pairs.len() * 24);
    encode_uint(&mut buf, major::MAP, pairs.len() as u64);
    for (key_bytes, ts) in pairs {
        buf.extend_from_slice(&key_bytes);
        encode_int(&mut buf, ts.as_millis());
    }
    buf
}

/// Decode a snapshot from CBOR bytes.
pub fn decode_state(bytes: &[u8]) -> Result<ReplicatedState, CoreError> {
    let mut cursor = Cursor::new(bytes);
    let value: Value =
        ciborium::from_reader(&mut cursor).map_err(|e| CoreError::DecodingError(e.to_string()))?;

    let consumed = usize::try_from(cursor.position()).unwrap_or(usize::MAX);
    if consumed < bytes.len() {
        return Err(CoreError::TrailingBytes(bytes.len() - consumed));
    }

    value_to_state(value)
}

/// Encode an identity key: `[host, port]`.
fn encode_identity(buf: &mut Vec<u8>, id: &NodeIdentity) {
    encode_uint(buf, major::ARRAY, 2);
    encode_text(buf, id.host());
    encode_uint(buf, major::UNSIGNED, u64::from(id.port()));
}

/// Encode a signed integer (major types 0 and 1).
fn encode_int(buf: &mut Vec<u8>, n: i64) {
    if n >= 0 {
        encode_uint(buf, major::UNSIGNED, n as u64);
    } else {
        // CBOR encodes -1 as 0, -2 as 1, etc.
        encode_uint(buf, major::NEGATIVE, (-1 - n) as u64);
    }
}

/// Encode an unsigned integer with the given major type.
fn encode_uint(buf: &mut Vec<u8>, major: u8, n: u64) {
    let mt = major << 5;
    if n < 24 {
        buf.push(mt | (n as u8));
    } else if n <= 0xff {
        buf.push(mt | 24);
        buf.push(n as u8);
    } else if n <= 0xffff {
        buf.push(mt | 25);
        buf.extend_from_slice(&(n as u16).to_be_bytes());
    } else if n <= 0xffff_ffff {
        buf.push(mt | 26);
        buf.extend_from_slice(&(n as u32).to_be_bytes());
    } else {
        buf.push(mt | 27);
        buf.extend_from_slice(&n.to_be_bytes());
    }
}

/// Encode a text string (major type 3).
fn encode_text(buf: &mut Vec<u8>, s: &str) {
    encode_uint(buf, major::TEXT, s.len() as u64);
    buf.extend_from_slice(s.as_bytes());
}

fn value_to_state(value: Value) -> Result<ReplicatedState, CoreError> {
    let entries = match value {
        Value::Map(entries) => entries,
        other => {
            return Err(CoreError::MalformedSnapshot(format!(
                "expected map, got {}",
                describe(&other)
            )))
        }
    };

    let mut records = BTreeMap::new();
    for (key, ts) in entries {
        let id = value_to_identity(key)?;
        let ts = value_to_timestamp(ts)?;
        if records.insert(id.clone(), ts).is_some() {
            return Err(CoreError::DuplicateIdentity(id));
        }
    }

    Ok(records.into_iter().collect())
}

fn value_to_identity(value: Value) -> Result<NodeIdentity, CoreError> {
    let items = match value {
        Value::Array(items) if items.len() == 2 => items,
        other => {
            return Err(CoreError::MalformedSnapshot(format!(
                "identity must be [host, port], got {}",
                describe(&other)
            )))
        }
    };

    let mut items = items.into_iter();
    let host = match items.next() {
        Some(Value::Text(host)) if !host.is_empty() => host,
        _ => return Err(CoreError::MalformedSnapshot("invalid host".into())),
    };
    let port = match items.next() {
        Some(Value::Integer(i)) => u16::try_from(i128::from(i))
            .map_err(|_| CoreError::MalformedSnapshot("port out of range".into()))?,
        _ => return Err(CoreError::MalformedSnapshot("invalid port".into())),
    };

    Ok(NodeIdentity::new(host, port))
}

fn value_to_timestamp(value: Value) -> Result<Timestamp, CoreError> {
    match value {
        Value::Integer(i) => i64::try_from(i128::from(i))
            .map(Timestamp::from_millis)
            .map_err(|_| CoreError::MalformedSnapshot("timestamp out of range".into())),
        other => Err(CoreError::MalformedSnapshot(format!(
            "timestamp must be an integer, got {}",
            describe(&other)
        ))),
    }
}

fn describe(value: &Value) -> &'static str {
    match value {
        Value::Integer(_) => "integer",
        Value::Bytes(_) => "bytes",
        Value::Float(_) => "float",
        Value::Text(_) => "text",
        Value::Bool(_) => "bool",
        Value::Null => "null",
        Value::Tag(_, _) => "tag",
        Value::Array(_) => "array",
        Value::Map(_) => "map",
        _ => "unknown",
    }
}
