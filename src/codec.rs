//! Document codec.
//!
//! Records are serialized into a generic ordered JSON object before any
//! reserved key is touched, so the same code path handles derived structs,
//! `HashMap`s and `serde_json::Value` objects alike.

use crate::protocol::{CouchError, CouchResult};
use serde::Serialize;
use serde_json::{Map, Value};

pub const ID_FIELD: &str = "_id";
pub const REV_FIELD: &str = "_rev";

/// Canonical key-value form of a record.
pub type Document = Map<String, Value>;

/// A record split into its body and its reserved identity/revision keys.
#[derive(Debug, Clone, PartialEq)]
pub struct Decomposed {
    pub body: Document,
    pub id: Option<String>,
    pub rev: Option<String>,
}

/// Serializes `record` into a key-value document.
///
/// Scalars, sequences and anything else that does not serialize to a JSON
/// object are rejected with [`CouchError::Encoding`].
pub fn to_document<T: Serialize + ?Sized>(record: &T) -> CouchResult<Document> {
    let value = serde_json::to_value(record)
        .map_err(|e| CouchError::Encoding(format!("failed to serialize record: {}", e)))?;
    match value {
        Value::Object(map) => Ok(map),
        other => Err(CouchError::Encoding(format!(
            "record must serialize to an object, got {}",
            kind(&other)
        ))),
    }
}

/// Strips `_id` and `_rev` from the serialized record and returns them
/// alongside the remaining body.
pub fn decompose<T: Serialize + ?Sized>(record: &T) -> CouchResult<Decomposed> {
    let mut body = to_document(record)?;
    let id = take_reserved(&mut body, ID_FIELD)?;
    let rev = take_reserved(&mut body, REV_FIELD)?;
    Ok(Decomposed { body, id, rev })
}

/// Serializes `record` and sets `_id`/`_rev`, replacing any values the
/// record already carried under those names.
pub fn inject<T: Serialize + ?Sized>(record: &T, id: &str, rev: &str) -> CouchResult<Document> {
    let mut body = to_document(record)?;
    body.insert(ID_FIELD.to_string(), Value::String(id.to_string()));
    body.insert(REV_FIELD.to_string(), Value::String(rev.to_string()));
    Ok(body)
}

/// Reads a reserved key without removing it.
pub(crate) fn reserved(doc: &Document, key: &str) -> CouchResult<Option<String>> {
    match doc.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.is_empty() => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(CouchError::Encoding(format!(
            "{} must be a string, got {}",
            key,
            kind(other)
        ))),
    }
}

fn take_reserved(doc: &mut Document, key: &str) -> CouchResult<Option<String>> {
    let value = reserved(doc, key)?;
    doc.shift_remove(key);
    Ok(value)
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
