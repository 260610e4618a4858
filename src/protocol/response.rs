use super::error::{CouchError, CouchResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Reply to every mutating request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(default)]
    pub ok: bool,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub rev: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
}

impl Envelope {
    /// Turns a not-ok envelope into a `Domain` error.
    pub fn into_result(self) -> CouchResult<Self> {
        if self.ok {
            Ok(self)
        } else {
            Err(CouchError::domain(self.error, self.reason))
        }
    }

    pub(crate) fn require_rev(&mut self) -> CouchResult<String> {
        self.rev
            .take()
            .ok_or_else(|| CouchError::Decode("response carries no rev".to_string()))
    }

    pub(crate) fn require_id(&mut self) -> CouchResult<String> {
        self.id
            .take()
            .ok_or_else(|| CouchError::Decode("response carries no id".to_string()))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ViewResponse {
    #[serde(default)]
    pub total_rows: u64,
    #[serde(default)]
    pub offset: u64,
    #[serde(default)]
    pub rows: Vec<Row>,
}

/// A single view row. Reduced rows have no `id`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Row {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub key: Option<Value>,
    #[serde(default)]
    pub value: Option<Value>,
}

impl ViewResponse {
    pub fn ids(self) -> Vec<String> {
        self.rows.into_iter().filter_map(|row| row.id).collect()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatabaseInfo {
    #[serde(rename = "db_name")]
    pub name: String,
    #[serde(default)]
    pub doc_count: Option<u64>,
}
