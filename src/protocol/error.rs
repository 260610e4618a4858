use thiserror::Error;

#[derive(Error, Debug)]
pub enum CouchError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Encoding error: {0}")]
    Encoding(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("HTTP {code}: {reason}")]
    Status { code: u16, reason: String },

    // CouchDB reports conflicts, missing documents and auth failures this way.
    #[error("{error}: {reason}")]
    Domain { error: String, reason: String },

    #[error("Precondition failed: {0}")]
    Precondition(String),

    #[error("CouchDB not running at {0}")]
    NotRunning(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type CouchResult<T> = Result<T, CouchError>;

impl CouchError {
    pub(crate) fn domain(error: Option<String>, reason: Option<String>) -> Self {
        CouchError::Domain {
            error: error.unwrap_or_else(|| "unknown_error".to_string()),
            reason: reason.unwrap_or_default(),
        }
    }

    /// True when the store rejected a write because the presented revision
    /// was stale or missing.
    pub fn is_conflict(&self) -> bool {
        match self {
            CouchError::Domain { error, .. } => error == "conflict",
            CouchError::Status { code, .. } => *code == 409,
            _ => false,
        }
    }

    /// True when the addressed document or database does not exist.
    pub fn is_not_found(&self) -> bool {
        match self {
            CouchError::Domain { error, .. } => error == "not_found",
            CouchError::Status { code, .. } => *code == 404,
            _ => false,
        }
    }
}

impl From<serde_json::Error> for CouchError {
    fn from(err: serde_json::Error) -> Self {
        CouchError::Decode(err.to_string())
    }
}
