use super::{Credentials, Database, DEFAULT_PORT};
use crate::protocol::{CouchError, CouchResult};
use std::time::Duration;

pub const URL_ENV: &str = "COUCHDB_URL";
pub const TIMEOUT_ENV: &str = "COUCHDB_TIMEOUT_MS";

pub struct DatabaseBuilder {
    host: String,
    port: u16,
    name: Option<String>,
    auth: Option<Credentials>,
    timeout_ms: Option<u64>,
}

impl DatabaseBuilder {
    pub fn new(host: &str) -> Self {
        Self {
            host: host.to_string(),
            port: DEFAULT_PORT,
            name: None,
            auth: None,
            timeout_ms: None,
        }
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    pub fn auth(mut self, username: &str, password: &str) -> Self {
        self.auth = Some(Credentials::new(username, password));
        self
    }

    pub fn timeout_ms(mut self, ms: u64) -> Self {
        self.timeout_ms = Some(ms);
        self
    }

    /// Assembles the handle without touching the network.
    pub fn build(self) -> CouchResult<Database> {
        if self.host.is_empty() {
            return Err(CouchError::Config("no host specified".to_string()));
        }
        let name = self
            .name
            .filter(|n| !n.is_empty())
            .ok_or_else(|| CouchError::Config("no database name specified".to_string()))?;

        let mut db = Database::new(&self.host, self.port, &name);
        if let Some(auth) = self.auth {
            db = db.with_credentials(auth);
        }
        if let Some(ms) = self.timeout_ms {
            db = db.with_timeout(Duration::from_millis(ms));
        }
        Ok(db)
    }

    /// Builds the handle, then checks the server is up and creates the
    /// database if it is missing.
    pub fn connect(self) -> CouchResult<Database> {
        let db = self.build()?;
        db.ensure_database()?;
        Ok(db)
    }
}

impl Database {
    /// Reads `COUCHDB_URL` (and optionally `COUCHDB_TIMEOUT_MS`) from the
    /// environment, after loading a `.env` file if one is present.
    pub fn from_env() -> CouchResult<Self> {
        let _ = dotenvy::dotenv();
        let url = std::env::var(URL_ENV)
            .map_err(|_| CouchError::Config(format!("{} is not set", URL_ENV)))?;
        let mut db = Database::from_url(&url)?;
        if let Ok(raw) = std::env::var(TIMEOUT_ENV) {
            let ms: u64 = raw.parse().map_err(|_| {
                CouchError::Config(format!("{} must be milliseconds, got '{}'", TIMEOUT_ENV, raw))
            })?;
            db = db.with_timeout(Duration::from_millis(ms));
        }
        Ok(db)
    }
}
