use super::Database;
use crate::protocol::{CouchError, CouchResult, DatabaseInfo, Envelope};
use reqwest::header::HeaderMap;
use reqwest::Method;
use tracing::{debug, info};

impl Database {
    /// Whether a CouchDB server answers at this handle's host and port.
    /// Ignores the database name.
    pub fn running(&self) -> bool {
        let url = format!("{}/_all_dbs", self.base_url());
        match self.execute::<Vec<String>>(Method::GET, &url, HeaderMap::new(), None) {
            Ok(_) => true,
            Err(e) => {
                debug!("Liveness probe failed: {}", e);
                false
            }
        }
    }

    /// Whether this handle's database exists on the server.
    pub fn exists(&self) -> bool {
        match self.execute::<DatabaseInfo>(Method::GET, &self.db_url(), HeaderMap::new(), None) {
            Ok((_, info)) => info.name == self.name,
            Err(e) => {
                debug!("Database {} not found: {}", self.name, e);
                false
            }
        }
    }

    pub fn create_database(&self) -> CouchResult<()> {
        let (_, envelope): (_, Envelope) =
            self.execute(Method::PUT, &self.db_url(), HeaderMap::new(), None)?;
        envelope.into_result()?;
        info!("Created database {}", self.name);
        Ok(())
    }

    /// Deletes this handle's database and every document in it.
    pub fn delete_database(&self) -> CouchResult<()> {
        let (_, envelope): (_, Envelope) =
            self.execute(Method::DELETE, &self.db_url(), HeaderMap::new(), None)?;
        envelope.into_result()?;
        info!("Deleted database {}", self.name);
        Ok(())
    }

    /// Creates the database if the server is up and it does not exist yet.
    pub fn ensure_database(&self) -> CouchResult<()> {
        if !self.running() {
            return Err(CouchError::NotRunning(format!(
                "{}:{}",
                self.host, self.port
            )));
        }
        if !self.exists() {
            self.create_database()?;
        }
        Ok(())
    }
}
