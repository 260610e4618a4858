mod builder;
mod database;
mod document;
mod http_client;
mod query;

pub use builder::DatabaseBuilder;
pub use query::ViewOptions;

use std::fmt;
use std::time::Duration;

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use url::Url;

use crate::protocol::{CouchError, CouchResult};

pub const DEFAULT_PORT: u16 = 5984;

/// Everything except RFC 3986 unreserved characters.
pub(crate) const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

pub(crate) fn escape(component: &str) -> String {
    utf8_percent_encode(component, COMPONENT).to_string()
}

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: &str, password: &str) -> Self {
        Self {
            username: username.to_string(),
            password: password.to_string(),
        }
    }

    fn userinfo(&self) -> String {
        format!("{}:{}", escape(&self.username), escape(&self.password))
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Handle to one database on a CouchDB server.
///
/// Holds no connection or session state; cloning it is cheap and every call
/// opens and closes its own connection.
#[derive(Debug, Clone, PartialEq)]
pub struct Database {
    host: String,
    port: u16,
    name: String,
    auth: Option<Credentials>,
    timeout: Option<Duration>,
}

impl Database {
    pub fn new(host: &str, port: u16, name: &str) -> Self {
        Self {
            host: host.to_string(),
            port,
            name: name.to_string(),
            auth: None,
            timeout: None,
        }
    }

    pub fn builder(host: &str) -> DatabaseBuilder {
        DatabaseBuilder::new(host)
    }

    /// Parses `http://[user:pass@]host[:port]/name`.
    pub fn from_url(dburl: &str) -> CouchResult<Self> {
        let url = Url::parse(dburl)?;
        if url.scheme() != "http" {
            return Err(CouchError::Config(format!(
                "unsupported scheme '{}', expected http",
                url.scheme()
            )));
        }

        let host = url
            .host_str()
            .ok_or_else(|| CouchError::Config(format!("no host in {}", redact(&url))))?;
        let name = decode(url.path().trim_matches('/'))?;
        if name.is_empty() {
            return Err(CouchError::Config(format!(
                "no database name in {}",
                redact(&url)
            )));
        }

        Ok(Self {
            host: host.to_string(),
            port: explicit_port(dburl, &url).unwrap_or(DEFAULT_PORT),
            name,
            auth: credentials_from(&url)?,
            timeout: None,
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn credentials(&self) -> Option<&Credentials> {
        self.auth.as_ref()
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.auth = Some(credentials);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Server root, with credentials embedded as user-info when present.
    pub fn base_url(&self) -> String {
        let userinfo = self
            .auth
            .as_ref()
            .map(|c| format!("{}@", c.userinfo()))
            .unwrap_or_default();
        format!("http://{}{}:{}", userinfo, self.host, self.port)
    }

    pub fn db_url(&self) -> String {
        format!("{}/{}", self.base_url(), escape(&self.name))
    }

    pub(crate) fn doc_url(&self, id: &str) -> String {
        format!("{}/{}", self.db_url(), escape(id))
    }
}

fn decode(component: &str) -> CouchResult<String> {
    percent_decode_str(component)
        .decode_utf8()
        .map(|s| s.into_owned())
        .map_err(|e| CouchError::Config(format!("invalid percent-encoding: {}", e)))
}

/// Port written in `raw`, including one equal to the scheme default that
/// `Url::port` normalizes away.
fn explicit_port(raw: &str, url: &Url) -> Option<u16> {
    if url.port().is_some() {
        return url.port();
    }
    let rest = raw.split_once("://").map(|(_, r)| r).unwrap_or(raw);
    let authority = rest.split(['/', '?', '#']).next().unwrap_or_default();
    let host_port = authority
        .rsplit_once('@')
        .map(|(_, h)| h)
        .unwrap_or(authority);
    match host_port.rsplit_once(':') {
        Some((_, port)) if !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()) => {
            url.port_or_known_default()
        }
        _ => None,
    }
}

/// Extracts user-info from `url`, percent-decoded. A username without a
/// password yields no credentials.
pub(crate) fn credentials_from(url: &Url) -> CouchResult<Option<Credentials>> {
    let Some(password) = url.password() else {
        return Ok(None);
    };
    if url.username().is_empty() {
        return Ok(None);
    }
    Ok(Some(Credentials {
        username: decode(url.username())?,
        password: decode(password)?,
    }))
}

/// Copy of `url` safe to log.
pub(crate) fn redact(url: &Url) -> Url {
    let mut clean = url.clone();
    let _ = clean.set_username("");
    let _ = clean.set_password(None);
    clean
}
