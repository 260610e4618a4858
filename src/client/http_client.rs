use super::{credentials_from, redact, Database};
use crate::protocol::{CouchError, CouchResult, Envelope};
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, CONNECTION, CONTENT_TYPE};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use url::Url;

/// Longest body excerpt carried in a decode error.
const MAX_EXCERPT_CHARS: usize = 256;

impl Database {
    /// Performs one request/response cycle against `url`.
    ///
    /// User-info embedded in `url` is removed from the request line and sent
    /// as basic auth instead. A JSON content type is set whenever `body` is
    /// present. Each call opens its own connection and closes it afterwards.
    ///
    /// Responses outside 2xx are failures; if the body carries CouchDB's
    /// `{error, reason}` object it becomes [`CouchError::Domain`], otherwise
    /// [`CouchError::Status`].
    pub fn execute<T>(
        &self,
        method: Method,
        url: &str,
        mut headers: HeaderMap,
        body: Option<Vec<u8>>,
    ) -> CouchResult<(StatusCode, T)>
    where
        T: DeserializeOwned,
    {
        let parsed = Url::parse(url)?;
        let credentials = credentials_from(&parsed)?;
        let target = redact(&parsed);

        if body.is_some() {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        }
        headers.insert(CONNECTION, HeaderValue::from_static("close"));

        debug!("{} {}", method, target);

        let mut request = self
            .transport()?
            .request(method.clone(), target.clone())
            .headers(headers);
        if let Some(c) = credentials {
            request = request.basic_auth(c.username, Some(c.password));
        }
        if let Some(b) = body {
            request = request.body(b);
        }

        let response = request.send().map_err(|e| {
            CouchError::Connection(format!("{} {} failed: {}", method, target, e.without_url()))
        })?;
        let status = response.status();
        let bytes = response.bytes().map_err(|e| {
            CouchError::Connection(format!("Failed to read response: {}", e.without_url()))
        })?;

        if !status.is_success() {
            warn!("{} {} returned {}", method, target, status);
            return Err(classify_failure(status, &bytes));
        }

        let decoded = decode_body(&format!("{} {}", method, target), &bytes)?;
        Ok((status, decoded))
    }

    /// Single-use client with idle pooling disabled.
    fn transport(&self) -> CouchResult<Client> {
        let mut builder = Client::builder().pool_max_idle_per_host(0);
        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }
        builder
            .build()
            .map_err(|e| CouchError::Connection(format!("Failed to build HTTP client: {}", e)))
    }
}

fn decode_body<T: DeserializeOwned>(context: &str, bytes: &[u8]) -> CouchResult<T> {
    serde_json::from_slice(bytes).map_err(|e| {
        CouchError::Decode(format!("{}: {} - Text: {}", context, e, excerpt(bytes)))
    })
}

fn excerpt(bytes: &[u8]) -> String {
    let text = String::from_utf8_lossy(bytes);
    let mut chars = text.chars();
    let mut out: String = chars.by_ref().take(MAX_EXCERPT_CHARS).collect();
    if chars.next().is_some() {
        out.push_str("...");
    }
    out
}

fn classify_failure(status: StatusCode, bytes: &[u8]) -> CouchError {
    match serde_json::from_slice::<Envelope>(bytes) {
        Ok(envelope) if envelope.error.is_some() => {
            CouchError::domain(envelope.error, envelope.reason)
        }
        _ => CouchError::Status {
            code: status.as_u16(),
            reason: status
                .canonical_reason()
                .unwrap_or("Unknown status")
                .to_string(),
        },
    }
}
