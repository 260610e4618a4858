use super::Database;
use crate::codec::{self, Decomposed, Document, ID_FIELD, REV_FIELD};
use crate::protocol::{CouchError, CouchResult, Envelope};
use reqwest::header::{HeaderMap, HeaderValue, IF_MATCH};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

impl Database {
    /// Stores `doc` and returns its `(id, rev)`.
    ///
    /// What happens depends on the reserved keys `doc` carries:
    /// - `_id` and `_rev`: overwrite via [`Database::edit`]; fails on a stale rev.
    /// - `_id` only: create at that id; fails if the id is taken.
    /// - neither: create under a server-assigned id.
    /// - `_rev` only: rejected, there is nothing to check the rev against.
    pub fn insert<T>(&self, doc: &T) -> CouchResult<(String, String)>
    where
        T: Serialize + ?Sized,
    {
        let Decomposed { body, id, rev } = codec::decompose(doc)?;
        match (id, rev) {
            (Some(id), Some(_)) => {
                let rev = self.edit(doc)?;
                Ok((id, rev))
            }
            (Some(id), None) => self.create(&body, Some(&id)),
            (None, None) => self.create(&body, None),
            (None, Some(_)) => Err(CouchError::Precondition(
                "document has a rev but no id (try edit_with)".to_string(),
            )),
        }
    }

    /// Creates `doc` under `id`. Fails with a conflict if the id is taken.
    ///
    /// `doc` may not carry a `_rev`, and may only carry an `_id` equal to `id`.
    pub fn insert_with<T>(&self, doc: &T, id: &str) -> CouchResult<(String, String)>
    where
        T: Serialize + ?Sized,
    {
        if id.is_empty() {
            return Err(CouchError::Precondition("no id specified".to_string()));
        }
        let Decomposed {
            body,
            id: carried_id,
            rev,
        } = codec::decompose(doc)?;
        if rev.is_some() {
            return Err(CouchError::Precondition(
                "document carries a rev (try edit_with)".to_string(),
            ));
        }
        if let Some(carried) = carried_id {
            if carried != id {
                return Err(CouchError::Precondition(format!(
                    "document id '{}' does not match '{}'",
                    carried, id
                )));
            }
        }
        self.create(&body, Some(id))
    }

    /// Fetches document `id` and returns it with its current revision.
    ///
    /// The body is parsed once; `_id`/`_rev` stay in the content, so
    /// destination types declaring them get them filled in.
    pub fn retrieve<T>(&self, id: &str) -> CouchResult<(T, String)>
    where
        T: DeserializeOwned,
    {
        if id.is_empty() {
            return Err(CouchError::Precondition("no id specified".to_string()));
        }
        let (_, content): (_, Document) =
            self.execute(Method::GET, &self.doc_url(id), HeaderMap::new(), None)?;
        let rev = codec::reserved(&content, REV_FIELD)?.ok_or_else(|| {
            CouchError::Decode(format!("document {} has no {}", id, REV_FIELD))
        })?;
        let doc = serde_json::from_value(Value::Object(content)).map_err(|e| {
            CouchError::Decode(format!("couldn't decode document {}: {}", id, e))
        })?;
        Ok((doc, rev))
    }

    /// Like [`Database::retrieve`] but decodes straight into `T` and does not
    /// report the revision.
    pub fn retrieve_fast<T>(&self, id: &str) -> CouchResult<T>
    where
        T: DeserializeOwned,
    {
        if id.is_empty() {
            return Err(CouchError::Precondition("no id specified".to_string()));
        }
        let (_, doc) = self.execute(Method::GET, &self.doc_url(id), HeaderMap::new(), None)?;
        Ok(doc)
    }

    /// Overwrites the stored document with `doc`, which must carry both `_id`
    /// and `_rev`. Returns the new revision.
    ///
    /// The server only accepts the write when `_rev` is its current revision
    /// for that id; otherwise a conflict error is returned and the stored
    /// document is untouched.
    pub fn edit<T>(&self, doc: &T) -> CouchResult<String>
    where
        T: Serialize + ?Sized,
    {
        let body = codec::to_document(doc)?;
        let id = codec::reserved(&body, ID_FIELD)?
            .ok_or_else(|| CouchError::Precondition("id not specified".to_string()))?;
        if codec::reserved(&body, REV_FIELD)?.is_none() {
            return Err(CouchError::Precondition(
                "rev not specified (try insert_with)".to_string(),
            ));
        }

        let payload = serde_json::to_vec(&body)
            .map_err(|e| CouchError::Encoding(format!("failed to serialize document: {}", e)))?;
        let (_, envelope): (_, Envelope) = self.execute(
            Method::PUT,
            &self.doc_url(&id),
            HeaderMap::new(),
            Some(payload),
        )?;
        let rev = envelope.into_result()?.require_rev()?;
        debug!("Document edited: {} now at {}", id, rev);
        Ok(rev)
    }

    /// Sets `_id`/`_rev` on `doc` (replacing any it carries) and edits.
    pub fn edit_with<T>(&self, doc: &T, id: &str, rev: &str) -> CouchResult<String>
    where
        T: Serialize + ?Sized,
    {
        if id.is_empty() || rev.is_empty() {
            return Err(CouchError::Precondition(
                "must specify both id and rev".to_string(),
            ));
        }
        let body = codec::inject(doc, id, rev)?;
        self.edit(&body)
    }

    /// Deletes document `id` if `rev` is still its current revision.
    pub fn delete(&self, id: &str, rev: &str) -> CouchResult<()> {
        if id.is_empty() {
            return Err(CouchError::Precondition("no id specified".to_string()));
        }
        if rev.is_empty() {
            return Err(CouchError::Precondition("no rev specified".to_string()));
        }
        let mut headers = HeaderMap::new();
        let expected = HeaderValue::from_str(rev)
            .map_err(|_| CouchError::Precondition(format!("invalid rev '{}'", rev)))?;
        headers.insert(IF_MATCH, expected);

        let (_, envelope): (_, Envelope) =
            self.execute(Method::DELETE, &self.doc_url(id), headers, None)?;
        envelope.into_result()?;
        debug!("Document deleted: {}", id);
        Ok(())
    }

    /// PUT to `id` when given, otherwise POST for a server-assigned id.
    fn create(&self, body: &Document, id: Option<&str>) -> CouchResult<(String, String)> {
        let (method, url) = match id {
            Some(id) => (Method::PUT, self.doc_url(id)),
            None => (Method::POST, self.db_url()),
        };
        let payload = serde_json::to_vec(body)
            .map_err(|e| CouchError::Encoding(format!("failed to serialize document: {}", e)))?;
        let (_, envelope): (_, Envelope) =
            self.execute(method, &url, HeaderMap::new(), Some(payload))?;
        let mut envelope = envelope.into_result()?;
        let id = envelope.require_id()?;
        let rev = envelope.require_rev()?;
        debug!("Document created: {} at {}", id, rev);
        Ok((id, rev))
    }
}
