use super::{escape, Database};
use crate::protocol::{CouchError, CouchResult, ViewResponse};
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use reqwest::header::HeaderMap;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

/// Characters that would break up a query string if left in a JSON literal.
const QUERY_LITERAL: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'#')
    .add(b'%')
    .add(b'&')
    .add(b'+');

/// Options for a view request, encoded in insertion order.
///
/// Strings are sent quoted (`key="baz"`), integers and booleans bare
/// (`limit=5`), and anything else as compact JSON (`startkey=["a",1]`).
/// Setting a key twice replaces its value in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewOptions {
    params: Map<String, Value>,
}

impl ViewOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: &str, value: impl Into<Value>) -> &mut Self {
        self.params.insert(key.to_string(), value.into());
        self
    }

    pub fn key(self, key: impl Into<Value>) -> Self {
        self.set("key", key)
    }

    pub fn startkey(self, key: impl Into<Value>) -> Self {
        self.set("startkey", key)
    }

    pub fn endkey(self, key: impl Into<Value>) -> Self {
        self.set("endkey", key)
    }

    pub fn limit(self, limit: u64) -> Self {
        self.set("limit", limit)
    }

    pub fn skip(self, skip: u64) -> Self {
        self.set("skip", skip)
    }

    pub fn descending(self, descending: bool) -> Self {
        self.set("descending", descending)
    }

    pub fn include_docs(self, include: bool) -> Self {
        self.set("include_docs", include)
    }

    pub fn reduce(self, reduce: bool) -> Self {
        self.set("reduce", reduce)
    }

    pub fn group(self, group: bool) -> Self {
        self.set("group", group)
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn to_query_string(&self) -> String {
        self.params
            .iter()
            .map(|(k, v)| format!("{}={}", escape(k), encode_value(v)))
            .collect::<Vec<_>>()
            .join("&")
    }
}

impl From<Map<String, Value>> for ViewOptions {
    fn from(params: Map<String, Value>) -> Self {
        Self { params }
    }
}

impl<K, V> FromIterator<(K, V)> for ViewOptions
where
    K: Into<String>,
    V: Into<Value>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            params: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

fn encode_value(value: &Value) -> String {
    match value {
        Value::String(s) => {
            // JSON-escape the content, then percent-escape it inside literal quotes.
            let json = Value::String(s.clone()).to_string();
            format!("\"{}\"", escape(&json[1..json.len() - 1]))
        }
        Value::Number(n) if n.is_i64() || n.is_u64() => n.to_string(),
        Value::Bool(b) => b.to_string(),
        other => utf8_percent_encode(&other.to_string(), QUERY_LITERAL).to_string(),
    }
}

impl Database {
    /// Runs the view at `view` (e.g. `_design/app/_view/by_name`) and decodes
    /// the response into `T`, usually a [`ViewResponse`].
    pub fn query<T>(&self, view: &str, options: &ViewOptions) -> CouchResult<T>
    where
        T: DeserializeOwned,
    {
        if view.is_empty() {
            return Err(CouchError::Precondition("empty view".to_string()));
        }
        let mut url = format!("{}/{}", self.db_url(), view.trim_start_matches('/'));
        if !options.is_empty() {
            url.push('?');
            url.push_str(&options.to_query_string());
        }
        let (_, results) = self.execute(Method::GET, &url, HeaderMap::new(), None)?;
        Ok(results)
    }

    /// Document ids emitted by `view`; rows without an id are skipped.
    pub fn query_ids(&self, view: &str, options: &ViewOptions) -> CouchResult<Vec<String>> {
        let response: ViewResponse = self.query(view, options)?;
        Ok(response.ids())
    }
}
