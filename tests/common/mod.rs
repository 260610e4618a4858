//! In-process fake CouchDB for integration tests.
//!
//! Serves the subset of the CouchDB HTTP API the client speaks, with
//! revision compare-and-swap on writes, `If-Match` deletes, optional basic
//! auth and canned view responses. Every request is recorded so tests can
//! assert on what went over the wire.

#![allow(dead_code)]

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    Json, Router,
};
use base64::{engine::general_purpose::STANDARD, Engine};
use couch_client::Database;
use parking_lot::Mutex;
use percent_encoding::percent_decode_str;
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{mpsc, Arc};

#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    pub headers: HashMap<String, String>,
    pub body: Option<Value>,
}

impl Recorded {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_lowercase()).map(|s| s.as_str())
    }

    /// Decoded query parameters, in order.
    pub fn params(&self) -> Vec<(String, String)> {
        self.query
            .as_deref()
            .map(|q| {
                url::form_urlencoded::parse(q.as_bytes())
                    .into_owned()
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[derive(Default)]
struct StoredDb {
    docs: BTreeMap<String, Value>,
    deleted: BTreeSet<String>,
}

#[derive(Default)]
struct Store {
    databases: BTreeMap<String, StoredDb>,
    views: HashMap<String, Value>,
    requests: Vec<Recorded>,
    auth: Option<(String, String)>,
}

type Shared = Arc<Mutex<Store>>;

#[derive(Clone)]
pub struct FakeCouch {
    pub port: u16,
    state: Shared,
}

impl FakeCouch {
    pub fn start() -> Self {
        Self::launch(None)
    }

    pub fn start_with_auth(username: &str, password: &str) -> Self {
        Self::launch(Some((username.to_string(), password.to_string())))
    }

    fn launch(auth: Option<(String, String)>) -> Self {
        init_tracing();
        let state: Shared = Arc::new(Mutex::new(Store {
            auth,
            ..Default::default()
        }));
        let app: Router = Router::new().fallback(dispatch).with_state(state.clone());

        let (tx, rx) = mpsc::channel();
        std::thread::spawn(move || {
            let runtime = tokio::runtime::Runtime::new().expect("Failed to build runtime");
            runtime.block_on(async move {
                let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
                    .await
                    .expect("Failed to bind fake couch");
                let port = listener.local_addr().expect("No local addr").port();
                tx.send(port).expect("Test went away");
                axum::serve(listener, app).await.expect("Fake couch crashed");
            });
        });
        let port = rx.recv().expect("Fake couch failed to start");

        Self { port, state }
    }

    /// Handle on `name`, creating the database server-side first.
    pub fn database(&self, name: &str) -> Database {
        self.state
            .lock()
            .databases
            .entry(name.to_string())
            .or_default();
        self.handle(name)
    }

    /// Handle on `name` without creating it.
    pub fn handle(&self, name: &str) -> Database {
        Database::new("127.0.0.1", self.port, name)
    }

    pub fn set_view(&self, view: &str, response: Value) {
        self.state.lock().views.insert(view.to_string(), response);
    }

    pub fn stored(&self, db: &str, id: &str) -> Option<Value> {
        self.state
            .lock()
            .databases
            .get(db)
            .and_then(|d| d.docs.get(id).cloned())
    }

    pub fn doc_count(&self, db: &str) -> usize {
        self.state
            .lock()
            .databases
            .get(db)
            .map(|d| d.docs.len())
            .unwrap_or(0)
    }

    pub fn has_database(&self, db: &str) -> bool {
        self.state.lock().databases.contains_key(db)
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.state.lock().requests.clone()
    }

    pub fn last_request(&self) -> Recorded {
        self.state
            .lock()
            .requests
            .last()
            .cloned()
            .expect("No request recorded")
    }

    pub fn clear_requests(&self) {
        self.state.lock().requests.clear();
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A port with nothing listening on it.
pub fn closed_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("Failed to bind");
    listener.local_addr().expect("No local addr").port()
}

async fn dispatch(
    State(state): State<Shared>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let segments: Vec<String> = uri
        .path()
        .split('/')
        .filter(|s| !s.is_empty())
        .map(|s| percent_decode_str(s).decode_utf8_lossy().into_owned())
        .collect();
    let parsed_body = if body.is_empty() {
        None
    } else {
        serde_json::from_slice::<Value>(&body).ok()
    };
    let header_map = headers
        .iter()
        .map(|(k, v)| {
            (
                k.as_str().to_lowercase(),
                v.to_str().unwrap_or_default().to_string(),
            )
        })
        .collect();

    let mut store = state.lock();
    store.requests.push(Recorded {
        method: method.to_string(),
        path: uri.path().to_string(),
        query: uri.query().map(|q| q.to_string()),
        headers: header_map,
        body: parsed_body.clone(),
    });

    if let Some((user, pass)) = &store.auth {
        let expected = format!("Basic {}", STANDARD.encode(format!("{}:{}", user, pass)));
        let presented = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        if presented != expected {
            return error(
                StatusCode::UNAUTHORIZED,
                "unauthorized",
                "Name or password is incorrect.",
            );
        }
    }

    let segs: Vec<&str> = segments.iter().map(|s| s.as_str()).collect();
    match (method.as_str(), segs.as_slice()) {
        ("GET", ["_all_dbs"]) => {
            let names: Vec<&String> = store.databases.keys().collect();
            (StatusCode::OK, Json(json!(names))).into_response()
        }
        ("GET", ["_garbage"]) => (StatusCode::OK, "this is not json").into_response(),
        ("GET", ["_unstructured"]) => {
            (StatusCode::SERVICE_UNAVAILABLE, "maintenance").into_response()
        }
        ("GET", [db]) => match store.databases.get(*db) {
            Some(d) => ok(json!({"db_name": db, "doc_count": d.docs.len()})),
            None => missing_db(),
        },
        ("PUT", [db]) => {
            if store.databases.contains_key(*db) {
                return error(
                    StatusCode::PRECONDITION_FAILED,
                    "file_exists",
                    "The database could not be created, the file already exists.",
                );
            }
            store.databases.insert(db.to_string(), StoredDb::default());
            created(json!({"ok": true}))
        }
        ("DELETE", [db]) => match store.databases.remove(*db) {
            Some(_) => ok(json!({"ok": true})),
            None => missing_db(),
        },
        ("POST", [db]) => {
            let Some(doc) = parsed_body.and_then(into_object) else {
                return error(StatusCode::BAD_REQUEST, "bad_request", "Document must be a JSON object");
            };
            let id = doc
                .get("_id")
                .and_then(|v| v.as_str())
                .map(|s| s.to_string())
                .unwrap_or_else(|| uuid::Uuid::new_v4().simple().to_string());
            write_doc(&mut store, db, &id, doc)
        }
        ("GET", [db, "_design", ddoc, "_view", view]) => {
            let key = format!("_design/{}/_view/{}", ddoc, view);
            if let Some(canned) = store.views.get(&key) {
                return ok(canned.clone());
            }
            let Some(d) = store.databases.get(*db) else {
                return missing_db();
            };
            let limit = uri
                .query()
                .map(|q| url::form_urlencoded::parse(q.as_bytes()).into_owned().collect::<Vec<_>>())
                .unwrap_or_default()
                .into_iter()
                .find(|(k, _)| k == "limit")
                .and_then(|(_, v)| v.parse::<usize>().ok())
                .unwrap_or(usize::MAX);
            let rows: Vec<Value> = d
                .docs
                .iter()
                .take(limit)
                .map(|(id, doc)| json!({"id": id, "key": id, "value": {"rev": doc["_rev"]}}))
                .collect();
            ok(json!({"total_rows": d.docs.len(), "offset": 0, "rows": rows}))
        }
        ("GET", [db, id]) => {
            let Some(d) = store.databases.get(*db) else {
                return missing_db();
            };
            match d.docs.get(*id) {
                Some(doc) => ok(doc.clone()),
                None if d.deleted.contains(*id) => {
                    error(StatusCode::NOT_FOUND, "not_found", "deleted")
                }
                None => error(StatusCode::NOT_FOUND, "not_found", "missing"),
            }
        }
        ("PUT", [db, id]) => {
            let Some(doc) = parsed_body.and_then(into_object) else {
                return error(StatusCode::BAD_REQUEST, "bad_request", "Document must be a JSON object");
            };
            write_doc(&mut store, db, id, doc)
        }
        ("DELETE", [db, id]) => {
            let presented = headers
                .get("if-match")
                .and_then(|v| v.to_str().ok())
                .map(|s| s.to_string());
            let Some(d) = store.databases.get_mut(*db) else {
                return missing_db();
            };
            let Some(current) = d.docs.get(*id).map(current_rev) else {
                return error(StatusCode::NOT_FOUND, "not_found", "missing");
            };
            if presented.as_deref() != Some(current.as_str()) {
                return conflict();
            }
            d.docs.remove(*id);
            d.deleted.insert(id.to_string());
            ok(json!({"ok": true, "id": id, "rev": next_rev(Some(&current))}))
        }
        _ => error(StatusCode::METHOD_NOT_ALLOWED, "method_not_allowed", "Unsupported"),
    }
}

fn write_doc(store: &mut Store, db: &str, id: &str, mut doc: Map<String, Value>) -> Response {
    let Some(d) = store.databases.get_mut(db) else {
        return missing_db();
    };
    let presented = doc.get("_rev").and_then(|v| v.as_str()).map(|s| s.to_string());
    let current = d.docs.get(id).map(current_rev);
    if presented != current {
        return conflict();
    }
    let rev = next_rev(current.as_deref());
    doc.insert("_id".to_string(), json!(id));
    doc.insert("_rev".to_string(), json!(rev));
    d.docs.insert(id.to_string(), Value::Object(doc));
    d.deleted.remove(id);
    created(json!({"ok": true, "id": id, "rev": rev}))
}

fn current_rev(doc: &Value) -> String {
    doc["_rev"].as_str().unwrap_or_default().to_string()
}

fn next_rev(previous: Option<&str>) -> String {
    let generation = previous
        .and_then(|r| r.split('-').next())
        .and_then(|g| g.parse::<u64>().ok())
        .unwrap_or(0);
    format!("{}-{}", generation + 1, uuid::Uuid::new_v4().simple())
}

fn into_object(value: Value) -> Option<Map<String, Value>> {
    match value {
        Value::Object(map) => Some(map),
        _ => None,
    }
}

fn ok(body: Value) -> Response {
    (StatusCode::OK, Json(body)).into_response()
}

fn created(body: Value) -> Response {
    (StatusCode::CREATED, Json(body)).into_response()
}

fn conflict() -> Response {
    error(StatusCode::CONFLICT, "conflict", "Document update conflict.")
}

fn missing_db() -> Response {
    error(StatusCode::NOT_FOUND, "not_found", "Database does not exist.")
}

fn error(status: StatusCode, error: &str, reason: &str) -> Response {
    (status, Json(json!({"error": error, "reason": reason}))).into_response()
}
