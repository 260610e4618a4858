//! Synchronous CouchDB client.
//!
//! Documents are plain serde types. Identity and revision travel in the
//! reserved `_id` / `_rev` keys, and every write is checked by the server
//! against the revision the caller presents (optimistic concurrency).
//!
//! # Example
//!
//! ```no_run
//! use couch_client::{Database, ViewOptions, ViewResponse};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Serialize, Deserialize)]
//! struct Task {
//!     #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
//!     id: Option<String>,
//!     #[serde(rename = "_rev", skip_serializing_if = "Option::is_none")]
//!     rev: Option<String>,
//!     title: String,
//!     done: bool,
//! }
//!
//! fn main() -> Result<(), couch_client::CouchError> {
//!     let db = Database::builder("localhost")
//!         .name("tasks")
//!         .auth("admin", "password")
//!         .connect()?;
//!
//!     let (id, rev) = db.insert(&Task { id: None, rev: None, title: "write docs".into(), done: false })?;
//!
//!     let (mut task, current): (Task, String) = db.retrieve(&id)?;
//!     assert_eq!(current, rev);
//!     task.done = true;
//!     let next = db.edit(&task)?;
//!
//!     // A second edit with the old revision is rejected by the server.
//!     assert!(db.edit_with(&task, &id, &rev).unwrap_err().is_conflict());
//!
//!     let open: ViewResponse = db.query("_design/tasks/_view/open", &ViewOptions::new().limit(10))?;
//!     println!("{} open tasks", open.rows.len());
//!
//!     db.delete(&id, &next)?;
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod codec;
pub mod protocol;

pub use client::{Credentials, Database, DatabaseBuilder, ViewOptions, DEFAULT_PORT};
pub use codec::{Decomposed, Document};
pub use protocol::{CouchError, CouchResult, DatabaseInfo, Envelope, Row, ViewResponse};

pub use reqwest::header::HeaderMap;
pub use reqwest::{Method, StatusCode};
