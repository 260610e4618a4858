mod error;
mod response;

pub use error::{CouchError, CouchResult};
pub use response::{DatabaseInfo, Envelope, Row, ViewResponse};
