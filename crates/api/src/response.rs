//! Success envelope for API responses.
//!
//! Every 2xx body is `{ "data": ... }`. Handlers wrap their payload in
//! [`DataResponse`] rather than hand-building the envelope with
//! `serde_json::json!`, so the shape is typed and uniform.

use serde::Serialize;

/// The `{ "data": T }` wrapper every success response ships in.
#[derive(Debug, Serialize)]
pub struct DataResponse<T: Serialize> {
    pub data: T,
}
