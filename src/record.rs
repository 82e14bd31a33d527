//! The audit record describing one HTTP attempt.

use serde::{Deserialize, Serialize};

/// Timestamp format used for every date-time field on a record.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Returns the current local time formatted as [`TIMESTAMP_FORMAT`].
pub(crate) fn now_stamp() -> String {
    chrono::Local::now().format(TIMESTAMP_FORMAT).to_string()
}

/// The persisted description of one HTTP attempt: the request that was
/// sent, the response that came back, and the timing around both.
///
/// A record is created empty when a call is assembled, populated
/// incrementally across request build, each attempt, and final
/// materialization, and persisted (create-or-update) after every
/// mutation. Text fields use the empty string for "unset"; all date-time
/// fields are [`TIMESTAMP_FORMAT`] stamps.
///
/// Once an `id` is assigned it is stable for the life of one logical
/// request. When an attempt fails and another follows, the identity is
/// reset so the next persist starts a fresh row: the audit trail keeps
/// one row per attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RequestRecord {
    /// Opaque unique id. Empty until first persisted.
    pub id: String,
    /// When the row was created.
    pub created_at: String,
    /// When the row was last written.
    pub updated_at: String,
    /// When the request was last handed to the transport.
    pub issued_at: String,
    /// The base URL the caller supplied, before query merging.
    pub base_url: String,
    /// The resolved URL, including the percent-encoded query.
    pub path: String,
    /// The HTTP method.
    pub method: String,
    /// Protocol version of the response, e.g. `HTTP/1.1`.
    pub http_version: String,
    /// The `Content-Type` the request declared, if any.
    pub content_type: String,
    /// The response status code as text, e.g. `200`.
    pub http_status: String,
    /// Wall-clock latency in milliseconds, measured from dispatch and
    /// spanning every retry attempt.
    pub latency_ms: i64,
    /// Free-text note, e.g. `retry attempt 2`.
    pub remark: String,
    /// The query-parameter map as JSON text.
    pub query: String,
    /// The request body as it was sent.
    pub body: String,
    /// Caller-declared business payload as JSON text.
    pub business_payload: String,
    /// The per-call header map as JSON text.
    pub request_headers: String,
    /// The response header map as JSON text.
    pub response_headers: String,
    /// A text copy of the response body. Left empty by file downloads.
    pub response_body: String,
    /// Caller-attached business outcome as JSON text, recorded after the
    /// fact via [`Receipt::save_business_result`](crate::Receipt::save_business_result).
    pub business_result: String,
}

impl RequestRecord {
    /// Default backing table name for audit rows.
    pub const TABLE: &'static str = "http_request_record";

    /// Creates an empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` once the record has been written to the store.
    pub fn is_persisted(&self) -> bool {
        !self.id.is_empty()
    }

    /// Clears the identity and re-stamps the creation timestamps so the
    /// next persist inserts a fresh row instead of overwriting this one.
    /// Called between a failed attempt and its retry.
    pub(crate) fn reset_identity(&mut self) {
        self.id.clear();
        self.created_at = now_stamp();
        self.updated_at = now_stamp();
    }
}
