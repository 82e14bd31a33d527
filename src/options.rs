//! Per-call configuration and request payloads.

use cookie::Cookie;
use serde::Serialize;
use std::collections::HashMap;

use crate::{Error, Result};

/// `Content-Type` for JSON request bodies.
pub const CONTENT_TYPE_JSON: &str = "application/json;charset=UTF-8";
/// `Content-Type` for URL-encoded form bodies.
pub const CONTENT_TYPE_FORM_URLENCODED: &str = "application/x-www-form-urlencoded";
/// `Content-Type` for multipart form bodies.
pub const CONTENT_TYPE_MULTIPART_FORM: &str = "multipart/form-data";

/// The request body of an audited call.
///
/// A raw string is sent byte-for-byte as the body and recorded verbatim
/// on the audit record. Anything else goes through [`Payload::json`],
/// which serializes it once; the same JSON text becomes both the request
/// body and the record's `body` field.
#[derive(Debug, Clone, Default)]
pub enum Payload {
    /// No body. The assembler falls back to [`CallOptions::body`] if set.
    #[default]
    Empty,
    /// A pre-encoded body, sent verbatim.
    Raw(String),
    /// A JSON value, serialized at assembly time.
    Json(serde_json::Value),
}

impl Payload {
    /// Builds a JSON payload from any serializable value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Serialization`] if the value cannot be
    /// represented as JSON.
    pub fn json<T: Serialize>(value: &T) -> Result<Self> {
        let value = serde_json::to_value(value).map_err(|e| Error::Serialization(e.to_string()))?;
        Ok(Payload::Json(value))
    }
}

impl From<String> for Payload {
    fn from(body: String) -> Self {
        Payload::Raw(body)
    }
}

impl From<&str> for Payload {
    fn from(body: &str) -> Self {
        Payload::Raw(body.to_string())
    }
}

impl From<serde_json::Value> for Payload {
    fn from(value: serde_json::Value) -> Self {
        Payload::Json(value)
    }
}

/// Per-call configuration: content type, query parameters, headers,
/// cookies, and audit-table routing.
///
/// Every field is independently optional. Option sets compose with
/// [`CallOptions::merge`], where later values win on conflict.
///
/// # Examples
///
/// ```
/// use scrivener::{options::CONTENT_TYPE_JSON, CallOptions};
///
/// let options = CallOptions::new()
///     .with_content_type(CONTENT_TYPE_JSON)
///     .with_query_param("page", "1")
///     .with_header("X-Request-Id", "abc-123")
///     .with_cookie("session", "s3cr3t");
/// ```
#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    /// Value for the request's `Content-Type` header, also recorded on
    /// the audit record.
    pub content_type: Option<String>,
    /// Fallback raw body, used only when the call carries
    /// [`Payload::Empty`].
    pub body: Option<String>,
    /// Overrides the audit table the record is written to.
    pub table_name: Option<String>,
    /// Query parameters merged into the URL with percent-encoding.
    pub query: HashMap<String, String>,
    /// Headers appended (not replaced) on the request.
    pub headers: HashMap<String, String>,
    /// Cookies rendered into a single `Cookie` header.
    pub cookies: Vec<Cookie<'static>>,
    /// Shards the audit table by month: the resolved table name gains a
    /// `_YYYYMM` suffix.
    pub split_table: Option<bool>,
}

impl CallOptions {
    /// Creates an empty option set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the `Content-Type` for the request.
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Sets the fallback raw body.
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Routes the audit record to a specific table.
    pub fn with_table_name(mut self, table: impl Into<String>) -> Self {
        self.table_name = Some(table.into());
        self
    }

    /// Adds a query parameter.
    pub fn with_query_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(key.into(), value.into());
        self
    }

    /// Adds multiple query parameters.
    pub fn with_query(mut self, params: impl IntoIterator<Item = (String, String)>) -> Self {
        self.query.extend(params);
        self
    }

    /// Adds a header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Adds multiple headers.
    pub fn with_headers(mut self, headers: impl IntoIterator<Item = (String, String)>) -> Self {
        self.headers.extend(headers);
        self
    }

    /// Adds a cookie.
    pub fn with_cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.cookies.push(Cookie::new(name.into(), value.into()));
        self
    }

    /// Enables or disables month-sharding of the audit table.
    pub fn with_split_table(mut self, split: bool) -> Self {
        self.split_table = Some(split);
        self
    }

    /// Merges another option set over this one.
    ///
    /// Scalar fields set on `other` replace this set's values; map
    /// entries and cookies are combined with `other` winning on
    /// duplicate keys.
    pub fn merge(mut self, other: CallOptions) -> Self {
        if other.content_type.is_some() {
            self.content_type = other.content_type;
        }
        if other.body.is_some() {
            self.body = other.body;
        }
        if other.table_name.is_some() {
            self.table_name = other.table_name;
        }
        if other.split_table.is_some() {
            self.split_table = other.split_table;
        }
        self.query.extend(other.query);
        self.headers.extend(other.headers);
        self.cookies.extend(other.cookies);
        self
    }
}
