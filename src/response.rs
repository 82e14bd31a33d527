//! Materialized responses and their audit receipts.
//!
//! Every terminal operation on a [`Call`](crate::Call) returns a
//! [`Response`] wrapping the materialized data together with transaction
//! metadata and a [`Receipt`]: the handle to the audit record that was
//! persisted alongside the call.

use http::{HeaderMap, StatusCode};
use serde::Serialize;
use std::time::Duration;

use crate::record::RequestRecord;
use crate::store::Persister;
use crate::{Error, Result};

/// A materialized HTTP response.
///
/// # Type Parameters
///
/// * `T` - The materialized shape: `Vec<u8>` for bytes, `String` for
///   text, a deserialized type for JSON, or the written path for file
///   downloads.
///
/// # Examples
///
/// ```no_run
/// use scrivener::{CallOptions, Client, Payload};
/// use http::Method;
/// use serde::Deserialize;
///
/// #[derive(Deserialize)]
/// struct User {
///     id: u64,
///     name: String,
/// }
///
/// # async fn example() -> Result<(), scrivener::Error> {
/// # let client = Client::builder().build()?;
/// let response = client
///     .get("http://api.example.com/users/123", CallOptions::new())
///     .await?
///     .json::<User>()
///     .await?;
///
/// println!("User: {}", response.data.name);
/// println!("Request took {:?}", response.latency);
/// println!("Attempts: {}", response.attempts);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Response<T> {
    /// The materialized response data.
    pub data: T,

    /// The HTTP status code of the response.
    pub status: StatusCode,

    /// The response headers.
    pub headers: HeaderMap,

    /// Wall-clock latency from dispatch to response, spanning every
    /// retry attempt and inter-attempt delay.
    pub latency: Duration,

    /// The number of attempts made to complete this request. `1` when
    /// the first attempt succeeded.
    pub attempts: usize,

    /// Handle to the audit record persisted for this call.
    pub receipt: Receipt,
}

impl<T> Response<T> {
    /// Returns `true` if the request required retries.
    pub fn was_retried(&self) -> bool {
        self.attempts > 1
    }

    /// Returns a response header value by name, if present and valid
    /// UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)?.to_str().ok()
    }

    /// Maps the response data to a different type, preserving the
    /// metadata and receipt.
    pub fn map<U, F>(self, f: F) -> Response<U>
    where
        F: FnOnce(T) -> U,
    {
        Response {
            data: f(self.data),
            status: self.status,
            headers: self.headers,
            latency: self.latency,
            attempts: self.attempts,
            receipt: self.receipt,
        }
    }
}

impl<T> AsRef<T> for Response<T> {
    fn as_ref(&self) -> &T {
        &self.data
    }
}

impl<T> std::ops::Deref for Response<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.data
    }
}

/// The audit outcome of a completed call.
///
/// Holds the final [`RequestRecord`] as it was last persisted, the
/// table it lives in, and any persistence failure that occurred along
/// the way. Audit failures never fail the HTTP call itself; inspect
/// [`Receipt::audit_error`] when the trail matters.
pub struct Receipt {
    record: RequestRecord,
    table: String,
    persister: Persister,
    audit_error: Option<Error>,
}

impl Receipt {
    pub(crate) fn new(
        record: RequestRecord,
        table: String,
        persister: Persister,
        audit_error: Option<Error>,
    ) -> Self {
        Self {
            record,
            table,
            persister,
            audit_error,
        }
    }

    /// The audit record as it was last persisted.
    pub fn record(&self) -> &RequestRecord {
        &self.record
    }

    /// The table the record was written to.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// The most recent persistence failure, if any write to the store
    /// failed during this call.
    pub fn audit_error(&self) -> Option<&Error> {
        self.audit_error.as_ref()
    }

    /// Attaches an application-level outcome to the audit record and
    /// persists it.
    ///
    /// The value is serialized to JSON and stored in the record's
    /// `business_result` field, distinct from the raw HTTP response
    /// body. Unlike mid-call persistence, a store failure here is
    /// returned to the caller.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # async fn example(mut response: scrivener::Response<Vec<u8>>) -> Result<(), scrivener::Error> {
    /// response
    ///     .receipt
    ///     .save_business_result(&serde_json::json!({ "order_accepted": true }))
    ///     .await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn save_business_result<T: Serialize>(&mut self, value: &T) -> Result<()> {
        let json = serde_json::to_string(value).map_err(|e| Error::Serialization(e.to_string()))?;
        self.record.business_result = json;
        self.persister.save(&mut self.record, &self.table).await
    }
}

impl std::fmt::Debug for Receipt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Receipt")
            .field("record", &self.record)
            .field("table", &self.table)
            .field("audit_error", &self.audit_error)
            .finish_non_exhaustive()
    }
}
