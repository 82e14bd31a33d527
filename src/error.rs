//! Error types for audited HTTP calls.
//!
//! This module provides the error taxonomy for the crate. Errors preserve
//! debugging context (raw response bodies, HTTP status codes, the backing
//! store's failure) while remaining ergonomic to match on. Transport-level
//! failures are the only errors the retrying executor acts on; everything
//! else surfaces to the caller directly.

use http::StatusCode;

/// A boxed error produced by a [`RecordStore`](crate::RecordStore)
/// implementation.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The main error type for audited HTTP calls.
///
/// # Examples
///
/// ```no_run
/// use scrivener::{CallOptions, Client, Error, Payload};
/// use http::Method;
///
/// # async fn example() -> Result<(), Error> {
/// let client = Client::builder().build()?;
///
/// let call = client
///     .request("http://api.example.com/users", Method::GET, Payload::Empty, None, CallOptions::new())
///     .await?;
///
/// match call.json::<serde_json::Value>().await {
///     Ok(response) => println!("Success: {:?}", response.data),
///     Err(Error::Decode { raw_response, serde_error, .. }) => {
///         eprintln!("Failed to decode. Raw response: {}", raw_response);
///         eprintln!("Serde error: {}", serde_error);
///     }
///     Err(e) => eprintln!("Other error: {}", e),
/// }
/// # Ok(())
/// # }
/// ```
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The base URL could not be parsed.
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The HTTP method is outside the supported set
    /// (GET, POST, PUT, DELETE, PATCH).
    #[error("unsupported HTTP method: {method}")]
    UnsupportedMethod {
        /// The method that was rejected.
        method: String,
    },

    /// The retry delay list is shorter than the attempt count requires.
    ///
    /// A plan of `N` attempts needs `N - 1` inter-attempt delays. This is
    /// reported when the plan is configured, before any network attempt.
    #[error("retry delay list has {delays} entries, fewer than the {attempts}-attempt plan requires")]
    RetryConfigIncomplete {
        /// The configured attempt count.
        attempts: usize,
        /// The number of delays that were provided.
        delays: usize,
    },

    /// A network-level error occurred on an attempt (connection failed,
    /// DNS lookup failed, connection reset mid-response, etc.).
    ///
    /// This wraps the underlying `reqwest::Error` and drives the retry
    /// loop; it is only returned once the retry budget is exhausted.
    #[error("transport failure: {0}")]
    Transport(#[from] reqwest::Error),

    /// An attempt exceeded the configured per-request deadline.
    ///
    /// The in-flight call is cancelled and the timeout is counted as a
    /// normal retryable attempt failure.
    #[error("request timed out")]
    Timeout,

    /// No record store is configured on the client.
    #[error("no record store configured")]
    BackendUnavailable,

    /// The record store failed to provision a table or write a row.
    ///
    /// Persistence failures never abort an otherwise-successful HTTP call;
    /// they are reported on the audit channel
    /// ([`Receipt::audit_error`](crate::Receipt::audit_error)) instead.
    #[error("audit persistence failed while {context}: {source}")]
    Persistence {
        /// What the persister was doing when the store failed.
        context: String,
        /// The store's underlying error.
        #[source]
        source: BoxError,
    },

    /// The response body could not be decoded into the requested shape.
    ///
    /// The audit record has already been persisted with the raw bytes by
    /// the time this is reported.
    #[error("failed to decode response (status {status}): {serde_error}")]
    Decode {
        /// The raw response body as text.
        raw_response: String,
        /// The decoder's error message.
        serde_error: String,
        /// The HTTP status code of the response.
        status: StatusCode,
    },

    /// A request payload or audit field could not be serialized to JSON.
    #[error("failed to serialize: {0}")]
    Serialization(String),

    /// Invalid client or call configuration (bad header name, client
    /// construction failure, etc.).
    #[error("configuration error: {0}")]
    Config(String),

    /// A filesystem error while streaming a download to disk.
    #[error("file write failed: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Returns `true` if this error is retryable by the executor.
    ///
    /// Only transport failures and per-attempt timeouts drive the retry
    /// loop. An HTTP response with any status code, including 4xx and 5xx,
    /// is a completed attempt rather than a retryable failure.
    ///
    /// # Examples
    ///
    /// ```
    /// use scrivener::Error;
    ///
    /// assert!(Error::Timeout.is_retryable());
    /// assert!(!Error::BackendUnavailable.is_retryable());
    /// ```
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Transport(_) | Error::Timeout)
    }

    /// Returns the HTTP status code if this error carries one.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Error::Decode { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Returns the raw response body if this error carries one.
    pub fn raw_response(&self) -> Option<&str> {
        match self {
            Error::Decode { raw_response, .. } => Some(raw_response),
            _ => None,
        }
    }
}

/// A specialized `Result` type for audited HTTP calls.
pub type Result<T> = std::result::Result<T, Error>;
