//! # Scrivener - an audited HTTP client library
//!
//! Scrivener is a retry-aware HTTP client built on top of `reqwest` that
//! writes a durable audit record for every request it makes: the request
//! that was sent, the response that came back, timing, and retries, all
//! persisted through a pluggable [`RecordStore`].
//!
//! ## Quick Start
//!
//! ```no_run
//! use scrivener::{CallOptions, Client, Payload};
//! use http::Method;
//! use serde::Serialize;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! #[derive(Serialize)]
//! struct CreateOrder {
//!     sku: String,
//!     quantity: u32,
//! }
//!
//! # async fn example(store: Arc<dyn scrivener::RecordStore>) -> Result<(), scrivener::Error> {
//! // Create a client with a 10 second deadline and an audit store.
//! let client = Client::builder()
//!     .timeout(Duration::from_secs(10))
//!     .store(store)
//!     .build()?;
//!
//! // POST with three attempts, sleeping 1s then 5s between failures.
//! let payload = Payload::json(&CreateOrder { sku: "A-100".to_string(), quantity: 2 })?;
//! let mut response = client
//!     .request("https://api.example.com/orders", Method::POST, payload, None, CallOptions::new())
//!     .await?
//!     .retry(3, vec![Duration::from_secs(1), Duration::from_secs(5)])?
//!     .map()
//!     .await?;
//!
//! println!("order: {:?}", response.data);
//! println!("took {:?} over {} attempt(s)", response.latency, response.attempts);
//!
//! // Record the application-level outcome on the same audit row.
//! response
//!     .receipt
//!     .save_business_result(&serde_json::json!({ "accepted": true }))
//!     .await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## The audit trail
//!
//! Every call persists a [`RequestRecord`] at three points: when the
//! request is assembled (so a record exists even if the network is never
//! reached), after every attempt, and after the response is
//! materialized. A failed attempt that will be retried resets the
//! record's identity first, so the trail keeps one row per attempt.
//!
//! The store is yours: implement [`RecordStore`] over any backend that
//! can create a table, insert a row, and update a row by id. Audit
//! failures never fail the HTTP call; they surface on
//! [`Receipt::audit_error`] instead.
//!
//! ## Materialization
//!
//! A pending [`Call`] ends in one of five shapes:
//!
//! - [`Call::bytes`] - the raw body
//! - [`Call::text`] - UTF-8 text
//! - [`Call::json`] - any `DeserializeOwned` type
//! - [`Call::map`] - a JSON object map
//! - [`Call::download`] - streamed to a file, without copying the
//!   payload into the audit record
//!
//! ## Retries
//!
//! The retry budget is explicit: an attempt count plus a delay list
//! covering every gap between attempts, validated up front. Only
//! transport failures and per-attempt timeouts are retried; an HTTP
//! response with any status code completes the call.
//!
//! ```no_run
//! use scrivener::{CallOptions, Client};
//! use std::time::Duration;
//!
//! # async fn example(client: Client) -> Result<(), scrivener::Error> {
//! let response = client
//!     .get("https://api.example.com/health", CallOptions::new())
//!     .await?
//!     .retry(4, vec![
//!         Duration::from_millis(500),
//!         Duration::from_secs(1),
//!         Duration::from_secs(5),
//!     ])?
//!     .text()
//!     .await?;
//! # Ok(())
//! # }
//! ```

mod client;
mod error;
pub mod options;
mod record;
mod response;
pub mod retry;
pub mod store;

pub use client::{Call, Client, ClientBuilder};
pub use error::{BoxError, Error, Result};
pub use options::{CallOptions, Payload};
pub use record::RequestRecord;
pub use response::{Receipt, Response};
pub use retry::RetryPlan;
pub use store::RecordStore;
