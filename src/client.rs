//! The audited HTTP client: assembly, retrying execution, and response
//! materialization.
//!
//! [`Client`] owns the pooled transport and the audit persister. Each
//! request becomes a [`Call`], which persists its audit record at
//! assembly, after every network attempt, and after materialization.

use http::header::{CONTENT_TYPE, COOKIE};
use http::{HeaderMap, HeaderName, HeaderValue, Method};
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::AsyncWriteExt;
use url::Url;

use crate::options::{CallOptions, Payload};
use crate::record::{now_stamp, RequestRecord};
use crate::response::{Receipt, Response};
use crate::retry::RetryPlan;
use crate::store::{Persister, RecordStore};
use crate::{Error, Result};

/// An HTTP client that writes an audit record for every request it
/// makes.
///
/// The client is designed to be reused: it maintains a connection pool
/// and a single audit persister shared by all calls. Cloning is cheap.
///
/// # Examples
///
/// ```no_run
/// use scrivener::{CallOptions, Client, Payload};
/// use http::Method;
/// use serde::Serialize;
/// use std::time::Duration;
///
/// #[derive(Serialize)]
/// struct CreateUser {
///     name: String,
/// }
///
/// # async fn example(store: std::sync::Arc<dyn scrivener::RecordStore>) -> Result<(), scrivener::Error> {
/// let client = Client::builder()
///     .timeout(Duration::from_secs(10))
///     .store(store)
///     .build()?;
///
/// let payload = Payload::json(&CreateUser { name: "Alice".to_string() })?;
/// let response = client
///     .request("http://api.example.com/users", Method::POST, payload, None, CallOptions::new())
///     .await?
///     .retry(3, vec![Duration::from_secs(1), Duration::from_secs(2)])?
///     .map()
///     .await?;
///
/// println!("created: {:?}", response.data);
/// if let Some(audit) = response.receipt.audit_error() {
///     eprintln!("call succeeded but the audit trail did not: {audit}");
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    http: reqwest::Client,
    timeout: Duration,
    persister: Persister,
}

impl Client {
    /// Creates a new [`ClientBuilder`].
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Assembles an audited request and persists its initial record.
    ///
    /// The partially filled audit record is written before this returns,
    /// success or failure, so a record exists even for requests that
    /// never reach the network. `template` seeds the record; use it to
    /// pre-fill fields such as
    /// [`business_payload`](RequestRecord::business_payload).
    ///
    /// # Errors
    ///
    /// [`Error::InvalidUrl`] when the base URL does not parse,
    /// [`Error::UnsupportedMethod`] for methods outside
    /// GET/POST/PUT/DELETE/PATCH, [`Error::Serialization`] when a
    /// payload or audit field cannot be encoded, [`Error::Config`] for
    /// invalid header names or values.
    pub async fn request(
        &self,
        url_path: impl AsRef<str>,
        method: Method,
        payload: Payload,
        template: Option<RequestRecord>,
        options: CallOptions,
    ) -> Result<Call> {
        let mut record = template.unwrap_or_default();
        let table = resolve_table(&options);
        let assembled = assemble(&mut record, url_path.as_ref(), &method, payload, &options);

        let mut audit_error = None;
        if let Err(e) = self.inner.persister.save(&mut record, &table).await {
            tracing::error!(error = %e, table = %table, "failed to persist audit record");
            audit_error = Some(e);
        }

        let (url, headers, body) = assembled?;

        Ok(Call {
            client: self.clone(),
            method,
            url,
            headers,
            body,
            record,
            table,
            plan: RetryPlan::single(),
            audit_error,
            attempts_made: 0,
        })
    }

    /// Assembles an audited GET request.
    pub async fn get(&self, url_path: impl AsRef<str>, options: CallOptions) -> Result<Call> {
        self.request(url_path, Method::GET, Payload::Empty, None, options)
            .await
    }

    /// Assembles an audited POST request.
    pub async fn post(
        &self,
        url_path: impl AsRef<str>,
        payload: Payload,
        options: CallOptions,
    ) -> Result<Call> {
        self.request(url_path, Method::POST, payload, None, options)
            .await
    }

    /// Assembles an audited PUT request.
    pub async fn put(
        &self,
        url_path: impl AsRef<str>,
        payload: Payload,
        options: CallOptions,
    ) -> Result<Call> {
        self.request(url_path, Method::PUT, payload, None, options)
            .await
    }

    /// Assembles an audited DELETE request.
    pub async fn delete(
        &self,
        url_path: impl AsRef<str>,
        payload: Payload,
        options: CallOptions,
    ) -> Result<Call> {
        self.request(url_path, Method::DELETE, payload, None, options)
            .await
    }

    /// Assembles an audited PATCH request.
    pub async fn patch(
        &self,
        url_path: impl AsRef<str>,
        payload: Payload,
        options: CallOptions,
    ) -> Result<Call> {
        self.request(url_path, Method::PATCH, payload, None, options)
            .await
    }
}

/// Builder for configuring and creating a [`Client`].
///
/// The connection pool carries fixed defaults (100 idle connections per
/// host, 90 s idle timeout, 30 s connect timeout and TCP keep-alive);
/// only the per-request deadline, the audit store, and the TLS
/// verification policy are configurable.
pub struct ClientBuilder {
    timeout: Duration,
    store: Option<Arc<dyn RecordStore>>,
    danger_accept_invalid_certs: bool,
}

impl ClientBuilder {
    /// Creates a builder with a 30 second per-request deadline, no audit
    /// store, and TLS certificate verification disabled.
    pub fn new() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            store: None,
            danger_accept_invalid_certs: true,
        }
    }

    /// Sets the per-request deadline applied to every attempt.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the audit store. Without one, every persistence attempt
    /// reports [`Error::BackendUnavailable`] on the audit channel while
    /// HTTP calls proceed normally.
    pub fn store(mut self, store: Arc<dyn RecordStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Controls TLS certificate verification. Disabled by default to
    /// match the fixed transport policy of the audited-gateway
    /// deployments this client targets; set `false` to re-enable
    /// verification.
    pub fn danger_accept_invalid_certs(mut self, accept: bool) -> Self {
        self.danger_accept_invalid_certs = accept;
        self
    }

    /// Builds the configured [`Client`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the underlying transport cannot be
    /// constructed.
    pub fn build(self) -> Result<Client> {
        let http = reqwest::Client::builder()
            .pool_max_idle_per_host(100)
            .pool_idle_timeout(Duration::from_secs(90))
            .connect_timeout(Duration::from_secs(30))
            .tcp_keepalive(Duration::from_secs(30))
            .danger_accept_invalid_certs(self.danger_accept_invalid_certs)
            .timeout(self.timeout)
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Client {
            inner: Arc::new(ClientInner {
                http,
                timeout: self.timeout,
                persister: Persister::new(self.store),
            }),
        })
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A pending audited request.
///
/// Produced by [`Client::request`]; consumed by one of the terminal
/// materializers. A call and its audit record are owned by a single
/// chain and must not be shared across concurrent invocations.
pub struct Call {
    client: Client,
    method: Method,
    url: Url,
    headers: HeaderMap,
    body: Option<Vec<u8>>,
    record: RequestRecord,
    table: String,
    plan: RetryPlan,
    audit_error: Option<Error>,
    attempts_made: usize,
}

impl Call {
    /// Attaches a retry plan: `attempts` total attempts with the given
    /// inter-attempt delays.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RetryConfigIncomplete`] when fewer than
    /// `attempts - 1` delays are provided. The check runs here, before
    /// any network attempt.
    pub fn retry(mut self, attempts: usize, delays: Vec<Duration>) -> Result<Self> {
        let plan = RetryPlan::new(attempts, delays);
        plan.validate()?;
        self.plan = plan;
        Ok(self)
    }

    /// The audit record in its current state.
    pub fn record(&self) -> &RequestRecord {
        &self.record
    }

    /// Reads the whole response body as bytes.
    ///
    /// Records protocol version, latency, status code, response headers,
    /// and a text copy of the body on the audit record, then persists
    /// it.
    pub async fn bytes(mut self) -> Result<Response<Vec<u8>>> {
        let dispatched = Instant::now();
        let response = self.execute().await?;

        self.record.http_version = format!("{:?}", response.version());
        let latency = dispatched.elapsed();
        self.record.latency_ms = latency.as_millis() as i64;
        self.record.http_status = response.status().as_u16().to_string();
        self.record.response_headers = match headers_json(response.headers()) {
            Ok(json) => json,
            Err(e) => {
                self.persist().await;
                return Err(e);
            }
        };

        let status = response.status();
        let headers = response.headers().clone();

        let body = match response.bytes().await {
            Ok(bytes) => bytes,
            Err(e) => {
                self.persist().await;
                return Err(Error::Transport(e));
            }
        };
        self.record.response_body = String::from_utf8_lossy(&body).into_owned();
        self.persist().await;

        tracing::info!(
            status = status.as_u16(),
            latency_ms = latency.as_millis() as u64,
            attempts = self.attempts_made,
            "received HTTP response"
        );

        Ok(Response {
            data: body.to_vec(),
            status,
            headers,
            latency,
            attempts: self.attempts_made,
            receipt: Receipt::new(
                self.record,
                self.table,
                self.client.inner.persister.clone(),
                self.audit_error,
            ),
        })
    }

    /// Reads the response body as a UTF-8 string.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`] when the body is not valid UTF-8; the
    /// audit record has already been persisted with the raw bytes.
    pub async fn text(self) -> Result<Response<String>> {
        let response = self.bytes().await?;
        let Response {
            data,
            status,
            headers,
            latency,
            attempts,
            receipt,
        } = response;

        match String::from_utf8(data) {
            Ok(text) => Ok(Response {
                data: text,
                status,
                headers,
                latency,
                attempts,
                receipt,
            }),
            Err(e) => Err(Error::Decode {
                raw_response: String::from_utf8_lossy(e.as_bytes()).into_owned(),
                serde_error: e.to_string(),
                status,
            }),
        }
    }

    /// Deserializes the response body into `T`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`] carrying the raw body and status when
    /// deserialization fails; the audit record has already been
    /// persisted with the raw bytes.
    pub async fn json<T: DeserializeOwned>(self) -> Result<Response<T>> {
        let response = self.bytes().await?;
        let status = response.status;

        match serde_json::from_slice::<T>(&response.data) {
            Ok(data) => Ok(response.map(|_| data)),
            Err(e) => Err(Error::Decode {
                raw_response: String::from_utf8_lossy(&response.data).into_owned(),
                serde_error: e.to_string(),
                status,
            }),
        }
    }

    /// Deserializes the response body into a JSON object map.
    pub async fn map(self) -> Result<Response<serde_json::Map<String, serde_json::Value>>> {
        self.json().await
    }

    /// Streams the response body into `dir/file_name`.
    ///
    /// Performs the same status/header/latency bookkeeping as
    /// [`Call::bytes`], but the payload goes straight to disk and the
    /// audit record's `response_body` stays empty, so large binary
    /// downloads are not copied into the store.
    pub async fn download(
        mut self,
        dir: impl AsRef<Path>,
        file_name: impl AsRef<str>,
    ) -> Result<Response<PathBuf>> {
        let dispatched = Instant::now();
        let mut response = self.execute().await?;

        self.record.http_version = format!("{:?}", response.version());
        let latency = dispatched.elapsed();
        self.record.latency_ms = latency.as_millis() as i64;
        self.record.http_status = response.status().as_u16().to_string();
        self.record.response_headers = match headers_json(response.headers()) {
            Ok(json) => json,
            Err(e) => {
                self.persist().await;
                return Err(e);
            }
        };

        let status = response.status();
        let headers = response.headers().clone();
        let path = dir.as_ref().join(file_name.as_ref());

        let written: Result<()> = async {
            let mut file = tokio::fs::File::create(&path).await?;
            while let Some(chunk) = response.chunk().await.map_err(Error::Transport)? {
                file.write_all(&chunk).await?;
            }
            file.flush().await?;
            Ok(())
        }
        .await;

        self.persist().await;
        written?;

        tracing::info!(
            status = status.as_u16(),
            path = %path.display(),
            attempts = self.attempts_made,
            "downloaded response body"
        );

        Ok(Response {
            data: path,
            status,
            headers,
            latency,
            attempts: self.attempts_made,
            receipt: Receipt::new(
                self.record,
                self.table,
                self.client.inner.persister.clone(),
                self.audit_error,
            ),
        })
    }

    /// Runs the attempt loop: strictly sequential attempts, each bounded
    /// by the per-request deadline and persisted before the next starts.
    async fn execute(&mut self) -> Result<reqwest::Response> {
        let attempts = self.plan.attempts();
        let mut attempt = 0;

        loop {
            attempt += 1;
            self.attempts_made = attempt;

            if attempt > 1 {
                self.record.remark = format!("retry attempt {}", attempt - 1);
                tracing::warn!(
                    attempt,
                    method = %self.method,
                    url = %self.url,
                    "retrying request"
                );
            }

            self.record.issued_at = now_stamp();
            let started = Instant::now();
            tracing::debug!(
                method = %self.method,
                url = %self.url,
                attempt,
                "executing HTTP request"
            );

            let outcome = self.dispatch().await;
            if matches!(outcome, Err(Error::Timeout)) {
                self.record.latency_ms = started.elapsed().as_millis() as i64;
            }
            self.persist().await;

            match outcome {
                Ok(response) => break Ok(response),
                Err(e) if attempt < attempts => {
                    tracing::warn!(error = %e, attempt, "attempt failed");
                    // next persist must insert a fresh row, not overwrite
                    // the failed attempt's
                    self.record.reset_identity();
                    if let Some(delay) = self.plan.delay_after(attempt) {
                        tokio::time::sleep(delay).await;
                    }
                }
                Err(e) => break Err(e),
            }
        }
    }

    /// One attempt against the pooled transport, under the configured
    /// deadline.
    async fn dispatch(&self) -> Result<reqwest::Response> {
        let mut request = self
            .client
            .inner
            .http
            .request(self.method.clone(), self.url.clone())
            .headers(self.headers.clone());
        if let Some(body) = &self.body {
            request = request.body(body.clone());
        }

        match tokio::time::timeout(self.client.inner.timeout, request.send()).await {
            Ok(Ok(response)) => Ok(response),
            // the pooled client enforces the same deadline internally;
            // report either expiry as a timeout
            Ok(Err(e)) if e.is_timeout() => Err(Error::Timeout),
            Ok(Err(e)) => Err(Error::Transport(e)),
            Err(_) => Err(Error::Timeout),
        }
    }

    async fn persist(&mut self) {
        if let Err(e) = self
            .client
            .inner
            .persister
            .save(&mut self.record, &self.table)
            .await
        {
            tracing::error!(error = %e, table = %self.table, "failed to persist audit record");
            self.audit_error = Some(e);
        }
    }
}

fn resolve_table(options: &CallOptions) -> String {
    let base = options
        .table_name
        .clone()
        .unwrap_or_else(|| RequestRecord::TABLE.to_string());
    if options.split_table.unwrap_or(false) {
        format!("{base}_{}", chrono::Local::now().format("%Y%m"))
    } else {
        base
    }
}

/// Builds the network request parts and mirrors them onto the audit
/// record. GET never carries a body, even when one was computed.
fn assemble(
    record: &mut RequestRecord,
    url_path: &str,
    method: &Method,
    payload: Payload,
    options: &CallOptions,
) -> Result<(Url, HeaderMap, Option<Vec<u8>>)> {
    record.base_url = url_path.to_string();

    let mut url = Url::parse(url_path)?;
    if !options.query.is_empty() {
        {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in &options.query {
                pairs.append_pair(key, value);
            }
        }
        record.query =
            serde_json::to_string(&options.query).map_err(|e| Error::Serialization(e.to_string()))?;
    }
    record.path = url.to_string();
    tracing::debug!(url = %url, "assembled request target");

    let body_text = match payload {
        Payload::Raw(body) => Some(body),
        Payload::Json(value) => {
            Some(serde_json::to_string(&value).map_err(|e| Error::Serialization(e.to_string()))?)
        }
        Payload::Empty => options.body.clone(),
    };
    if let Some(body) = &body_text {
        record.body = body.clone();
    }

    match method.as_str() {
        "GET" | "POST" | "PUT" | "DELETE" | "PATCH" => {}
        other => {
            return Err(Error::UnsupportedMethod {
                method: other.to_string(),
            })
        }
    }
    record.method = method.to_string();

    let body = if *method == Method::GET {
        None
    } else {
        body_text.map(String::into_bytes)
    };

    let mut headers = HeaderMap::new();
    for (name, value) in &options.headers {
        let name = HeaderName::try_from(name.as_str())
            .map_err(|e| Error::Config(format!("invalid header name {name:?}: {e}")))?;
        let value = HeaderValue::try_from(value.as_str())
            .map_err(|e| Error::Config(format!("invalid header value: {e}")))?;
        headers.append(name, value);
    }
    record.request_headers =
        serde_json::to_string(&options.headers).map_err(|e| Error::Serialization(e.to_string()))?;

    if let Some(content_type) = &options.content_type {
        let value = HeaderValue::try_from(content_type.as_str())
            .map_err(|e| Error::Config(format!("invalid content type: {e}")))?;
        headers.append(CONTENT_TYPE, value);
        record.content_type = content_type.clone();
    }

    if !options.cookies.is_empty() {
        let joined = options
            .cookies
            .iter()
            .map(|cookie| cookie.to_string())
            .collect::<Vec<_>>()
            .join("; ");
        let value = HeaderValue::try_from(joined)
            .map_err(|e| Error::Config(format!("invalid cookie value: {e}")))?;
        headers.append(COOKIE, value);
    }

    Ok((url, headers, body))
}

/// Serializes a header map to JSON as `name -> [values]`.
fn headers_json(headers: &HeaderMap) -> Result<String> {
    let mut map: BTreeMap<&str, Vec<String>> = BTreeMap::new();
    for (name, value) in headers {
        map.entry(name.as_str())
            .or_default()
            .push(String::from_utf8_lossy(value.as_bytes()).into_owned());
    }
    serde_json::to_string(&map).map_err(|e| Error::Serialization(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let client = Client::builder().build().unwrap();
        assert_eq!(client.inner.timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_resolve_table_defaults_and_shards() {
        assert_eq!(resolve_table(&CallOptions::new()), RequestRecord::TABLE);

        let named = CallOptions::new().with_table_name("gateway_audit");
        assert_eq!(resolve_table(&named), "gateway_audit");

        let sharded = CallOptions::new().with_split_table(true);
        let resolved = resolve_table(&sharded);
        assert!(resolved.starts_with("http_request_record_"));
        // base, underscore, YYYYMM
        assert_eq!(resolved.len(), RequestRecord::TABLE.len() + 7);
    }

    #[test]
    fn test_assemble_get_drops_body_but_records_it() {
        let mut record = RequestRecord::new();
        let (_, _, body) = assemble(
            &mut record,
            "http://example.com/items",
            &Method::GET,
            Payload::from("ignored on the wire"),
            &CallOptions::new(),
        )
        .unwrap();

        assert!(body.is_none());
        assert_eq!(record.body, "ignored on the wire");
        assert_eq!(record.method, "GET");
    }

    #[test]
    fn test_assemble_rejects_unsupported_method() {
        let mut record = RequestRecord::new();
        let result = assemble(
            &mut record,
            "http://example.com/items",
            &Method::HEAD,
            Payload::Empty,
            &CallOptions::new(),
        );

        match result {
            Err(Error::UnsupportedMethod { method }) => assert_eq!(method, "HEAD"),
            other => panic!("expected UnsupportedMethod, got {:?}", other),
        }
        // the method is only recorded once it passes validation
        assert!(record.method.is_empty());
    }

    #[test]
    fn test_assemble_invalid_url() {
        let mut record = RequestRecord::new();
        let result = assemble(
            &mut record,
            "not a url",
            &Method::GET,
            Payload::Empty,
            &CallOptions::new(),
        );
        assert!(matches!(result, Err(Error::InvalidUrl(_))));
    }

    #[test]
    fn test_assemble_percent_encodes_query() {
        let mut record = RequestRecord::new();
        let options = CallOptions::new().with_query_param("q", "café au lait");
        let (url, _, _) = assemble(
            &mut record,
            "http://example.com/search",
            &Method::GET,
            Payload::Empty,
            &options,
        )
        .unwrap();

        assert_eq!(url.query(), Some("q=caf%C3%A9+au+lait"));
        // the raw map is still recoverable from the audit record
        let recovered: std::collections::HashMap<String, String> =
            serde_json::from_str(&record.query).unwrap();
        assert_eq!(recovered.get("q").map(String::as_str), Some("café au lait"));
    }

    #[test]
    fn test_assemble_body_option_fallback() {
        let mut record = RequestRecord::new();
        let options = CallOptions::new().with_body("a=1&b=2");
        let (_, _, body) = assemble(
            &mut record,
            "http://example.com/form",
            &Method::POST,
            Payload::Empty,
            &options,
        )
        .unwrap();

        assert_eq!(body.as_deref(), Some("a=1&b=2".as_bytes()));
        assert_eq!(record.body, "a=1&b=2");
    }

    #[test]
    fn test_assemble_headers_and_cookies() {
        let mut record = RequestRecord::new();
        let options = CallOptions::new()
            .with_content_type(crate::options::CONTENT_TYPE_JSON)
            .with_header("X-Request-Id", "abc-123")
            .with_cookie("session", "s3cr3t")
            .with_cookie("theme", "dark");
        let (_, headers, _) = assemble(
            &mut record,
            "http://example.com/items",
            &Method::POST,
            Payload::Empty,
            &options,
        )
        .unwrap();

        assert_eq!(headers.get("X-Request-Id").unwrap(), "abc-123");
        assert_eq!(
            headers.get(CONTENT_TYPE).unwrap(),
            crate::options::CONTENT_TYPE_JSON
        );
        assert_eq!(headers.get(COOKIE).unwrap(), "session=s3cr3t; theme=dark");
        assert_eq!(record.content_type, crate::options::CONTENT_TYPE_JSON);
        assert!(record.request_headers.contains("X-Request-Id"));
    }

    #[test]
    fn test_headers_json_groups_repeated_names() {
        let mut headers = HeaderMap::new();
        headers.append("set-cookie", HeaderValue::from_static("a=1"));
        headers.append("set-cookie", HeaderValue::from_static("b=2"));

        let json = headers_json(&headers).unwrap();
        assert_eq!(json, r#"{"set-cookie":["a=1","b=2"]}"#);
    }
}
