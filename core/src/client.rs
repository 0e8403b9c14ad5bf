//! Authorization-gated client for collection records.
//!
//! # Design
//! Each primitive is split into a pure `build_*` method that produces an
//! `HttpRequest` and a pure `parse_*` method that consumes an `HttpResponse`.
//! The gated methods (`create`, `update`, `delete`, `list`, `get_one`) run
//! the auth strategy first, then build, attach the bearer token, execute
//! through the `Transport`, and parse. When authorization fails nothing is
//! sent.

use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::auth::{bearer, AuthStrategy, Authorizer};
use crate::collection::Collection;
use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::transport::{Transport, UreqTransport};
use crate::types::{CreateResult, ListOptions, ListResult, Record};

/// Client for the records API of one backend.
///
/// The auth strategy is fixed at construction. The client is `Sync`, so one
/// instance can serve several threads.
pub struct ApiClient {
    base_url: String,
    transport: Arc<dyn Transport>,
    auth: Authorizer,
    debug: bool,
}

impl ApiClient {
    /// Build a client that talks HTTP through a `ureq` agent.
    pub fn new(config: ClientConfig) -> Self {
        let transport = Arc::new(UreqTransport::new(config.transport.clone()));
        Self::with_transport(config, transport)
    }

    /// Build a client on top of any transport; auth requests go through it
    /// too.
    pub fn with_transport(config: ClientConfig, transport: Arc<dyn Transport>) -> Self {
        let auth = Authorizer::from_credential(
            config.credential.clone(),
            Arc::clone(&transport),
            config.token_freshness,
        );
        Self {
            base_url: config.base_url().to_string(),
            transport,
            auth,
            debug: config.debug,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn auth_strategy(&self) -> &Authorizer {
        &self.auth
    }

    /// Run the auth strategy without issuing any other request.
    pub fn authorize(&self) -> Result<()> {
        self.auth.authorize().map_err(ClientError::from)
    }

    /// A typed view over one collection.
    pub fn collection<T>(&self, name: &str) -> Collection<'_, T> {
        Collection::new(self, name)
    }

    /// An untyped view over one collection.
    pub fn records(&self, name: &str) -> Collection<'_, Record> {
        Collection::new(self, name)
    }

    // -----------------------------------------------------------------------
    // Gated operations
    // -----------------------------------------------------------------------

    pub fn create<B: Serialize + ?Sized>(&self, collection: &str, body: &B) -> Result<CreateResult> {
        self.authorize()?;
        let request = self.build_create(collection, body)?;
        self.parse_create(self.send(request)?)
    }

    pub fn update<B: Serialize + ?Sized>(&self, collection: &str, id: &str, body: &B) -> Result<()> {
        self.authorize()?;
        let request = self.build_update(collection, id, body)?;
        self.parse_update(self.send(request)?)
    }

    pub fn delete(&self, collection: &str, id: &str) -> Result<()> {
        self.authorize()?;
        let request = self.build_delete(collection, id);
        self.parse_delete(self.send(request)?)
    }

    /// List one page of records, decoding items into `T`. The request does
    /// not depend on `T`.
    pub fn list<T: DeserializeOwned>(
        &self,
        collection: &str,
        options: &ListOptions,
    ) -> Result<ListResult<T>> {
        self.authorize()?;
        let request = self.build_list(collection, options);
        self.parse_list(self.send(request)?)
    }

    /// [`list`](Self::list) with untyped records.
    pub fn list_records(&self, collection: &str, options: &ListOptions) -> Result<ListResult<Record>> {
        self.list(collection, options)
    }

    pub fn get_one<T: DeserializeOwned>(&self, collection: &str, id: &str) -> Result<T> {
        self.authorize()?;
        let request = self.build_get_one(collection, id);
        self.parse_get_one(self.send(request)?)
    }

    // -----------------------------------------------------------------------
    // Request builders
    // -----------------------------------------------------------------------

    pub fn build_create<B: Serialize + ?Sized>(&self, collection: &str, body: &B) -> Result<HttpRequest> {
        let body = encode(body)?;
        Ok(HttpRequest::new(HttpMethod::Post, self.records_url(collection)).with_body(body))
    }

    pub fn build_update<B: Serialize + ?Sized>(
        &self,
        collection: &str,
        id: &str,
        body: &B,
    ) -> Result<HttpRequest> {
        let body = encode(body)?;
        Ok(HttpRequest::new(HttpMethod::Patch, self.record_url(collection, id)).with_body(body))
    }

    pub fn build_delete(&self, collection: &str, id: &str) -> HttpRequest {
        HttpRequest::new(HttpMethod::Delete, self.record_url(collection, id))
    }

    pub fn build_list(&self, collection: &str, options: &ListOptions) -> HttpRequest {
        options
            .query_pairs()
            .into_iter()
            .fold(HttpRequest::new(HttpMethod::Get, self.records_url(collection)), |req, (k, v)| {
                req.with_query(k, v)
            })
    }

    pub fn build_get_one(&self, collection: &str, id: &str) -> HttpRequest {
        HttpRequest::new(HttpMethod::Get, self.record_url(collection, id))
    }

    // -----------------------------------------------------------------------
    // Response parsers
    // -----------------------------------------------------------------------

    pub fn parse_create(&self, response: HttpResponse) -> Result<CreateResult> {
        check_status(&response)?;
        decode(&response)
    }

    pub fn parse_update(&self, response: HttpResponse) -> Result<()> {
        check_status(&response)
    }

    pub fn parse_delete(&self, response: HttpResponse) -> Result<()> {
        check_status(&response)
    }

    pub fn parse_list<T: DeserializeOwned>(&self, response: HttpResponse) -> Result<ListResult<T>> {
        check_status(&response)?;
        decode(&response)
    }

    pub fn parse_get_one<T: DeserializeOwned>(&self, response: HttpResponse) -> Result<T> {
        check_status(&response)?;
        decode(&response)
    }

    // -----------------------------------------------------------------------

    fn records_url(&self, collection: &str) -> String {
        format!(
            "{}/api/collections/{}/records",
            self.base_url,
            urlencoding::encode(collection)
        )
    }

    fn record_url(&self, collection: &str, id: &str) -> String {
        format!("{}/{}", self.records_url(collection), urlencoding::encode(id))
    }

    /// Attach the current token and execute.
    fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let request = match self.auth.current_token() {
            Some(token) => request.with_header("Authorization", bearer(&token)),
            None => request,
        };
        if self.debug {
            debug!(method = %request.method, url = %request.url, query = ?request.query, "sending request");
        }
        let response = self.transport.execute(&request)?;
        if self.debug {
            debug!(method = %request.method, url = %request.url, status = response.status, "received response");
        }
        Ok(response)
    }
}

impl fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .field("auth", &self.auth)
            .field("debug", &self.debug)
            .finish_non_exhaustive()
    }
}

/// Map non-success statuses to `ClientError::Backend`.
fn check_status(response: &HttpResponse) -> Result<()> {
    if response.is_success() {
        return Ok(());
    }
    Err(ClientError::Backend {
        status: response.status,
        body: response.body.clone(),
    })
}

fn decode<T: DeserializeOwned>(response: &HttpResponse) -> Result<T> {
    serde_json::from_str(&response.body).map_err(|e| ClientError::Decode(e.to_string()))
}

fn encode<B: Serialize + ?Sized>(body: &B) -> Result<String> {
    serde_json::to_string(body).map_err(|e| ClientError::Serialization(e.to_string()))
}
