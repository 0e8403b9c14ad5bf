//! Blocking client for a collection-based records API.
//!
//! # Overview
//! `ApiClient` wraps create/update/delete/list/get calls against
//! `{base}/api/collections/{collection}/records`. Before every call it asks
//! its auth strategy for a valid token; when that fails the call returns the
//! auth error and nothing else is sent. `Collection<T>` gives a typed view of
//! one collection, and `Filter` renders parameterised filter expressions for
//! list queries.
//!
//! # Design
//! - Requests and responses are plain data (`HttpRequest`/`HttpResponse`);
//!   only a `Transport` performs I/O, so building and parsing are testable in
//!   isolation.
//! - The auth strategy is chosen once from a `Credential` and never swapped.
//! - Errors are classified (auth, transport, backend status, decode) and
//!   never retried here, except transport-level retries inside
//!   `UreqTransport`.

pub mod auth;
pub mod client;
pub mod collection;
pub mod config;
pub mod error;
pub mod filter;
pub mod http;
pub mod transport;
pub mod types;

#[cfg(test)]
mod test_support;

pub use auth::{AuthStrategy, Authorizer, Credential, NoOpAuth, PasswordAuth, TokenAuth};
pub use client::ApiClient;
pub use collection::Collection;
pub use config::ClientConfig;
pub use error::{AuthError, ClientError, FilterError, Result, TransportError};
pub use filter::{Filter, FilterParams, FilterValue};
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use transport::{Transport, TransportConfig, UreqTransport};
pub use types::{CreateResult, ListOptions, ListResult, Record};
