//! Authentication strategies.
//!
//! An [`AuthStrategy`] turns a [`Credential`] into a bearer token that the
//! client attaches to every request. Three variants exist and one is chosen
//! when the client is built:
//!
//! - [`NoOpAuth`]: never produces a token.
//! - [`TokenAuth`]: wraps a supplied token and validates/rotates it once
//!   against an `auth-refresh` endpoint, then reuses the result.
//! - [`PasswordAuth`]: exchanges an identity and password for a token at an
//!   `auth-with-password` endpoint. By default this happens on every
//!   `authorize()` call; an optional freshness window lets a recent token be
//!   reused.
//!
//! Token state is instance-scoped and guarded by a mutex. Network calls are
//! made without holding the lock, so concurrent `authorize()` calls may each
//! hit the endpoint, but a cached token is always replaced as a whole.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::error::AuthError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::transport::Transport;

/// How the client authenticates. Immutable once a strategy is built from it.
#[derive(Clone, PartialEq, Eq, Default)]
pub enum Credential {
    #[default]
    None,
    EmailPassword {
        endpoint: String,
        email: String,
        password: String,
    },
    StaticToken {
        endpoint: String,
        token: String,
    },
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credential::None => f.write_str("None"),
            Credential::EmailPassword { endpoint, email, .. } => f
                .debug_struct("EmailPassword")
                .field("endpoint", endpoint)
                .field("email", email)
                .finish_non_exhaustive(),
            Credential::StaticToken { endpoint, .. } => f
                .debug_struct("StaticToken")
                .field("endpoint", endpoint)
                .finish_non_exhaustive(),
        }
    }
}

/// Capability shared by all strategies.
pub trait AuthStrategy: Send + Sync {
    /// Make sure `current_token` yields a usable credential, or fail.
    /// Safe to call repeatedly and from several threads.
    fn authorize(&self) -> Result<(), AuthError>;

    /// The cached token, if the strategy has one.
    fn current_token(&self) -> Option<String>;
}

#[derive(Clone)]
struct TokenState {
    token: String,
    fetched_at: Instant,
    valid: bool,
}

impl TokenState {
    fn fresh(token: String) -> Self {
        Self {
            token,
            fetched_at: Instant::now(),
            valid: true,
        }
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    #[serde(default)]
    token: String,
}

#[derive(Deserialize)]
struct BackendMessage {
    message: String,
}

pub(crate) fn bearer(token: &str) -> String {
    format!("Bearer {token}")
}

/// Execute an auth request and pull the token out of a success body.
fn request_token(transport: &dyn Transport, request: &HttpRequest) -> Result<String, AuthError> {
    let response = transport.execute(request).map_err(AuthError::Unreachable)?;
    if !response.is_success() {
        return Err(AuthError::Rejected {
            status: response.status,
            message: backend_message(&response),
        });
    }
    let parsed: TokenResponse = serde_json::from_str(&response.body)
        .map_err(|e| AuthError::InvalidResponse(e.to_string()))?;
    if parsed.token.is_empty() {
        return Err(AuthError::InvalidResponse("response carries no token".to_string()));
    }
    Ok(parsed.token)
}

/// The backend's `message` field when present, otherwise the raw body.
fn backend_message(response: &HttpResponse) -> String {
    serde_json::from_str::<BackendMessage>(&response.body)
        .map(|m| m.message)
        .unwrap_or_else(|_| response.body.clone())
}

/// For backends that need no authentication.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpAuth;

impl AuthStrategy for NoOpAuth {
    fn authorize(&self) -> Result<(), AuthError> {
        Ok(())
    }

    fn current_token(&self) -> Option<String> {
        None
    }
}

/// A statically supplied token, refreshed once and then reused.
///
/// If the refresh fails the previous token stays available through
/// `current_token`, and the next `authorize` tries again.
pub struct TokenAuth {
    transport: Arc<dyn Transport>,
    endpoint: String,
    state: Mutex<TokenState>,
}

impl TokenAuth {
    pub fn new(transport: Arc<dyn Transport>, endpoint: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            transport,
            endpoint: endpoint.into(),
            state: Mutex::new(TokenState {
                token: token.into(),
                fetched_at: Instant::now(),
                valid: false,
            }),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl fmt::Debug for TokenAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenAuth")
            .field("endpoint", &self.endpoint)
            .field("valid", &self.state.lock().valid)
            .finish_non_exhaustive()
    }
}

impl AuthStrategy for TokenAuth {
    fn authorize(&self) -> Result<(), AuthError> {
        let token = {
            let state = self.state.lock();
            if state.valid {
                return Ok(());
            }
            state.token.clone()
        };

        let request = HttpRequest::new(HttpMethod::Post, self.endpoint.as_str())
            .with_header("Authorization", bearer(&token));
        match request_token(self.transport.as_ref(), &request) {
            Ok(rotated) => {
                *self.state.lock() = TokenState::fresh(rotated);
                info!(endpoint = %self.endpoint, "token refreshed");
                Ok(())
            }
            Err(err) => {
                warn!(endpoint = %self.endpoint, error = %err, "token refresh failed");
                Err(err)
            }
        }
    }

    fn current_token(&self) -> Option<String> {
        Some(self.state.lock().token.clone())
    }
}

/// Identity/password exchanged for a token at an `auth-with-password`
/// endpoint.
pub struct PasswordAuth {
    transport: Arc<dyn Transport>,
    endpoint: String,
    identity: String,
    password: String,
    freshness: Option<Duration>,
    state: Mutex<Option<TokenState>>,
}

impl PasswordAuth {
    pub fn new(
        transport: Arc<dyn Transport>,
        endpoint: impl Into<String>,
        identity: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            endpoint: endpoint.into(),
            identity: identity.into(),
            password: password.into(),
            freshness: None,
            state: Mutex::new(None),
        }
    }

    /// Reuse a token for `window` after it was fetched instead of
    /// re-authenticating on every call.
    pub fn with_freshness(mut self, window: Duration) -> Self {
        self.freshness = Some(window);
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn is_fresh(&self) -> bool {
        let Some(window) = self.freshness else {
            return false;
        };
        self.state
            .lock()
            .as_ref()
            .is_some_and(|s| s.valid && s.fetched_at.elapsed() < window)
    }
}

impl fmt::Debug for PasswordAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PasswordAuth")
            .field("endpoint", &self.endpoint)
            .field("identity", &self.identity)
            .field("freshness", &self.freshness)
            .finish_non_exhaustive()
    }
}

impl AuthStrategy for PasswordAuth {
    fn authorize(&self) -> Result<(), AuthError> {
        if self.is_fresh() {
            debug!(endpoint = %self.endpoint, "reusing fresh token");
            return Ok(());
        }

        let body = serde_json::json!({
            "identity": self.identity,
            "password": self.password,
        });
        let request =
            HttpRequest::new(HttpMethod::Post, self.endpoint.as_str()).with_body(body.to_string());
        match request_token(self.transport.as_ref(), &request) {
            Ok(token) => {
                *self.state.lock() = Some(TokenState::fresh(token));
                info!(endpoint = %self.endpoint, identity = %self.identity, "authenticated");
                Ok(())
            }
            Err(err) => {
                warn!(endpoint = %self.endpoint, identity = %self.identity, error = %err, "authentication failed");
                Err(err)
            }
        }
    }

    fn current_token(&self) -> Option<String> {
        self.state.lock().as_ref().map(|s| s.token.clone())
    }
}

/// The strategy a client was built with. Closed over the three variants and
/// fixed for the client's lifetime.
#[derive(Debug)]
pub enum Authorizer {
    NoOp(NoOpAuth),
    Token(TokenAuth),
    Password(PasswordAuth),
}

impl Authorizer {
    /// Build the strategy for `credential`. `freshness` only affects
    /// password authentication.
    pub fn from_credential(
        credential: Credential,
        transport: Arc<dyn Transport>,
        freshness: Option<Duration>,
    ) -> Self {
        match credential {
            Credential::None => Authorizer::NoOp(NoOpAuth),
            Credential::StaticToken { endpoint, token } => {
                Authorizer::Token(TokenAuth::new(transport, endpoint, token))
            }
            Credential::EmailPassword {
                endpoint,
                email,
                password,
            } => {
                let auth = PasswordAuth::new(transport, endpoint, email, password);
                Authorizer::Password(match freshness {
                    Some(window) => auth.with_freshness(window),
                    None => auth,
                })
            }
        }
    }

    fn strategy(&self) -> &dyn AuthStrategy {
        match self {
            Authorizer::NoOp(a) => a,
            Authorizer::Token(a) => a,
            Authorizer::Password(a) => a,
        }
    }
}

impl AuthStrategy for Authorizer {
    fn authorize(&self) -> Result<(), AuthError> {
        self.strategy().authorize()
    }

    fn current_token(&self) -> Option<String> {
        self.strategy().current_token()
    }
}
