//! Construction-time options for [`ApiClient`](crate::ApiClient).
//!
//! Options apply in call order. Every auth option replaces the pending
//! credential, so when several are given the last one wins.

use std::time::Duration;

use crate::auth::Credential;
use crate::transport::TransportConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    base_url: String,
    pub(crate) credential: Credential,
    pub(crate) token_freshness: Option<Duration>,
    pub(crate) debug: bool,
    pub(crate) transport: TransportConfig,
}

impl ClientConfig {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            credential: Credential::None,
            token_freshness: None,
            debug: false,
            transport: TransportConfig::default(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    /// Log every request and response status at debug level.
    pub fn debug(mut self, enabled: bool) -> Self {
        self.debug = enabled;
        self
    }

    pub fn admin_email_password(self, email: &str, password: &str) -> Self {
        let endpoint = format!("{}/api/admins/auth-with-password", self.base_url);
        self.password_credential(endpoint, email, password)
    }

    pub fn user_email_password(self, email: &str, password: &str) -> Self {
        self.collection_auth("users", email, password)
    }

    /// Authenticate as a record of any auth collection.
    pub fn collection_auth(self, collection: &str, identity: &str, password: &str) -> Self {
        let endpoint = format!(
            "{}/api/collections/{}/auth-with-password",
            self.base_url,
            urlencoding::encode(collection)
        );
        self.password_credential(endpoint, identity, password)
    }

    pub fn admin_token(self, token: &str) -> Self {
        let endpoint = format!("{}/api/admins/auth-refresh", self.base_url);
        self.token_credential(endpoint, token)
    }

    pub fn user_token(self, token: &str) -> Self {
        let endpoint = format!("{}/api/collections/users/auth-refresh", self.base_url);
        self.token_credential(endpoint, token)
    }

    /// Reuse a password-auth token for `window` instead of re-authenticating
    /// before every call.
    pub fn token_freshness(mut self, window: Duration) -> Self {
        self.token_freshness = Some(window);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.transport.timeout = timeout;
        self
    }

    /// Retries after a transport failure. HTTP error statuses are never
    /// retried.
    pub fn retry_count(mut self, count: u32) -> Self {
        self.transport.retry_count = count;
        self
    }

    pub fn retry_wait(mut self, wait: Duration) -> Self {
        self.transport.retry_wait = wait;
        self
    }

    pub fn retry_max_wait(mut self, wait: Duration) -> Self {
        self.transport.retry_max_wait = wait;
        self
    }

    fn password_credential(mut self, endpoint: String, email: &str, password: &str) -> Self {
        self.credential = Credential::EmailPassword {
            endpoint,
            email: email.to_string(),
            password: password.to_string(),
        };
        self
    }

    fn token_credential(mut self, endpoint: String, token: &str) -> Self {
        self.credential = Credential::StaticToken {
            endpoint,
            token: token.to_string(),
        };
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_no_auth() {
        let config = ClientConfig::new("http://localhost:8090/");
        assert_eq!(config.base_url(), "http://localhost:8090");
        assert_eq!(config.credential(), &Credential::None);
        assert_eq!(config.transport, TransportConfig::default());
    }

    #[test]
    fn auth_endpoints_follow_backend_layout() {
        let base = "http://pb";
        let cases = [
            (
                ClientConfig::new(base).admin_email_password("a", "p"),
                "http://pb/api/admins/auth-with-password",
            ),
            (
                ClientConfig::new(base).user_email_password("a", "p"),
                "http://pb/api/collections/users/auth-with-password",
            ),
            (
                ClientConfig::new(base).collection_auth("members", "a", "p"),
                "http://pb/api/collections/members/auth-with-password",
            ),
            (
                ClientConfig::new(base).collection_auth("staff/admins", "a", "p"),
                "http://pb/api/collections/staff%2Fadmins/auth-with-password",
            ),
            (
                ClientConfig::new(base).admin_token("t"),
                "http://pb/api/admins/auth-refresh",
            ),
            (
                ClientConfig::new(base).user_token("t"),
                "http://pb/api/collections/users/auth-refresh",
            ),
        ];
        for (config, expected) in cases {
            let endpoint = match config.credential() {
                Credential::EmailPassword { endpoint, .. } => endpoint,
                Credential::StaticToken { endpoint, .. } => endpoint,
                Credential::None => panic!("no credential for {expected}"),
            };
            assert_eq!(endpoint, expected);
        }
    }

    #[test]
    fn last_auth_option_wins() {
        let config = ClientConfig::new("http://pb")
            .user_email_password("a@b.c", "pw")
            .admin_token("tok");
        assert_eq!(
            config.credential(),
            &Credential::StaticToken {
                endpoint: "http://pb/api/admins/auth-refresh".to_string(),
                token: "tok".to_string(),
            }
        );
    }

    #[test]
    fn transport_options_are_collected() {
        let config = ClientConfig::new("http://pb")
            .debug(true)
            .timeout(Duration::from_secs(5))
            .retry_count(0)
            .retry_wait(Duration::from_millis(10))
            .retry_max_wait(Duration::from_millis(20));
        assert!(config.debug);
        assert_eq!(config.transport.timeout, Duration::from_secs(5));
        assert_eq!(config.transport.retry_count, 0);
        assert_eq!(config.transport.retry_wait, Duration::from_millis(10));
        assert_eq!(config.transport.retry_max_wait, Duration::from_millis(20));
    }
}
