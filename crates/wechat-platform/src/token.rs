//! OAuth-style session for the gateway.
//!
//! Acquisition prefers the refresh credential and falls back to the two-step
//! login (`/-/auth/code` then `/-/auth/token`). The acquisition requests go to
//! the gate's transport directly: routing them through `submit` would park
//! them behind the very acquisition they are part of.

use std::fmt;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::descriptor::RequestDescriptor;
use crate::error::{ApiError, Error, Result};
use crate::gate::{Deregistration, InvalidationSet, SessionStrategy};
use crate::transport::Transport;

/// Status the gateway answers with once the access token expired.
pub const TOKEN_EXPIRED_STATUS: i64 = 410;

const CODE_PATH: &str = "/-/auth/code";
const TOKEN_PATH: &str = "/-/auth/token";
const REFRESH_PATH: &str = "/-/auth/refresh";
const ACCESS_TOKEN_HEADER: &str = "access_token";

/// Access/refresh credential pair returned by the gateway.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

impl fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenPair").finish_non_exhaustive()
    }
}

/// Token-based [`SessionStrategy`].
pub struct TokenSession {
    app_id: String,
    app_secret: String,
    tokens: RwLock<Option<TokenPair>>,
    invalidation: InvalidationSet,
}

impl TokenSession {
    pub fn new(app_id: impl Into<String>, app_secret: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
            app_secret: app_secret.into(),
            tokens: RwLock::new(None),
            invalidation: InvalidationSet::with_codes([TOKEN_EXPIRED_STATUS]),
        }
    }

    /// Seed a previously obtained pair (the gate then starts `Ready`).
    pub fn with_tokens(self, tokens: TokenPair) -> Self {
        *self.tokens.write() = Some(tokens);
        self
    }

    pub fn tokens(&self) -> Option<TokenPair> {
        self.tokens.read().clone()
    }

    pub fn invalidation(&self) -> &InvalidationSet {
        &self.invalidation
    }

    pub fn add_invalidation_code(&self, code: i64) -> Deregistration {
        self.invalidation.add_code(code)
    }

    fn refresh_token(&self) -> Option<String> {
        self.tokens
            .read()
            .as_ref()
            .map(|t| t.refresh_token.clone())
            .filter(|t| !t.is_empty())
    }

    async fn request_code(&self, transport: &dyn Transport) -> Result<(String, String)> {
        let state = chrono::Utc::now().timestamp_millis().to_string();
        let request = RequestDescriptor::get(CODE_PATH)
            .query("appid", self.app_id.as_str())
            .query("state", state.as_str());
        let code = expect_string(transport.send(request, CancellationToken::new()).await?)?;
        Ok((code, state))
    }

    async fn exchange_code(
        &self,
        transport: &dyn Transport,
        code: &str,
        state: &str,
    ) -> Result<TokenPair> {
        let request = RequestDescriptor::get(TOKEN_PATH)
            .query("code", code)
            .query("state", state)
            .query("secret", self.app_secret.as_str());
        let value = transport.send(request, CancellationToken::new()).await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn refresh(&self, transport: &dyn Transport, refresh_token: &str) -> Result<TokenPair> {
        let request = RequestDescriptor::get(REFRESH_PATH).query("token", refresh_token);
        let value = transport.send(request, CancellationToken::new()).await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn login(&self, transport: &dyn Transport) -> Result<TokenPair> {
        let (code, state) = self.request_code(transport).await?;
        self.exchange_code(transport, &code, &state).await
    }
}

fn expect_string(value: Value) -> Result<String> {
    match value {
        Value::String(s) => Ok(s),
        other => Err(Error::decode(format!("expected string payload, got {other}"))),
    }
}

#[async_trait]
impl SessionStrategy for TokenSession {
    fn is_session_present(&self) -> bool {
        self.tokens
            .read()
            .as_ref()
            .is_some_and(|t| !t.access_token.is_empty())
    }

    #[instrument(skip_all, fields(app_id = %self.app_id))]
    async fn acquire(&self, transport: &dyn Transport) -> Result<()> {
        let tokens = match self.refresh_token() {
            Some(refresh_token) => match self.refresh(transport, &refresh_token).await {
                Ok(tokens) => {
                    debug!("Access token refreshed");
                    tokens
                }
                Err(e) => {
                    warn!(error = %e, "Token refresh failed, falling back to login");
                    self.login(transport).await?
                }
            },
            None => self.login(transport).await?,
        };
        *self.tokens.write() = Some(tokens);
        info!("Gateway session established");
        Ok(())
    }

    fn decorate(&self, request: &mut RequestDescriptor) -> Result<()> {
        let tokens = self.tokens.read();
        let tokens = tokens.as_ref().ok_or(Error::NoSession)?;
        request.set_header(ACCESS_TOKEN_HEADER, &tokens.access_token)
    }

    fn is_invalidation(&self, error: &ApiError) -> bool {
        self.invalidation.matches(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{ScriptedTransport, api_err, ok, query};
    use serde_json::json;

    fn pair(access: &str, refresh: &str) -> Value {
        json!({"access_token": access, "refresh_token": refresh})
    }

    #[tokio::test]
    async fn test_full_login_without_refresh_token() {
        let transport = ScriptedTransport::new(|req| match req.path.as_str() {
            CODE_PATH => ok(json!("one-time-code")),
            TOKEN_PATH => {
                assert_eq!(query(req, "code"), Some("one-time-code"));
                assert_eq!(query(req, "secret"), Some("s3cret"));
                ok(pair("access-1", "refresh-1"))
            }
            other => panic!("unexpected path {other}"),
        });
        let session = TokenSession::new("wx-app", "s3cret");
        assert!(!session.is_session_present());

        session.acquire(transport.as_ref()).await.unwrap();

        assert!(session.is_session_present());
        assert_eq!(session.tokens().unwrap().access_token, "access-1");
        let requests = transport.requests();
        assert_eq!(query(&requests[0], "appid"), Some("wx-app"));
        // The state sent with the code request is echoed in the exchange.
        assert_eq!(query(&requests[0], "state"), query(&requests[1], "state"));
    }

    #[tokio::test]
    async fn test_refresh_preferred_when_available() {
        let transport = ScriptedTransport::new(|req| match req.path.as_str() {
            REFRESH_PATH => {
                assert_eq!(query(req, "token"), Some("refresh-1"));
                ok(pair("access-2", "refresh-2"))
            }
            other => panic!("unexpected path {other}"),
        });
        let session = TokenSession::new("wx-app", "s3cret").with_tokens(TokenPair {
            access_token: "access-1".into(),
            refresh_token: "refresh-1".into(),
        });

        session.acquire(transport.as_ref()).await.unwrap();

        assert_eq!(transport.paths(), vec![REFRESH_PATH]);
        assert_eq!(session.tokens().unwrap().refresh_token, "refresh-2");
    }

    #[tokio::test]
    async fn test_failed_refresh_falls_back_to_login() {
        let transport = ScriptedTransport::new(|req| match req.path.as_str() {
            REFRESH_PATH => api_err(401),
            CODE_PATH => ok(json!("code")),
            TOKEN_PATH => ok(pair("access-3", "refresh-3")),
            other => panic!("unexpected path {other}"),
        });
        let session = TokenSession::new("wx-app", "s3cret").with_tokens(TokenPair {
            access_token: "stale".into(),
            refresh_token: "revoked".into(),
        });

        session.acquire(transport.as_ref()).await.unwrap();

        assert_eq!(transport.paths(), vec![REFRESH_PATH, CODE_PATH, TOKEN_PATH]);
        assert_eq!(session.tokens().unwrap().access_token, "access-3");
    }

    #[tokio::test]
    async fn test_exchange_failure_surfaces_as_transport_error() {
        let transport = ScriptedTransport::new(|req| match req.path.as_str() {
            CODE_PATH => ok(json!("code")),
            _ => api_err(500),
        });
        let session = TokenSession::new("wx-app", "s3cret");

        let err = session.acquire(transport.as_ref()).await.unwrap_err();
        assert_eq!(err.api_code(), Some(500));
        assert!(!session.is_session_present());
    }

    #[test]
    fn test_decorate_and_classify() {
        let session = TokenSession::new("wx-app", "s3cret");
        let mut req = RequestDescriptor::get("/-/api/safe");
        assert!(matches!(session.decorate(&mut req), Err(Error::NoSession)));

        let session = session.with_tokens(TokenPair {
            access_token: "access-1".into(),
            refresh_token: "refresh-1".into(),
        });
        session.decorate(&mut req).unwrap();
        assert_eq!(req.headers.get(ACCESS_TOKEN_HEADER).unwrap(), "access-1");

        assert!(session.is_invalidation(&ApiError::new(410, None)));
        assert!(!session.is_invalidation(&ApiError::new(404, None)));
        let handle = session.add_invalidation_code(401);
        assert!(session.is_invalidation(&ApiError::new(401, None)));
        assert!(handle.deregister());
    }

    #[test]
    fn test_token_pair_debug_redacts() {
        let tokens = TokenPair {
            access_token: "secret-access".into(),
            refresh_token: "secret-refresh".into(),
        };
        assert!(!format!("{tokens:?}").contains("secret"));
    }
}
