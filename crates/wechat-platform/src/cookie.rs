//! Scan-derived cookie sessions for the channels web consoles.
//!
//! Two consoles are supported:
//!
//! | variant | identity | cookie | default invalidation codes |
//! |---|---|---|---|
//! | [`CookieVariant::Assistant`] | wxid + finder username | `sessionid` | 300334, 300330 |
//! | [`CookieVariant::Promotion`] | wxid | `promotewebsessionid` | -330 |
//!
//! A session is obtained by asking the gateway to "scan" into the console on
//! behalf of the account ([`SessionScanner`]). Requests are then sent straight
//! to the channels origin with the session as a cookie.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::broadcast;
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::api::{AssistantScanner, PromotionScanner};
use crate::client::PlatformClient;
use crate::config::{CookieGateConfig, GateConfig};
use crate::descriptor::RequestDescriptor;
use crate::error::{ApiError, Error, Result};
use crate::gate::{
    Deregistration, EventSink, InvalidationSet, SessionEvent, SessionGate, SessionState,
    SessionStrategy,
};
use crate::transport::{Envelope, HttpTransport, Transport};

const COOKIE_HEADER: &str = "cookie";

/// Produces a console session for an identity.
#[async_trait]
pub trait SessionScanner: Send + Sync + 'static {
    async fn scan(&self, identity: &str, secondary: Option<&str>) -> Result<String>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CookieVariant {
    Assistant,
    Promotion,
}

impl CookieVariant {
    pub fn cookie_name(self) -> &'static str {
        match self {
            CookieVariant::Assistant => "sessionid",
            CookieVariant::Promotion => "promotewebsessionid",
        }
    }

    pub fn envelope(self) -> Envelope {
        match self {
            CookieVariant::Assistant => Envelope::Assistant,
            CookieVariant::Promotion => Envelope::Promotion,
        }
    }

    pub fn default_invalidation_codes(self) -> &'static [i64] {
        match self {
            CookieVariant::Assistant => &[300334, 300330],
            CookieVariant::Promotion => &[-330],
        }
    }

    /// Code meaning "this identity is not an operator of the target account".
    pub fn default_not_operator_code(self) -> i64 {
        match self {
            CookieVariant::Assistant => 300333,
            CookieVariant::Promotion => -331,
        }
    }
}

/// Cookie-based [`SessionStrategy`].
pub struct CookieSession {
    variant: CookieVariant,
    identity: String,
    secondary: Option<String>,
    scanner: Arc<dyn SessionScanner>,
    origin: Url,
    session: RwLock<Option<String>>,
    invalidation: InvalidationSet,
    not_operator_code: i64,
    events: EventSink,
}

impl fmt::Debug for CookieSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CookieSession")
            .field("variant", &self.variant)
            .field("identity", &self.identity)
            .field("secondary", &self.secondary)
            .field("origin", &self.origin.as_str())
            .field("invalidation", &self.invalidation)
            .finish_non_exhaustive()
    }
}

impl CookieSession {
    pub fn new(
        variant: CookieVariant,
        identity: impl Into<String>,
        secondary: Option<String>,
        scanner: Arc<dyn SessionScanner>,
        config: &CookieGateConfig,
    ) -> Result<Self> {
        if variant == CookieVariant::Assistant && secondary.as_deref().is_none_or(str::is_empty) {
            return Err(Error::config("assistant sessions require a finder username"));
        }
        let codes = config
            .invalidation_codes
            .clone()
            .unwrap_or_else(|| variant.default_invalidation_codes().to_vec());
        Ok(Self {
            variant,
            identity: identity.into(),
            secondary,
            scanner,
            origin: config.origin_url()?,
            session: RwLock::new(None),
            invalidation: InvalidationSet::with_codes(codes),
            not_operator_code: config
                .not_operator_code
                .unwrap_or_else(|| variant.default_not_operator_code()),
            events: EventSink::new(),
        })
    }

    pub fn variant(&self) -> CookieVariant {
        self.variant
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn secondary(&self) -> Option<&str> {
        self.secondary.as_deref()
    }

    pub fn session(&self) -> Option<String> {
        self.session.read().clone()
    }

    pub fn set_session(&self, value: impl Into<String>) {
        *self.session.write() = Some(value.into());
    }

    pub fn invalidation(&self) -> &InvalidationSet {
        &self.invalidation
    }

    pub fn events(&self) -> &EventSink {
        &self.events
    }
}

#[async_trait]
impl SessionStrategy for CookieSession {
    fn is_session_present(&self) -> bool {
        self.session.read().as_ref().is_some_and(|s| !s.is_empty())
    }

    #[instrument(skip_all, fields(variant = ?self.variant, identity = %self.identity))]
    async fn acquire(&self, _transport: &dyn Transport) -> Result<()> {
        let session = self
            .scanner
            .scan(&self.identity, self.secondary.as_deref())
            .await?;
        if session.is_empty() {
            return Err(Error::decode("scan returned an empty session"));
        }
        *self.session.write() = Some(session.clone());
        info!("Console session acquired");
        self.events.emit(SessionEvent::Acquired { session });
        Ok(())
    }

    fn decorate(&self, request: &mut RequestDescriptor) -> Result<()> {
        let session = self.session.read();
        let session = session.as_deref().ok_or(Error::NoSession)?;
        request.base = Some(self.origin.clone());
        let cookie = format!(
            "{}={}",
            self.variant.cookie_name(),
            urlencoding::encode(session)
        );
        request.set_header(COOKIE_HEADER, &cookie)
    }

    fn is_invalidation(&self, error: &ApiError) -> bool {
        self.invalidation.matches(error)
    }

    fn observe_failure(&self, error: &ApiError) {
        if error.code == self.not_operator_code {
            warn!(
                variant = ?self.variant,
                identity = %self.identity,
                code = error.code,
                "Identity is not an operator of the target, disconnected"
            );
            self.events.emit(SessionEvent::Disconnected { code: error.code });
        }
    }
}

/// Client for one console session of one identity.
#[derive(Debug, Clone)]
pub struct CookieClient {
    gate: SessionGate<CookieSession>,
}

impl CookieClient {
    /// Assistant console client for `wxid` operating `finder`.
    pub fn assistant(
        platform: &PlatformClient,
        wxid: impl Into<String>,
        finder: impl Into<String>,
        http: reqwest::Client,
        config: &CookieGateConfig,
    ) -> Result<Self> {
        let scanner = Arc::new(AssistantScanner::new(platform.clone()));
        let session = CookieSession::new(
            CookieVariant::Assistant,
            wxid,
            Some(finder.into()),
            scanner,
            config,
        )?;
        Self::over_http(session, http, config)
    }

    /// Promotion console client for `wxid`.
    pub fn promotion(
        platform: &PlatformClient,
        wxid: impl Into<String>,
        http: reqwest::Client,
        config: &CookieGateConfig,
    ) -> Result<Self> {
        let scanner = Arc::new(PromotionScanner::new(platform.clone()));
        let session = CookieSession::new(CookieVariant::Promotion, wxid, None, scanner, config)?;
        Self::over_http(session, http, config)
    }

    fn over_http(session: CookieSession, http: reqwest::Client, config: &CookieGateConfig) -> Result<Self> {
        let transport = HttpTransport::new(http, config.origin_url()?, session.variant().envelope());
        Ok(Self::from_parts(session, Arc::new(transport), &config.gate))
    }

    pub fn from_parts(session: CookieSession, transport: Arc<dyn Transport>, gate: &GateConfig) -> Self {
        Self {
            gate: SessionGate::with_config(session, transport, gate),
        }
    }

    pub fn gate(&self) -> &SessionGate<CookieSession> {
        &self.gate
    }

    pub fn session_state(&self) -> SessionState {
        self.gate.state()
    }

    pub fn session(&self) -> Option<String> {
        self.gate.strategy().session()
    }

    /// Install a known session, e.g. one restored by the caller, and flush queued calls.
    pub fn set_session(&self, value: impl Into<String>) -> &Self {
        self.gate.strategy().set_session(value);
        self.gate.session_installed();
        self
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.gate.strategy().events().subscribe()
    }

    /// Treat `code` as a session invalidation from now on.
    pub fn add_invalidation_code(&self, code: i64) -> Deregistration {
        self.gate.strategy().invalidation().add_code(code)
    }

    pub fn add_invalidation_predicate<F>(&self, predicate: F) -> Deregistration
    where
        F: Fn(i64) -> bool + Send + Sync + 'static,
    {
        self.gate.strategy().invalidation().add_predicate(predicate)
    }

    pub fn remove_invalidation_code(&self, code: i64) -> bool {
        self.gate.strategy().invalidation().remove_code(code)
    }

    pub async fn send<T: DeserializeOwned>(&self, request: RequestDescriptor) -> Result<T> {
        debug!(method = %request.method, path = %request.path, "Console call");
        self.gate.call(request).await
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.send(RequestDescriptor::get(path)).await
    }

    pub async fn post<T, B>(&self, path: &str, body: &B) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.send(RequestDescriptor::post(path).json(body)?).await
    }

    pub async fn put<T, B>(&self, path: &str, body: &B) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.send(RequestDescriptor::put(path).json(body)?).await
    }

    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.send(RequestDescriptor::delete(path)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{ScriptedTransport, api_err, header, ok, settle};
    use rstest::rstest;
    use serde_json::{Value, json};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingScanner {
        scans: AtomicUsize,
        seen: parking_lot::Mutex<Vec<(String, Option<String>)>>,
    }

    impl CountingScanner {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                scans: AtomicUsize::new(0),
                seen: parking_lot::Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl SessionScanner for CountingScanner {
        async fn scan(&self, identity: &str, secondary: Option<&str>) -> Result<String> {
            let n = self.scans.fetch_add(1, Ordering::SeqCst) + 1;
            self.seen
                .lock()
                .push((identity.to_string(), secondary.map(str::to_string)));
            Ok(format!("sess/{n}=="))
        }
    }

    fn client(
        variant: CookieVariant,
        scanner: Arc<CountingScanner>,
        transport: Arc<ScriptedTransport>,
    ) -> CookieClient {
        let secondary = (variant == CookieVariant::Assistant).then(|| "finder_x".to_string());
        let session = CookieSession::new(
            variant,
            "wxid_a",
            secondary,
            scanner,
            &CookieGateConfig::default(),
        )
        .unwrap();
        CookieClient::from_parts(session, transport, &GateConfig::default())
    }

    #[tokio::test]
    async fn test_acquire_emits_session_and_decorates_cookie() {
        let scanner = CountingScanner::new();
        let transport = ScriptedTransport::new(|req| {
            assert_eq!(
                req.base.as_ref().map(Url::as_str),
                Some("https://channels.weixin.qq.com/")
            );
            assert_eq!(
                header(req, "cookie").as_deref(),
                Some("sessionid=sess%2F1%3D%3D")
            );
            ok(json!({"ok": true}))
        });
        let client = client(CookieVariant::Assistant, scanner.clone(), transport);
        let mut events = client.subscribe();

        let body: Value = client.get("cgi-bin/helper/auth_data").await.unwrap();
        assert_eq!(body["ok"], true);
        assert_eq!(
            events.recv().await.unwrap(),
            SessionEvent::Acquired {
                session: "sess/1==".into()
            }
        );
        assert_eq!(
            scanner.seen.lock()[0],
            ("wxid_a".to_string(), Some("finder_x".to_string()))
        );
    }

    #[rstest]
    #[case(CookieVariant::Assistant, 300334)]
    #[case(CookieVariant::Assistant, 300330)]
    #[case(CookieVariant::Promotion, -330)]
    #[tokio::test]
    async fn test_default_codes_trigger_rescan(#[case] variant: CookieVariant, #[case] code: i64) {
        let scanner = CountingScanner::new();
        let name = variant.cookie_name();
        let transport = ScriptedTransport::new(move |req| {
            let cookie = header(req, "cookie").unwrap();
            if cookie == format!("{name}=sess%2F1%3D%3D") {
                api_err(code)
            } else {
                ok(json!("fresh"))
            }
        });
        let client = client(variant, scanner.clone(), transport.clone());

        let body: String = client.get("api/list").await.unwrap();
        assert_eq!(body, "fresh");
        assert_eq!(scanner.scans.load(Ordering::SeqCst), 2);
        assert_eq!(transport.calls(), 2);
    }

    #[tokio::test]
    async fn test_not_operator_code_disconnects_without_rescan() {
        let scanner = CountingScanner::new();
        let transport = ScriptedTransport::new(|_| api_err(300333));
        let client = client(CookieVariant::Assistant, scanner.clone(), transport);
        let mut events = client.subscribe();

        let err = client.get::<Value>("api/list").await.unwrap_err();
        assert_eq!(err.api_code(), Some(300333));
        assert!(matches!(err, Error::Api(_)));

        assert!(matches!(events.recv().await.unwrap(), SessionEvent::Acquired { .. }));
        assert_eq!(
            events.recv().await.unwrap(),
            SessionEvent::Disconnected { code: 300333 }
        );
        assert_eq!(scanner.scans.load(Ordering::SeqCst), 1);
        assert_eq!(client.gate().pending(), 0);
    }

    #[tokio::test]
    async fn test_runtime_registered_code_and_deregistration() {
        let scanner = CountingScanner::new();
        let transport = ScriptedTransport::new(|req| {
            if header(req, "cookie").as_deref() == Some("promotewebsessionid=sess%2F1%3D%3D") {
                api_err(-1)
            } else {
                ok(json!(1))
            }
        });
        let client = client(CookieVariant::Promotion, scanner.clone(), transport);

        let handle = client.add_invalidation_code(-1);
        let value: i64 = client.get("api/list").await.unwrap();
        assert_eq!(value, 1);
        assert_eq!(scanner.scans.load(Ordering::SeqCst), 2);

        assert!(handle.deregister());
        assert!(!client.gate().strategy().invalidation().contains_code(-1));
        assert!(client.remove_invalidation_code(-330));
        assert!(client.gate().strategy().invalidation().is_empty());
    }

    #[tokio::test]
    async fn test_predicate_classifier() {
        let scanner = CountingScanner::new();
        let transport = ScriptedTransport::new(|req| {
            if header(req, "cookie").as_deref() == Some("promotewebsessionid=sess%2F1%3D%3D") {
                api_err(-345)
            } else {
                ok(json!(null))
            }
        });
        let client = client(CookieVariant::Promotion, scanner.clone(), transport);
        let _keep = client.add_invalidation_predicate(|code| (-399..=-340).contains(&code));

        let value: Value = client.get("api/list").await.unwrap();
        assert!(value.is_null());
        assert_eq!(scanner.scans.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_set_session_skips_scan() {
        let scanner = CountingScanner::new();
        let transport = ScriptedTransport::new(|req| {
            assert_eq!(
                header(req, "cookie").as_deref(),
                Some("promotewebsessionid=restored")
            );
            ok(json!("ok"))
        });
        let client = client(CookieVariant::Promotion, scanner.clone(), transport);
        client.set_session("restored");
        assert_eq!(client.session_state(), SessionState::Ready);

        let value: String = client.get("api/list").await.unwrap();
        assert_eq!(value, "ok");
        assert_eq!(scanner.scans.load(Ordering::SeqCst), 0);
        settle(|| client.gate().pending() == 0).await;
    }

    #[test]
    fn test_config_overrides_defaults() {
        let config = CookieGateConfig {
            invalidation_codes: Some(vec![1, 2]),
            not_operator_code: Some(3),
            ..CookieGateConfig::default()
        };
        let session = CookieSession::new(
            CookieVariant::Assistant,
            "wxid_a",
            Some("finder_x".to_string()),
            CountingScanner::new(),
            &config,
        )
        .unwrap();
        assert!(session.is_invalidation(&ApiError::new(2, None)));
        assert!(!session.is_invalidation(&ApiError::new(300334, None)));

        let mut events = session.events().subscribe();
        session.observe_failure(&ApiError::new(3, None));
        assert_eq!(
            events.try_recv().unwrap(),
            SessionEvent::Disconnected { code: 3 }
        );
    }

    #[rstest]
    #[case(None)]
    #[case(Some(String::new()))]
    fn test_assistant_requires_finder(#[case] secondary: Option<String>) {
        let err = CookieSession::new(
            CookieVariant::Assistant,
            "wxid_a",
            secondary,
            CountingScanner::new(),
            &CookieGateConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        let promotion = CookieSession::new(
            CookieVariant::Promotion,
            "wxid_a",
            None,
            CountingScanner::new(),
            &CookieGateConfig::default(),
        );
        assert!(promotion.is_ok());
    }
}
