//! Gateway client backed by a [`TokenSession`] gate.

use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::broadcast;
use tracing::debug;

use crate::config::ClientConfig;
use crate::descriptor::RequestDescriptor;
use crate::error::Result;
use crate::gate::{SessionGate, SessionState};
use crate::token::{TokenPair, TokenSession};
use crate::transport::{Envelope, HttpTransport, Transport};
use crate::webhook::{WebhookEvent, WebhookHub, WebhookMessage};

const WXID_HEADER: &str = "wxid";

/// Entry point for the gateway APIs.
///
/// Every call goes through the session gate, so callers never deal with
/// token expiry themselves.
#[derive(Debug, Clone)]
pub struct PlatformClient {
    gate: SessionGate<TokenSession>,
    webhooks: WebhookHub,
}

impl PlatformClient {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let transport = HttpTransport::new(config.http_client()?, config.host_url()?, Envelope::Gateway);
        Ok(Self::with_transport(config, Arc::new(transport)))
    }

    /// Build a client over a custom transport.
    pub fn with_transport(config: &ClientConfig, transport: Arc<dyn Transport>) -> Self {
        Self::with_session(
            config,
            TokenSession::new(config.app_id.as_str(), config.app_secret.as_str()),
            transport,
        )
    }

    /// Build a client around an already configured session, e.g. one seeded
    /// with tokens via [`TokenSession::with_tokens`].
    pub fn with_session(
        config: &ClientConfig,
        session: TokenSession,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            gate: SessionGate::with_config(session, transport, &config.gate),
            webhooks: WebhookHub::new(),
        }
    }

    pub fn gate(&self) -> &SessionGate<TokenSession> {
        &self.gate
    }

    pub fn session_state(&self) -> SessionState {
        self.gate.state()
    }

    pub fn tokens(&self) -> Option<TokenPair> {
        self.gate.strategy().tokens()
    }

    /// Send an arbitrary request through the gate.
    pub async fn send<T: DeserializeOwned>(&self, request: RequestDescriptor) -> Result<T> {
        debug!(method = %request.method, path = %request.path, "Gateway call");
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

    pub async fn get_with_wxid<T: DeserializeOwned>(&self, wxid: &str, path: &str) -> Result<T> {
        self.send(RequestDescriptor::get(path).header(WXID_HEADER, wxid)?)
            .await
    }

    pub async fn post_with_wxid<T, B>(&self, wxid: &str, path: &str, body: &B) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.send(
            RequestDescriptor::post(path)
                .json(body)?
                .header(WXID_HEADER, wxid)?,
        )
        .await
    }

    /// POST without a body, as used by the scan endpoints.
    pub async fn post_empty_with_wxid<T: DeserializeOwned>(
        &self,
        wxid: &str,
        path: &str,
    ) -> Result<T> {
        self.send(RequestDescriptor::post(path).header(WXID_HEADER, wxid)?)
            .await
    }

    pub async fn put_with_wxid<T, B>(&self, wxid: &str, path: &str, body: &B) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.send(
            RequestDescriptor::put(path)
                .json(body)?
                .header(WXID_HEADER, wxid)?,
        )
        .await
    }

    pub async fn delete_with_wxid<T: DeserializeOwned>(&self, wxid: &str, path: &str) -> Result<T> {
        self.send(RequestDescriptor::delete(path).header(WXID_HEADER, wxid)?)
            .await
    }

    /// Subscribe to events pushed through [`PlatformClient::receive`].
    pub fn subscribe_webhooks(&self) -> broadcast::Receiver<WebhookEvent> {
        self.webhooks.subscribe()
    }

    /// Fan out a webhook payload received by the embedding HTTP server.
    ///
    /// Returns the number of events that were decoded.
    pub fn receive(&self, message: WebhookMessage) -> usize {
        self.webhooks.dispatch(message)
    }
}
