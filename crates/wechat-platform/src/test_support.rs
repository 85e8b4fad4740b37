//! Scripted collaborators shared by unit tests.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use crate::client::PlatformClient;
use crate::config::ClientConfig;
use crate::descriptor::RequestDescriptor;
use crate::error::{ApiError, Error, Result};
use crate::token::{TokenPair, TokenSession};
use crate::transport::Transport;

/// What the scripted transport does with one request.
pub(crate) enum Script {
    Reply(Result<Value>),
    /// Wait until the attempt is cancelled, then report the cancellation marker.
    Hang,
    /// Wait for a permit, ignoring cancellation, then reply. Models a response
    /// already on the wire when the cascade starts.
    Hold(Arc<Semaphore>, Result<Value>),
}

pub(crate) fn ok(value: Value) -> Script {
    Script::Reply(Ok(value))
}

pub(crate) fn api_err(code: i64) -> Script {
    Script::Reply(Err(Error::Api(ApiError::new(code, None))))
}

type Handler = Box<dyn Fn(&RequestDescriptor) -> Script + Send + Sync>;

pub(crate) struct ScriptedTransport {
    handler: Handler,
    log: Mutex<Vec<RequestDescriptor>>,
}

impl ScriptedTransport {
    pub(crate) fn new<F>(handler: F) -> Arc<Self>
    where
        F: Fn(&RequestDescriptor) -> Script + Send + Sync + 'static,
    {
        Arc::new(Self {
            handler: Box::new(handler),
            log: Mutex::new(Vec::new()),
        })
    }

    pub(crate) fn calls(&self) -> usize {
        self.log.lock().len()
    }

    pub(crate) fn requests(&self) -> Vec<RequestDescriptor> {
        self.log.lock().clone()
    }

    pub(crate) fn paths(&self) -> Vec<String> {
        self.log.lock().iter().map(|r| r.path.clone()).collect()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: RequestDescriptor, cancel: CancellationToken) -> Result<Value> {
        let script = (self.handler)(&request);
        self.log.lock().push(request);
        match script {
            Script::Reply(result) => result,
            Script::Hang => {
                cancel.cancelled().await;
                Err(Error::Cancelled)
            }
            Script::Hold(gate, result) => {
                if let Ok(permit) = gate.acquire().await {
                    permit.forget();
                }
                result
            }
        }
    }
}

/// Client whose token session is already installed, so calls go straight out.
pub(crate) fn ready_client(transport: Arc<ScriptedTransport>) -> PlatformClient {
    let session = TokenSession::new("wx-app", "s3cret").with_tokens(TokenPair {
        access_token: "access".into(),
        refresh_token: "refresh".into(),
    });
    PlatformClient::with_session(
        &ClientConfig::new("https://gateway.example.com", "wx-app", "s3cret"),
        session,
        transport,
    )
}

pub(crate) fn header(request: &RequestDescriptor, name: &str) -> Option<String> {
    request
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

pub(crate) fn query<'a>(request: &'a RequestDescriptor, key: &str) -> Option<&'a str> {
    request
        .query
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

/// Yield to spawned tasks until `cond` holds.
pub(crate) async fn settle(mut cond: impl FnMut() -> bool) {
    for _ in 0..10_000 {
        if cond() {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("condition not reached");
}
