//! Transport collaborator used by the session gate.
//!
//! The gate never performs HTTP itself. A [`Transport`] takes a fully
//! decorated [`RequestDescriptor`], performs the call and unwraps the
//! platform's response envelope. Cancellation is cooperative: when the
//! supplied token fires, the transport must give up and return
//! [`Error::Cancelled`].

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use url::Url;

use crate::descriptor::RequestDescriptor;
use crate::error::{ApiError, Error, Result};

#[async_trait]
pub trait Transport: Send + Sync {
    /// Perform the call and return the unwrapped `data` payload.
    async fn send(&self, request: RequestDescriptor, cancel: CancellationToken) -> Result<Value>;
}

/// Response envelope shapes used by the different backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Envelope {
    /// Gateway envelope: `{ status, message?, data? }`, success is `status == 200`.
    Gateway,
    /// Channels assistant envelope: `{ errCode, errMsg, data }`, success is `errCode == 0`.
    Assistant,
    /// Promotion envelope: `{ data?, error?: { code } }`, success is a missing or zero code.
    Promotion,
}

#[derive(Deserialize)]
struct GatewayBody {
    status: i64,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    data: Option<Value>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AssistantBody {
    err_code: i64,
    #[serde(default)]
    err_msg: Option<String>,
    #[serde(default)]
    data: Option<Value>,
}

#[derive(Deserialize)]
struct PromotionBody {
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    error: Option<PromotionFault>,
}

#[derive(Deserialize)]
struct PromotionFault {
    #[serde(default)]
    code: i64,
}

impl Envelope {
    /// Unwrap a response body into its payload or an [`ApiError`].
    pub fn unwrap(self, body: Value) -> Result<Value> {
        match self {
            Envelope::Gateway => {
                let body: GatewayBody = serde_json::from_value(body)?;
                if body.status != 200 {
                    return Err(ApiError::new(body.status, body.message).into());
                }
                Ok(body.data.unwrap_or(Value::Null))
            }
            Envelope::Assistant => {
                let body: AssistantBody = serde_json::from_value(body)?;
                if body.err_code != 0 {
                    return Err(ApiError::new(body.err_code, body.err_msg).into());
                }
                Ok(body.data.unwrap_or(Value::Null))
            }
            Envelope::Promotion => {
                let body: PromotionBody = serde_json::from_value(body)?;
                match body.error {
                    Some(fault) if fault.code != 0 => Err(ApiError::new(fault.code, None).into()),
                    _ => Ok(body.data.unwrap_or(Value::Null)),
                }
            }
        }
    }
}

/// reqwest-backed transport.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    base: Url,
    envelope: Envelope,
}

impl HttpTransport {
    pub fn new(client: Client, base: Url, envelope: Envelope) -> Self {
        Self {
            client,
            base,
            envelope,
        }
    }

    pub fn envelope(&self) -> Envelope {
        self.envelope
    }

    async fn perform(&self, request: RequestDescriptor) -> Result<Value> {
        let url = request.resolve(&self.base)?;
        debug!(method = %request.method, url = %url.path(), "Sending request");

        let mut builder = self
            .client
            .request(request.method, url)
            .headers(request.headers);
        if let Some(body) = request.body.as_ref() {
            builder = builder.json(body);
        }

        let response = builder.send().await?.error_for_status()?;
        let body: Value = response.json().await?;
        self.envelope.unwrap(body)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: RequestDescriptor, cancel: CancellationToken) -> Result<Value> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(Error::Cancelled),
            result = self.perform(request) => result,
        }
    }
}
