//! wechat-platform: session-gated clients for the WeChat platform gateway.
//!
//! Every outbound call goes through a [`SessionGate`], which acquires a
//! credential before anything is sent and transparently re-acquires it when
//! the platform reports it as expired.
//!
//! ## Clients
//!
//! - [`PlatformClient`] - gateway client authenticated by an OAuth-style token pair
//! - [`CookieClient`] - assistant and promotion consoles authenticated by a scanned cookie
//!
//! ## Dispatcher
//!
//! - [`SessionGate`] - pending-call table, acquisition serialization and retries
//! - [`SessionStrategy`] - credential plug-in (acquire, decorate, classify)
//! - [`InvalidationSet`] - runtime-editable set of invalidation classifiers
//!
//! ## Transport
//!
//! - [`Transport`] - async request/response seam with cancellation
//! - [`HttpTransport`] - reqwest implementation with per-API envelope decoding
//!
//! ## Webhooks
//!
//! - [`WebhookHub`] - fan-out of typed account events pushed by the gateway

pub mod api;
pub mod client;
pub mod config;
pub mod cookie;
pub mod descriptor;
pub mod error;
pub mod gate;
pub mod token;
pub mod transport;
pub mod webhook;

#[cfg(test)]
mod test_support;

pub use client::PlatformClient;
pub use config::{ClientConfig, Config, CookieGateConfig, GateConfig};
pub use cookie::{CookieClient, CookieSession, CookieVariant, SessionScanner};
pub use descriptor::RequestDescriptor;
pub use error::{ApiError, Error, Result};
pub use gate::{
    Deregistration, EventSink, InvalidationSet, PendingReply, SessionEvent, SessionGate,
    SessionState, SessionStrategy,
};
pub use token::{TokenPair, TokenSession};
pub use transport::{Envelope, HttpTransport, Transport};
pub use webhook::{WebhookEvent, WebhookHub, WebhookMessage, WebhookPayload};
