//! Client configuration.
//!
//! All sections deserialize from TOML with sensible defaults, e.g.
//!
//! ```toml
//! [client]
//! host = "https://gateway.example.com"
//! app_id = "wx-app"
//! app_secret = "secret"
//!
//! [assistant]
//! invalidation_codes = [300334, 300330, 300331]
//! ```

use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use rustls::crypto::ring;
use rustls_platform_verifier::BuilderVerifierExt;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Error, Result};
use crate::gate::MAX_TRACE_ID;

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/142.0.0.0 Safari/537.36";

/// Origin the channels web APIs are served from.
pub const CHANNELS_ORIGIN: &str = "https://channels.weixin.qq.com/";

fn default_timeout_secs() -> u64 {
    30
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

fn default_trace_id_limit() -> u64 {
    MAX_TRACE_ID
}

fn default_origin() -> String {
    CHANNELS_ORIGIN.to_string()
}

/// Dispatcher tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateConfig {
    /// Trace ids wrap back to 1 after this value.
    #[serde(default = "default_trace_id_limit")]
    pub trace_id_limit: u64,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            trace_id_limit: default_trace_id_limit(),
        }
    }
}

/// Gateway client settings.
#[derive(Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Base URL of the gateway.
    pub host: String,
    pub app_id: String,
    pub app_secret: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default)]
    pub gate: GateConfig,
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("host", &self.host)
            .field("app_id", &self.app_id)
            .field("app_secret", &"<redacted>")
            .field("timeout_secs", &self.timeout_secs)
            .field("user_agent", &self.user_agent)
            .field("gate", &self.gate)
            .finish()
    }
}

impl ClientConfig {
    pub fn new(
        host: impl Into<String>,
        app_id: impl Into<String>,
        app_secret: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            app_id: app_id.into(),
            app_secret: app_secret.into(),
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
            gate: GateConfig::default(),
        }
    }

    pub fn host_url(&self) -> Result<Url> {
        parse_base(&self.host)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Build the shared HTTP client, verifying certificates against the
    /// platform trust store.
    pub fn http_client(&self) -> Result<Client> {
        let provider = Arc::new(ring::default_provider());
        let tls = rustls::ClientConfig::builder_with_provider(provider)
            .with_safe_default_protocol_versions()
            .map_err(|e| Error::config(format!("tls protocol versions: {e}")))?
            .with_platform_verifier()
            .map_err(|e| Error::config(format!("tls verifier: {e}")))?
            .with_no_client_auth();

        Ok(Client::builder()
            .use_preconfigured_tls(tls)
            .user_agent(self.user_agent.as_str())
            .timeout(self.timeout())
            .build()?)
    }
}

/// Overrides for one cookie gate variant. `None` keeps the variant default.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CookieGateConfig {
    #[serde(default = "default_origin")]
    pub origin: String,
    #[serde(default)]
    pub invalidation_codes: Option<Vec<i64>>,
    #[serde(default)]
    pub not_operator_code: Option<i64>,
    #[serde(default)]
    pub gate: GateConfig,
}

impl Default for CookieGateConfig {
    fn default() -> Self {
        Self {
            origin: default_origin(),
            invalidation_codes: None,
            not_operator_code: None,
            gate: GateConfig::default(),
        }
    }
}

impl CookieGateConfig {
    pub fn origin_url(&self) -> Result<Url> {
        parse_base(&self.origin)
    }
}

/// Complete configuration file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub client: ClientConfig,
    #[serde(default)]
    pub assistant: CookieGateConfig,
    #[serde(default)]
    pub promotion: CookieGateConfig,
}

impl Config {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| Error::config(e.to_string()))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::config(format!("failed to read {}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }
}

/// Parse a base URL, making sure relative joins keep its path.
fn parse_base(raw: &str) -> Result<Url> {
    let with_slash = if raw.ends_with('/') {
        raw.to_string()
    } else {
        format!("{raw}/")
    };
    Url::parse(&with_slash).map_err(|e| Error::config(format!("invalid base url {raw}: {e}")))
}
