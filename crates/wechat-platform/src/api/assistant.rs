//! Channels assistant endpoints.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::scan_token;
use crate::client::PlatformClient;
use crate::cookie::SessionScanner;
use crate::error::{Error, Result};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AssistantMember {
    pub finder_username: String,
    pub nickname: String,
    pub head_img_url: String,
    pub cover_img_url: String,
    pub spam_flag: i64,
    pub acct_type: i64,
    pub auth_icon_type: i64,
    pub owner_wx_uin: i64,
    pub admin_nickname: String,
    pub category_flag: String,
    pub uniq_id: String,
    pub is_master_finder: bool,
}

pub struct Assistant<'a> {
    client: &'a PlatformClient,
}

impl<'a> Assistant<'a> {
    pub(crate) fn new(client: &'a PlatformClient) -> Self {
        Self { client }
    }

    /// Channels accounts the user can operate through the assistant.
    pub async fn members(&self, wxid: &str, token: &str) -> Result<Vec<AssistantMember>> {
        self.client
            .get_with_wxid(wxid, &format!("/-/api/assistant/{token}/members"))
            .await
    }

    /// Scan into the assistant web console as `username`; returns the session cookie value.
    pub async fn scan(&self, wxid: &str, token: &str, username: &str) -> Result<String> {
        self.client
            .post_with_wxid(
                wxid,
                &format!("/-/api/assistant/{token}/scan"),
                &json!({ "username": username }),
            )
            .await
    }
}

/// Scans assistant sessions through the gateway. Needs both the wxid and the
/// finder username.
#[derive(Debug, Clone)]
pub struct AssistantScanner {
    client: PlatformClient,
}

impl AssistantScanner {
    pub fn new(client: PlatformClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SessionScanner for AssistantScanner {
    async fn scan(&self, identity: &str, secondary: Option<&str>) -> Result<String> {
        let username = secondary
            .ok_or_else(|| Error::config("assistant scan requires a finder username"))?;
        self.client
            .assistant()
            .scan(identity, &scan_token(), username)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;
    use crate::test_support::{ScriptedTransport, header, ok};
    use crate::token::{TokenPair, TokenSession};

    #[tokio::test]
    async fn test_scanner_posts_username_with_wxid() {
        let transport = ScriptedTransport::new(|req| {
            assert!(req.path.starts_with("/-/api/assistant/"));
            assert!(req.path.ends_with("/scan"));
            assert_eq!(header(req, "wxid").as_deref(), Some("wxid_a"));
            assert_eq!(req.body.as_ref().unwrap()["username"], "finder_x");
            ok(json!("session-cookie"))
        });
        let session = TokenSession::new("wx-app", "s3cret").with_tokens(TokenPair {
            access_token: "access".into(),
            refresh_token: "refresh".into(),
        });
        let client = PlatformClient::with_session(
            &ClientConfig::new("https://gateway.example.com", "wx-app", "s3cret"),
            session,
            transport,
        );
        let scanner = AssistantScanner::new(client);

        assert_eq!(
            scanner.scan("wxid_a", Some("finder_x")).await.unwrap(),
            "session-cookie"
        );
        assert!(matches!(
            scanner.scan("wxid_a", None).await,
            Err(Error::Config(_))
        ));
    }
}
