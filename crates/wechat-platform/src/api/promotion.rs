//! Promotion console endpoints.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::scan_token;
use crate::client::PlatformClient;
use crate::cookie::SessionScanner;
use crate::error::Result;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PromotionMember {
    pub nickname: String,
    pub head_img_url: String,
    pub username: String,
    pub acct_status: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PromotionMembers {
    pub promotion_personal_users: Vec<PromotionMember>,
    pub promotion_corporate_users: Vec<PromotionMember>,
    pub acct_status: i64,
}

pub struct Promotion<'a> {
    client: &'a PlatformClient,
}

impl<'a> Promotion<'a> {
    pub(crate) fn new(client: &'a PlatformClient) -> Self {
        Self { client }
    }

    pub async fn members(&self, wxid: &str, token: &str) -> Result<PromotionMembers> {
        self.client
            .get_with_wxid(wxid, &format!("/-/api/promotion/{token}/members"))
            .await
    }

    /// Scan into the promotion console; returns the session cookie value.
    pub async fn scan(&self, wxid: &str, token: &str) -> Result<String> {
        self.client
            .post_empty_with_wxid(wxid, &format!("/-/api/promotion/{token}/scan"))
            .await
    }
}

/// Scans promotion sessions through the gateway. Only the wxid is needed.
#[derive(Debug, Clone)]
pub struct PromotionScanner {
    client: PlatformClient,
}

impl PromotionScanner {
    pub fn new(client: PlatformClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SessionScanner for PromotionScanner {
    async fn scan(&self, identity: &str, _secondary: Option<&str>) -> Result<String> {
        self.client.promotion().scan(identity, &scan_token()).await
    }
}
