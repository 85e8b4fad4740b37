//! Account lifecycle endpoints: QR login, safety checks, proxy management.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::client::PlatformClient;
use crate::error::Result;

/// Outbound proxy bound to an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyConfig {
    pub address: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

/// Device information submitted with a QR login request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginMeta {
    pub device_id: String,
    pub device_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy: Option<ProxyConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QrcodeTicket {
    pub base64: String,
    pub uuid: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QrcodeStatus {
    Created,
    #[serde(rename = "scaned")]
    Scanned,
    Canceled,
    Success,
    Outdated,
    #[serde(rename = "unknow", other)]
    Unknown,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PersonalInfo {
    pub nickname: String,
    pub uin: String,
    pub email: String,
    pub mobile: String,
    pub sex: i64,
    pub signature: String,
    pub point: i64,
    pub country: String,
    pub province: String,
    pub city: String,
    pub level: i64,
    pub experience: i64,
    pub level_low_exp: i64,
    pub level_high_exp: i64,
    pub img_head: String,
    pub wallet_region: i64,
}

/// Details attached to a QR login status poll.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoginProgress {
    pub info: Option<PersonalInfo>,
    pub meta: Option<LoginMeta>,
    pub nickname: Option<String>,
    pub avatar: Option<String>,
    pub wxid: Option<String>,
    pub uuid: Option<String>,
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SafeItem {
    pub title: String,
    pub result: String,
    pub is_pass: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SafeReport {
    #[serde(default)]
    pub results: Vec<SafeItem>,
    #[serde(default)]
    pub ticket: String,
    #[serde(default)]
    pub verify_type: i64,
}

impl PlatformClient {
    /// Request a login QR code for a new device.
    pub async fn qrcode(&self, meta: &LoginMeta) -> Result<QrcodeTicket> {
        self.post("/-/api/qrcode", meta).await
    }

    /// Poll a QR login. `None` while nothing happened yet.
    pub async fn check_login(&self, uuid: &str) -> Result<Option<(QrcodeStatus, LoginProgress)>> {
        self.get(&format!("/-/api/{uuid}")).await
    }

    pub async fn logout(&self, wxid: &str) -> Result<Value> {
        self.delete_with_wxid(wxid, "/-/api/logout").await
    }

    pub async fn is_safe(&self, wxid: &str) -> Result<SafeReport> {
        self.get_with_wxid(wxid, "/-/api/safe").await
    }

    /// Unbind the account from the application.
    pub async fn delete_account(&self, wxid: &str) -> Result<i64> {
        self.delete_with_wxid(wxid, "/-/api/wechat/rel").await
    }

    pub async fn update_proxy(&self, wxid: &str, proxy: &ProxyConfig) -> Result<Value> {
        self.post_with_wxid(wxid, "/-/api/proxy", proxy).await
    }

    pub async fn delete_proxy(&self, wxid: &str) -> Result<Value> {
        self.delete_with_wxid(wxid, "/-/api/proxy").await
    }
}
