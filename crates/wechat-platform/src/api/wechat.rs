//! Logged-in account registry.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::LoginMeta;
use crate::client::PlatformClient;
use crate::descriptor::RequestDescriptor;
use crate::error::Result;

/// One account bound to the application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WechatEntry {
    /// Device information the account logged in with.
    pub meta: LoginMeta,
    pub wechat: Value,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WechatEntries {
    pub total: u64,
    pub data: Vec<WechatEntry>,
}

pub struct Wechat<'a> {
    client: &'a PlatformClient,
}

impl<'a> Wechat<'a> {
    pub(crate) fn new(client: &'a PlatformClient) -> Self {
        Self { client }
    }

    pub async fn info(&self, wxid: &str) -> Result<WechatEntry> {
        self.client.get_with_wxid(wxid, "/-/api/wechat").await
    }

    /// One page of bound accounts. Pages start at 1.
    pub async fn entries(&self, page: u32, size: u32) -> Result<WechatEntries> {
        self.client
            .send(
                RequestDescriptor::get("/-/api/wechat/entries")
                    .query("page", page.to_string())
                    .query("size", size.to_string()),
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{ScriptedTransport, header, ok, query, ready_client};
    use serde_json::json;

    #[tokio::test]
    async fn test_entries_pages_without_wxid() {
        let transport = ScriptedTransport::new(|req| {
            assert_eq!(req.path, "/-/api/wechat/entries");
            assert_eq!(query(req, "page"), Some("2"));
            assert_eq!(query(req, "size"), Some("10"));
            assert!(header(req, "wxid").is_none());
            ok(json!({
                "total": 11,
                "data": [{
                    "meta": {"deviceId": "d-1", "deviceName": "pad"},
                    "wechat": {"wxid": "wxid_a", "nickname": "alice"}
                }]
            }))
        });
        let client = ready_client(transport);

        let entries = client.wechat().entries(2, 10).await.unwrap();
        assert_eq!(entries.total, 11);
        assert_eq!(entries.data[0].meta.device_name, "pad");
        assert_eq!(entries.data[0].wechat["nickname"], "alice");
    }
}
