//! Channels live-stream endpoints.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::client::PlatformClient;
use crate::error::Result;

/// Identifies one live stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveRef {
    pub vid: String,
    pub lid: String,
    pub nid: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LotteryQuery {
    pub vid: String,
    pub lid: String,
    pub lottery_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveMessageQuery {
    /// Cursor cookies returned by the previous poll.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cookies: Option<String>,
    pub username: String,
    pub vid: String,
    pub nid: String,
    pub lid: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveProductsQuery {
    pub vid: String,
    pub lid: String,
    pub username: String,
}

pub struct Live<'a> {
    client: &'a PlatformClient,
}

impl<'a> Live<'a> {
    pub(crate) fn new(client: &'a PlatformClient) -> Self {
        Self { client }
    }

    /// Whether the stream has ended.
    pub async fn ending(&self, wxid: &str, lid: &str) -> Result<Vec<Value>> {
        self.client
            .post_with_wxid(wxid, "/-/api/live/ending", &json!({ "lid": lid }))
            .await
    }

    pub async fn heats(&self, wxid: &str, live: &LiveRef) -> Result<Vec<Value>> {
        self.client
            .post_with_wxid(wxid, "/-/api/live/heats", live)
            .await
    }

    pub async fn join(&self, wxid: &str, live: &LiveRef) -> Result<Value> {
        self.client
            .post_with_wxid(wxid, "/-/api/live/join", live)
            .await
    }

    pub async fn lottery(&self, wxid: &str, query: &LotteryQuery) -> Result<Value> {
        self.client
            .post_with_wxid(wxid, "/-/api/live/lottery", query)
            .await
    }

    /// Poll the stream's message feed.
    pub async fn message(&self, wxid: &str, query: &LiveMessageQuery) -> Result<Value> {
        self.client
            .post_with_wxid(wxid, "/-/api/live/message", query)
            .await
    }

    pub async fn products(&self, wxid: &str, query: &LiveProductsQuery) -> Result<Value> {
        self.client
            .post_with_wxid(wxid, "/-/api/live/products", query)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{ScriptedTransport, ok, ready_client};

    #[tokio::test]
    async fn test_message_omits_missing_cookies() {
        let transport = ScriptedTransport::new(|req| {
            assert_eq!(req.path, "/-/api/live/message");
            let body = req.body.as_ref().unwrap();
            assert!(body.get("cookies").is_none());
            assert_eq!(body["lid"], "l1");
            ok(json!({"cookies": "next-cursor", "msgs": [{"content": "hi"}]}))
        });
        let client = ready_client(transport);
        let query = LiveMessageQuery {
            cookies: None,
            username: "finder_x".into(),
            vid: "v1".into(),
            nid: "n1".into(),
            lid: "l1".into(),
        };

        let feed = client.live().message("wxid_a", &query).await.unwrap();
        assert_eq!(feed["cookies"], "next-cursor");
        assert_eq!(feed["msgs"][0]["content"], "hi");
    }

    #[tokio::test]
    async fn test_lottery_uses_camel_case_id() {
        let transport = ScriptedTransport::new(|req| {
            assert_eq!(req.body.as_ref().unwrap()["lotteryId"], "lot-9");
            ok(json!({"status": 1}))
        });
        let client = ready_client(transport);
        let query = LotteryQuery {
            vid: "v1".into(),
            lid: "l1".into(),
            lottery_id: "lot-9".into(),
        };

        assert_eq!(
            client.live().lottery("wxid_a", &query).await.unwrap()["status"],
            1
        );
    }
}
