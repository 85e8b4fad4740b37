//! Channels (finder) content endpoints.
//!
//! Response shapes vary per endpoint and are passed through as JSON.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use super::Paged;
use crate::client::PlatformClient;
use crate::error::{Error, Result};

/// Identifies one video's comment thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentsQuery {
    pub vid: String,
    pub nid: String,
    pub username: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicQuery {
    pub value: String,
    pub wxid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebSearchQuery {
    pub keyword: String,
    /// Result category, `0..=3`.
    #[serde(rename = "type")]
    pub kind: u8,
    pub offset: i64,
    pub search_id: String,
    pub cookies: String,
}

pub struct Finder<'a> {
    client: &'a PlatformClient,
}

impl<'a> Finder<'a> {
    pub(crate) fn new(client: &'a PlatformClient) -> Self {
        Self { client }
    }

    /// Shopping links attached to the given videos.
    pub async fn links(&self, wxid: &str, ids: &[String]) -> Result<Vec<Value>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        self.client
            .post_with_wxid(wxid, "/-/api/finder/links", &json!({ "ids": ids }))
            .await
    }

    pub async fn comments(&self, wxid: &str, query: &CommentsQuery, next: &str) -> Result<Value> {
        self.client
            .post_with_wxid(wxid, "/-/api/finder/comments", &Paged::new(query, next))
            .await
    }

    /// Trending search terms.
    pub async fn hot(&self, wxid: &str) -> Result<Vec<Value>> {
        self.client.get_with_wxid(wxid, "/-/api/finder/hot").await
    }

    /// Profile of a channels account plus one page of its videos.
    pub async fn info(&self, wxid: &str, username: &str, next: &str) -> Result<Value> {
        self.client
            .post_with_wxid(
                wxid,
                "/-/api/finder/info",
                &json!({ "username": username, "next": next }),
            )
            .await
    }

    pub async fn search(&self, wxid: &str, keyword: &str, next: &str) -> Result<Value> {
        self.client
            .post_with_wxid(
                wxid,
                "/-/api/finder/search",
                &json!({ "keyword": keyword, "next": next }),
            )
            .await
    }

    pub async fn topic(&self, wxid: &str, query: &TopicQuery, next: &str) -> Result<Value> {
        self.client
            .post_with_wxid(wxid, "/-/api/finder/topic", &Paged::new(query, next))
            .await
    }

    pub async fn related_videos(&self, wxid: &str, vid: &str, next: &str) -> Result<Value> {
        self.client
            .post_with_wxid(
                wxid,
                "/-/api/finder/video-related",
                &json!({ "vid": vid, "next": next }),
            )
            .await
    }

    /// Resolve the export key found in web search results to a video id.
    pub async fn export_key_to_id(&self, wxid: &str, key: &str) -> Result<String> {
        self.client
            .post_with_wxid(
                wxid,
                "/-/api/finder/export-key-to-video-id",
                &json!({ "key": key }),
            )
            .await
    }

    pub async fn web_search(&self, wxid: &str, query: &WebSearchQuery) -> Result<Value> {
        if query.kind > 3 {
            return Err(Error::config(format!(
                "unknown web search type {}",
                query.kind
            )));
        }
        self.client
            .post_with_wxid(wxid, "/-/api/finder/web-search", query)
            .await
    }
}
