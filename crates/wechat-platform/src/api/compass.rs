//! Compass (e-commerce dashboard) endpoints.

use serde::{Deserialize, Serialize, Serializer};
use serde_json::json;

use crate::client::PlatformClient;
use crate::error::Result;

/// Business line a compass scan is issued for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CompassBizType {
    EcStore = 4,
    Finder = 5,
    Talent = 9,
}

impl Serialize for CompassBizType {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_u8(*self as u8)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CompassFinder {
    pub identity: i64,
    pub nickname: String,
    pub finder_username: String,
    pub headurl: String,
    pub account_type: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CompassMembers {
    pub success: bool,
    pub talent_list: Vec<AppRef>,
    pub ec_store_info_list: Vec<AppRef>,
    pub finder_list: Vec<CompassFinder>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppRef {
    pub appid: String,
}

pub struct Compass<'a> {
    client: &'a PlatformClient,
}

impl<'a> Compass<'a> {
    pub(crate) fn new(client: &'a PlatformClient) -> Self {
        Self { client }
    }

    pub async fn members(&self, wxid: &str) -> Result<CompassMembers> {
        self.client
            .get_with_wxid(wxid, "/-/api/compass/members")
            .await
    }

    /// Scan into the compass console for one business id; returns its cookies.
    pub async fn scan(
        &self,
        wxid: &str,
        biz_id: &str,
        biz_type: CompassBizType,
    ) -> Result<Vec<String>> {
        self.client
            .post_with_wxid(
                wxid,
                "/-/api/assistant/scan",
                &json!({ "biz_id": biz_id, "biz_type": biz_type }),
            )
            .await
    }
}
