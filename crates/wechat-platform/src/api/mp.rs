//! Mini program endpoints.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::client::PlatformClient;
use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MpDataQuery {
    pub appid: String,
    /// Request payload forwarded to the mini program, either an object or a string.
    pub data: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opt: Option<i64>,
}

/// How a product is located: by share url, or by its mini program coordinates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProductRef {
    Url(String),
    Meta {
        appid: String,
        product_id: String,
        method: Option<String>,
    },
}

#[derive(Serialize)]
struct ProductBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    url: Option<&'a str>,
    meta: ProductMeta<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<bool>,
}

#[derive(Default, Serialize)]
#[serde(rename_all = "camelCase")]
struct ProductMeta<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    appid: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    product_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    method: Option<&'a str>,
}

impl<'a> ProductBody<'a> {
    fn new(product: &'a ProductRef, format: Option<bool>) -> Self {
        match product {
            ProductRef::Url(url) => Self {
                url: Some(url.as_str()),
                meta: ProductMeta::default(),
                format,
            },
            ProductRef::Meta {
                appid,
                product_id,
                method,
            } => Self {
                url: None,
                meta: ProductMeta {
                    appid: Some(appid.as_str()),
                    product_id: Some(product_id.as_str()),
                    method: method.as_deref(),
                },
                format,
            },
        }
    }
}

pub struct Mp<'a> {
    client: &'a PlatformClient,
}

impl<'a> Mp<'a> {
    pub(crate) fn new(client: &'a PlatformClient) -> Self {
        Self { client }
    }

    /// Exchange a mini program login code.
    pub async fn code(&self, wxid: &str, appid: &str) -> Result<Value> {
        self.client
            .post_with_wxid(wxid, "/-/api/mp/code", &json!({ "appid": appid }))
            .await
    }

    pub async fn data(&self, wxid: &str, query: &MpDataQuery) -> Result<Value> {
        self.client
            .post_with_wxid(wxid, "/-/api/mp/data", query)
            .await
    }

    /// Product details. With `format` the gateway normalizes the payload.
    pub async fn product(
        &self,
        wxid: &str,
        product: &ProductRef,
        format: Option<bool>,
    ) -> Result<Value> {
        self.client
            .post_with_wxid(
                wxid,
                "/-/api/mp/product",
                &ProductBody::new(product, format),
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{ScriptedTransport, ok, ready_client};

    #[tokio::test]
    async fn test_product_by_meta_nests_coordinates() {
        let transport = ScriptedTransport::new(|req| {
            assert_eq!(req.path, "/-/api/mp/product");
            assert_eq!(
                req.body.as_ref().unwrap(),
                &json!({
                    "meta": {"appid": "wx-mp", "productId": "p-1"},
                    "format": true
                })
            );
            ok(json!({"title": "kettle", "price": 1999}))
        });
        let client = ready_client(transport);
        let product = ProductRef::Meta {
            appid: "wx-mp".into(),
            product_id: "p-1".into(),
            method: None,
        };

        let info = client
            .mp()
            .product("wxid_a", &product, Some(true))
            .await
            .unwrap();
        assert_eq!(info["price"], 1999);
    }

    #[tokio::test]
    async fn test_product_by_url_sends_empty_meta() {
        let transport = ScriptedTransport::new(|req| {
            assert_eq!(
                req.body.as_ref().unwrap(),
                &json!({"url": "https://shop.example.com/p/1", "meta": {}})
            );
            ok(Value::Null)
        });
        let client = ready_client(transport);
        let product = ProductRef::Url("https://shop.example.com/p/1".into());

        assert!(
            client
                .mp()
                .product("wxid_a", &product, None)
                .await
                .unwrap()
                .is_null()
        );
    }
}
