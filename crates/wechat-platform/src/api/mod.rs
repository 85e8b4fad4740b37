//! Convenience endpoints layered over [`PlatformClient`].
//!
//! These are thin pass-throughs: each builds a request and lets the session
//! gate take care of credentials.

mod account;
mod assistant;
mod compass;
mod finder;
mod live;
mod mp;
mod promotion;
mod wechat;

pub use account::{
    LoginMeta, LoginProgress, PersonalInfo, ProxyConfig, QrcodeStatus, QrcodeTicket, SafeItem,
    SafeReport,
};
pub use assistant::{Assistant, AssistantMember, AssistantScanner};
pub use compass::{AppRef, Compass, CompassBizType, CompassFinder, CompassMembers};
pub use finder::{CommentsQuery, Finder, TopicQuery, WebSearchQuery};
pub use live::{Live, LiveMessageQuery, LiveProductsQuery, LiveRef, LotteryQuery};
pub use mp::{Mp, MpDataQuery, ProductRef};
pub use promotion::{Promotion, PromotionMember, PromotionMembers, PromotionScanner};
pub use wechat::{Wechat, WechatEntries, WechatEntry};

use serde::Serialize;

use crate::client::PlatformClient;

impl PlatformClient {
    pub fn assistant(&self) -> Assistant<'_> {
        Assistant::new(self)
    }

    pub fn promotion(&self) -> Promotion<'_> {
        Promotion::new(self)
    }

    pub fn compass(&self) -> Compass<'_> {
        Compass::new(self)
    }

    pub fn finder(&self) -> Finder<'_> {
        Finder::new(self)
    }

    pub fn live(&self) -> Live<'_> {
        Live::new(self)
    }

    pub fn mp(&self) -> Mp<'_> {
        Mp::new(self)
    }

    pub fn wechat(&self) -> Wechat<'_> {
        Wechat::new(self)
    }
}

/// Query fields followed by the pagination cursor, in one flat JSON object.
#[derive(Serialize)]
struct Paged<'a, T> {
    #[serde(flatten)]
    query: &'a T,
    next: &'a str,
}

impl<'a, T> Paged<'a, T> {
    fn new(query: &'a T, next: &'a str) -> Self {
        Self { query, next }
    }
}

/// Millisecond timestamp used as the one-shot token of scan endpoints.
pub fn scan_token() -> String {
    chrono::Utc::now().timestamp_millis().to_string()
}
