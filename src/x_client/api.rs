use crate::x_client::auth::AuthMode;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Posts are passed through exactly as the API returned them.
pub type Post = Value;

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Response {
    #[serde(default)]
    pub data: Option<Vec<Post>>,
    #[serde(default)]
    pub meta: Option<Value>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UserLookup {
    pub data: Option<UserId>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UserId {
    pub id: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FeedMeta {
    pub days: i64,
    pub start_time: String,
    pub auth_mode: AuthMode,
    pub username: Option<String>,
    pub user_id: String,
    pub post_count: usize,
}

/// The result of a feed fetch; also the on-disk format of `fetch --out`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Feed {
    pub meta: FeedMeta,
    pub data: Vec<Post>,
    pub raw_meta: Value,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TopicMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_mode: Option<AuthMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub days: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub per_topic_results: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topic_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    /// Set when the search could not run at all.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Per-topic failures; the other topics were still searched.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub errors: IndexMap<String, String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TopicResearch {
    pub meta: TopicMeta,
    /// Keyed by the topic string as the caller passed it, in input order.
    pub topics: IndexMap<String, Vec<Post>>,
}

impl TopicResearch {
    pub fn failed(error: &str) -> Self {
        Self {
            meta: TopicMeta {
                error: Some(error.to_string()),
                ..TopicMeta::default()
            },
            topics: IndexMap::new(),
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PublicMetrics {
    #[serde(default)]
    pub retweet_count: i64,
    #[serde(default)]
    pub reply_count: i64,
    #[serde(default)]
    pub like_count: i64,
    #[serde(default)]
    pub quote_count: i64,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct NonPublicMetrics {
    #[serde(default)]
    pub impression_count: i64,
}

/// A typed view over the parts of a raw post the advice engine reads.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PostView {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub public_metrics: Option<PublicMetrics>,
    #[serde(default)]
    pub non_public_metrics: Option<NonPublicMetrics>,
}

impl PostView {
    /// Anything that isn't shaped like a post reads as an empty one.
    pub fn of(post: &Post) -> Self {
        serde_json::from_value(post.clone()).unwrap_or_default()
    }

    pub fn text(&self) -> &str {
        self.text.as_deref().unwrap_or("").trim()
    }

    pub fn public(&self) -> PublicMetrics {
        self.public_metrics.clone().unwrap_or_default()
    }

    pub fn impressions(&self) -> i64 {
        self.non_public_metrics
            .as_ref()
            .map(|m| m.impression_count)
            .unwrap_or(0)
    }
}
