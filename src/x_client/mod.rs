pub mod api;
pub mod auth;
pub mod canonical;
pub mod oauth1;

use crate::config::Config;
use crate::error::{Error, Result, TransportError};
use auth::{Auth, AuthMode};
use canonical::{percent_encode, Params};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use hyper::client::HttpConnector;
use hyper::header::{AUTHORIZATION, USER_AGENT};
use hyper::{Body, Client, Request};
use hyper_tls::HttpsConnector;
use indexmap::IndexMap;
use oauth1::SignedRequest;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

pub const API_BASE: &str = "https://api.x.com/2";
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const FEED_MAX_RESULTS: (i64, i64) = (5, 100);
const SEARCH_MAX_RESULTS: (i64, i64) = (10, 100);
/// The recent-search endpoint only looks back a week.
const SEARCH_LOOKBACK_DAYS: (i64, i64) = (1, 7);
const SEARCH_NOTE: &str =
    "Search API recent endpoint is used and then ranked by public engagement.";

/// Lookback and page size for a feed fetch.  Out-of-range input is clamped, not rejected.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FetchWindow {
    pub days: i64,
    pub max_results: i64,
}

impl FetchWindow {
    /// A negative lookback means "from now".
    pub fn clamped_days(&self) -> i64 {
        self.days.max(0)
    }

    pub fn clamped_max_results(&self) -> i64 {
        self.max_results.clamp(FEED_MAX_RESULTS.0, FEED_MAX_RESULTS.1)
    }
}

/// Whose posts to fetch.  At least one of the two is set.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Identity {
    pub user_id: Option<String>,
    pub username: Option<String>,
}

impl Identity {
    /// Explicit id, then explicit username, then `X_USER_ID`, then `X_USERNAME`.
    pub fn choose(user_id: Option<&str>, username: Option<&str>, config: &Config) -> Result<Self> {
        let user_id = user_id.filter(|s| !s.is_empty()).map(String::from);
        let username = username.filter(|s| !s.is_empty()).map(String::from);

        let identity = match (user_id, username) {
            (Some(user_id), username) => Identity {
                user_id: Some(user_id),
                username: username.or_else(|| config.username.clone()),
            },
            (None, Some(username)) => Identity {
                user_id: None,
                username: Some(username),
            },
            (None, None) => Identity {
                user_id: config.user_id.clone(),
                username: config.username.clone(),
            },
        };

        if identity.user_id.is_none() && identity.username.is_none() {
            return Err(Error::Configuration(
                "Provide --username/--user-id or X_USERNAME/X_USER_ID".to_string(),
            ));
        }
        Ok(identity)
    }
}

/// `now - days` as `YYYY-MM-DDTHH:MM:SSZ`.
pub fn start_time_days_ago(days: i64) -> String {
    start_time_from(Utc::now(), days)
}

pub fn start_time_from(now: DateTime<Utc>, days: i64) -> String {
    // NB: `Duration` is bounded by i64 milliseconds
    let days = days.clamp(0, i64::MAX / 86_400_000);
    now.checked_sub_signed(ChronoDuration::days(days))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
        .format("%Y-%m-%dT%H:%M:%SZ")
        .to_string()
}

pub fn feed_fields(mode: AuthMode) -> Vec<&'static str> {
    let mut fields = vec!["created_at", "public_metrics"];
    if mode.can_read_non_public_metrics() {
        fields.push("non_public_metrics");
    }
    fields
}

pub fn feed_params(start_time: &str, window: &FetchWindow, mode: AuthMode) -> Params {
    vec![
        ("start_time".to_string(), start_time.to_string()),
        ("max_results".to_string(), window.clamped_max_results().to_string()),
        ("tweet.fields".to_string(), feed_fields(mode).join(",")),
    ]
}

/// `(topic) lang:en -is:retweet -is:reply`, or `None` for a blank topic.  Replies and retweets
/// are dropped to bias toward posts people actually wrote.
pub fn topic_query(topic: &str) -> Option<String> {
    let cleaned = topic.split_whitespace().collect::<Vec<_>>().join(" ");
    if cleaned.is_empty() {
        return None;
    }
    Some(format!("({cleaned}) lang:en -is:retweet -is:reply"))
}

pub fn search_lookback_days(days: i64) -> i64 {
    days.clamp(SEARCH_LOOKBACK_DAYS.0, SEARCH_LOOKBACK_DAYS.1)
}

pub fn search_max_results(per_topic_results: i64) -> i64 {
    per_topic_results.clamp(SEARCH_MAX_RESULTS.0, SEARCH_MAX_RESULTS.1)
}

pub fn search_params(query: &str, start_time: &str, per_topic_results: i64) -> Params {
    vec![
        ("query".to_string(), query.to_string()),
        ("max_results".to_string(), search_max_results(per_topic_results).to_string()),
        ("start_time".to_string(), start_time.to_string()),
        ("tweet.fields".to_string(), "created_at,public_metrics,author_id".to_string()),
    ]
}

#[derive(Debug, Clone)]
pub struct XClient {
    https_client: Client<HttpsConnector<HttpConnector>>,
    auth: Auth,
    api_base: String,
}

impl XClient {
    pub fn new(auth: Auth) -> Self {
        Self::with_api_base(auth, API_BASE)
    }

    pub fn with_api_base(auth: Auth, api_base: &str) -> Self {
        let https = HttpsConnector::new();
        let https_client = Client::builder().build::<_, hyper::Body>(https);
        Self {
            https_client,
            auth,
            api_base: api_base.trim_end_matches('/').to_string(),
        }
    }

    pub fn auth_mode(&self) -> AuthMode {
        self.auth.mode()
    }

    /// Signs and sends a GET, returning the decoded JSON body.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(String, String)],
    ) -> Result<T> {
        let signed = self.auth.sign("GET", url, query)?;
        self.execute(&signed).await
    }

    /// One attempt, bounded by [REQUEST_TIMEOUT].  Non-2xx and non-JSON bodies are errors.
    async fn execute<T: DeserializeOwned>(&self, signed: &SignedRequest) -> Result<T> {
        let mut uri = Url::parse(&signed.url)?;
        if !signed.query.is_empty() {
            uri.set_query(Some(&canonical::query_string(&signed.query)));
        }
        debug!(method = %signed.method, url = %uri, "sending request");

        let req = Request::builder()
            .method(signed.method.as_str())
            .uri(uri.as_str())
            .header(AUTHORIZATION, signed.authorization.as_str())
            .header(USER_AGENT, concat!("x-writing/", env!("CARGO_PKG_VERSION")))
            .body(Body::empty())?;

        let (status, body) = tokio::time::timeout(REQUEST_TIMEOUT, async {
            let resp = self.https_client.request(req).await?;
            let status = resp.status();
            let body = hyper::body::to_bytes(resp.into_body()).await?;
            Ok::<_, hyper::Error>((status, body))
        })
        .await
        .map_err(|_| TransportError::Timeout(REQUEST_TIMEOUT))??;

        if !status.is_success() {
            return Err(TransportError::Status {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&body).into_owned(),
            }
            .into());
        }
        Ok(serde_json::from_slice(&body)?)
    }

    pub async fn resolve_user_id(&self, username: &str) -> Result<String> {
        let url = format!("{}/users/by/username/{}", self.api_base, percent_encode(username));
        let query = vec![("user.fields".to_string(), "id".to_string())];
        let body: Value = self.get_json(&url, &query).await?;

        let user_id = serde_json::from_value::<api::UserLookup>(body.clone())
            .ok()
            .and_then(|lookup| lookup.data)
            .and_then(|user| user.id)
            .filter(|id| !id.is_empty());

        user_id.ok_or_else(|| Error::IdentityResolution {
            username: username.to_string(),
            response: body.to_string(),
        })
    }

    pub async fn fetch_recent_posts(
        &self,
        window: &FetchWindow,
        identity: &Identity,
    ) -> Result<api::Feed> {
        let start_time = start_time_days_ago(window.clamped_days());
        let mode = self.auth_mode();

        let user_id = match (&identity.user_id, &identity.username) {
            (Some(user_id), _) => user_id.clone(),
            (None, Some(username)) => self.resolve_user_id(username).await?,
            (None, None) => {
                return Err(Error::Configuration(
                    "Provide --username/--user-id or X_USERNAME/X_USER_ID".to_string(),
                ))
            }
        };

        let url = format!("{}/users/{}/tweets", self.api_base, percent_encode(&user_id));
        let params = feed_params(&start_time, window, mode);
        let resp: api::Response = self.get_json(&url, &params).await?;

        let data = resp.data.unwrap_or_default();
        info!(user_id = %user_id, posts = data.len(), auth_mode = %mode, "fetched recent posts");

        Ok(api::Feed {
            meta: api::FeedMeta {
                days: window.clamped_days(),
                start_time,
                auth_mode: mode,
                username: identity.username.clone(),
                user_id,
                post_count: data.len(),
            },
            data,
            raw_meta: resp.meta.unwrap_or_else(|| json!({})),
        })
    }

    /// One recent-search per non-blank topic, sequentially.  A failing topic is recorded in
    /// `meta.errors` and does not stop the others.
    pub async fn search_topic_posts(
        &self,
        topics: &[String],
        days: i64,
        per_topic_results: i64,
    ) -> api::TopicResearch {
        let lookback_days = search_lookback_days(days);
        let start_time = start_time_days_ago(lookback_days);
        let url = format!("{}/tweets/search/recent", self.api_base);

        let mut research = api::TopicResearch {
            meta: api::TopicMeta {
                auth_mode: Some(self.auth_mode()),
                days: Some(lookback_days),
                start_time: Some(start_time.clone()),
                per_topic_results: Some(search_max_results(per_topic_results)),
                topic_count: Some(topics.len()),
                note: Some(SEARCH_NOTE.to_string()),
                ..api::TopicMeta::default()
            },
            topics: IndexMap::new(),
        };

        for topic in topics {
            let Some(query) = topic_query(topic) else {
                debug!(topic = %topic, "skipping blank topic");
                continue;
            };
            let params = search_params(&query, &start_time, per_topic_results);
            match self.get_json::<api::Response>(&url, &params).await {
                Ok(resp) => {
                    let posts = resp.data.unwrap_or_default();
                    info!(topic = %topic, posts = posts.len(), "searched topic");
                    research.topics.insert(topic.clone(), posts);
                }
                Err(e) => {
                    warn!(topic = %topic, error = %e, "topic search failed");
                    research.meta.errors.insert(topic.clone(), e.to_string());
                }
            }
        }

        research
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{
        config_from, X_ACCESS_TOKEN, X_ACCESS_TOKEN_SECRET, X_API_KEY, X_API_KEY_SECRET,
        X_BEARER_TOKEN, X_USERNAME, X_USER_ID,
    };
    use chrono::TimeZone;
    use hyper::service::{make_service_fn, service_fn};
    use hyper::Server;
    use std::collections::HashMap;
    use std::convert::Infallible;
    use std::net::SocketAddr;
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Clone)]
    struct Recorded {
        path: String,
        query: HashMap<String, String>,
        raw_query: String,
        authorization: Option<String>,
    }

    type Responder = fn(&str, &HashMap<String, String>) -> (u16, String);

    async fn spawn_server(responder: Responder) -> (String, Arc<Mutex<Vec<Recorded>>>) {
        let recorded = Arc::new(Mutex::new(Vec::new()));
        let log = recorded.clone();

        let make_svc = make_service_fn(move |_conn| {
            let log = log.clone();
            async move {
                Ok::<_, Infallible>(service_fn(move |req: Request<Body>| {
                    let log = log.clone();
                    async move {
                        let raw_query = req.uri().query().unwrap_or("").to_string();
                        let entry = Recorded {
                            path: req.uri().path().to_string(),
                            query: url::form_urlencoded::parse(raw_query.as_bytes())
                                .into_owned()
                                .collect(),
                            raw_query,
                            authorization: req
                                .headers()
                                .get(AUTHORIZATION)
                                .and_then(|v| v.to_str().ok())
                                .map(String::from),
                        };
                        let (status, body) = responder(&entry.path, &entry.query);
                        log.lock().unwrap().push(entry);
                        Ok::<_, Infallible>(
                            hyper::Response::builder()
                                .status(status)
                                .body(Body::from(body))
                                .unwrap(),
                        )
                    }
                }))
            }
        });

        let addr: SocketAddr = ([127, 0, 0, 1], 0).into();
        let server = Server::bind(&addr).serve(make_svc);
        let api_base = format!("http://{}/2", server.local_addr());
        tokio::spawn(server);
        (api_base, recorded)
    }

    fn bearer() -> Auth {
        Auth::select(&config_from(&[(X_BEARER_TOKEN, "tok")])).unwrap()
    }

    fn oauth1() -> Auth {
        Auth::select(&config_from(&[
            (X_API_KEY, "key"),
            (X_API_KEY_SECRET, "key-secret"),
            (X_ACCESS_TOKEN, "token"),
            (X_ACCESS_TOKEN_SECRET, "token-secret"),
        ]))
        .unwrap()
    }

    fn feed_responder(path: &str, _query: &HashMap<String, String>) -> (u16, String) {
        match path {
            "/2/users/by/username/jack" => (200, r#"{"data":{"id":"42","name":"Jack","username":"jack"}}"#.to_string()),
            "/2/users/42/tweets" => (
                200,
                r#"{"data":[{"id":"1","text":"first","public_metrics":{"like_count":5}},{"id":"2","text":"second"}],"meta":{"result_count":2,"newest_id":"2"}}"#.to_string(),
            ),
            _ => (404, r#"{"title":"Not Found Error"}"#.to_string()),
        }
    }

    #[test]
    fn test_start_time_format() {
        let now = Utc.with_ymd_and_hms(2024, 3, 31, 12, 34, 56).unwrap();
        assert_eq!(start_time_from(now, 30), "2024-03-01T12:34:56Z");
        assert_eq!(start_time_from(now, 0), "2024-03-31T12:34:56Z");
        assert_eq!(start_time_from(now, -3), "2024-03-31T12:34:56Z");
        assert!(start_time_from(now, i64::MAX).ends_with("00:00:00Z"));
    }

    #[test]
    fn test_feed_fields_by_auth_mode() {
        assert_eq!(feed_fields(AuthMode::Bearer), vec!["created_at", "public_metrics"]);
        assert!(!feed_fields(AuthMode::Bearer).contains(&"non_public_metrics"));
        assert_eq!(
            feed_fields(AuthMode::OAuth1),
            vec!["created_at", "public_metrics", "non_public_metrics"]
        );
    }

    #[test]
    fn test_feed_max_results_clamped() {
        let window = |max_results| FetchWindow { days: 30, max_results };
        assert_eq!(window(200).clamped_max_results(), 100);
        assert_eq!(window(1).clamped_max_results(), 5);
        assert_eq!(window(-3).clamped_max_results(), 5);
        assert_eq!(window(42).clamped_max_results(), 42);
    }

    #[test]
    fn test_search_clamps() {
        assert_eq!(search_lookback_days(30), 7);
        assert_eq!(search_lookback_days(0), 1);
        assert_eq!(search_lookback_days(3), 3);
        assert_eq!(search_lookback_days(-3), 1);
        assert_eq!(search_max_results(5), 10);
        assert_eq!(search_max_results(500), 100);
        assert_eq!(search_max_results(25), 25);
    }

    #[test]
    fn test_topic_query() {
        assert_eq!(
            topic_query("  AI   tools  ").as_deref(),
            Some("(AI tools) lang:en -is:retweet -is:reply")
        );
        assert_eq!(topic_query("rust\n\tasync").as_deref(), Some("(rust async) lang:en -is:retweet -is:reply"));
        assert_eq!(topic_query(""), None);
        assert_eq!(topic_query("   "), None);
    }

    #[test]
    fn test_identity_priority() {
        let config = config_from(&[(X_USER_ID, "env-id"), (X_USERNAME, "env-name")]);

        let identity = Identity::choose(Some("7"), None, &config).unwrap();
        assert_eq!(identity.user_id.as_deref(), Some("7"));
        assert_eq!(identity.username.as_deref(), Some("env-name"));

        let identity = Identity::choose(None, Some("jack"), &config).unwrap();
        assert_eq!(identity, Identity { user_id: None, username: Some("jack".to_string()) });

        let identity = Identity::choose(None, None, &config).unwrap();
        assert_eq!(identity.user_id.as_deref(), Some("env-id"));

        let identity = Identity::choose(None, None, &config_from(&[(X_USERNAME, "env-name")])).unwrap();
        assert_eq!(identity, Identity { user_id: None, username: Some("env-name".to_string()) });
    }

    #[test]
    fn test_identity_missing_is_configuration_error() {
        let err = Identity::choose(None, Some(""), &config_from(&[])).unwrap_err();
        assert!(err.is_configuration());
    }

    #[tokio::test]
    async fn test_fetch_bearer_resolves_username() {
        let (api_base, recorded) = spawn_server(feed_responder).await;
        let client = XClient::with_api_base(bearer(), &api_base);
        let identity = Identity { user_id: None, username: Some("jack".to_string()) };
        let window = FetchWindow { days: 30, max_results: 200 };

        let feed = client.fetch_recent_posts(&window, &identity).await.unwrap();
        assert_eq!(feed.meta.user_id, "42");
        assert_eq!(feed.meta.username.as_deref(), Some("jack"));
        assert_eq!(feed.meta.auth_mode, AuthMode::Bearer);
        assert_eq!(feed.meta.post_count, 2);
        assert_eq!(feed.meta.days, 30);
        assert_eq!(feed.data[0], json!({"id":"1","text":"first","public_metrics":{"like_count":5}}));
        assert_eq!(feed.raw_meta["newest_id"], "2");

        let recorded = recorded.lock().unwrap();
        assert_eq!(recorded.len(), 2);
        assert_eq!(recorded[0].query["user.fields"], "id");
        assert_eq!(recorded[1].path, "/2/users/42/tweets");
        assert_eq!(recorded[1].query["max_results"], "100");
        assert_eq!(recorded[1].query["tweet.fields"], "created_at,public_metrics");
        assert_eq!(recorded[1].query["start_time"], feed.meta.start_time);
        assert!(recorded[1].raw_query.contains("tweet.fields=created_at%2Cpublic_metrics"));
        assert!(recorded.iter().all(|r| r.authorization.as_deref() == Some("Bearer tok")));
    }

    #[tokio::test]
    async fn test_fetch_oauth1_requests_private_metrics() {
        let (api_base, recorded) = spawn_server(feed_responder).await;
        let client = XClient::with_api_base(oauth1(), &api_base);
        let identity = Identity { user_id: Some("42".to_string()), username: None };
        let window = FetchWindow { days: 7, max_results: 1 };

        let feed = client.fetch_recent_posts(&window, &identity).await.unwrap();
        assert_eq!(feed.meta.auth_mode, AuthMode::OAuth1);

        let recorded = recorded.lock().unwrap();
        assert_eq!(recorded.len(), 1);
        let request = &recorded[0];
        assert_eq!(request.query["max_results"], "5");
        assert_eq!(
            request.query["tweet.fields"],
            "created_at,public_metrics,non_public_metrics"
        );
        assert!(request.query.keys().all(|k| !k.starts_with("oauth_")));
        let authorization = request.authorization.as_deref().unwrap();
        assert!(authorization.starts_with("OAuth "));
        assert!(authorization.contains("oauth_signature=\""));
        assert!(!authorization.contains("max_results"));
    }

    #[tokio::test]
    async fn test_unresolvable_username() {
        fn responder(_path: &str, _query: &HashMap<String, String>) -> (u16, String) {
            (200, r#"{"errors":[{"title":"Not Found Error"}]}"#.to_string())
        }
        let (api_base, _) = spawn_server(responder).await;
        let client = XClient::with_api_base(bearer(), &api_base);

        let err = client.resolve_user_id("nobody").await.unwrap_err();
        match err {
            Error::IdentityResolution { username, response } => {
                assert_eq!(username, "nobody");
                assert!(response.contains("Not Found Error"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_non_2xx_is_transport_error() {
        fn responder(_path: &str, _query: &HashMap<String, String>) -> (u16, String) {
            (401, r#"{"title":"Unauthorized"}"#.to_string())
        }
        let (api_base, recorded) = spawn_server(responder).await;
        let client = XClient::with_api_base(bearer(), &api_base);
        let identity = Identity { user_id: Some("42".to_string()), username: None };
        let window = FetchWindow { days: 30, max_results: 100 };

        let err = client.fetch_recent_posts(&window, &identity).await.unwrap_err();
        assert!(matches!(err, Error::Transport(TransportError::Status { status: 401, .. })));
        // no retries
        assert_eq!(recorded.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_malformed_json_is_transport_error() {
        fn responder(_path: &str, _query: &HashMap<String, String>) -> (u16, String) {
            (200, "<html>oops</html>".to_string())
        }
        let (api_base, _) = spawn_server(responder).await;
        let client = XClient::with_api_base(bearer(), &api_base);

        let err = client.resolve_user_id("jack").await.unwrap_err();
        assert!(matches!(err, Error::Transport(TransportError::Json(_))));
    }

    #[tokio::test]
    async fn test_search_topics() {
        fn responder(path: &str, query: &HashMap<String, String>) -> (u16, String) {
            assert_eq!(path, "/2/tweets/search/recent");
            if query["query"].contains("broken") {
                return (503, r#"{"title":"Service Unavailable"}"#.to_string());
            }
            (200, r#"{"data":[{"id":"9","text":"tools post"}],"meta":{"result_count":1}}"#.to_string())
        }
        let (api_base, recorded) = spawn_server(responder).await;
        let client = XClient::with_api_base(bearer(), &api_base);
        let topics = vec![
            "broken".to_string(),
            "  AI   tools  ".to_string(),
            "".to_string(),
        ];

        let research = client.search_topic_posts(&topics, 30, 5).await;
        assert_eq!(research.meta.days, Some(7));
        assert_eq!(research.meta.per_topic_results, Some(10));
        assert_eq!(research.meta.topic_count, Some(3));
        assert_eq!(research.meta.auth_mode, Some(AuthMode::Bearer));
        assert_eq!(research.topics.keys().collect::<Vec<_>>(), vec!["  AI   tools  "]);
        assert_eq!(research.topics["  AI   tools  "].len(), 1);
        assert!(research.meta.errors["broken"].contains("503"));
        assert!(!research.topics.contains_key(""));

        let recorded = recorded.lock().unwrap();
        assert_eq!(recorded.len(), 2);
        let request = &recorded[1];
        assert_eq!(request.query["query"], "(AI tools) lang:en -is:retweet -is:reply");
        assert_eq!(request.query["max_results"], "10");
        assert_eq!(request.query["tweet.fields"], "created_at,public_metrics,author_id");
        assert_eq!(Some(&request.query["start_time"]), research.meta.start_time.as_ref());
        assert!(request.raw_query.contains("query=%28AI%20tools%29%20lang%3Aen"));
    }
}
