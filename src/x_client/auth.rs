use crate::config::{Config, X_BEARER_TOKEN};
use crate::error::{Error, Result};
use crate::x_client::oauth1::{self, OAuth1Credentials, SignedRequest};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
    OAuth1,
    Bearer,
}

impl AuthMode {
    /// Bearer tokens are app-only and cannot see private engagement counts.
    pub fn can_read_non_public_metrics(self) -> bool {
        self == AuthMode::OAuth1
    }
}

impl fmt::Display for AuthMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthMode::OAuth1 => write!(f, "oauth1"),
            AuthMode::Bearer => write!(f, "bearer"),
        }
    }
}

/// One auth mode per process; chosen once, then used for every request.
#[derive(Clone)]
pub enum Auth {
    OAuth1(OAuth1Credentials),
    Bearer(String),
}

impl Auth {
    /// Prefers a complete OAuth 1.0a set, falls back to the bearer token.
    pub fn select(config: &Config) -> Result<Self> {
        if let (
            Some(consumer_key),
            Some(consumer_secret),
            Some(access_token),
            Some(access_token_secret),
        ) = (
            &config.api_key,
            &config.api_key_secret,
            &config.access_token,
            &config.access_token_secret,
        ) {
            return Ok(Auth::OAuth1(OAuth1Credentials {
                consumer_key: consumer_key.clone(),
                consumer_secret: consumer_secret.clone(),
                access_token: access_token.clone(),
                access_token_secret: access_token_secret.clone(),
            }));
        }

        if let Some(bearer_token) = &config.bearer_token {
            return Ok(Auth::Bearer(bearer_token.clone()));
        }

        let mut missing = config.missing_oauth1_vars();
        missing.push(X_BEARER_TOKEN);
        Err(Error::Configuration(format!(
            "No auth found. Set OAuth 1.0a vars or X_BEARER_TOKEN (missing: {})",
            missing.join(", ")
        )))
    }

    pub fn mode(&self) -> AuthMode {
        match self {
            Auth::OAuth1(_) => AuthMode::OAuth1,
            Auth::Bearer(_) => AuthMode::Bearer,
        }
    }

    pub fn sign(
        &self,
        method: &str,
        url: &str,
        query: &[(String, String)],
    ) -> Result<SignedRequest> {
        match self {
            Auth::OAuth1(credentials) => oauth1::sign(method, url, query, credentials),
            Auth::Bearer(token) => Ok(SignedRequest {
                method: method.to_uppercase(),
                url: url.to_string(),
                query: query.to_vec(),
                authorization: format!("Bearer {token}"),
            }),
        }
    }
}

impl fmt::Debug for Auth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Auth::OAuth1(credentials) => f.debug_tuple("OAuth1").field(credentials).finish(),
            Auth::Bearer(_) => f.debug_tuple("Bearer").field(&"<redacted>").finish(),
        }
    }
}
