use std::env;

pub const X_API_KEY: &str = "X_API_KEY";
pub const X_API_KEY_SECRET: &str = "X_API_KEY_SECRET";
pub const X_ACCESS_TOKEN: &str = "X_ACCESS_TOKEN";
pub const X_ACCESS_TOKEN_SECRET: &str = "X_ACCESS_TOKEN_SECRET";
pub const X_BEARER_TOKEN: &str = "X_BEARER_TOKEN";
pub const X_USERNAME: &str = "X_USERNAME";
pub const X_USER_ID: &str = "X_USER_ID";

/// Everything this tool reads from the environment, captured once at startup.
///
/// NB: empty values are treated as unset, so `X_API_KEY=` in a .env file does not count as a
/// credential.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Config {
    pub api_key: Option<String>,
    pub api_key_secret: Option<String>,
    pub access_token: Option<String>,
    pub access_token_secret: Option<String>,
    pub bearer_token: Option<String>,
    pub username: Option<String>,
    pub user_id: Option<String>,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.is_empty());
        Self {
            api_key: get(X_API_KEY),
            api_key_secret: get(X_API_KEY_SECRET),
            access_token: get(X_ACCESS_TOKEN),
            access_token_secret: get(X_ACCESS_TOKEN_SECRET),
            bearer_token: get(X_BEARER_TOKEN),
            username: get(X_USERNAME),
            user_id: get(X_USER_ID),
        }
    }

    /// Names of the OAuth 1.0a variables that are not set.
    pub fn missing_oauth1_vars(&self) -> Vec<&'static str> {
        [
            (X_API_KEY, &self.api_key),
            (X_API_KEY_SECRET, &self.api_key_secret),
            (X_ACCESS_TOKEN, &self.access_token),
            (X_ACCESS_TOKEN_SECRET, &self.access_token_secret),
        ]
        .into_iter()
        .filter(|(_, value)| value.is_none())
        .map(|(name, _)| name)
        .collect()
    }
}

// NB: hand-written so secrets never end up in logs
impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let redact = |value: &Option<String>| value.as_ref().map(|_| "<redacted>");
        f.debug_struct("Config")
            .field("api_key", &redact(&self.api_key))
            .field("api_key_secret", &redact(&self.api_key_secret))
            .field("access_token", &redact(&self.access_token))
            .field("access_token_secret", &redact(&self.access_token_secret))
            .field("bearer_token", &redact(&self.bearer_token))
            .field("username", &self.username)
            .field("user_id", &self.user_id)
            .finish()
    }
}

#[cfg(test)]
pub(crate) fn config_from(vars: &[(&str, &str)]) -> Config {
    let vars: std::collections::HashMap<String, String> = vars
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    Config::from_lookup(|key| vars.get(key).cloned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_values_are_unset() {
        let config = config_from(&[(X_API_KEY, ""), (X_BEARER_TOKEN, "abc")]);
        assert_eq!(config.api_key, None);
        assert_eq!(config.bearer_token.as_deref(), Some("abc"));
    }

    #[test]
    fn test_missing_oauth1_vars() {
        let config = config_from(&[(X_API_KEY, "k"), (X_ACCESS_TOKEN, "t")]);
        assert_eq!(
            config.missing_oauth1_vars(),
            vec![X_API_KEY_SECRET, X_ACCESS_TOKEN_SECRET]
        );
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = config_from(&[(X_API_KEY_SECRET, "hunter2"), (X_USERNAME, "jack")]);
        let printed = format!("{config:?}");
        assert!(!printed.contains("hunter2"));
        assert!(printed.contains("jack"));
    }
}
