//! OAuth 1.0a request signing (HMAC-SHA1), RFC 5849 section 3.4.

use crate::error::{Error, Result};
use crate::x_client::canonical::{normalized_params, percent_encode, Params};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::Utc;
use hmac::{Hmac, Mac};
use itertools::Itertools;
use rand::rngs::OsRng;
use rand::RngCore;
use sha1::Sha1;

type HmacSha1 = Hmac<Sha1>;

pub const SIGNATURE_METHOD: &str = "HMAC-SHA1";
pub const OAUTH_VERSION: &str = "1.0";

#[derive(Clone, PartialEq, Eq)]
pub struct OAuth1Credentials {
    pub consumer_key: String,
    pub consumer_secret: String,
    pub access_token: String,
    pub access_token_secret: String,
}

impl std::fmt::Debug for OAuth1Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuth1Credentials")
            .field("consumer_key", &self.consumer_key)
            .finish_non_exhaustive()
    }
}

/// The per-request, single-use part of a signature.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Stamp {
    pub nonce: String,
    pub timestamp: i64,
}

impl Stamp {
    /// 16 bytes from the OS CSPRNG, hex-encoded, plus the current unix time.
    pub fn fresh() -> Self {
        let mut bytes = [0u8; 16];
        OsRng.fill_bytes(&mut bytes);
        Self {
            nonce: bytes.iter().map(|b| format!("{b:02x}")).join(""),
            timestamp: Utc::now().timestamp(),
        }
    }
}

/// A GET ready to be sent.  Built fresh per call and never reused.
#[derive(Clone, Debug)]
pub struct SignedRequest {
    pub method: String,
    pub url: String,
    pub query: Params,
    pub authorization: String,
}

/// Signs `method url?query` with a fresh stamp.
pub fn sign(
    method: &str,
    url: &str,
    query: &[(String, String)],
    credentials: &OAuth1Credentials,
) -> Result<SignedRequest> {
    sign_with_stamp(method, url, query, credentials, &Stamp::fresh())
}

pub fn sign_with_stamp(
    method: &str,
    url: &str,
    query: &[(String, String)],
    credentials: &OAuth1Credentials,
    stamp: &Stamp,
) -> Result<SignedRequest> {
    let protocol_params = protocol_params(credentials, stamp);

    // NB: query params are signed but never repeated in the header
    let signing_params: Params = query
        .iter()
        .chain(protocol_params.iter())
        .cloned()
        .collect();

    let base_string = signature_base_string(method, url, &signing_params);
    let key = signing_key(&credentials.consumer_secret, &credentials.access_token_secret);
    let signature = hmac_sha1_base64(&key, &base_string)?;

    let mut header_params = protocol_params;
    header_params.push(("oauth_signature".to_string(), signature));

    Ok(SignedRequest {
        method: method.to_uppercase(),
        url: url.to_string(),
        query: query.to_vec(),
        authorization: authorization_header(&header_params),
    })
}

fn protocol_params(credentials: &OAuth1Credentials, stamp: &Stamp) -> Params {
    let timestamp = stamp.timestamp.to_string();
    [
        ("oauth_consumer_key", credentials.consumer_key.as_str()),
        ("oauth_nonce", stamp.nonce.as_str()),
        ("oauth_signature_method", SIGNATURE_METHOD),
        ("oauth_timestamp", timestamp.as_str()),
        ("oauth_token", credentials.access_token.as_str()),
        ("oauth_version", OAUTH_VERSION),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

/// `METHOD&enc(url)&enc(normalized params)`; `url` must not carry a query string.
pub fn signature_base_string(
    method: &str,
    url: &str,
    signing_params: &[(String, String)],
) -> String {
    format!(
        "{}&{}&{}",
        method.to_uppercase(),
        percent_encode(url),
        percent_encode(&normalized_params(signing_params))
    )
}

pub fn signing_key(consumer_secret: &str, token_secret: &str) -> String {
    format!(
        "{}&{}",
        percent_encode(consumer_secret),
        percent_encode(token_secret)
    )
}

fn hmac_sha1_base64(key: &str, message: &str) -> Result<String> {
    let mut mac =
        HmacSha1::new_from_slice(key.as_bytes()).map_err(|e| Error::Signing(e.to_string()))?;
    mac.update(message.as_bytes());
    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}

/// `OAuth k="v", k="v"` over the `oauth_*` params, sorted by key.
pub fn authorization_header(header_params: &[(String, String)]) -> String {
    let fields = header_params
        .iter()
        .sorted()
        .map(|(k, v)| format!("{}=\"{}\"", percent_encode(k), percent_encode(v)))
        .join(", ");
    format!("OAuth {fields}")
}
