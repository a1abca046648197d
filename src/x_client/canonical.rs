//! RFC 3986 percent-encoding and the RFC 5849 parameter normalization the signature depends on.
//!
//! The server recomputes exactly these strings to verify a signature, so any drift here (an extra
//! encoded character, `+` instead of `%20`, lowercase hex) breaks every signed request.

use itertools::Itertools;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

/// Everything except `A-Z a-z 0-9 - . _ ~`.
const RESERVED: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

pub type Params = Vec<(String, String)>;

pub fn percent_encode(value: &str) -> String {
    utf8_percent_encode(value, RESERVED).to_string()
}

/// Encodes every key and value, sorts by encoded key then encoded value, and joins as
/// `k=v&k=v`.  Input order never matters.
pub fn normalized_params<K, V>(params: &[(K, V)]) -> String
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    params
        .iter()
        .map(|(k, v)| (percent_encode(k.as_ref()), percent_encode(v.as_ref())))
        .sorted()
        .map(|(k, v)| format!("{k}={v}"))
        .join("&")
}

/// Query string for the outbound request, in insertion order, using the same encoding as the
/// signature.
pub fn query_string<K, V>(params: &[(K, V)]) -> String
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    params
        .iter()
        .map(|(k, v)| format!("{}={}", percent_encode(k.as_ref()), percent_encode(v.as_ref())))
        .join("&")
}
