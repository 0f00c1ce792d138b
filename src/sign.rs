//! # Request Signing
//!
//! Each call carries `timestamp`, `nonce` and `sign` query parameters. The signature is
//! the upper-case hex MD5 of a canonical string built from the call parameters plus the
//! identity fields and the password:
//!
//! 1. merge everything into one flat map (a `params` entry holding `k=v&k=v` is exploded)
//! 2. sort keys lexicographically
//! 3. join as `key=value` with `&`, no trailing separator
//!
//! The password only ever enters the signature; it is never part of the URL.

use crate::params::ParameterSet;
use md5::{Digest, Md5};
use reqwest::Url;
use std::collections::BTreeMap;

/// Identity and client fields folded into every signature
#[derive(Debug, Clone)]
pub struct Credentials {
    pub service_node_id: String,
    pub user: String,
    pub password: String,
    pub language: String,
    pub client_version: String,
}

/// A fully signed request, ready to be sent
#[derive(Debug, Clone)]
pub struct SignedCall {
    pub url: Url,
    pub method: String,
    pub interface_id: String,
    pub timestamp: i64,
    pub nonce: String,
    pub sign: String,
}

/// Flattens `entries` into the map that gets signed.
///
/// A `params` key whose value is `k=v&k=v` contributes its pairs instead of itself.
pub fn canonical_map<'a, I>(entries: I) -> BTreeMap<String, String>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut map = BTreeMap::new();
    for (key, value) in entries {
        if key == "params" {
            for pair in value.split('&').filter(|p| !p.is_empty()) {
                let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
                map.insert(k.to_string(), v.to_string());
            }
        } else {
            map.insert(key.to_string(), value.to_string());
        }
    }
    map
}

/// Joins a sorted map as `k=v&k=v`.
pub fn canonical_string(map: &BTreeMap<String, String>) -> String {
    map.iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&")
}

/// Upper-case hex MD5 of the canonical string.
pub fn compute_sign(map: &BTreeMap<String, String>) -> String {
    let mut hasher = Md5::new();
    hasher.update(canonical_string(map).as_bytes());
    format!("{:X}", hasher.finalize())
}

/// Builds the signed URL for one call.
///
/// `base` is the service endpoint (`http://host:port/music-ws/api`), validated once when
/// the client is built; appending query pairs cannot fail.
pub fn sign_call(
    base: &Url,
    credentials: &Credentials,
    method: &str,
    interface_id: &str,
    params: &ParameterSet,
    timestamp: i64,
    nonce: &str,
) -> SignedCall {
    let timestamp_str = timestamp.to_string();
    let identity = [
        ("serviceNodeId", credentials.service_node_id.as_str()),
        ("method", method),
        ("userId", credentials.user.as_str()),
        ("interfaceId", interface_id),
        ("language", credentials.language.as_str()),
        ("clientversion", credentials.client_version.as_str()),
    ];
    let trailer = [("timestamp", timestamp_str.as_str()), ("nonce", nonce)];

    let signed_entries = identity
        .iter()
        .copied()
        .chain(params.iter())
        .chain(trailer.iter().copied())
        .chain(std::iter::once(("pwd", credentials.password.as_str())));
    let sign = compute_sign(&canonical_map(signed_entries));

    let mut url = base.clone();
    {
        let mut query = url.query_pairs_mut();
        query.extend_pairs(identity.iter().copied());
        for (k, v) in canonical_map(params.iter()) {
            query.append_pair(&k, &v);
        }
        query.extend_pairs(trailer.iter().copied());
        query.append_pair("sign", &sign);
    }

    SignedCall {
        url,
        method: method.to_string(),
        interface_id: interface_id.to_string(),
        timestamp,
        nonce: nonce.to_string(),
        sign,
    }
}

/// Milliseconds since the Unix epoch, the timestamp unit the service expects.
pub fn timestamp_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Fresh nonce for one call.
pub fn new_nonce() -> String {
    uuid::Uuid::new_v4().to_string()
}
