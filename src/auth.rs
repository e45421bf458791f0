//! API key extraction for agent requests
//!
//! Agents authenticate with the key returned at registration, passed as
//! `X-API-Key: <key>` or `Authorization: Bearer <key>`. The bearer scheme is
//! matched case-insensitively. `X-API-Key` wins when both are present.

use hyper::header::{HeaderMap, AUTHORIZATION};

pub const API_KEY_HEADER: &str = "x-api-key";

/// Extract the API key from request headers, if one was sent
pub fn extract_api_key(headers: &HeaderMap) -> Option<String> {
    if let Some(key) = header_str(headers, API_KEY_HEADER) {
        let key = key.trim();
        if !key.is_empty() {
            return Some(key.to_string());
        }
    }

    let authorization = header_str(headers, AUTHORIZATION.as_str())?;
    bearer_token(authorization).map(str::to_string)
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Token from a `Bearer <token>` header value, scheme case-insensitive
pub fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    if token.is_empty() {
        None
    } else {
        Some(token)
    }
}
