//! HTTP digest authentication (RFC 7616) for the Atlas Admin API.
//!
//! Atlas answers an unauthenticated request with `401` and a
//! `WWW-Authenticate: Digest ...` challenge; the request is then resent with
//! the computed `Authorization` header.

use crate::error::ApiError;
use digest_auth::{AuthContext, HttpMethod};
use reqwest::{Method, Url};

/// Request-target used in the digest: path plus query.
pub fn request_uri(url: &Url) -> String {
    match url.query() {
        Some(query) => format!("{}?{}", url.path(), query),
        None => url.path().to_string(),
    }
}

/// Answer a digest challenge for one request.
pub fn authorization_header(
    challenge: &str,
    username: &str,
    password: &str,
    method: &Method,
    url: &Url,
    body: Option<&[u8]>,
) -> Result<String, ApiError> {
    let mut prompt = digest_auth::parse(challenge).map_err(|e| ApiError::Auth(e.to_string()))?;
    let uri = request_uri(url);
    let context = AuthContext::new_with_method(
        username,
        password,
        uri.as_str(),
        body,
        HttpMethod::from(method.as_str()),
    );
    let answer = prompt
        .respond(&context)
        .map_err(|e| ApiError::Auth(e.to_string()))?;
    Ok(answer.to_header_string())
}
