//! Atlas Admin API client
//!
//! Thin wrapper over `reqwest` that adds digest authentication and the
//! versioned `Accept` header. Every call is awaited in turn; there is no
//! request pipelining.

use crate::config::AtlasConfig;
use crate::digest;
use crate::error::{ApiError, ApiResult};
use reqwest::header::{HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE, WWW_AUTHENTICATE};
use reqwest::{Method, Response, StatusCode, Url};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Versioned media types of the Atlas Admin API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiVersion {
    /// Default for every operation.
    V20240530,
    /// Needed for `:startWith` (tier selection).
    V20250312,
}

impl ApiVersion {
    pub fn accept(&self) -> &'static str {
        match self {
            Self::V20240530 => "application/vnd.atlas.2024-05-30+json",
            Self::V20250312 => "application/vnd.atlas.2025-03-12+json",
        }
    }
}

pub struct AtlasClient {
    config: Arc<AtlasConfig>,
    http: reqwest::Client,
}

impl AtlasClient {
    pub fn new(config: Arc<AtlasConfig>) -> ApiResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|source| ApiError::Transport {
                url: config.base_url.clone(),
                source,
            })?;
        Ok(Self { config, http })
    }

    pub fn config(&self) -> &AtlasConfig {
        &self.config
    }

    pub fn project_url(&self) -> String {
        self.config.project_url()
    }

    pub fn workspace_url(&self) -> ApiResult<String> {
        self.config.workspace_url()
    }

    /// Send one request, answering a digest challenge if the server asks.
    ///
    /// Returns the response whatever its status; see [`Self::execute`] for
    /// the variant that maps non-2xx answers to [`ApiError::Status`].
    pub async fn send(
        &self,
        method: Method,
        url: &str,
        query: &[(&str, &str)],
        body: Option<&Value>,
        version: ApiVersion,
    ) -> ApiResult<Response> {
        let mut parsed = Url::parse(url).map_err(|e| ApiError::InvalidUrl {
            url: url.to_string(),
            message: e.to_string(),
        })?;
        if !query.is_empty() {
            parsed.query_pairs_mut().extend_pairs(query);
        }
        let payload = match body {
            Some(json) => Some(serde_json::to_vec(json).map_err(|source| ApiError::Decode {
                url: url.to_string(),
                source,
            })?),
            None => None,
        };

        tracing::debug!(%method, url = %parsed, "Atlas API request");

        let response = self
            .dispatch(&method, &parsed, payload.as_deref(), version, None)
            .await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        let Some(challenge) = response
            .headers()
            .get(WWW_AUTHENTICATE)
            .and_then(|v| v.to_str().ok())
        else {
            return Ok(response);
        };
        let authorization = digest::authorization_header(
            challenge,
            &self.config.public_key,
            &self.config.private_key,
            &method,
            &parsed,
            payload.as_deref(),
        )?;

        self.dispatch(
            &method,
            &parsed,
            payload.as_deref(),
            version,
            Some(authorization),
        )
        .await
    }

    async fn dispatch(
        &self,
        method: &Method,
        url: &Url,
        payload: Option<&[u8]>,
        version: ApiVersion,
        authorization: Option<String>,
    ) -> ApiResult<Response> {
        let mut request = self
            .http
            .request(method.clone(), url.clone())
            .header(ACCEPT, HeaderValue::from_static(version.accept()));
        if let Some(bytes) = payload {
            request = request
                .header(CONTENT_TYPE, "application/json")
                .body(bytes.to_vec());
        }
        if let Some(value) = authorization {
            request = request.header(AUTHORIZATION, value);
        }
        request.send().await.map_err(|source| ApiError::Transport {
            url: url.to_string(),
            source,
        })
    }

    /// Send and require a 2xx answer.
    pub async fn execute(
        &self,
        method: Method,
        url: &str,
        query: &[(&str, &str)],
        body: Option<&Value>,
        version: ApiVersion,
    ) -> ApiResult<Response> {
        let response = self.send(method, url, query, body, version).await?;
        ensure_success(response).await
    }

    /// GET a JSON document.
    pub async fn get_json(&self, url: &str, query: &[(&str, &str)]) -> ApiResult<Value> {
        let response = self
            .execute(Method::GET, url, query, None, ApiVersion::V20240530)
            .await?;
        read_json(response).await
    }

    /// GET a list endpoint and return its `results` array.
    pub async fn get_results(&self, url: &str) -> ApiResult<Vec<Value>> {
        let document = self.get_json(url, &[]).await?;
        Ok(results_of(document))
    }

    pub async fn post_json(&self, url: &str, body: &Value) -> ApiResult<()> {
        self.execute(Method::POST, url, &[], Some(body), ApiVersion::V20240530)
            .await
            .map(drop)
    }

    pub async fn post_empty(&self, url: &str) -> ApiResult<()> {
        self.execute(Method::POST, url, &[], None, ApiVersion::V20240530)
            .await
            .map(drop)
    }

    pub async fn delete(&self, url: &str) -> ApiResult<()> {
        self.execute(Method::DELETE, url, &[], None, ApiVersion::V20240530)
            .await
            .map(drop)
    }
}

/// Map a non-2xx response to [`ApiError::Status`], keeping the body.
pub async fn ensure_success(response: Response) -> ApiResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let url = response.url().to_string();
    let body = response.text().await.unwrap_or_default();
    tracing::debug!(%status, %url, "Atlas API error response");
    Err(ApiError::status(status, url, body))
}

pub async fn read_json(response: Response) -> ApiResult<Value> {
    let url = response.url().to_string();
    let text = response
        .text()
        .await
        .map_err(|source| ApiError::Transport {
            url: url.clone(),
            source,
        })?;
    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(&text).map_err(|source| ApiError::Decode { url, source })
}

/// `results` array of a paginated list document; a bare array is accepted too.
pub fn results_of(document: Value) -> Vec<Value> {
    match document {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("results") {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        },
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_accept_headers() {
        assert_eq!(
            ApiVersion::V20240530.accept(),
            "application/vnd.atlas.2024-05-30+json"
        );
        assert_eq!(
            ApiVersion::V20250312.accept(),
            "application/vnd.atlas.2025-03-12+json"
        );
    }

    #[test]
    fn test_results_of() {
        assert_eq!(
            results_of(json!({"results": [{"name": "a"}], "totalCount": 1})),
            vec![json!({"name": "a"})]
        );
        assert_eq!(results_of(json!([1, 2])), vec![json!(1), json!(2)]);
        assert!(results_of(json!({"totalCount": 0})).is_empty());
        assert!(results_of(Value::Null).is_empty());
    }
}
