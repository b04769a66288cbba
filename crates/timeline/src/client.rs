use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use common::config::GithubConfig;
use gh_transport::{HttpExec, HttpStatusError};
use http::header::{self, HeaderMap};
use http::{Method, Request, StatusCode};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, instrument};
use url::Url;

#[derive(Debug, Error)]
pub enum GithubApiError {
    #[error("github api error: {status} for {endpoint}")]
    Http {
        status: StatusCode,
        endpoint: String,
    },
    #[error("undecodable response from {endpoint}: {source}")]
    Decode {
        endpoint: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("no canned response for {0}")]
    NotCanned(String),
}

impl GithubApiError {
    pub fn status(status: StatusCode, endpoint: impl Into<String>) -> Self {
        Self::Http {
            status,
            endpoint: endpoint.into(),
        }
    }

    pub fn status_code(&self) -> Option<StatusCode> {
        match *self {
            GithubApiError::Http { status, .. } => Some(status),
            _ => None,
        }
    }
}

/// One page of a paginated read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemotePage {
    pub body: Vec<u8>,
    /// Path of the following page, relative to the API base. `None` on the last page.
    pub next: Option<String>,
}

impl RemotePage {
    pub fn last(body: Vec<u8>) -> Self {
        Self { body, next: None }
    }
}

/// Read access to the hosting platform.
#[async_trait]
pub trait RemoteEndpoint: Send + Sync {
    async fn read(&self, path: &str) -> Result<RemotePage>;

    /// Single bulk GraphQL request; returns the `data` object.
    async fn query(&self, query: &str, variables: Value) -> Result<Value>;
}

pub struct GithubEndpoint {
    exec: Arc<dyn HttpExec>,
    base: Url,
    user_agent: String,
    token: Option<String>,
}

impl GithubEndpoint {
    pub fn new(
        exec: Arc<dyn HttpExec>,
        api_base: &str,
        user_agent: impl Into<String>,
        token: Option<String>,
    ) -> Result<Self> {
        let mut base = api_base.to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base = Url::parse(&base).with_context(|| format!("invalid api base {api_base}"))?;
        Ok(Self {
            exec,
            base,
            user_agent: user_agent.into(),
            token,
        })
    }

    pub fn from_config(exec: Arc<dyn HttpExec>, config: &GithubConfig) -> Result<Self> {
        Self::new(
            exec,
            &config.api_base,
            config.user_agent.clone(),
            config.token.clone(),
        )
    }

    fn resolve(&self, path: &str) -> Result<Url> {
        if path.starts_with("http://") || path.starts_with("https://") {
            return Ok(Url::parse(path)?);
        }
        Ok(self.base.join(path.trim_start_matches('/'))?)
    }

    /// Strips the API base so cached keys and logs stay host independent.
    fn relative(&self, url: &str) -> String {
        url.strip_prefix(self.base.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| url.to_string())
    }

    fn request(&self, method: Method, url: &Url, body: Vec<u8>) -> Result<Request<Vec<u8>>> {
        let uri: http::Uri = url.as_str().parse()?;
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::USER_AGENT, self.user_agent.clone())
            .header(header::ACCEPT, "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28");
        if let Some(token) = &self.token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        if !body.is_empty() {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
        }
        Ok(builder.body(body)?)
    }

    async fn send(&self, request: Request<Vec<u8>>, endpoint: &str) -> Result<http::Response<Vec<u8>>> {
        let response = match self.exec.execute(request).await {
            Ok(response) => response,
            Err(err) => {
                if let Some(status_err) = err.downcast_ref::<HttpStatusError>() {
                    return Err(GithubApiError::status(status_err.status, endpoint).into());
                }
                return Err(err);
            }
        };
        if !response.status().is_success() {
            return Err(GithubApiError::status(response.status(), endpoint).into());
        }
        Ok(response)
    }
}

#[async_trait]
impl RemoteEndpoint for GithubEndpoint {
    #[instrument(skip(self))]
    async fn read(&self, path: &str) -> Result<RemotePage> {
        let url = self.resolve(path)?;
        let endpoint = url.path().trim_start_matches('/').to_string();
        let request = self.request(Method::GET, &url, Vec::new())?;
        let response = self.send(request, &endpoint).await?;
        let next = next_link(response.headers()).map(|link| self.relative(&link));
        debug!(endpoint = %endpoint, has_next = next.is_some(), "page received");
        Ok(RemotePage {
            body: response.into_body(),
            next,
        })
    }

    #[instrument(skip(self, query, variables))]
    async fn query(&self, query: &str, variables: Value) -> Result<Value> {
        let url = self.base.join("graphql")?;
        let body = serde_json::to_vec(&json!({ "query": query, "variables": variables }))?;
        let request = self.request(Method::POST, &url, body)?;
        let response = self.send(request, "graphql").await?;
        let mut value: Value =
            serde_json::from_slice(response.body()).map_err(|source| GithubApiError::Decode {
                endpoint: "graphql".to_string(),
                source,
            })?;
        if let Some(errors) = value.get("errors").and_then(Value::as_array) {
            if !errors.is_empty() {
                return Err(anyhow!("graphql query returned errors: {}", Value::from(errors.clone())));
            }
        }
        Ok(value.get_mut("data").map(Value::take).unwrap_or(Value::Null))
    }
}

/// Extracts the `rel="next"` target from a `Link` header.
pub fn next_link(headers: &HeaderMap) -> Option<String> {
    let raw = headers.get(header::LINK)?.to_str().ok()?;
    raw.split(',').find_map(|entry| {
        let mut segments = entry.split(';');
        let target = segments.next()?.trim();
        let is_next = segments.any(|param| {
            let param = param.trim();
            param == "rel=\"next\"" || param == "rel=next"
        });
        if !is_next {
            return None;
        }
        target
            .strip_prefix('<')
            .and_then(|t| t.strip_suffix('>'))
            .map(str::to_string)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    #[test]
    fn parses_next_link() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::LINK,
            HeaderValue::from_static(
                "<https://api.github.com/repositories/1/pulls/2/commits?page=2>; rel=\"next\", \
                 <https://api.github.com/repositories/1/pulls/2/commits?page=5>; rel=\"last\"",
            ),
        );
        assert_eq!(
            next_link(&headers).as_deref(),
            Some("https://api.github.com/repositories/1/pulls/2/commits?page=2")
        );
    }

    #[test]
    fn last_page_has_no_next() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::LINK,
            HeaderValue::from_static("<https://api.github.com/x?page=1>; rel=\"first\""),
        );
        assert_eq!(next_link(&headers), None);
        assert_eq!(next_link(&HeaderMap::new()), None);
    }
}
