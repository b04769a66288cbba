//! In-memory endpoint serving canned pages, used by tests and fixture runs.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use http::StatusCode;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::client::{GithubApiError, RemoteEndpoint, RemotePage};

#[derive(Debug, Default, Deserialize)]
struct Fixture {
    #[serde(default)]
    pages: HashMap<String, FixturePage>,
    #[serde(default)]
    failures: HashMap<String, u16>,
    #[serde(default)]
    query: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct FixturePage {
    body: Value,
    #[serde(default)]
    next: Option<String>,
}

/// Serves pages by path. Lookup tries the exact path first, then the path
/// with its query string removed.
#[derive(Default)]
pub struct CannedEndpoint {
    pages: HashMap<String, RemotePage>,
    failures: HashMap<String, StatusCode>,
    delays: HashMap<String, Duration>,
    query_response: Option<Value>,
    calls: Mutex<Vec<String>>,
}

impl CannedEndpoint {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads `{"pages": {path: {"body": .., "next": ..}}, "failures": {path: status}, "query": ..}`.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read(path)
            .with_context(|| format!("reading fixture {}", path.display()))?;
        let fixture: Fixture = serde_json::from_slice(&raw)
            .with_context(|| format!("decoding fixture {}", path.display()))?;

        let mut endpoint = Self::new();
        for (route, page) in fixture.pages {
            let body = serde_json::to_vec(&page.body)?;
            endpoint.pages.insert(route, RemotePage { body, next: page.next });
        }
        for (route, status) in fixture.failures {
            let status = StatusCode::from_u16(status)
                .with_context(|| format!("invalid status for {route}"))?;
            endpoint.failures.insert(route, status);
        }
        endpoint.query_response = fixture.query;
        Ok(endpoint)
    }

    pub fn with_page(self, path: &str, body: &Value, next: Option<&str>) -> Self {
        let bytes = serde_json::to_vec(body).unwrap_or_default();
        self.with_raw_page(path, bytes, next)
    }

    /// Replaces anything registered for `path`, failures included.
    pub fn with_raw_page(mut self, path: &str, body: Vec<u8>, next: Option<&str>) -> Self {
        self.failures.remove(path);
        self.pages.insert(
            path.to_string(),
            RemotePage {
                body,
                next: next.map(str::to_string),
            },
        );
        self
    }

    pub fn with_failure(mut self, path: &str, status: StatusCode) -> Self {
        self.failures.insert(path.to_string(), status);
        self
    }

    /// Delays every read of `path` before answering.
    pub fn with_delay(mut self, path: &str, delay: Duration) -> Self {
        self.delays.insert(path.to_string(), delay);
        self
    }

    pub fn with_query_response(mut self, data: Value) -> Self {
        self.query_response = Some(data);
        self
    }

    /// Every path requested so far, in request order.
    pub fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }

    pub fn calls_matching(&self, prefix: &str) -> usize {
        self.calls()
            .iter()
            .filter(|call| call.starts_with(prefix))
            .count()
    }
}

fn lookup<'a, T>(map: &'a HashMap<String, T>, path: &str) -> Option<&'a T> {
    map.get(path).or_else(|| {
        let (bare, _) = path.split_once('?')?;
        map.get(bare)
    })
}

#[async_trait]
impl RemoteEndpoint for CannedEndpoint {
    async fn read(&self, path: &str) -> Result<RemotePage> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(path.to_string());
        }
        if let Some(delay) = lookup(&self.delays, path) {
            tokio::time::sleep(*delay).await;
        }
        if let Some(status) = lookup(&self.failures, path) {
            debug!(path, %status, "serving canned failure");
            return Err(GithubApiError::status(*status, path).into());
        }
        lookup(&self.pages, path)
            .cloned()
            .ok_or_else(|| GithubApiError::NotCanned(path.to_string()).into())
    }

    async fn query(&self, query: &str, _variables: Value) -> Result<Value> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(format!("graphql:{}", query.len()));
        }
        self.query_response
            .clone()
            .ok_or_else(|| GithubApiError::NotCanned("graphql".to_string()).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    #[tokio::test]
    async fn falls_back_to_path_without_query() {
        let endpoint = CannedEndpoint::new().with_page("repos/o/r/pulls/1/commits", &json!([]), None);
        let page = endpoint
            .read("repos/o/r/pulls/1/commits?per_page=100")
            .await
            .unwrap();
        assert_eq!(page.body, b"[]");
        assert_eq!(endpoint.calls(), vec!["repos/o/r/pulls/1/commits?per_page=100"]);
    }

    #[tokio::test]
    async fn unknown_paths_are_errors() {
        let endpoint = CannedEndpoint::new();
        let err = endpoint.read("repos/o/r").await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<GithubApiError>(),
            Some(GithubApiError::NotCanned(_))
        ));
    }

    #[tokio::test]
    async fn loads_fixture_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            "{}",
            json!({
                "pages": {"repos/o/r/pulls/1": {"body": {"number": 1}, "next": "repos/o/r/pulls/1?page=2"}},
                "failures": {"repos/o/r/pulls/1/reviews": 502}
            })
        )
        .unwrap();
        let endpoint = CannedEndpoint::from_file(file.path()).unwrap();
        let page = endpoint.read("repos/o/r/pulls/1").await.unwrap();
        assert_eq!(page.next.as_deref(), Some("repos/o/r/pulls/1?page=2"));
        let err = endpoint.read("repos/o/r/pulls/1/reviews").await.unwrap_err();
        let api = err.downcast_ref::<GithubApiError>().unwrap();
        assert_eq!(api.status_code(), Some(StatusCode::BAD_GATEWAY));
    }
}
