use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use gh_transport::{cache_key, CacheEntry, ResponseCache};
use normalizer::payloads::PullRequestPayload;
use normalizer::{PullRequestData, QuestionMatcher};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, instrument, warn};

use crate::client::{RemoteEndpoint, RemotePage};
use crate::error::FetchError;
use crate::fetcher::{FetchOptions, FetchOrchestrator, PullRequestFetcher, PullRequestRef};

/// What a cached read stores: the page and where pagination continues.
#[derive(Debug, Serialize, Deserialize)]
struct StoredPage {
    body: String,
    #[serde(default)]
    next: Option<String>,
}

fn encode_page(page: &RemotePage) -> Result<Vec<u8>> {
    let stored = StoredPage {
        body: STANDARD.encode(&page.body),
        next: page.next.clone(),
    };
    Ok(serde_json::to_vec(&stored)?)
}

fn decode_page(payload: &[u8]) -> Result<RemotePage> {
    let stored: StoredPage = serde_json::from_slice(payload)?;
    Ok(RemotePage {
        body: STANDARD.decode(stored.body)?,
        next: stored.next,
    })
}

/// Endpoint wrapper answering reads from the response cache when an entry is
/// fresh for `reference`, and storing every page it has to fetch.
pub struct CachingEndpoint {
    inner: Arc<dyn RemoteEndpoint>,
    cache: ResponseCache,
    reference: DateTime<Utc>,
}

impl CachingEndpoint {
    pub fn new(inner: Arc<dyn RemoteEndpoint>, cache: ResponseCache, reference: DateTime<Utc>) -> Self {
        Self {
            inner,
            cache,
            reference,
        }
    }

    pub fn reference(&self) -> DateTime<Utc> {
        self.reference
    }
}

#[async_trait]
impl RemoteEndpoint for CachingEndpoint {
    async fn read(&self, path: &str) -> Result<RemotePage> {
        let key = cache_key(&["read", path]);
        if let Some(entry) = self.cache.lookup_fresh(&key, self.reference).await {
            match decode_page(&entry.payload) {
                Ok(page) => {
                    self.cache.record_hit();
                    debug!(path, "served from cache");
                    return Ok(page);
                }
                Err(err) => warn!(path, error = %err, "discarding undecodable cached page"),
            }
        }
        self.cache.record_miss();

        let fetched_at = Utc::now();
        let page = self.inner.read(path).await?;
        match encode_page(&page) {
            Ok(payload) => {
                let entry = CacheEntry::new(payload, fetched_at);
                if let Err(err) = self.cache.put(&key, &entry).await {
                    warn!(path, error = %err, "failed to cache page");
                }
            }
            Err(err) => warn!(path, error = %err, "failed to encode page for cache"),
        }
        Ok(page)
    }

    async fn query(&self, query: &str, variables: Value) -> Result<Value> {
        self.inner.query(query, variables).await
    }
}

/// Same contract as [`FetchOrchestrator`], reading through the response cache.
pub struct CacheOrchestrator {
    endpoint: Arc<dyn RemoteEndpoint>,
    cache: ResponseCache,
    questions: Arc<QuestionMatcher>,
}

impl CacheOrchestrator {
    pub fn new(
        endpoint: Arc<dyn RemoteEndpoint>,
        cache: ResponseCache,
        questions: Arc<QuestionMatcher>,
    ) -> Self {
        Self {
            endpoint,
            cache,
            questions,
        }
    }

    /// Caller supplied reference, else the pull request's own `updated_at`
    /// read uncached from the endpoint.
    async fn reference_time(
        &self,
        pr: &PullRequestRef,
        options: &FetchOptions,
        deadline: Instant,
    ) -> Result<DateTime<Utc>, FetchError> {
        if let Some(reference) = options.reference_time {
            return Ok(reference);
        }
        let lookup = async {
            let page = self.endpoint.read(&pr.pull_request_path()).await?;
            let payload: PullRequestPayload = serde_json::from_slice(&page.body)
                .with_context(|| format!("decoding pull request {pr}"))?;
            Ok::<_, anyhow::Error>(payload.updated_at)
        };
        match timeout_at(deadline, lookup).await {
            Ok(Ok(updated_at)) => Ok(updated_at),
            Ok(Err(err)) => Err(FetchError::PullRequest(err)),
            Err(_) => Err(FetchError::Deadline("pull request metadata")),
        }
    }
}

#[async_trait]
impl PullRequestFetcher for CacheOrchestrator {
    #[instrument(skip(self, pr, options), fields(pr = %pr))]
    async fn fetch(
        &self,
        pr: &PullRequestRef,
        options: &FetchOptions,
    ) -> Result<PullRequestData, FetchError> {
        let deadline = options.deadline();
        let reference = self.reference_time(pr, options, deadline).await?;
        debug!(%reference, "reading through response cache");
        let caching = CachingEndpoint::new(self.endpoint.clone(), self.cache.clone(), reference);
        let options = options.clone().with_deadline(deadline);
        FetchOrchestrator::new(Arc::new(caching), self.questions.clone())
            .fetch(pr, &options)
            .await
    }
}
