use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::config::FetchConfig;
use common::AppError;
use normalizer::PullRequestData;
use tokio::time::Instant;

use crate::error::FetchError;

pub mod cached;
pub mod rest;

pub use cached::{CacheOrchestrator, CachingEndpoint};
pub use rest::FetchOrchestrator;

#[async_trait]
pub trait PullRequestFetcher: Send + Sync {
    async fn fetch(
        &self,
        pr: &PullRequestRef,
        options: &FetchOptions,
    ) -> Result<PullRequestData, FetchError>;
}

/// `owner/repo#number`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PullRequestRef {
    pub owner: String,
    pub repo: String,
    pub number: u64,
}

impl PullRequestRef {
    pub fn new(owner: impl Into<String>, repo: impl Into<String>, number: u64) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
            number,
        }
    }

    pub fn repo_path(&self) -> String {
        format!("repos/{}/{}", self.owner, self.repo)
    }

    pub fn pull_request_path(&self) -> String {
        format!("{}/pulls/{}", self.repo_path(), self.number)
    }

    pub fn required_checks_path(&self, base_ref: &str) -> String {
        format!(
            "{}/branches/{base_ref}/protection/required_status_checks",
            self.repo_path()
        )
    }
}

impl fmt::Display for PullRequestRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}#{}", self.owner, self.repo, self.number)
    }
}

impl FromStr for PullRequestRef {
    type Err = AppError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let invalid = || AppError::InvalidReference(input.to_string());
        let (repo_part, number) = input.trim().split_once('#').ok_or_else(invalid)?;
        let (owner, repo) = repo_part.split_once('/').ok_or_else(invalid)?;
        if owner.is_empty() || repo.is_empty() || repo.contains('/') {
            return Err(invalid());
        }
        let number: u64 = number.parse().map_err(|_| invalid())?;
        if number == 0 {
            return Err(invalid());
        }
        Ok(Self::new(owner, repo, number))
    }
}

#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// Cache freshness boundary. `None` lets the cache derive it from the
    /// pull request's own `updated_at`. Statuses and check runs on an
    /// unchanged head commit do not move `updated_at`, so a derived boundary
    /// keeps serving them from cache; pass an explicit time to see newer ones.
    pub reference_time: Option<DateTime<Utc>>,
    /// Applies to the whole fetch, metadata included.
    pub timeout: Duration,
    pub per_page: u32,
    /// Fixed end of the fetch. Set once by the outermost fetcher so nested
    /// fetchers share one budget; `None` starts `timeout` when the fetch starts.
    pub deadline: Option<Instant>,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self::from_config(&FetchConfig::default(), None)
    }
}

impl FetchOptions {
    pub fn from_config(config: &FetchConfig, reference_time: Option<DateTime<Utc>>) -> Self {
        Self {
            reference_time,
            timeout: config.timeout(),
            per_page: config.per_page.clamp(1, 100),
            deadline: None,
        }
    }

    /// The fixed deadline, or `timeout` from now.
    pub fn deadline(&self) -> Instant {
        self.deadline.unwrap_or_else(|| Instant::now() + self.timeout)
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_reference_time(mut self, reference_time: DateTime<Utc>) -> Self {
        self.reference_time = Some(reference_time);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_reference() {
        let pr: PullRequestRef = "rust-lang/cargo#1234".parse().unwrap();
        assert_eq!(pr, PullRequestRef::new("rust-lang", "cargo", 1234));
        assert_eq!(pr.to_string(), "rust-lang/cargo#1234");
        assert_eq!(pr.pull_request_path(), "repos/rust-lang/cargo/pulls/1234");
    }

    #[tokio::test(start_paused = true)]
    async fn fixed_deadline_does_not_move() {
        let options = FetchOptions::default().with_timeout(Duration::from_secs(5));
        let pinned = options.clone().with_deadline(options.deadline());
        let before = pinned.deadline();
        tokio::time::advance(Duration::from_secs(3)).await;
        assert_eq!(pinned.deadline(), before);
        assert_eq!(options.deadline(), Instant::now() + Duration::from_secs(5));
    }

    #[test]
    fn rejects_malformed_references() {
        for input in ["", "cargo#1", "rust-lang/cargo", "a/b/c#1", "a/b#x", "a/b#0", "/b#1"] {
            assert!(input.parse::<PullRequestRef>().is_err(), "{input}");
        }
    }
}
