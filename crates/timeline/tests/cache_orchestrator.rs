mod support;

use std::sync::Arc;

use anyhow::Result;
use chrono::{Duration, Utc};
use timeline::FetchError;
use gh_transport::ResponseCache;
use http::StatusCode;
use normalizer::{EventKind, QuestionMatcher};
use support::*;
use timeline::{
    CacheOrchestrator, CachingEndpoint, CannedEndpoint, FetchOptions, PullRequestFetcher,
    RemoteEndpoint,
};

fn questions() -> Arc<QuestionMatcher> {
    Arc::new(QuestionMatcher::new().unwrap())
}

#[tokio::test]
async fn second_fetch_is_served_from_cache() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let cache = ResponseCache::open(dir.path()).await?;
    let reference = Utc::now() - Duration::minutes(5);
    let options = FetchOptions::default().with_reference_time(reference);

    let first_endpoint = Arc::new(scenario());
    let first = CacheOrchestrator::new(first_endpoint.clone(), cache.clone(), questions())
        .fetch(&pr_ref(), &options)
        .await?;
    assert_eq!(first_endpoint.calls().len(), 9);

    // Network unavailable now; everything but the uncached 404 comes from disk.
    let offline = Arc::new(CannedEndpoint::new());
    let second = CacheOrchestrator::new(offline.clone(), cache, questions())
        .fetch(&pr_ref(), &options)
        .await?;

    assert_eq!(second, first);
    assert_eq!(
        offline.calls(),
        vec![path("branches/main/protection/required_status_checks")]
    );
    Ok(())
}

#[tokio::test]
async fn stale_entries_are_refetched() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let cache = ResponseCache::open(dir.path()).await?;
    let path = path("pulls/7");

    let endpoint = Arc::new(scenario());
    let early = CachingEndpoint::new(endpoint.clone(), cache.clone(), Utc::now() - Duration::hours(1));
    early.read(&path).await?;
    early.read(&path).await?;
    assert_eq!(endpoint.calls_matching(&path), 1);

    // The pull request changed after the entry was written.
    let later = CachingEndpoint::new(endpoint.clone(), cache, Utc::now() + Duration::hours(1));
    later.read(&path).await?;
    assert_eq!(endpoint.calls_matching(&path), 2);
    Ok(())
}

#[tokio::test]
async fn reference_defaults_to_pull_request_update_time() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let cache = ResponseCache::open(dir.path()).await?;
    let endpoint = Arc::new(scenario());
    let orchestrator = CacheOrchestrator::new(endpoint.clone(), cache, questions());

    orchestrator.fetch(&pr_ref(), &FetchOptions::default()).await?;
    orchestrator.fetch(&pr_ref(), &FetchOptions::default()).await?;

    // Metadata is read uncached on every fetch to learn `updated_at`, and
    // once more through the cache on the first fetch only.
    assert_eq!(endpoint.calls_matching(&path("pulls/7/")), 3);
    assert_eq!(
        endpoint
            .calls()
            .iter()
            .filter(|call| **call == path("pulls/7"))
            .count(),
        3
    );
    Ok(())
}

#[tokio::test]
async fn failed_cache_writes_still_return_data() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let root = dir.path().join("entries");
    let cache = ResponseCache::open(&root).await?;
    std::fs::remove_dir_all(&root)?;

    let endpoint = Arc::new(scenario());
    let data = CacheOrchestrator::new(endpoint, cache, questions())
        .fetch(
            &pr_ref(),
            &FetchOptions::default().with_reference_time(Utc::now()),
        )
        .await?;

    let kinds: Vec<EventKind> = data.events.iter().map(|e| e.kind()).collect();
    assert_eq!(
        kinds,
        vec![EventKind::PrOpened, EventKind::Commit, EventKind::Comment]
    );
    Ok(())
}

#[tokio::test]
async fn metadata_failure_is_fatal_through_the_cache() {
    let dir = tempfile::tempdir().unwrap();
    let cache = ResponseCache::open(dir.path()).await.unwrap();
    let endpoint = Arc::new(scenario().with_failure(&path("pulls/7"), StatusCode::BAD_GATEWAY));

    let err = CacheOrchestrator::new(endpoint.clone(), cache, questions())
        .fetch(&pr_ref(), &FetchOptions::default())
        .await
        .expect_err("metadata failure");
    assert!(matches!(err, timeline::FetchError::PullRequest(_)));
    assert_eq!(endpoint.calls().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn update_time_lookup_shares_the_caller_deadline() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let cache = ResponseCache::open(dir.path()).await?;
    let endpoint = Arc::new(
        scenario().with_delay(&path("pulls/7"), std::time::Duration::from_secs(4)),
    );
    let options = FetchOptions::default().with_timeout(std::time::Duration::from_secs(5));

    let started = tokio::time::Instant::now();
    let err = CacheOrchestrator::new(endpoint, cache, questions())
        .fetch(&pr_ref(), &options)
        .await
        .expect_err("two slow metadata reads cannot fit in five seconds");

    assert!(matches!(err, FetchError::Deadline(_)));
    assert!(started.elapsed() <= std::time::Duration::from_secs(5));
    Ok(())
}
