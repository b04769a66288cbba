use std::io::{self, BufWriter, Write};
use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};
use common::config::{AppConfig, OutputFormat};
use common::{logging, AppError};
use gh_transport::{ReqwestExecutor, ResponseCache, RetryPolicy, RetryTransport};
use normalizer::{PullRequestData, QuestionMatcher};
use timeline::{
    CacheOrchestrator, CannedEndpoint, FetchOptions, FetchOrchestrator, GithubEndpoint,
    PullRequestFetcher, PullRequestRef, RemoteEndpoint,
};
use tracing::info;

const USAGE: &str = "usage: timeline <owner>/<repo>#<number> [reference-rfc3339]";

#[tokio::main]
async fn main() -> Result<()> {
    logging::init_logging("info");
    let config = AppConfig::load()?;

    let mut args = std::env::args().skip(1);
    let target: PullRequestRef = args
        .next()
        .ok_or_else(|| AppError::InvalidReference(USAGE.to_string()))?
        .parse()?;
    let reference = args.next().map(|raw| parse_reference(&raw)).transpose()?;

    let endpoint = build_endpoint(&config)?;
    let questions = Arc::new(QuestionMatcher::new()?);
    let options = FetchOptions::from_config(&config.fetch, reference);

    let fetcher: Box<dyn PullRequestFetcher> = if config.fetch.use_cache {
        let cache = ResponseCache::open(&config.cache.dir).await?;
        cache.spawn_sweeper(config.cache.sweep_interval(), config.cache.retention());
        info!(dir = %config.cache.dir.display(), "response cache enabled");
        Box::new(CacheOrchestrator::new(endpoint, cache, questions))
    } else {
        Box::new(FetchOrchestrator::new(endpoint, questions))
    };

    info!(pr = %target, "fetching pull request timeline");
    let data = fetcher.fetch(&target, &options).await?;
    write_output(&data, config.output.format)?;
    Ok(())
}

fn parse_reference(raw: &str) -> Result<DateTime<Utc>, AppError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|at| at.with_timezone(&Utc))
        .map_err(|err| AppError::InvalidReference(format!("{raw}: {err}")))
}

fn build_endpoint(config: &AppConfig) -> Result<Arc<dyn RemoteEndpoint>> {
    if let Some(fixture) = &config.github.fixture_path {
        info!(fixture = %fixture.display(), "serving canned responses");
        return Ok(Arc::new(CannedEndpoint::from_file(fixture)?));
    }
    let executor = ReqwestExecutor::new(&config.github.user_agent, config.fetch.timeout())
        .map_err(AppError::http)?;
    let transport = RetryTransport::new(
        Arc::new(executor),
        RetryPolicy::from_config(&config.retry),
    );
    let endpoint = GithubEndpoint::from_config(Arc::new(transport), &config.github)?;
    Ok(Arc::new(endpoint))
}

fn write_output(data: &PullRequestData, format: OutputFormat) -> Result<(), AppError> {
    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    match format {
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut out, data).map_err(io::Error::from)?;
            writeln!(out)?;
        }
        OutputFormat::Events => {
            for event in &data.events {
                serde_json::to_writer(&mut out, event).map_err(io::Error::from)?;
                writeln!(out)?;
            }
        }
    }
    out.flush()?;
    Ok(())
}
