use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use normalizer::payloads::{PullRequestPayload, RequiredStatusChecksPayload};
use normalizer::{
    closing_event, normalize_pull_request, opened_event, summarize_approvals, summarize_checks,
    Event, PullRequestData, QuestionMatcher,
};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinSet;
use tokio::time::{sleep_until, timeout_at};
use tracing::{debug, info, instrument, warn};

use crate::client::RemoteEndpoint;
use crate::error::FetchError;
use crate::fetcher::{FetchOptions, PullRequestFetcher, PullRequestRef};
use crate::inference::WriteAccessInferencer;
use crate::metrics;
use crate::resources::Resource;

enum TaskMessage {
    Page {
        resource: Resource,
        events: Vec<Event>,
    },
    Failed {
        resource: Resource,
        error: anyhow::Error,
    },
    Done(Resource),
    RequiredChecks(Vec<String>),
}

/// Everything the collecting routine gathered from the resource tasks.
#[derive(Default)]
struct Collected {
    events: Vec<Event>,
    failures: Vec<(Resource, anyhow::Error)>,
    settled: HashSet<Resource>,
    required_checks: Vec<String>,
}

impl Collected {
    fn absorb(&mut self, message: TaskMessage) {
        match message {
            TaskMessage::Page { events, .. } => self.events.extend(events),
            TaskMessage::Failed { resource, error } => {
                warn!(resource = %resource, error = %format!("{error:#}"), "resource fetch failed");
                self.settled.insert(resource);
                self.failures.push((resource, error));
            }
            TaskMessage::Done(resource) => {
                self.settled.insert(resource);
            }
            TaskMessage::RequiredChecks(names) => self.required_checks = names,
        }
    }
}

/// Fetches a pull request and its seven resources straight from the endpoint.
pub struct FetchOrchestrator {
    endpoint: Arc<dyn RemoteEndpoint>,
    questions: Arc<QuestionMatcher>,
    inferencer: WriteAccessInferencer,
}

impl FetchOrchestrator {
    pub fn new(endpoint: Arc<dyn RemoteEndpoint>, questions: Arc<QuestionMatcher>) -> Self {
        Self {
            endpoint,
            questions,
            inferencer: WriteAccessInferencer::new(),
        }
    }

    async fn fetch_pull_request(&self, pr: &PullRequestRef) -> Result<PullRequestPayload> {
        let path = pr.pull_request_path();
        let page = self.endpoint.read(&path).await?;
        let payload = serde_json::from_slice(&page.body)
            .with_context(|| format!("decoding pull request {pr}"))?;
        Ok(payload)
    }

    fn spawn_tasks(
        &self,
        tasks: &mut JoinSet<()>,
        pr: &PullRequestRef,
        payload: &PullRequestPayload,
        options: &FetchOptions,
        tx: &UnboundedSender<TaskMessage>,
    ) {
        for resource in Resource::ALL {
            let path = resource.path(pr, &payload.head.sha, options.per_page);
            tasks.spawn(run_resource(
                resource,
                path,
                self.endpoint.clone(),
                self.questions.clone(),
                tx.clone(),
            ));
        }
        tasks.spawn(run_required_checks(
            pr.required_checks_path(&payload.base.ref_name),
            self.endpoint.clone(),
            tx.clone(),
        ));
    }
}

async fn run_resource(
    resource: Resource,
    first_page: String,
    endpoint: Arc<dyn RemoteEndpoint>,
    questions: Arc<QuestionMatcher>,
    tx: UnboundedSender<TaskMessage>,
) {
    let start = Instant::now();
    let mut next = Some(first_page);
    let mut items = 0usize;

    while let Some(path) = next.take() {
        let result = async {
            let page = endpoint
                .read(&path)
                .await
                .with_context(|| format!("fetching {resource} page {path}"))?;
            let events = resource
                .normalize(&page.body, &questions)
                .with_context(|| format!("decoding {resource} page {path}"))?;
            Ok::<_, anyhow::Error>((events, page.next))
        }
        .await;

        match result {
            Ok((events, following)) => {
                items += events.len();
                if tx.send(TaskMessage::Page { resource, events }).is_err() {
                    return;
                }
                // A page pointing at itself would never terminate.
                next = following.filter(|candidate| *candidate != path);
            }
            Err(error) => {
                metrics::record_fetch(resource.label(), "error", start.elapsed().as_secs_f64());
                let _ = tx.send(TaskMessage::Failed { resource, error });
                return;
            }
        }
    }

    metrics::record_fetch(resource.label(), "success", start.elapsed().as_secs_f64());
    metrics::record_items(resource.label(), items);
    debug!(resource = %resource, items, "resource fetch complete");
    let _ = tx.send(TaskMessage::Done(resource));
}

/// Branch protection is optional and often forbidden to the token; any failure means "none".
async fn run_required_checks(
    path: String,
    endpoint: Arc<dyn RemoteEndpoint>,
    tx: UnboundedSender<TaskMessage>,
) {
    let names = match endpoint.read(&path).await {
        Ok(page) => match serde_json::from_slice::<RequiredStatusChecksPayload>(&page.body) {
            Ok(payload) => payload.names(),
            Err(err) => {
                debug!(path = %path, error = %err, "undecodable required status checks");
                Vec::new()
            }
        },
        Err(err) => {
            debug!(path = %path, error = %format!("{err:#}"), "no required status checks");
            Vec::new()
        }
    };
    let _ = tx.send(TaskMessage::RequiredChecks(names));
}

async fn collect(
    mut rx: UnboundedReceiver<TaskMessage>,
    tasks: &mut JoinSet<()>,
    deadline: tokio::time::Instant,
) -> Collected {
    let mut collected = Collected::default();
    let expiry = sleep_until(deadline);
    tokio::pin!(expiry);

    loop {
        tokio::select! {
            message = rx.recv() => match message {
                Some(message) => collected.absorb(message),
                None => break,
            },
            _ = &mut expiry => {
                warn!(
                    pending = Resource::ALL.len() - collected.settled.len(),
                    "deadline elapsed, aborting outstanding resource fetches"
                );
                tasks.shutdown().await;
                while let Ok(message) = rx.try_recv() {
                    collected.absorb(message);
                }
                for resource in Resource::ALL {
                    if !collected.settled.contains(&resource) {
                        collected.absorb(TaskMessage::Failed {
                            resource,
                            error: FetchError::Deadline(resource.label()).into(),
                        });
                    }
                }
                break;
            }
        }
    }

    tasks.shutdown().await;
    collected
}

#[async_trait]
impl PullRequestFetcher for FetchOrchestrator {
    #[instrument(skip(self, pr, options), fields(pr = %pr))]
    async fn fetch(
        &self,
        pr: &PullRequestRef,
        options: &FetchOptions,
    ) -> Result<PullRequestData, FetchError> {
        let deadline = options.deadline();
        let started = Instant::now();

        let payload = match timeout_at(deadline, self.fetch_pull_request(pr)).await {
            Ok(Ok(payload)) => payload,
            Ok(Err(err)) => {
                metrics::record_fetch("pull_request", "error", started.elapsed().as_secs_f64());
                return Err(FetchError::PullRequest(err));
            }
            Err(_) => return Err(FetchError::Deadline("pull request metadata")),
        };
        metrics::record_fetch("pull_request", "success", started.elapsed().as_secs_f64());

        let mut pull_request = normalize_pull_request(&payload);
        let opened = opened_event(&pull_request, &self.questions);

        let (tx, rx) = mpsc::unbounded_channel();
        let mut tasks = JoinSet::new();
        self.spawn_tasks(&mut tasks, pr, &payload, options, &tx);
        drop(tx);
        let mut collected = collect(rx, &mut tasks, deadline).await;
        let closing = closing_event(&pull_request, &mut collected.events);

        let fetched = collected.events.len();
        if collected.failures.len() == Resource::ALL.len() && fetched == 0 {
            let mut failures = collected.failures.into_iter();
            return Err(match failures.next() {
                Some((resource, source)) => FetchError::AllResourcesFailed {
                    resource: resource.label(),
                    source,
                },
                None => FetchError::PullRequest(anyhow!("no resource fetches were run")),
            });
        }

        let mut events = Vec::with_capacity(fetched + 2);
        events.push(opened);
        events.extend(collected.events);
        events.extend(closing);
        events.sort_by_key(Event::timestamp);

        self.inferencer.apply(&mut events);
        self.inferencer.apply_to_author(&mut pull_request, &events);
        pull_request.check_summary = Some(summarize_checks(&events, &collected.required_checks));
        pull_request.approval_summary = Some(summarize_approvals(&events));

        info!(
            events = events.len(),
            failed_resources = collected.failures.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "pull request timeline assembled"
        );
        Ok(PullRequestData {
            pull_request,
            events,
        })
    }
}
