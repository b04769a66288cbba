use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use tracing::trace;

use crate::bots::{is_bot, user_is_bot};
use crate::models::{Event, EventKind, PullRequest, WriteAccess};
use crate::payloads::{
    CheckRunPayload, CheckRunsEnvelope, CommentPayload, CommitPayload, PullRequestPayload,
    ReviewPayload, StatusPayload, TimelineEventPayload, UserRef,
};
use crate::questions::QuestionMatcher;

/// Login GitHub shows for deleted accounts.
pub const GHOST_LOGIN: &str = "ghost";

/// Timeline `event` strings that become events. Anything else is dropped;
/// commits, comments, reviews and merges come from other sources. `closed`
/// records only name the closer and are folded into [`closing_event`].
const TIMELINE_KINDS: &[(&str, EventKind)] = &[
    ("closed", EventKind::PrClosed),
    ("assigned", EventKind::Assigned),
    ("unassigned", EventKind::Unassigned),
    ("labeled", EventKind::Labeled),
    ("unlabeled", EventKind::Unlabeled),
    ("milestoned", EventKind::Milestoned),
    ("demilestoned", EventKind::Demilestoned),
    ("review_requested", EventKind::ReviewRequested),
    ("review_request_removed", EventKind::ReviewRequestRemoved),
    ("reopened", EventKind::PrReopened),
];

pub fn timeline_kind(event: &str) -> Option<EventKind> {
    TIMELINE_KINDS
        .iter()
        .find(|(name, _)| *name == event)
        .map(|(_, kind)| *kind)
}

fn decode_page<T: DeserializeOwned>(body: &[u8]) -> Result<Vec<T>, serde_json::Error> {
    let page: Option<Vec<T>> = serde_json::from_slice(body)?;
    Ok(page.unwrap_or_default())
}

fn actor_fields(user: Option<&UserRef>) -> (String, bool) {
    match user {
        Some(user) => (user.login.clone(), user_is_bot(user)),
        None => (GHOST_LOGIN.to_string(), false),
    }
}

fn with_text(event: Event, body: Option<&str>, questions: &QuestionMatcher) -> Event {
    let body = body.unwrap_or_default();
    let question = questions.is_question(body);
    event.with_body(body, question)
}

pub fn normalize_pull_request(payload: &PullRequestPayload) -> PullRequest {
    let (author, author_bot) = actor_fields(payload.user.as_ref());
    PullRequest {
        number: payload.number,
        title: payload.title.clone(),
        body: payload.body.clone().unwrap_or_default(),
        state: payload.state.clone(),
        draft: payload.draft,
        merged: payload.merged || payload.merged_at.is_some(),
        mergeable: payload.mergeable,
        created_at: payload.created_at,
        updated_at: payload.updated_at,
        closed_at: payload.closed_at,
        merged_at: payload.merged_at,
        author,
        author_bot,
        author_association: payload.author_association.clone().unwrap_or_default(),
        author_write_access: WriteAccess::from_association(payload.author_association.as_deref()),
        merged_by: payload.merged_by.as_ref().map(|user| user.login.clone()),
        additions: payload.additions,
        deletions: payload.deletions,
        changed_files: payload.changed_files,
        head_sha: payload.head.sha.clone(),
        base_ref: payload.base.ref_name.clone(),
        check_summary: None,
        approval_summary: None,
    }
}

/// The always-present `pr_opened` event.
pub fn opened_event(pr: &PullRequest, questions: &QuestionMatcher) -> Event {
    let event = Event::new(EventKind::PrOpened, pr.created_at, pr.author.clone())
        .with_bot(pr.author_bot)
        .with_write_access(pr.author_write_access);
    with_text(event, Some(&pr.body), questions)
}

/// `pr_merged` beats `pr_closed`; open pull requests get nothing.
///
/// Removes the timeline `pr_closed` records from `fetched`. The latest of them
/// names who closed an unmerged pull request; without one the actor is
/// [`GHOST_LOGIN`].
pub fn closing_event(pr: &PullRequest, fetched: &mut Vec<Event>) -> Option<Event> {
    let mut closer: Option<Event> = None;
    fetched.retain(|event| {
        if event.kind() != EventKind::PrClosed {
            return true;
        }
        if closer
            .as_ref()
            .map_or(true, |latest| event.timestamp() >= latest.timestamp())
        {
            closer = Some(event.clone());
        }
        false
    });

    if pr.merged {
        let at = pr.merged_at.or(pr.closed_at).unwrap_or(pr.updated_at);
        let actor = pr.merged_by.clone().unwrap_or_else(|| GHOST_LOGIN.to_string());
        let bot = is_bot(None, &actor);
        return Some(
            Event::new(EventKind::PrMerged, at, actor)
                .with_bot(bot)
                .with_write_access(WriteAccess::Definitely),
        );
    }
    if pr.is_closed() {
        let at = pr.closed_at.unwrap_or(pr.updated_at);
        let event = match closer {
            Some(record) => Event::new(EventKind::PrClosed, at, record.actor())
                .with_bot(record.bot())
                .with_write_access(record.write_access()),
            None => Event::new(EventKind::PrClosed, at, GHOST_LOGIN),
        };
        return Some(event);
    }
    None
}

pub fn normalize_commit(payload: &CommitPayload, questions: &QuestionMatcher) -> Event {
    let (actor, bot) = match payload.author.as_ref() {
        Some(user) => (user.login.clone(), user_is_bot(user)),
        None => {
            let name = payload
                .commit
                .author
                .name
                .clone()
                .unwrap_or_else(|| GHOST_LOGIN.to_string());
            let bot = is_bot(None, &name);
            (name, bot)
        }
    };
    trace!(sha = %payload.sha, "normalizing commit");
    let event = Event::new(EventKind::Commit, payload.commit.author.date, actor).with_bot(bot);
    with_text(event, Some(&payload.commit.message), questions)
}

pub fn normalize_comment(
    payload: &CommentPayload,
    kind: EventKind,
    questions: &QuestionMatcher,
) -> Event {
    let (actor, bot) = actor_fields(payload.user.as_ref());
    let event = Event::new(kind, payload.created_at, actor)
        .with_bot(bot)
        .with_write_access(WriteAccess::from_association(
            payload.author_association.as_deref(),
        ));
    with_text(event, payload.body.as_deref(), questions)
}

/// Pending reviews have no submission time and produce nothing.
pub fn normalize_review(payload: &ReviewPayload, questions: &QuestionMatcher) -> Option<Event> {
    let submitted_at = payload.submitted_at?;
    let (actor, bot) = actor_fields(payload.user.as_ref());
    let event = Event::new(EventKind::Review, submitted_at, actor)
        .with_bot(bot)
        .with_outcome(payload.state.to_ascii_lowercase())
        .with_write_access(WriteAccess::from_association(
            payload.author_association.as_deref(),
        ));
    Some(with_text(event, payload.body.as_deref(), questions))
}

pub fn normalize_timeline_event(payload: &TimelineEventPayload) -> Option<Event> {
    let kind = timeline_kind(payload.event.as_deref()?)?;
    let created_at = payload.created_at?;
    let (actor, bot) = actor_fields(payload.actor.as_ref());

    let targets: Vec<String> = match kind {
        EventKind::Assigned | EventKind::Unassigned => payload
            .assignee
            .iter()
            .map(|user| user.login.clone())
            .collect(),
        EventKind::Labeled | EventKind::Unlabeled => {
            payload.label.iter().map(|label| label.name.clone()).collect()
        }
        EventKind::Milestoned | EventKind::Demilestoned => payload
            .milestone
            .iter()
            .map(|milestone| milestone.title.clone())
            .collect(),
        EventKind::ReviewRequested | EventKind::ReviewRequestRemoved => {
            match (&payload.requested_reviewer, &payload.requested_team) {
                (Some(reviewer), _) => vec![reviewer.login.clone()],
                (None, Some(team)) => vec![team.name.clone()],
                (None, None) => Vec::new(),
            }
        }
        _ => Vec::new(),
    };

    let write_access = if kind.requires_write_access() {
        WriteAccess::Definitely
    } else {
        WriteAccess::Unknown
    };

    Some(
        Event::new(kind, created_at, actor)
            .with_bot(bot)
            .with_targets(targets)
            .with_write_access(write_access),
    )
}

pub fn normalize_status(payload: &StatusPayload, questions: &QuestionMatcher) -> Event {
    let (actor, bot) = actor_fields(payload.creator.as_ref());
    let event = Event::new(EventKind::StatusCheck, payload.created_at, actor)
        .with_bot(bot)
        .with_outcome(payload.state.clone())
        .with_description(payload.description.clone().unwrap_or_default());
    with_text(event, Some(&payload.context), questions)
}

/// Runs that neither started nor completed have no place on the timeline.
pub fn normalize_check_run(payload: &CheckRunPayload, questions: &QuestionMatcher) -> Option<Event> {
    let at: DateTime<Utc> = payload.completed_at.or(payload.started_at)?;
    let actor = payload
        .app
        .as_ref()
        .and_then(|app| app.slug.clone().or_else(|| app.name.clone()))
        .unwrap_or_else(|| GHOST_LOGIN.to_string());
    let outcome = match (&payload.conclusion, payload.status.as_str()) {
        (Some(conclusion), "completed") => conclusion.clone(),
        _ => payload.status.clone(),
    };
    let description = payload
        .output
        .as_ref()
        .and_then(|output| {
            output
                .title
                .clone()
                .filter(|title| !title.is_empty())
                .or_else(|| output.summary.clone())
        })
        .unwrap_or_default();

    // Check runs are always produced by GitHub Apps.
    let event = Event::new(EventKind::CheckRun, at, actor)
        .with_bot(true)
        .with_outcome(outcome)
        .with_description(description);
    Some(with_text(event, Some(&payload.name), questions))
}

pub fn normalize_commits(
    body: &[u8],
    questions: &QuestionMatcher,
) -> Result<Vec<Event>, serde_json::Error> {
    let page: Vec<CommitPayload> = decode_page(body)?;
    Ok(page
        .iter()
        .map(|commit| normalize_commit(commit, questions))
        .collect())
}

pub fn normalize_comments(
    body: &[u8],
    questions: &QuestionMatcher,
) -> Result<Vec<Event>, serde_json::Error> {
    let page: Vec<CommentPayload> = decode_page(body)?;
    Ok(page
        .iter()
        .map(|comment| normalize_comment(comment, EventKind::Comment, questions))
        .collect())
}

pub fn normalize_review_comments(
    body: &[u8],
    questions: &QuestionMatcher,
) -> Result<Vec<Event>, serde_json::Error> {
    let page: Vec<CommentPayload> = decode_page(body)?;
    Ok(page
        .iter()
        .map(|comment| normalize_comment(comment, EventKind::ReviewComment, questions))
        .collect())
}

pub fn normalize_reviews(
    body: &[u8],
    questions: &QuestionMatcher,
) -> Result<Vec<Event>, serde_json::Error> {
    let page: Vec<ReviewPayload> = decode_page(body)?;
    Ok(page
        .iter()
        .filter_map(|review| normalize_review(review, questions))
        .collect())
}

pub fn normalize_timeline(body: &[u8]) -> Result<Vec<Event>, serde_json::Error> {
    let page: Vec<TimelineEventPayload> = decode_page(body)?;
    Ok(page.iter().filter_map(normalize_timeline_event).collect())
}

pub fn normalize_statuses(
    body: &[u8],
    questions: &QuestionMatcher,
) -> Result<Vec<Event>, serde_json::Error> {
    let page: Vec<StatusPayload> = decode_page(body)?;
    Ok(page
        .iter()
        .map(|status| normalize_status(status, questions))
        .collect())
}

pub fn normalize_check_runs(
    body: &[u8],
    questions: &QuestionMatcher,
) -> Result<Vec<Event>, serde_json::Error> {
    let envelope: CheckRunsEnvelope = serde_json::from_slice(body)?;
    Ok(envelope
        .check_runs
        .iter()
        .filter_map(|run| normalize_check_run(run, questions))
        .collect())
}
