use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::summary::{ApprovalSummary, CheckSummary};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Commit,
    Comment,
    Review,
    ReviewComment,
    StatusCheck,
    CheckRun,
    CheckSuite,
    PrOpened,
    PrClosed,
    PrMerged,
    PrReopened,
    Assigned,
    Unassigned,
    Labeled,
    Unlabeled,
    Milestoned,
    Demilestoned,
    ReviewRequested,
    ReviewRequestRemoved,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Commit => "commit",
            EventKind::Comment => "comment",
            EventKind::Review => "review",
            EventKind::ReviewComment => "review_comment",
            EventKind::StatusCheck => "status_check",
            EventKind::CheckRun => "check_run",
            EventKind::CheckSuite => "check_suite",
            EventKind::PrOpened => "pr_opened",
            EventKind::PrClosed => "pr_closed",
            EventKind::PrMerged => "pr_merged",
            EventKind::PrReopened => "pr_reopened",
            EventKind::Assigned => "assigned",
            EventKind::Unassigned => "unassigned",
            EventKind::Labeled => "labeled",
            EventKind::Unlabeled => "unlabeled",
            EventKind::Milestoned => "milestoned",
            EventKind::Demilestoned => "demilestoned",
            EventKind::ReviewRequested => "review_requested",
            EventKind::ReviewRequestRemoved => "review_request_removed",
        }
    }

    /// Only collaborators with push access can perform these.
    pub fn requires_write_access(&self) -> bool {
        matches!(
            self,
            EventKind::PrMerged
                | EventKind::Labeled
                | EventKind::Unlabeled
                | EventKind::Assigned
                | EventKind::Unassigned
                | EventKind::Milestoned
                | EventKind::Demilestoned
        )
    }

    pub fn is_targeted(&self) -> bool {
        matches!(
            self,
            EventKind::Assigned
                | EventKind::Unassigned
                | EventKind::Labeled
                | EventKind::Unlabeled
                | EventKind::Milestoned
                | EventKind::Demilestoned
                | EventKind::ReviewRequested
                | EventKind::ReviewRequestRemoved
        )
    }

    pub fn is_check(&self) -> bool {
        matches!(self, EventKind::StatusCheck | EventKind::CheckRun)
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Confidence that an actor can push to the repository. Ordered low to high.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum WriteAccess {
    #[default]
    Unknown,
    Likely,
    Definitely,
}

impl WriteAccess {
    /// Heuristic from GitHub's `author_association`.
    pub fn from_association(association: Option<&str>) -> Self {
        match association {
            Some("OWNER") | Some("MEMBER") | Some("COLLABORATOR") => WriteAccess::Likely,
            _ => WriteAccess::Unknown,
        }
    }
}

/// One occurrence in a pull request's history.
///
/// Everything except the write-access level is fixed at construction. The
/// write-access level can only be promoted from `likely` to `definitely`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    kind: EventKind,
    timestamp: DateTime<Utc>,
    actor: String,
    bot: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    outcome: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    body: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    targets: Vec<String>,
    #[serde(default)]
    question: bool,
    #[serde(default)]
    write_access: WriteAccess,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    description: String,
}

impl Event {
    pub fn new(kind: EventKind, timestamp: DateTime<Utc>, actor: impl Into<String>) -> Self {
        Self {
            kind,
            timestamp,
            actor: actor.into(),
            bot: false,
            outcome: String::new(),
            body: String::new(),
            targets: Vec::new(),
            question: false,
            write_access: WriteAccess::Unknown,
            description: String::new(),
        }
    }

    pub fn with_bot(mut self, bot: bool) -> Self {
        self.bot = bot;
        self
    }

    pub fn with_outcome(mut self, outcome: impl Into<String>) -> Self {
        self.outcome = outcome.into();
        self
    }

    /// Sets the body; `question` is derived by the caller and only kept for non-empty bodies.
    pub fn with_body(mut self, body: impl Into<String>, question: bool) -> Self {
        self.body = body.into();
        self.question = question && !self.body.is_empty();
        self
    }

    /// Ignored for kinds that carry no targets.
    pub fn with_targets(mut self, targets: Vec<String>) -> Self {
        if self.kind.is_targeted() {
            self.targets = targets;
        }
        self
    }

    pub fn with_write_access(mut self, write_access: WriteAccess) -> Self {
        self.write_access = write_access;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn kind(&self) -> EventKind {
        self.kind
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn actor(&self) -> &str {
        &self.actor
    }

    pub fn bot(&self) -> bool {
        self.bot
    }

    pub fn outcome(&self) -> &str {
        &self.outcome
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn targets(&self) -> &[String] {
        &self.targets
    }

    pub fn question(&self) -> bool {
        self.question
    }

    pub fn write_access(&self) -> WriteAccess {
        self.write_access
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Upgrades `likely` to `definitely`. Returns whether anything changed.
    pub fn promote_write_access(&mut self) -> bool {
        if self.write_access == WriteAccess::Likely {
            self.write_access = WriteAccess::Definitely;
            true
        } else {
            false
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PullRequest {
    pub number: u64,
    pub title: String,
    pub body: String,
    pub state: String,
    pub draft: bool,
    pub merged: bool,
    /// `None` while GitHub is still computing mergeability.
    pub mergeable: Option<bool>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    pub merged_at: Option<DateTime<Utc>>,
    pub author: String,
    pub author_bot: bool,
    pub author_association: String,
    pub author_write_access: WriteAccess,
    pub merged_by: Option<String>,
    pub additions: u64,
    pub deletions: u64,
    pub changed_files: u64,
    pub head_sha: String,
    pub base_ref: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check_summary: Option<CheckSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approval_summary: Option<ApprovalSummary>,
}

impl PullRequest {
    pub fn is_closed(&self) -> bool {
        self.state.eq_ignore_ascii_case("closed")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PullRequestData {
    pub pull_request: PullRequest,
    pub events: Vec<Event>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(write_access: WriteAccess) -> Event {
        Event::new(EventKind::Comment, Utc::now(), "alice").with_write_access(write_access)
    }

    #[test]
    fn promotion_only_moves_likely_up() {
        let mut likely = sample(WriteAccess::Likely);
        assert!(likely.promote_write_access());
        assert_eq!(likely.write_access(), WriteAccess::Definitely);
        assert!(!likely.promote_write_access());
        assert_eq!(likely.write_access(), WriteAccess::Definitely);

        let mut unknown = sample(WriteAccess::Unknown);
        assert!(!unknown.promote_write_access());
        assert_eq!(unknown.write_access(), WriteAccess::Unknown);
    }

    #[test]
    fn targets_only_stick_to_targeted_kinds() {
        let ts = Utc::now();
        let labeled = Event::new(EventKind::Labeled, ts, "bob").with_targets(vec!["bug".into()]);
        let comment = Event::new(EventKind::Comment, ts, "bob").with_targets(vec!["bug".into()]);
        assert_eq!(labeled.targets(), ["bug".to_string()]);
        assert!(comment.targets().is_empty());
    }

    #[test]
    fn question_requires_body() {
        let event = Event::new(EventKind::Comment, Utc::now(), "bob").with_body("", true);
        assert!(!event.question());
    }

    #[test]
    fn association_heuristic() {
        assert_eq!(WriteAccess::from_association(Some("OWNER")), WriteAccess::Likely);
        assert_eq!(WriteAccess::from_association(Some("CONTRIBUTOR")), WriteAccess::Unknown);
        assert_eq!(WriteAccess::from_association(None), WriteAccess::Unknown);
        assert!(WriteAccess::Definitely > WriteAccess::Likely);
    }

    #[test]
    fn kinds_serialize_snake_case() {
        let json = serde_json::to_string(&EventKind::ReviewRequestRemoved).unwrap();
        assert_eq!(json, "\"review_request_removed\"");
        assert_eq!(EventKind::PrOpened.to_string(), "pr_opened");
    }
}
