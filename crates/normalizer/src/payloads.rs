//! Raw GitHub REST shapes, trimmed to the fields the normalizer reads.

use chrono::{DateTime, Utc};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct UserRef {
    pub login: String,
    #[serde(rename = "type", default)]
    pub user_type: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BranchRef {
    #[serde(rename = "ref")]
    pub ref_name: String,
    pub sha: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PullRequestPayload {
    pub number: u64,
    pub title: String,
    pub body: Option<String>,
    pub state: String,
    #[serde(default)]
    pub draft: bool,
    #[serde(default)]
    pub merged: bool,
    pub mergeable: Option<bool>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    pub merged_at: Option<DateTime<Utc>>,
    pub user: Option<UserRef>,
    pub author_association: Option<String>,
    pub merged_by: Option<UserRef>,
    #[serde(default)]
    pub additions: u64,
    #[serde(default)]
    pub deletions: u64,
    #[serde(default)]
    pub changed_files: u64,
    pub head: BranchRef,
    pub base: BranchRef,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitSignature {
    pub name: Option<String>,
    pub date: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitCommit {
    pub author: GitSignature,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommitPayload {
    pub sha: String,
    pub commit: GitCommit,
    pub author: Option<UserRef>,
}

/// Issue comments and inline review comments share this shape.
#[derive(Debug, Clone, Deserialize)]
pub struct CommentPayload {
    pub user: Option<UserRef>,
    pub body: Option<String>,
    pub created_at: DateTime<Utc>,
    pub author_association: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReviewPayload {
    pub user: Option<UserRef>,
    pub body: Option<String>,
    pub state: String,
    /// Absent for reviews that are still pending.
    pub submitted_at: Option<DateTime<Utc>>,
    pub author_association: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NamedRef {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MilestoneRef {
    pub title: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TimelineEventPayload {
    /// Missing on a few timeline item types (e.g. line-commented).
    pub event: Option<String>,
    pub actor: Option<UserRef>,
    pub created_at: Option<DateTime<Utc>>,
    pub assignee: Option<UserRef>,
    pub label: Option<NamedRef>,
    pub milestone: Option<MilestoneRef>,
    pub requested_reviewer: Option<UserRef>,
    pub requested_team: Option<NamedRef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatusPayload {
    pub state: String,
    pub context: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub creator: Option<UserRef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppRef {
    pub slug: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CheckOutput {
    pub title: Option<String>,
    pub summary: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CheckRunPayload {
    pub name: String,
    pub status: String,
    pub conclusion: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub output: Option<CheckOutput>,
    pub app: Option<AppRef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CheckRunsEnvelope {
    #[serde(default)]
    pub total_count: u64,
    #[serde(default)]
    pub check_runs: Vec<CheckRunPayload>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RequiredStatusChecksPayload {
    #[serde(default)]
    pub contexts: Vec<String>,
    #[serde(default)]
    pub checks: Vec<RequiredCheck>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RequiredCheck {
    pub context: String,
}

impl RequiredStatusChecksPayload {
    /// Union of legacy `contexts` and `checks[].context`, in first-seen order.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        let all = self
            .contexts
            .iter()
            .chain(self.checks.iter().map(|check| &check.context));
        for name in all {
            if !names.contains(name) {
                names.push(name.clone());
            }
        }
        names
    }
}
