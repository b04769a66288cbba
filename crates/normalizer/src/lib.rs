pub mod bots;
pub mod models;
pub mod payloads;
pub mod questions;
pub mod summary;
pub mod transform;

pub use bots::is_bot;
pub use models::{Event, EventKind, PullRequest, PullRequestData, WriteAccess};
pub use questions::QuestionMatcher;
pub use summary::{
    summarize_approvals, summarize_checks, ApprovalSummary, CheckBucket, CheckState, CheckSummary,
    MISSING_CHECK_DESCRIPTION,
};
pub use transform::{
    closing_event, normalize_check_runs, normalize_comments, normalize_commits,
    normalize_pull_request, normalize_review_comments, normalize_reviews, normalize_statuses,
    normalize_timeline, opened_event,
};
