#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::{json, Value};
use timeline::{CannedEndpoint, PullRequestRef};

pub const REPO: &str = "repos/octo/widgets";
pub const HEAD_SHA: &str = "abc123";

pub fn pr_ref() -> PullRequestRef {
    PullRequestRef::new("octo", "widgets", 7)
}

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 2, 1, 10, 0, 0).unwrap()
}

pub fn at(offset_secs: i64) -> String {
    (t0() + Duration::seconds(offset_secs)).to_rfc3339()
}

pub fn pull_request_json(state: &str, merged_by: Option<&str>) -> Value {
    let merged = merged_by.is_some();
    json!({
        "number": 7,
        "title": "Add widget",
        "body": "Adds the widget.",
        "state": state,
        "draft": false,
        "merged": merged,
        "mergeable": null,
        "created_at": at(0),
        "updated_at": at(100),
        "closed_at": if state == "closed" { Value::from(at(90)) } else { Value::Null },
        "merged_at": if merged { Value::from(at(90)) } else { Value::Null },
        "user": {"login": "alice", "type": "User"},
        "author_association": "CONTRIBUTOR",
        "merged_by": merged_by.map(|login| json!({"login": login, "type": "User"})),
        "additions": 10,
        "deletions": 2,
        "changed_files": 1,
        "head": {"ref": "feature", "sha": HEAD_SHA},
        "base": {"ref": "main", "sha": "def456"}
    })
}

pub fn commit_json(login: &str, offset: i64, message: &str) -> Value {
    json!({
        "sha": format!("c{offset}"),
        "commit": {"author": {"name": login, "date": at(offset)}, "message": message},
        "author": {"login": login, "type": "User"}
    })
}

pub fn comment_json(login: &str, offset: i64, body: &str, association: &str) -> Value {
    json!({
        "user": {"login": login, "type": "User"},
        "body": body,
        "created_at": at(offset),
        "author_association": association
    })
}

pub fn path(suffix: &str) -> String {
    format!("{REPO}/{suffix}")
}

/// Pull request #7 with one commit by alice and one comment by bob; every
/// other resource is empty and the base branch is unprotected.
pub fn scenario() -> CannedEndpoint {
    CannedEndpoint::new()
        .with_page(&path("pulls/7"), &pull_request_json("open", None), None)
        .with_page(
            &path("pulls/7/commits"),
            &json!([commit_json("alice", 1, "Add widget")]),
            None,
        )
        .with_page(
            &path("issues/7/comments"),
            &json!([comment_json("bob", 2, "can you take a look?", "NONE")]),
            None,
        )
        .with_page(&path("pulls/7/reviews"), &json!([]), None)
        .with_page(&path("pulls/7/comments"), &json!([]), None)
        .with_page(&path("issues/7/timeline"), &json!([]), None)
        .with_page(&path(&format!("commits/{HEAD_SHA}/statuses")), &json!([]), None)
        .with_page(
            &path(&format!("commits/{HEAD_SHA}/check-runs")),
            &json!({"total_count": 0, "check_runs": []}),
            None,
        )
        .with_failure(
            &path("branches/main/protection/required_status_checks"),
            http::StatusCode::NOT_FOUND,
        )
}
