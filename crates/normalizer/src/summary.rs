use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::models::{Event, EventKind, WriteAccess};

/// Description given to required checks that never reported.
pub const MISSING_CHECK_DESCRIPTION: &str = "Expected — Waiting for status to be reported";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckBucket {
    Success,
    Failing,
    Pending,
    Neutral,
}

impl CheckBucket {
    /// Outcomes nobody recognises are treated as still running.
    pub fn from_outcome(outcome: &str) -> Self {
        match outcome {
            "success" => CheckBucket::Success,
            "failure" | "error" | "timed_out" | "action_required" => CheckBucket::Failing,
            "neutral" | "cancelled" | "skipped" | "stale" => CheckBucket::Neutral,
            _ => CheckBucket::Pending,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckState {
    pub name: String,
    pub outcome: String,
    pub bucket: CheckBucket,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    pub required: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckSummary {
    pub success: usize,
    pub failing: usize,
    pub pending: usize,
    pub neutral: usize,
    /// One entry per check name, in first-seen order; missing required checks last.
    pub checks: Vec<CheckState>,
}

impl CheckSummary {
    pub fn total(&self) -> usize {
        self.checks.len()
    }

    fn count(&mut self, bucket: CheckBucket) {
        match bucket {
            CheckBucket::Success => self.success += 1,
            CheckBucket::Failing => self.failing += 1,
            CheckBucket::Pending => self.pending += 1,
            CheckBucket::Neutral => self.neutral += 1,
        }
    }
}

/// Deduplicates status and check-run events by name, keeping the last one
/// in input order, then buckets each survivor.
pub fn summarize_checks(events: &[Event], required: &[String]) -> CheckSummary {
    let mut order: Vec<&str> = Vec::new();
    let mut latest: HashMap<&str, &Event> = HashMap::new();
    for event in events.iter().filter(|event| event.kind().is_check()) {
        let name = event.body();
        if latest.insert(name, event).is_none() {
            order.push(name);
        }
    }

    let mut summary = CheckSummary::default();
    for name in order {
        let Some(event) = latest.get(name) else {
            continue;
        };
        let bucket = CheckBucket::from_outcome(event.outcome());
        summary.count(bucket);
        summary.checks.push(CheckState {
            name: name.to_string(),
            outcome: event.outcome().to_string(),
            bucket,
            description: event.description().to_string(),
            required: required.iter().any(|r| r == name),
        });
    }

    for name in required {
        if summary.checks.iter().any(|check| &check.name == name) {
            continue;
        }
        summary.count(CheckBucket::Pending);
        summary.checks.push(CheckState {
            name: name.clone(),
            outcome: "expected".to_string(),
            bucket: CheckBucket::Pending,
            description: MISSING_CHECK_DESCRIPTION.to_string(),
            required: true,
        });
    }

    summary
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalSummary {
    pub approvals_with_write_access: usize,
    pub approvals_without_write_access: usize,
    pub changes_requested: usize,
}

impl ApprovalSummary {
    pub fn approvals(&self) -> usize {
        self.approvals_with_write_access + self.approvals_without_write_access
    }
}

/// Counts each reviewer's latest review (by input order). Comment-only and
/// dismissed reviews still replace earlier verdicts but are not counted.
pub fn summarize_approvals(events: &[Event]) -> ApprovalSummary {
    let mut latest: HashMap<&str, &Event> = HashMap::new();
    for event in events.iter().filter(|e| e.kind() == EventKind::Review) {
        latest.insert(event.actor(), event);
    }

    let mut summary = ApprovalSummary::default();
    for event in latest.values() {
        match event.outcome() {
            "approved" if event.write_access() == WriteAccess::Definitely => {
                summary.approvals_with_write_access += 1
            }
            "approved" => summary.approvals_without_write_access += 1,
            "changes_requested" => summary.changes_requested += 1,
            _ => {}
        }
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn check(kind: EventKind, name: &str, outcome: &str, offset: i64) -> Event {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap() + Duration::seconds(offset);
        Event::new(kind, at, "ci")
            .with_bot(true)
            .with_outcome(outcome)
            .with_body(name, false)
    }

    fn review(actor: &str, outcome: &str, access: WriteAccess) -> Event {
        Event::new(EventKind::Review, Utc::now(), actor)
            .with_outcome(outcome)
            .with_write_access(access)
    }

    #[test]
    fn missing_required_check_is_pending_once() {
        let required = vec!["ci/build".to_string()];
        let summary = summarize_checks(&[], &required);
        assert_eq!(summary.pending, 1);
        assert_eq!(summary.total(), 1);
        assert_eq!(summary.checks[0].description, MISSING_CHECK_DESCRIPTION);
        assert!(summary.checks[0].required);
    }

    #[test]
    fn last_record_per_name_wins_by_input_order() {
        let events = vec![
            check(EventKind::StatusCheck, "ci/build", "pending", 0),
            check(EventKind::CheckRun, "lint", "failure", 1),
            check(EventKind::StatusCheck, "ci/build", "success", 2),
            // Older by timestamp but later in input: still wins.
            check(EventKind::CheckRun, "lint", "success", -10),
        ];
        let summary = summarize_checks(&events, &[]);
        assert_eq!(summary.success, 2);
        assert_eq!(summary.failing, 0);
        assert_eq!(summary.checks[0].name, "ci/build");
        assert_eq!(summary.checks[1].name, "lint");
    }

    #[test]
    fn outcomes_are_bucketed() {
        let events = vec![
            check(EventKind::CheckRun, "a", "timed_out", 0),
            check(EventKind::CheckRun, "b", "action_required", 0),
            check(EventKind::CheckRun, "c", "queued", 0),
            check(EventKind::CheckRun, "d", "skipped", 0),
            check(EventKind::CheckRun, "e", "stale", 0),
            check(EventKind::StatusCheck, "f", "error", 0),
            check(EventKind::CheckRun, "g", "something_new", 0),
        ];
        let summary = summarize_checks(&events, &["a".to_string()]);
        assert_eq!(summary.failing, 3);
        assert_eq!(summary.pending, 2);
        assert_eq!(summary.neutral, 2);
        assert_eq!(summary.total(), 7);
        assert!(summary.checks[0].required);
    }

    #[test]
    fn non_check_events_are_ignored() {
        let comment = Event::new(EventKind::Comment, Utc::now(), "bob").with_body("ci/build", false);
        let summary = summarize_checks(&[comment], &[]);
        assert_eq!(summary, CheckSummary::default());
    }

    #[test]
    fn approvals_use_latest_review_per_actor() {
        let events = vec![
            review("carol", "changes_requested", WriteAccess::Definitely),
            review("carol", "approved", WriteAccess::Definitely),
            review("dave", "approved", WriteAccess::Likely),
            review("erin", "approved", WriteAccess::Unknown),
            review("erin", "commented", WriteAccess::Unknown),
            review("frank", "changes_requested", WriteAccess::Unknown),
        ];
        let summary = summarize_approvals(&events);
        assert_eq!(summary.approvals_with_write_access, 1);
        assert_eq!(summary.approvals_without_write_access, 1);
        assert_eq!(summary.changes_requested, 1);
        assert_eq!(summary.approvals(), 2);
    }
}
