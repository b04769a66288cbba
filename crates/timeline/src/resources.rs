use normalizer::{
    normalize_check_runs, normalize_comments, normalize_commits, normalize_review_comments,
    normalize_reviews, normalize_statuses, normalize_timeline, Event, QuestionMatcher,
};

use crate::fetcher::PullRequestRef;

/// The fixed set of resources fetched for every pull request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    Commits,
    IssueComments,
    Reviews,
    ReviewComments,
    Timeline,
    Statuses,
    CheckRuns,
}

impl Resource {
    pub const ALL: [Resource; 7] = [
        Resource::Commits,
        Resource::IssueComments,
        Resource::Reviews,
        Resource::ReviewComments,
        Resource::Timeline,
        Resource::Statuses,
        Resource::CheckRuns,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Resource::Commits => "commits",
            Resource::IssueComments => "issue_comments",
            Resource::Reviews => "reviews",
            Resource::ReviewComments => "review_comments",
            Resource::Timeline => "timeline",
            Resource::Statuses => "statuses",
            Resource::CheckRuns => "check_runs",
        }
    }

    /// First page path; statuses and check runs are keyed by the head commit.
    pub fn path(&self, pr: &PullRequestRef, head_sha: &str, per_page: u32) -> String {
        let repo = pr.repo_path();
        let number = pr.number;
        let suffix = match self {
            Resource::Commits => format!("pulls/{number}/commits"),
            Resource::IssueComments => format!("issues/{number}/comments"),
            Resource::Reviews => format!("pulls/{number}/reviews"),
            Resource::ReviewComments => format!("pulls/{number}/comments"),
            Resource::Timeline => format!("issues/{number}/timeline"),
            Resource::Statuses => format!("commits/{head_sha}/statuses"),
            Resource::CheckRuns => format!("commits/{head_sha}/check-runs"),
        };
        format!("{repo}/{suffix}?per_page={per_page}")
    }

    pub fn normalize(
        &self,
        body: &[u8],
        questions: &QuestionMatcher,
    ) -> Result<Vec<Event>, serde_json::Error> {
        match self {
            Resource::Commits => normalize_commits(body, questions),
            Resource::IssueComments => normalize_comments(body, questions),
            Resource::Reviews => normalize_reviews(body, questions),
            Resource::ReviewComments => normalize_review_comments(body, questions),
            Resource::Timeline => normalize_timeline(body),
            Resource::Statuses => normalize_statuses(body, questions),
            Resource::CheckRuns => normalize_check_runs(body, questions),
        }
    }
}

impl std::fmt::Display for Resource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_are_scoped_to_the_pull_request() {
        let pr: PullRequestRef = "octo/widgets#42".parse().unwrap();
        assert_eq!(
            Resource::Commits.path(&pr, "abc", 100),
            "repos/octo/widgets/pulls/42/commits?per_page=100"
        );
        assert_eq!(
            Resource::Timeline.path(&pr, "abc", 50),
            "repos/octo/widgets/issues/42/timeline?per_page=50"
        );
        assert_eq!(
            Resource::CheckRuns.path(&pr, "abc", 100),
            "repos/octo/widgets/commits/abc/check-runs?per_page=100"
        );
    }

    #[test]
    fn labels_are_unique() {
        let mut labels: Vec<&str> = Resource::ALL.iter().map(Resource::label).collect();
        labels.sort_unstable();
        labels.dedup();
        assert_eq!(labels.len(), Resource::ALL.len());
    }
}
