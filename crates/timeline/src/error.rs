use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    /// The mandatory metadata fetch failed; nothing else was attempted.
    #[error("failed to fetch pull request: {0}")]
    PullRequest(#[source] anyhow::Error),
    #[error("every resource fetch failed, first was {resource}: {source}")]
    AllResourcesFailed {
        resource: &'static str,
        #[source]
        source: anyhow::Error,
    },
    #[error("deadline elapsed while fetching {0}")]
    Deadline(&'static str),
}
