use std::collections::HashSet;

use normalizer::{Event, PullRequest, WriteAccess};
use tracing::debug;

/// Promotes `likely` write access to `definitely` for actors seen doing
/// something only a collaborator with push rights can do.
#[derive(Debug, Default, Clone, Copy)]
pub struct WriteAccessInferencer;

impl WriteAccessInferencer {
    pub fn new() -> Self {
        Self
    }

    pub fn confirmed_actors(&self, events: &[Event]) -> HashSet<String> {
        events
            .iter()
            .filter(|event| event.kind().requires_write_access())
            .map(|event| event.actor().to_string())
            .collect()
    }

    /// Returns the number of events promoted. Running it twice changes nothing.
    pub fn apply(&self, events: &mut [Event]) -> usize {
        let confirmed = self.confirmed_actors(events);
        let promoted = events
            .iter_mut()
            .filter(|event| confirmed.contains(event.actor()))
            .map(|event| event.promote_write_access())
            .filter(|changed| *changed)
            .count();
        if promoted > 0 {
            debug!(promoted, confirmed = confirmed.len(), "write access inferred");
        }
        promoted
    }

    /// Same rule applied to the pull request author.
    pub fn apply_to_author(&self, pull_request: &mut PullRequest, events: &[Event]) {
        if pull_request.author_write_access == WriteAccess::Likely
            && self.confirmed_actors(events).contains(&pull_request.author)
        {
            pull_request.author_write_access = WriteAccess::Definitely;
        }
    }
}
