use crate::payloads::UserRef;

const BOT_SUFFIXES: [&str; 3] = ["-bot", "[bot]", "-robot"];

/// GitHub's own `type` wins; otherwise the login must end in a bot suffix.
pub fn is_bot(user_type: Option<&str>, login: &str) -> bool {
    if user_type == Some("Bot") {
        return true;
    }
    BOT_SUFFIXES.iter().any(|suffix| login.ends_with(suffix))
}

pub fn user_is_bot(user: &UserRef) -> bool {
    is_bot(user.user_type.as_deref(), &user.login)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suffixes_mark_bots() {
        assert!(is_bot(None, "dependabot[bot]"));
        assert!(is_bot(None, "renovate-bot"));
        assert!(is_bot(None, "k8s-ci-robot"));
        assert!(!is_bot(None, "alice"));
    }

    #[test]
    fn substring_is_not_enough() {
        assert!(!is_bot(None, "robot-user"));
        assert!(!is_bot(None, "bottle"));
        assert!(!is_bot(Some("User"), "botanist"));
    }

    #[test]
    fn suffix_match_is_case_sensitive() {
        assert!(!is_bot(None, "ci-BOT"));
        assert!(!is_bot(None, "helper[Bot]"));
    }

    #[test]
    fn type_field_wins() {
        assert!(is_bot(Some("Bot"), "github-actions"));
        assert!(is_bot(Some("Bot"), "alice"));
    }
}
