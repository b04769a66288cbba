use regex::{Regex, RegexBuilder};

/// Phrases that read as a request for input. Matched case-insensitively on word boundaries.
const QUESTION_PHRASES: &[&str] = &[
    "can you",
    "could you",
    "would you",
    "will you",
    "can someone",
    "could someone",
    "can anyone",
    "does anyone",
    "anyone know",
    "should i",
    "should we",
    "do you",
    "do we",
    "is there",
    "are there",
    "is it possible",
    "any thoughts",
    "any ideas",
    "any idea",
    "thoughts on",
    "what do you think",
    "wdyt",
    "how do",
    "how can",
    "how should",
    "not sure",
    "wondering",
    "please advise",
    "ptal",
];

/// Fewer characters than this can never be a question without a literal `?`.
const MIN_QUESTION_LEN: usize = 3;

/// Compiled question phrase table. Build once and share by reference.
#[derive(Debug, Clone)]
pub struct QuestionMatcher {
    patterns: Vec<Regex>,
}

impl QuestionMatcher {
    pub fn new() -> Result<Self, regex::Error> {
        Self::with_phrases(QUESTION_PHRASES)
    }

    pub fn with_phrases(phrases: &[&str]) -> Result<Self, regex::Error> {
        let patterns = phrases
            .iter()
            .map(|phrase| {
                RegexBuilder::new(&format!(r"\b{}\b", regex::escape(phrase)))
                    .case_insensitive(true)
                    .build()
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    pub fn is_question(&self, text: &str) -> bool {
        if text.contains('?') {
            return true;
        }
        if text.chars().count() < MIN_QUESTION_LEN {
            return false;
        }
        self.patterns.iter().any(|pattern| pattern.is_match(text))
    }
}
