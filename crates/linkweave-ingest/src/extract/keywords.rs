//! Heuristic keyword extraction: content words, identifier-style terms, and
//! quoted phrases, in order of first appearance.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;

use super::stopwords::{all_stopwords, is_stopword};
use super::EntityExtractor;
use linkweave_core::Result;
use linkweave_store::normalize_entity;

/// Word-like tokens. `_` keeps snake_case identifiers whole; camelCase
/// identifiers are already a single run of letters.
static WORD_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[\p{L}\p{N}_][\p{L}\p{N}_+#-]*").expect("valid word regex")
});

static QUOTED_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"["“]([^"“”\n]{2,40})["”]"#).expect("valid quote regex")
});

const MIN_WORD_LEN: usize = 2;

pub struct KeywordExtractor {
    max_entities: usize,
}

impl KeywordExtractor {
    pub fn new(max_entities: usize) -> Self {
        Self {
            max_entities: max_entities.max(1),
        }
    }

    fn keep(candidate: &str) -> bool {
        if candidate.contains(' ') {
            !all_stopwords(candidate)
        } else {
            candidate.chars().count() >= MIN_WORD_LEN && !is_stopword(candidate)
        }
    }
}

impl Default for KeywordExtractor {
    fn default() -> Self {
        Self::new(32)
    }
}

impl EntityExtractor for KeywordExtractor {
    fn extract(&self, text: &str) -> Result<Vec<String>> {
        let mut spans: Vec<(usize, &str)> = QUOTED_RE
            .captures_iter(text)
            .filter_map(|cap| cap.get(1))
            .filter(|m| m.as_str().trim().contains(char::is_whitespace))
            .map(|m| (m.start(), m.as_str()))
            .collect();
        spans.extend(WORD_RE.find_iter(text).map(|m| (m.start(), m.as_str())));
        // Stable: a quoted phrase precedes the words inside it.
        spans.sort_by_key(|(start, _)| *start);

        let mut seen = HashSet::new();
        let mut entities = Vec::new();
        for (_, raw) in spans {
            let Some(candidate) = normalize_entity(raw) else {
                continue;
            };
            if Self::keep(&candidate) && seen.insert(candidate.clone()) {
                entities.push(candidate);
                if entities.len() == self.max_entities {
                    break;
                }
            }
        }
        Ok(entities)
    }
}
