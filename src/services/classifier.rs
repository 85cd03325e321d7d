// src/services/classifier.rs

//! Keyword-driven category tagging.
//!
//! Each category compiles into one case-insensitive pattern over all of its
//! keywords. A keyword matches only as a whole word or phrase, and keywords
//! ending in a letter also match with a trailing `s` (`craft` → `crafts`).
//! All categories are tested independently; afterwards, categories that
//! suppress children remove those children from the result.

use std::collections::{BTreeSet, HashMap};

use regex::{Regex, RegexBuilder};

use crate::error::{AppError, Result};
use crate::models::{CategoryId, CategoryRule};

/// A category with its compiled keyword matcher.
#[derive(Debug, Clone)]
struct CompiledRule {
    key: String,
    id: CategoryId,
    pattern: Regex,
}

/// Assigns category ids to event text.
///
/// Immutable after construction.
#[derive(Debug, Clone)]
pub struct CategoryClassifier {
    rules: Vec<CompiledRule>,
    suppressions: HashMap<CategoryId, Vec<CategoryId>>,
}

impl CategoryClassifier {
    /// Compile the taxonomy.
    pub fn new(rules: &[CategoryRule]) -> Result<Self> {
        let ids: HashMap<&str, CategoryId> =
            rules.iter().map(|r| (r.key.as_str(), r.id)).collect();

        let mut compiled = Vec::with_capacity(rules.len());
        let mut suppressions = HashMap::new();

        for rule in rules {
            let source = keyword_pattern(&rule.keywords).ok_or_else(|| {
                AppError::validation(format!("category '{}' has no keywords", rule.key))
            })?;
            let pattern = RegexBuilder::new(&source).case_insensitive(true).build()?;
            compiled.push(CompiledRule {
                key: rule.key.clone(),
                id: rule.id,
                pattern,
            });

            if !rule.suppresses.is_empty() {
                let children = rule
                    .suppresses
                    .iter()
                    .map(|child| {
                        ids.get(child.as_str()).copied().ok_or_else(|| {
                            AppError::validation(format!(
                                "category '{}' suppresses unknown category '{}'",
                                rule.key, child
                            ))
                        })
                    })
                    .collect::<Result<Vec<_>>>()?;
                suppressions.insert(rule.id, children);
            }
        }

        Ok(Self {
            rules: compiled,
            suppressions,
        })
    }

    /// Category ids for an event, with suppressed children removed.
    pub fn classify(&self, title: &str, description: &str) -> BTreeSet<CategoryId> {
        let matched = self.matches(title, description);

        let suppressed: BTreeSet<CategoryId> = matched
            .iter()
            .filter_map(|id| self.suppressions.get(id))
            .flatten()
            .copied()
            .collect();

        matched.difference(&suppressed).copied().collect()
    }

    /// Every category whose keywords appear, before suppression.
    pub fn matches(&self, title: &str, description: &str) -> BTreeSet<CategoryId> {
        let text = format!("{} {}", title, description).to_lowercase();
        self.rules
            .iter()
            .filter(|rule| rule.pattern.is_match(&text))
            .map(|rule| rule.id)
            .collect()
    }

    /// Key of a category id, for logging.
    pub fn key_of(&self, id: CategoryId) -> Option<&str> {
        self.rules
            .iter()
            .find(|rule| rule.id == id)
            .map(|rule| rule.key.as_str())
    }

    /// Keys for a set of ids, in id order.
    pub fn keys(&self, ids: &BTreeSet<CategoryId>) -> Vec<&str> {
        ids.iter().filter_map(|id| self.key_of(*id)).collect()
    }

    /// Number of categories.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Build the matcher source for a keyword list, longest keyword first.
///
/// Word boundaries are expressed as "start of text or a non-word character"
/// on each side, so keywords that end in a symbol (`18+`) still anchor
/// correctly.
pub fn keyword_pattern(keywords: &[String]) -> Option<String> {
    let mut keywords: Vec<&str> = keywords
        .iter()
        .map(|k| k.trim())
        .filter(|k| !k.is_empty())
        .collect();
    if keywords.is_empty() {
        return None;
    }
    keywords.sort_by(|a, b| b.len().cmp(&a.len()));

    let alternatives: Vec<String> = keywords
        .iter()
        .map(|kw| {
            let escaped = regex::escape(&kw.to_lowercase());
            if kw.chars().last().is_some_and(char::is_alphabetic) {
                format!("{escaped}s?")
            } else {
                escaped
            }
        })
        .collect();

    Some(format!(r"(?:^|\W)(?:{})(?:\W|$)", alternatives.join("|")))
}
