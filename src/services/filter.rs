// src/services/filter.rs

//! Public/private event filter.

/// Rejects room bookings and other private listings by literal phrase.
#[derive(Debug, Clone)]
pub struct PrivacyFilter {
    phrases: Vec<String>,
}

impl PrivacyFilter {
    pub fn new(phrases: &[String]) -> Self {
        Self {
            phrases: phrases
                .iter()
                .map(|p| p.to_lowercase())
                .filter(|p| !p.is_empty())
                .collect(),
        }
    }

    /// Whether the event may be published.
    pub fn is_public(&self, title: &str, description: &str) -> bool {
        self.blocking_phrase(title, description).is_none()
    }

    /// The first exclusion phrase found in the event text.
    ///
    /// Plain substring search on the lowercased `title description`.
    pub fn blocking_phrase(&self, title: &str, description: &str) -> Option<&str> {
        let text = format!("{} {}", title, description).to_lowercase();
        self.phrases
            .iter()
            .find(|phrase| text.contains(phrase.as_str()))
            .map(String::as_str)
    }
}
