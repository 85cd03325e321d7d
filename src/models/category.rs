//! Category taxonomy definitions.

use serde::{Deserialize, Serialize};

/// Numeric category identifier as stored in the event database.
pub type CategoryId = u32;

/// A named category and the keywords that trigger it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CategoryRule {
    /// Stable key (e.g. "storytime")
    pub key: String,

    /// Database id
    pub id: CategoryId,

    /// Trigger words and phrases, matched case-insensitively on word boundaries
    pub keywords: Vec<String>,

    /// Keys of child categories dropped when this one matches
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub suppresses: Vec<String>,
}
