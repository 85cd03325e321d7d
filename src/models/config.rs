//! Application configuration structures.

use std::collections::HashSet;
use std::env;
use std::fs;
use std::path::Path;

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::{CategoryRule, SourceConfig};

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// HTTP client settings
    #[serde(default)]
    pub http: HttpConfig,

    /// Event store API settings
    #[serde(default)]
    pub sink: SinkConfig,

    /// IANA timezone the calendars are published in
    #[serde(default = "defaults::timezone")]
    pub timezone: String,

    /// Length of the rolling window in days
    #[serde(default = "defaults::window_days")]
    pub window_days: i64,

    /// Library calendars to scrape
    #[serde(default)]
    pub sources: Vec<SourceConfig>,

    /// Category taxonomy used for tagging
    #[serde(default = "defaults::default_categories")]
    pub categories: Vec<CategoryRule>,

    /// Phrases that mark an event as a private booking
    #[serde(default = "defaults::default_exclusions")]
    pub exclusions: Vec<String>,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Apply `API_URL` and `SCRAPER_USER_AGENT` from the environment.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(url) = env::var("API_URL") {
            if !url.trim().is_empty() {
                self.sink.api_url = url;
            }
        }
        if let Ok(agent) = env::var("SCRAPER_USER_AGENT") {
            if !agent.trim().is_empty() {
                self.http.user_agent = agent;
            }
        }
    }

    /// Parse the configured timezone.
    pub fn tz(&self) -> Result<Tz> {
        self.timezone
            .parse::<Tz>()
            .map_err(|e| AppError::config(format!("timezone '{}': {}", self.timezone, e)))
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.http.user_agent.trim().is_empty() {
            return Err(AppError::validation("http.user_agent is empty"));
        }
        if self.http.timeout_secs == 0 {
            return Err(AppError::validation("http.timeout_secs must be > 0"));
        }
        if self.window_days <= 0 {
            return Err(AppError::validation("window_days must be > 0"));
        }
        self.tz()?;
        if self.sources.is_empty() {
            return Err(AppError::config("No sources configured"));
        }
        self.validate_categories()
    }

    fn validate_categories(&self) -> Result<()> {
        let mut keys = HashSet::new();
        let mut ids = HashSet::new();
        for rule in &self.categories {
            if !keys.insert(rule.key.as_str()) {
                return Err(AppError::validation(format!(
                    "duplicate category key '{}'",
                    rule.key
                )));
            }
            if !ids.insert(rule.id) {
                return Err(AppError::validation(format!(
                    "duplicate category id {}",
                    rule.id
                )));
            }
            if rule.keywords.iter().all(|k| k.trim().is_empty()) {
                return Err(AppError::validation(format!(
                    "category '{}' has no keywords",
                    rule.key
                )));
            }
        }
        for rule in &self.categories {
            if let Some(child) = rule.suppresses.iter().find(|c| !keys.contains(c.as_str())) {
                return Err(AppError::validation(format!(
                    "category '{}' suppresses unknown category '{}'",
                    rule.key, child
                )));
            }
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http: HttpConfig::default(),
            sink: SinkConfig::default(),
            timezone: defaults::timezone(),
            window_days: defaults::window_days(),
            sources: Vec::new(),
            categories: defaults::default_categories(),
            exclusions: defaults::default_exclusions(),
        }
    }
}

/// HTTP client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
        }
    }
}

/// Event store API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SinkConfig {
    /// Endpoint receiving one event per POST; cleanup lives under `/cleanup`
    #[serde(default = "defaults::api_url")]
    pub api_url: String,

    /// Name of the environment variable holding the bearer token
    #[serde(default = "defaults::api_key_env")]
    pub api_key_env: String,
}

impl SinkConfig {
    /// Read the bearer token from the environment.
    pub fn api_key(&self) -> Option<String> {
        env::var(&self.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
    }
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            api_url: defaults::api_url(),
            api_key_env: defaults::api_key_env(),
        }
    }
}

mod defaults {
    use crate::models::CategoryRule;

    pub fn user_agent() -> String {
        "LibrovaScraper/1.0".into()
    }
    pub fn timeout() -> u64 {
        30
    }
    pub fn api_url() -> String {
        "http://localhost:3000/api/events".into()
    }
    pub fn api_key_env() -> String {
        "SCRAPER_API_KEY".into()
    }
    pub fn timezone() -> String {
        "America/New_York".into()
    }
    pub fn window_days() -> i64 {
        7
    }

    pub fn default_exclusions() -> Vec<String> {
        [
            "(comm)",
            "room reservation",
            "private event",
            "baby shower",
            "baby sprinkle",
            "birthday party",
            "private meeting",
            "staff only",
            "closed for",
        ]
        .into_iter()
        .map(String::from)
        .collect()
    }

    fn rule(key: &str, id: u32, keywords: &[&str], suppresses: &[&str]) -> CategoryRule {
        CategoryRule {
            key: key.to_string(),
            id,
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            suppresses: suppresses.iter().map(|k| k.to_string()).collect(),
        }
    }

    pub fn default_categories() -> Vec<CategoryRule> {
        vec![
            rule(
                "storytime",
                1,
                &[
                    "storytime",
                    "story time",
                    "story-time",
                    "read aloud",
                    "read-aloud",
                    "toddler time",
                    "rhymes",
                    "nursery rhymes",
                    "bilingual storytime",
                    "read to",
                    "tales",
                    "lapsit",
                    "bedtime story",
                    "wiggles",
                    "words",
                    "fingerplay",
                    "tunes",
                    "songs",
                    "mother goose",
                ],
                &["crafts", "children", "early_childhood", "music"],
            ),
            rule(
                "crafts",
                2,
                &[
                    "craft",
                    "diy",
                    "make and take",
                    "make & take",
                    "origami",
                    "painting",
                    "knitting",
                    "crochet",
                    "sewing",
                    "scrapbooking",
                    "art",
                    "drawing",
                    "maker",
                    "watercolor",
                    "yarn",
                    "papercraft",
                    "quilter",
                    "quilting",
                    "crafter",
                    "needlework",
                    "embroidery",
                ],
                &[],
            ),
            rule(
                "book_talks",
                3,
                &[
                    "book club",
                    "book discussion",
                    "author visit",
                    "book talk",
                    "author talk",
                    "literature",
                    "reading group",
                    "chapter chat",
                    "meet the author",
                    "book review",
                    "mystery book club",
                    "page turner",
                ],
                &[],
            ),
            rule(
                "games",
                4,
                &[
                    "board game",
                    "video game",
                    "trivia",
                    "bingo",
                    "chess",
                    "mahjong",
                    "mah jong",
                    "d&d",
                    "dungeons and dragons",
                    "scrabble",
                    "puzzle",
                    "esports",
                    "gaming",
                    "switch",
                    "tabletop",
                ],
                &[],
            ),
            rule(
                "history",
                5,
                &[
                    "history",
                    "historical",
                    "genealogy",
                    "ancestry",
                    "heritage",
                    "archives",
                    "local history",
                    "civil war",
                    "historian",
                ],
                &[],
            ),
            rule(
                "health",
                6,
                &[
                    "health",
                    "wellness",
                    "yoga",
                    "tai chi",
                    "meditation",
                    "mindfulness",
                    "fitness",
                    "nutrition",
                    "blood pressure",
                    "zumba",
                    "chair exercise",
                ],
                &[],
            ),
            rule(
                "stem",
                7,
                &[
                    "stem",
                    "steam",
                    "coding",
                    "robotics",
                    "lego",
                    "science",
                    "math",
                    "experiment",
                    "engineering",
                    "technology",
                    "3d printing",
                    "python",
                    "physics",
                    "astronomy",
                    "space",
                    "computer science",
                    "minecraft",
                ],
                &[],
            ),
            rule(
                "teens",
                8,
                &[
                    "teen",
                    "youth",
                    "grades 6-12",
                    "middle school",
                    "high school",
                    "ya",
                    "young adult",
                    "grades 7-12",
                    "adolescent",
                ],
                &[],
            ),
            rule(
                "adults",
                9,
                &[
                    "adult",
                    "18+",
                    "seniors",
                    "elder",
                    "21+",
                    "adults only",
                    "retirement",
                    "medicare",
                ],
                &[],
            ),
            rule(
                "family",
                10,
                &[
                    "family",
                    "all ages",
                    "intergenerational",
                    "parents",
                    "caregiver",
                    "family-friendly",
                ],
                &[],
            ),
            rule(
                "children",
                11,
                &[
                    "kid",
                    "child",
                    "baby",
                    "babies",
                    "elementary",
                    "tween",
                    "grades k-5",
                ],
                &[],
            ),
            rule(
                "early_childhood",
                12,
                &[
                    "twos",
                    "threes",
                    "two-year-olds",
                    "three-year-olds",
                    "pre-k",
                    "preschool",
                    "toddler",
                    "kindergarten",
                    "early literacy",
                    "playgroup",
                ],
                &[],
            ),
            rule(
                "tech_help",
                13,
                &[
                    "tech help",
                    "computer help",
                    "smart phone",
                    "ipad",
                    "tablet",
                    "device advice",
                    "tech tutor",
                    "software help",
                    "digital literacy",
                ],
                &[],
            ),
            rule(
                "special_needs",
                14,
                &[
                    "all abilities",
                    "sensory-friendly",
                    "adaptive",
                    "special needs",
                    "inclusive",
                    "neurodiversity",
                    "neurodivergent",
                ],
                &[],
            ),
            rule(
                "esl",
                15,
                &[
                    "esl",
                    "english as a second language",
                    "ell",
                    "english learners",
                    "language learning",
                    "conversation group",
                    "french",
                    "spanish",
                    "italian",
                ],
                &[],
            ),
            rule(
                "music",
                16,
                &[
                    "music",
                    "musical",
                    "song",
                    "sing-along",
                    "singalong",
                    "concert",
                    "guitar",
                    "piano",
                    "ukulele",
                    "drum",
                    "choir",
                    "karaoke",
                ],
                &[],
            ),
        ]
    }
}
