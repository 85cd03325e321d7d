// src/sources/assabet.rs

//! Assabet Interactive calendar pages.
//!
//! The calendar is a static HTML listing where each event is a card:
//!
//! ```html
//! <div class="listing-event">
//!   <h2><a href="/event/teen-game-night-1234/">Teen Game Night</a></h2>
//!   <span class="event-day">Thursday, February 5</span>
//!   <span class="event-time">6:30—8:00 PM</span>
//!   <div class="event-description-excerpt">
//!     Board games and snacks. <a class="event-description-excerpt-more">Learn more</a>
//!   </div>
//! </div>
//! ```

use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use super::{NormalizedBatch, RawData, ScrapeContext, SourceAdapter};
use crate::error::{AppError, Result};
use crate::models::{CanonicalEvent, LibraryId, SourceConfig};
use crate::utils::{http, normalize_whitespace, resolve_url};

const CARD_SELECTOR: &str = "div.listing-event, div.listing_event";
const TITLE_SELECTOR: &str = "h2";
const LINK_SELECTOR: &str = "h2 a[href]";
const DAY_SELECTOR: &str = "span.event-day";
const TIME_SELECTOR: &str = "span.event-time";
const DESCRIPTION_SELECTOR: &str = "div.event-description-excerpt";
const MORE_LINK_SELECTOR: &str = "a.event-description-excerpt-more";

/// Compiled CSS selectors for an event card.
#[derive(Debug, Clone)]
struct CardSelectors {
    card: Selector,
    title: Selector,
    link: Selector,
    day: Selector,
    time: Selector,
    description: Selector,
    more_link: Selector,
}

impl CardSelectors {
    fn new() -> Result<Self> {
        Ok(Self {
            card: parse_selector(CARD_SELECTOR)?,
            title: parse_selector(TITLE_SELECTOR)?,
            link: parse_selector(LINK_SELECTOR)?,
            day: parse_selector(DAY_SELECTOR)?,
            time: parse_selector(TIME_SELECTOR)?,
            description: parse_selector(DESCRIPTION_SELECTOR)?,
            more_link: parse_selector(MORE_LINK_SELECTOR)?,
        })
    }
}

/// Fields of one card as rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
struct RawCard {
    title: String,
    href: Option<String>,
    day: Option<String>,
    time: Option<String>,
    description: String,
}

/// Adapter for Assabet Interactive HTML calendars.
pub struct AssabetAdapter {
    name: String,
    library_id: LibraryId,
    url: Url,
    client: reqwest::Client,
    selectors: CardSelectors,
}

impl AssabetAdapter {
    /// Create an adapter for a source with a `url` parameter.
    pub fn new(source: &SourceConfig, client: reqwest::Client) -> Result<Self> {
        let url = Url::parse(source.require("url", &source.params.url)?)?;
        Ok(Self {
            name: source.name.clone(),
            library_id: source.library_id,
            url,
            client,
            selectors: CardSelectors::new()?,
        })
    }

    fn parse_card(&self, card: &ElementRef) -> RawCard {
        let sel = &self.selectors;

        let title = card
            .select(&sel.title)
            .next()
            .map(|el| element_text(&el))
            .unwrap_or_default();
        let href = card
            .select(&sel.link)
            .next()
            .and_then(|a| a.value().attr("href"))
            .map(|href| resolve_url(&self.url, href.trim()));
        let day = card
            .select(&sel.day)
            .next()
            .map(|el| element_text(&el))
            .filter(|s| !s.is_empty());
        let time = card
            .select(&sel.time)
            .next()
            .map(|el| element_text(&el))
            .filter(|s| !s.is_empty());
        let description = card
            .select(&sel.description)
            .next()
            .map(|el| text_without(&el, &sel.more_link))
            .unwrap_or_default();

        RawCard {
            title,
            href,
            day,
            time,
            description,
        }
    }
}

#[async_trait]
impl SourceAdapter for AssabetAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn library_id(&self) -> LibraryId {
        self.library_id
    }

    async fn fetch(&self, _ctx: &ScrapeContext) -> Result<RawData> {
        log::info!("[{}] Fetching calendar page {}", self.name, self.url);
        let html = http::fetch_text(&self.client, self.url.as_str()).await?;
        Ok(RawData::Markup(html))
    }

    fn normalize_data(&self, raw: RawData, ctx: &ScrapeContext) -> Result<NormalizedBatch> {
        let RawData::Markup(html) = raw else {
            return Err(AppError::adapter(&self.name, "expected an HTML document"));
        };

        let document = Html::parse_document(&html);
        let mut batch = NormalizedBatch::default();

        for card in document.select(&self.selectors.card) {
            batch.seen += 1;
            let card = self.parse_card(&card);

            if card.title.is_empty() {
                batch.reject(&self.name, "card without a title");
                continue;
            }
            let Some(day) = card.day.as_deref() else {
                batch.reject(&self.name, &format!("'{}' has no date", card.title));
                continue;
            };

            let time = card.time.as_deref();
            let parsed = ctx.normalizer.normalize_range(day, time, false);
            let Some(range) = batch.admit(&self.name, &card.title, (day, time), parsed, &ctx.window)
            else {
                continue;
            };

            batch.events.push(
                CanonicalEvent::new(card.title, range.start, self.library_id)
                    .with_end_time(range.end)
                    .with_description(card.description)
                    .with_event_url(card.href),
            );
        }

        log::info!(
            "[{}] Normalized {} of {} cards",
            self.name,
            batch.events.len(),
            batch.seen
        );
        Ok(batch)
    }
}

fn parse_selector(s: &str) -> Result<Selector> {
    Selector::parse(s).map_err(|e| AppError::selector(s, format!("{e:?}")))
}

/// Whitespace-collapsed text of an element.
fn element_text(element: &ElementRef) -> String {
    normalize_whitespace(&element.text().collect::<Vec<_>>().join(" "))
}

/// Text of an element, skipping anything inside elements matching `excluded`.
fn text_without(element: &ElementRef, excluded: &Selector) -> String {
    let parts: Vec<&str> = element
        .descendants()
        .filter(|node| {
            !node
                .ancestors()
                .filter_map(ElementRef::wrap)
                .any(|el| excluded.matches(&el))
        })
        .filter_map(|node| node.value().as_text().map(|text| &**text))
        .collect();
    normalize_whitespace(&parts.join(" "))
}
