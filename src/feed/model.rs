use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::util::host_of;

/// Label used when a feed declares no title.
pub const DEFAULT_FEED_TITLE: &str = "Feed";
/// Label used when an entry has no title.
pub const DEFAULT_ITEM_TITLE: &str = "Untitled";
/// Link used when an entry has no usable link.
pub const MISSING_LINK: &str = "#";

// ============================================================================
// Inputs
// ============================================================================

/// One configured feed. The URL is the identity used in failure reports.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FeedSource {
    pub url: String,
}

impl FeedSource {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    /// Short human label: the hostname when the URL has one, else the URL.
    pub fn label(&self) -> String {
        host_of(&self.url).unwrap_or_else(|| self.url.clone())
    }
}

impl fmt::Display for FeedSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url)
    }
}

/// How the aggregator lays out the items of all feeds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OrderingMode {
    /// One section per feed, in configuration order.
    #[default]
    Grouped,
    /// One sequence across all feeds, newest first.
    Merged,
}

// ============================================================================
// Normalized output
// ============================================================================

/// One normalized entry, independent of the RSS or Atom markup it came from.
///
/// `title` and `link` are never empty; `snippet` is plain text.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedItem {
    pub title: String,
    /// Absolute URL, or `#` when the entry had none.
    pub link: String,
    /// `None` when the entry had no parseable date. Never shown as a date.
    pub published_at: Option<DateTime<Utc>>,
    pub snippet: String,
    pub image_url: Option<String>,
    /// Provenance label for merged timelines.
    pub source_title: String,
}

/// Extraction result for one feed document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtractedFeed {
    pub feed_title: String,
    /// Newest first, at most `max_items` long.
    pub items: Vec<FeedItem>,
}

/// A titled section of grouped output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedGroup {
    pub source: FeedSource,
    pub title: String,
    pub items: Vec<FeedItem>,
}

/// Items of a refresh cycle in the requested layout.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "mode", content = "data", rename_all = "lowercase")]
pub enum AggregateView {
    Grouped(Vec<FeedGroup>),
    Merged(Vec<FeedItem>),
}

/// Everything presentation needs from one refresh cycle.
#[derive(Debug, Clone, Serialize)]
pub struct AggregateResult {
    pub view: AggregateView,
    /// Sources that failed, in configuration order.
    pub failed_sources: Vec<FeedSource>,
    /// When the cycle finished; shown as "last updated".
    pub refreshed_at: DateTime<Utc>,
}

impl AggregateResult {
    /// Total number of items across the view.
    pub fn item_count(&self) -> usize {
        match &self.view {
            AggregateView::Grouped(groups) => groups.iter().map(|g| g.items.len()).sum(),
            AggregateView::Merged(items) => items.len(),
        }
    }

    /// True when no source failed.
    pub fn all_succeeded(&self) -> bool {
        self.failed_sources.is_empty()
    }

    /// One-line status: full success, or the failed feeds by hostname.
    pub fn status_line(&self) -> String {
        if self.all_succeeded() {
            return "All feeds loaded.".to_owned();
        }
        let labels: Vec<String> = self.failed_sources.iter().map(FeedSource::label).collect();
        format!("Some feeds failed to load: {}", labels.join(", "))
    }
}
