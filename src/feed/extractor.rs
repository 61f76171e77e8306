use chrono::{DateTime, Utc};
use scraper::Html;
use url::Url;

use super::date::parse_timestamp;
use super::document::FeedNode;
use super::image::resolve_image;
use super::model::{
    ExtractedFeed, FeedItem, DEFAULT_FEED_TITLE, DEFAULT_ITEM_TITLE, MISSING_LINK,
};
use crate::util::{absolutize_link, collapse_whitespace, host_of, snippet_of, strip_control_chars};

const FEED_CONTAINER_TAGS: &[&str] = &["channel", "feed"];
const ENTRY_TAGS: &[&str] = &["item", "entry"];
const DATE_TAGS: &[&str] = &["pubDate", "updated", "published", "dc:date"];
const SNIPPET_TAGS: &[&str] = &["description", "summary", "content"];

/// Default snippet length in characters.
pub const DEFAULT_SNIPPET_CHARS: usize = 200;

/// Per-feed extraction limits.
#[derive(Debug, Clone, Copy)]
pub struct ExtractOptions {
    /// Maximum entries kept after sorting.
    pub max_items: usize,
    /// Snippet length in characters, before the ellipsis marker.
    pub snippet_chars: usize,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            max_items: 5,
            snippet_chars: DEFAULT_SNIPPET_CHARS,
        }
    }
}

/// Walks a parsed feed and produces its title and newest-first items.
///
/// Entries are ordered by published time, newest first, with a stable sort:
/// equal times keep document order and entries without a parseable time
/// go last. Only the first `max_items` are normalized.
///
/// `base` is the feed's own URL and is used to absolutize image references.
/// Missing fields never fail extraction; each has a documented default.
pub fn extract<N: FeedNode>(root: &N, base: Option<&Url>, options: &ExtractOptions) -> ExtractedFeed {
    let declared_title = feed_title(root);
    let feed_title = declared_title
        .clone()
        .unwrap_or_else(|| DEFAULT_FEED_TITLE.to_owned());

    let mut entries: Vec<(Option<DateTime<Utc>>, &N)> = root
        .find_all(ENTRY_TAGS)
        .into_iter()
        .map(|entry| (published_at(entry), entry))
        .collect();

    // None < Some(_), so a descending sort puts undated entries last.
    entries.sort_by(|a, b| b.0.cmp(&a.0));
    entries.truncate(options.max_items);

    let items = entries
        .into_iter()
        .map(|(published_at, entry)| {
            let link = entry_link(entry);
            let source_title = declared_title
                .clone()
                .or_else(|| host_of(&link))
                .unwrap_or_else(|| DEFAULT_FEED_TITLE.to_owned());

            FeedItem {
                title: clean_text(entry.first_text(&["title"]))
                    .unwrap_or_else(|| DEFAULT_ITEM_TITLE.to_owned()),
                link,
                published_at,
                snippet: snippet(entry, options.snippet_chars),
                image_url: resolve_image(entry, base),
                source_title,
            }
        })
        .collect();

    ExtractedFeed { feed_title, items }
}

fn clean_text(raw: Option<String>) -> Option<String> {
    raw.map(|t| collapse_whitespace(&strip_control_chars(&t)))
        .filter(|t| !t.is_empty())
}

/// Title of the first `channel` or `feed` element, if the feed declares one.
fn feed_title<N: FeedNode>(root: &N) -> Option<String> {
    let container = if FEED_CONTAINER_TAGS.iter().any(|t| *t == root.name()) {
        Some(root)
    } else {
        root.find_all(FEED_CONTAINER_TAGS).into_iter().next()
    }?;
    clean_text(container.child(&["title"]).map(|t| t.text()))
}

/// Whichever date field the entry lists first wins.
fn published_at<N: FeedNode>(entry: &N) -> Option<DateTime<Utc>> {
    entry
        .first_text_in_order(DATE_TAGS)
        .and_then(|raw| parse_timestamp(&raw))
}

/// Picks the entry's link: a `rel="alternate"` (or rel-less) link when there
/// is one, else the first. Atom carries the URL in `href`, RSS in the text.
fn entry_link<N: FeedNode>(entry: &N) -> String {
    let links = entry.find_all(&["link"]);
    let chosen = links
        .iter()
        .find(|l| {
            l.attribute(&["rel"])
                .map_or(true, |rel| rel.eq_ignore_ascii_case("alternate"))
        })
        .or_else(|| links.first());

    let href = chosen
        .and_then(|l| {
            l.attribute(&["href"])
                .map(str::to_owned)
                .or_else(|| Some(l.text().trim().to_owned()))
        })
        .filter(|h| !h.is_empty());

    match href {
        Some(href) => absolutize_link(&href),
        None => MISSING_LINK.to_owned(),
    }
}

/// Plain-text snippet of the first non-empty description-like field, in
/// document order.
fn snippet<N: FeedNode>(entry: &N, budget: usize) -> String {
    let Some(html) = entry.first_text_in_order(SNIPPET_TAGS) else {
        return String::new();
    };
    snippet_of(&html_to_text(&html), budget)
}

/// Drops all markup from an HTML fragment, decoding entities and collapsing
/// whitespace.
fn html_to_text(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    let text: String = fragment.root_element().text().collect();
    collapse_whitespace(&strip_control_chars(&text))
}
