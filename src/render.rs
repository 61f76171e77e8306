//! Plain-text and JSON output for one refresh cycle.

use chrono::{DateTime, Local, TimeZone, Utc};
use std::fmt::Write;

use crate::feed::{AggregateResult, AggregateView, FeedItem};

/// Renders a cycle for the terminal, with times in the local zone.
pub fn render_text(result: &AggregateResult) -> String {
    render_text_in(result, &Local)
}

/// Renders a cycle as pretty-printed JSON. Times stay in UTC.
pub fn render_json(result: &AggregateResult) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(result)
}

fn render_text_in<Tz: TimeZone>(result: &AggregateResult, tz: &Tz) -> String
where
    Tz::Offset: std::fmt::Display,
{
    let mut out = String::new();

    match &result.view {
        AggregateView::Grouped(groups) => {
            for group in groups {
                let _ = writeln!(out, "== {} ==", group.title);
                if group.items.is_empty() {
                    out.push_str("  (no items)\n");
                }
                for item in &group.items {
                    write_item(&mut out, item, None, tz);
                }
                out.push('\n');
            }
        }
        AggregateView::Merged(items) => {
            for item in items {
                write_item(&mut out, item, Some(&item.source_title), tz);
            }
            if !items.is_empty() {
                out.push('\n');
            }
        }
    }

    let _ = writeln!(out, "{}", result.status_line());
    let _ = writeln!(out, "Updated: {}", local_time(&result.refreshed_at, tz, "%H:%M:%S"));
    out
}

fn write_item<Tz: TimeZone>(out: &mut String, item: &FeedItem, source: Option<&str>, tz: &Tz)
where
    Tz::Offset: std::fmt::Display,
{
    match source {
        Some(source) => {
            let _ = writeln!(out, "- [{}] {}", source, item.title);
        }
        None => {
            let _ = writeln!(out, "- {}", item.title);
        }
    }

    // Items without a known time show no date at all.
    match &item.published_at {
        Some(at) => {
            let _ = writeln!(out, "  {} | {}", local_time(at, tz, "%Y-%m-%d %H:%M"), item.link);
        }
        None => {
            let _ = writeln!(out, "  {}", item.link);
        }
    }

    if !item.snippet.is_empty() {
        let _ = writeln!(out, "  {}", item.snippet);
    }
    if let Some(image) = &item.image_url {
        let _ = writeln!(out, "  image: {image}");
    }
}

fn local_time<Tz: TimeZone>(at: &DateTime<Utc>, tz: &Tz, fmt: &str) -> String
where
    Tz::Offset: std::fmt::Display,
{
    at.with_timezone(tz).format(fmt).to_string()
}
