use chrono::Utc;
use futures::future::join_all;

use super::extractor::{ExtractOptions, DEFAULT_SNIPPET_CHARS};
use super::fetcher::{fetch_feed, FeedResult};
use super::model::{AggregateResult, AggregateView, FeedGroup, FeedItem, FeedSource, OrderingMode};
use super::transport::Transport;

/// Per-cycle aggregation settings, passed in explicitly on every call.
#[derive(Debug, Clone, Copy)]
pub struct AggregateOptions {
    pub mode: OrderingMode,
    pub max_items_per_feed: usize,
    pub snippet_chars: usize,
}

impl Default for AggregateOptions {
    fn default() -> Self {
        Self {
            mode: OrderingMode::Grouped,
            max_items_per_feed: 5,
            snippet_chars: DEFAULT_SNIPPET_CHARS,
        }
    }
}

/// Runs one refresh cycle over `sources`.
///
/// Every feed is fetched concurrently on the current task and the cycle
/// waits for all of them to settle before composing output, so the result
/// never depends on which response arrives first and one failing feed never
/// drops another. Failed sources are reported in input order.
///
/// # Behavior
///
/// - [`OrderingMode::Grouped`]: one group per succeeded source, input order
/// - [`OrderingMode::Merged`]: all items, newest first across feeds; equal
///   or unknown times keep source order, unknown times go last
pub async fn aggregate<T: Transport>(
    transport: &T,
    sources: &[FeedSource],
    options: &AggregateOptions,
) -> AggregateResult {
    let extract_options = ExtractOptions {
        max_items: options.max_items_per_feed,
        snippet_chars: options.snippet_chars,
    };

    // Settle-all: each future resolves to a FeedResult and cannot fail, so
    // join_all never short-circuits. Output order matches `sources`.
    let results: Vec<FeedResult> = join_all(
        sources
            .iter()
            .map(|source| fetch_feed(transport, source, &extract_options)),
    )
    .await;

    let result = compose(results, options.mode);

    tracing::info!(
        feeds = sources.len(),
        failed = result.failed_sources.len(),
        items = result.item_count(),
        mode = ?options.mode,
        "Refresh cycle complete"
    );

    result
}

/// Turns settled per-feed results (in source order) into the requested view.
pub fn compose(results: Vec<FeedResult>, mode: OrderingMode) -> AggregateResult {
    let mut failed_sources = Vec::new();
    let mut groups = Vec::new();

    for FeedResult { source, result } in results {
        match result {
            Ok(feed) => groups.push(FeedGroup {
                source,
                title: feed.feed_title,
                items: feed.items,
            }),
            Err(_) => {
                if !failed_sources.contains(&source) {
                    failed_sources.push(source);
                }
            }
        }
    }

    let view = match mode {
        OrderingMode::Grouped => AggregateView::Grouped(groups),
        OrderingMode::Merged => AggregateView::Merged(merge_newest_first(groups)),
    };

    AggregateResult {
        view,
        failed_sources,
        refreshed_at: Utc::now(),
    }
}

fn merge_newest_first(groups: Vec<FeedGroup>) -> Vec<FeedItem> {
    let mut items: Vec<FeedItem> = groups.into_iter().flat_map(|g| g.items).collect();
    // Stable; None sorts below every Some, so unknown times end up last.
    items.sort_by(|a, b| b.published_at.cmp(&a.published_at));
    items
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::transport::TransportError;
    use chrono::{DateTime, TimeZone};
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use std::collections::HashMap;
    use std::time::Duration;

    /// In-memory transport; URLs not in the map answer 404.
    struct StubTransport {
        bodies: HashMap<String, String>,
        delays: HashMap<String, Duration>,
    }

    impl StubTransport {
        fn new(pairs: &[(&str, &str)]) -> Self {
            Self {
                bodies: pairs
                    .iter()
                    .map(|(u, b)| (u.to_string(), b.to_string()))
                    .collect(),
                delays: HashMap::new(),
            }
        }

        fn delayed(mut self, url: &str, delay: Duration) -> Self {
            self.delays.insert(url.to_owned(), delay);
            self
        }
    }

    impl Transport for StubTransport {
        async fn fetch_text(&self, url: &str) -> Result<String, TransportError> {
            if let Some(delay) = self.delays.get(url) {
                tokio::time::sleep(*delay).await;
            }
            self.bodies
                .get(url)
                .cloned()
                .ok_or(TransportError::HttpStatus(404))
        }
    }

    fn rss(title: &str, items: &[(&str, Option<&str>)]) -> String {
        let body: String = items
            .iter()
            .map(|(t, date)| match date {
                Some(d) => format!("<item><title>{t}</title><pubDate>{d}</pubDate></item>"),
                None => format!("<item><title>{t}</title></item>"),
            })
            .collect();
        format!("<rss><channel><title>{title}</title>{body}</channel></rss>")
    }

    fn sources(urls: &[&str]) -> Vec<FeedSource> {
        urls.iter().map(|u| FeedSource::new(*u)).collect()
    }

    fn merged_titles(result: &AggregateResult) -> Vec<&str> {
        match &result.view {
            AggregateView::Merged(items) => items.iter().map(|i| i.title.as_str()).collect(),
            AggregateView::Grouped(_) => panic!("expected merged view"),
        }
    }

    const A: &str = "https://a.example.com/rss";
    const B: &str = "https://b.example.com/rss";
    const C: &str = "https://c.example.com/rss";

    const D1: &str = "Mon, 01 Jan 2024 00:00:00 +0000";
    const D2: &str = "Tue, 02 Jan 2024 00:00:00 +0000";
    const D3: &str = "Wed, 03 Jan 2024 00:00:00 +0000";

    #[tokio::test]
    async fn test_grouped_preserves_source_order_and_omits_failures() {
        let a = rss("Feed A", &[("a1", Some(D1))]);
        let c = rss("Feed C", &[("c1", Some(D3))]);
        let transport = StubTransport::new(&[(A, &a), (C, &c)]);

        let result = aggregate(&transport, &sources(&[A, B, C]), &AggregateOptions::default()).await;

        let AggregateView::Grouped(groups) = &result.view else {
            panic!("expected grouped view");
        };
        let titles: Vec<&str> = groups.iter().map(|g| g.title.as_str()).collect();
        assert_eq!(titles, vec!["Feed A", "Feed C"]);
        assert_eq!(result.failed_sources, sources(&[B]));
        assert_eq!(result.status_line(), "Some feeds failed to load: b.example.com");
    }

    #[tokio::test]
    async fn test_grouped_order_independent_of_completion_order() {
        let a = rss("Feed A", &[("a1", Some(D1))]);
        let b = rss("Feed B", &[("b1", Some(D1))]);
        let transport =
            StubTransport::new(&[(A, &a), (B, &b)]).delayed(A, Duration::from_millis(50));

        let result = aggregate(&transport, &sources(&[A, B]), &AggregateOptions::default()).await;
        let AggregateView::Grouped(groups) = &result.view else {
            panic!("expected grouped view");
        };
        assert_eq!(groups[0].source.url, A);
        assert_eq!(groups[1].source.url, B);
    }

    #[tokio::test]
    async fn test_merged_sorts_across_feeds_with_unknown_last() {
        let a = rss("Feed A", &[("a-old", Some(D1)), ("a-undated", None)]);
        let b = rss("Feed B", &[("b-new", Some(D3)), ("b-mid", Some(D2))]);
        let transport = StubTransport::new(&[(A, &a), (B, &b)]);
        let options = AggregateOptions {
            mode: OrderingMode::Merged,
            ..AggregateOptions::default()
        };

        let result = aggregate(&transport, &sources(&[A, B]), &options).await;
        assert_eq!(merged_titles(&result), vec!["b-new", "b-mid", "a-old", "a-undated"]);
        assert!(result.all_succeeded());
        assert_eq!(result.status_line(), "All feeds loaded.");
    }

    #[tokio::test]
    async fn test_merged_ties_keep_source_order() {
        let a = rss("Feed A", &[("a1", Some(D2)), ("a2", Some(D2))]);
        let b = rss("Feed B", &[("b1", Some(D2))]);
        let transport = StubTransport::new(&[(A, &a), (B, &b)]).delayed(A, Duration::from_millis(30));
        let options = AggregateOptions {
            mode: OrderingMode::Merged,
            ..AggregateOptions::default()
        };

        for _ in 0..3 {
            let result = aggregate(&transport, &sources(&[A, B]), &options).await;
            assert_eq!(merged_titles(&result), vec!["a1", "a2", "b1"]);
        }
    }

    #[tokio::test]
    async fn test_merged_items_carry_source_title() {
        let a = rss("Feed A", &[("a1", Some(D1))]);
        let transport = StubTransport::new(&[(A, &a)]);
        let options = AggregateOptions {
            mode: OrderingMode::Merged,
            ..AggregateOptions::default()
        };

        let result = aggregate(&transport, &sources(&[A]), &options).await;
        let AggregateView::Merged(items) = &result.view else {
            panic!("expected merged view");
        };
        assert_eq!(items[0].source_title, "Feed A");
    }

    #[tokio::test]
    async fn test_all_fail_and_all_succeed() {
        let transport = StubTransport::new(&[]);
        let result = aggregate(&transport, &sources(&[A, B]), &AggregateOptions::default()).await;
        assert_eq!(result.failed_sources, sources(&[A, B]));
        assert_eq!(result.item_count(), 0);

        let a = rss("Feed A", &[("a1", None)]);
        let b = rss("Feed B", &[("b1", None)]);
        let transport = StubTransport::new(&[(A, &a), (B, &b)]);
        let result = aggregate(&transport, &sources(&[A, B]), &AggregateOptions::default()).await;
        assert!(result.failed_sources.is_empty());
        assert_eq!(result.item_count(), 2);
    }

    #[tokio::test]
    async fn test_empty_source_list() {
        let transport = StubTransport::new(&[]);
        let result = aggregate(&transport, &[], &AggregateOptions::default()).await;
        assert_eq!(result.item_count(), 0);
        assert!(result.all_succeeded());
    }

    #[tokio::test]
    async fn test_duplicate_failed_source_reported_once() {
        let transport = StubTransport::new(&[]);
        let result = aggregate(&transport, &sources(&[B, B]), &AggregateOptions::default()).await;
        assert_eq!(result.failed_sources, sources(&[B]));
    }

    fn item(title: String, published_at: Option<DateTime<Utc>>) -> FeedItem {
        FeedItem {
            title,
            link: "#".to_owned(),
            published_at,
            snippet: String::new(),
            image_url: None,
            source_title: "Feed".to_owned(),
        }
    }

    proptest! {
        // Output is sorted newest first, unknown times last, and equal keys
        // keep their concatenation order.
        #[test]
        fn prop_merge_is_stable_newest_first(
            feeds in prop::collection::vec(
                prop::collection::vec(prop::option::of(0i64..5), 0..6),
                0..5,
            )
        ) {
            let groups: Vec<FeedGroup> = feeds
                .iter()
                .enumerate()
                .map(|(f, times)| FeedGroup {
                    source: FeedSource::new(format!("https://f{f}.example.com/")),
                    title: format!("f{f}"),
                    items: times
                        .iter()
                        .enumerate()
                        .map(|(i, t)| item(
                            format!("{f}-{i}"),
                            t.map(|d| Utc.timestamp_opt(d * 86_400, 0).unwrap()),
                        ))
                        .collect(),
                })
                .collect();

            let concatenated: Vec<String> = groups
                .iter()
                .flat_map(|g| g.items.iter().map(|i| i.title.clone()))
                .collect();
            let merged = merge_newest_first(groups);

            prop_assert_eq!(merged.len(), concatenated.len());
            for pair in merged.windows(2) {
                prop_assert!(pair[0].published_at >= pair[1].published_at);
                if pair[0].published_at == pair[1].published_at {
                    let first = concatenated.iter().position(|t| *t == pair[0].title);
                    let second = concatenated.iter().position(|t| *t == pair[1].title);
                    prop_assert!(first < second);
                }
            }
        }
    }
}
