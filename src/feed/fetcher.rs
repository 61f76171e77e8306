use thiserror::Error;
use url::Url;

use super::document::{Document, ParseError};
use super::extractor::{extract, ExtractOptions};
use super::model::{ExtractedFeed, FeedSource};
use super::transport::{Transport, TransportError};

/// Why a single feed produced no items this cycle.
#[derive(Debug, Error)]
pub enum FeedError {
    /// The feed text could not be retrieved
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// The feed text was not well-formed XML
    #[error("Invalid document: {0}")]
    InvalidDocument(#[from] ParseError),
}

/// Outcome of one feed in one refresh cycle.
///
/// Carries the source for correlation and either the extracted feed or the
/// error that stopped it.
#[derive(Debug)]
pub struct FeedResult {
    pub source: FeedSource,
    pub result: Result<ExtractedFeed, FeedError>,
}

impl FeedResult {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Fetches, parses and extracts one feed.
///
/// Never fails: transport errors and invalid documents are captured in the
/// returned [`FeedResult`], which makes this the unit of failure isolation
/// for the aggregator.
pub async fn fetch_feed<T: Transport>(
    transport: &T,
    source: &FeedSource,
    options: &ExtractOptions,
) -> FeedResult {
    let result = fetch_and_extract(transport, source, options).await;

    match &result {
        Ok(feed) => tracing::debug!(
            feed = %source.url,
            title = %feed.feed_title,
            items = feed.items.len(),
            "Feed extracted"
        ),
        Err(e) => tracing::warn!(feed = %source.url, error = %e, "Feed failed"),
    }

    FeedResult {
        source: source.clone(),
        result,
    }
}

async fn fetch_and_extract<T: Transport>(
    transport: &T,
    source: &FeedSource,
    options: &ExtractOptions,
) -> Result<ExtractedFeed, FeedError> {
    let text = transport.fetch_text(&source.url).await?;

    // The document lives only for the duration of extraction.
    let document = Document::parse(&text)?;
    let base = Url::parse(&source.url).ok();
    Ok(extract(document.root(), base.as_ref(), options))
}
