//! Feed pipeline: retrieval, parsing, extraction and aggregation of RSS and
//! Atom feeds.
//!
//! # Architecture
//!
//! - [`document`] - Safe XML parsing into a read-only element tree
//! - [`extractor`] - Turns a feed tree into normalized, newest-first items
//! - [`image`] - Picks a representative image for an entry
//! - [`date`] - Lenient timestamp parsing for RSS and Atom dates
//! - [`transport`] - HTTP retrieval through an optional URL-prefix proxy
//! - [`fetcher`] - One feed end to end, with failures captured per feed
//! - [`aggregate`] - One refresh cycle over all feeds, grouped or merged
//!
//! # Example
//!
//! ```ignore
//! use feedboard::feed::{aggregate, AggregateOptions, FeedSource, ProxyTransport};
//!
//! let transport = ProxyTransport::new(reqwest::Client::new());
//! let sources = vec![FeedSource::new("https://nrkbeta.no/feed/")];
//! let result = aggregate(&transport, &sources, &AggregateOptions::default()).await;
//! println!("{}", result.status_line());
//! ```

pub mod aggregate;
pub mod date;
pub mod document;
pub mod extractor;
pub mod fetcher;
pub mod image;
pub mod model;
pub mod transport;

pub use aggregate::{aggregate, compose, AggregateOptions};
pub use document::{Document, Element, FeedNode, ParseError};
pub use extractor::{extract, ExtractOptions, DEFAULT_SNIPPET_CHARS};
pub use fetcher::{fetch_feed, FeedError, FeedResult};
pub use image::resolve_image;
pub use model::{
    AggregateResult, AggregateView, ExtractedFeed, FeedGroup, FeedItem, FeedSource, OrderingMode,
};
pub use transport::{ProxyTransport, Transport, TransportError, DEFAULT_PROXY};
