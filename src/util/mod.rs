//! Utility functions shared by the feed pipeline.
//!
//! - **Text**: control-character stripping, whitespace collapsing, snippets
//! - **URLs**: feed URL validation, link absolutization, image URL resolution

mod text;
mod urls;

pub use urls::{absolutize_link, host_of, resolve_url, validate_url, UrlValidationError};
pub use text::{collapse_whitespace, snippet_of, strip_control_chars, ELLIPSIS};
