//! Fetches a configured set of RSS and Atom feeds, normalizes their entries
//! and lays them out grouped per feed or merged into one timeline.

pub mod config;
pub mod feed;
pub mod render;
pub mod util;
