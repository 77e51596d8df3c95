//! Patchfeed - a Windows/Cloud update news aggregator
//!
//! This crate fetches update announcements from RSS sources into a
//! flat JSON file cache and serves aggregated views of it (latest,
//! facets, stats) over HTTP as JSON.

pub mod aggregate;
pub mod categories;
pub mod config;
pub mod fetcher;
pub mod routes;
pub mod store;
