//! News ingestion
//!
//! Pulls articles from RSS feeds and runs each one through the
//! classification pipeline in [`processor`].

pub mod processor;
pub mod rss;


pub use processor::{BatchReport, ItemOutcome, NewsProcessor, ProcessorSettings, Stage};
pub use rss::RssSource;

use crate::error::Result;
use crate::types::{Fingerprint, NewsItem};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Anything that yields the latest batch of articles.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NewsSource: Send + Sync {
    fn name(&self) -> String;

    async fn fetch_latest(&self) -> Result<Vec<NewsItem>>;
}

/// Fetch every source. A failing feed is logged and skipped.
pub async fn collect(sources: &[Arc<dyn NewsSource>]) -> Vec<NewsItem> {
    let mut items = Vec::new();
    for source in sources {
        match source.fetch_latest().await {
            Ok(batch) => {
                tracing::debug!("📰 {} items from {}", batch.len(), source.name());
                items.extend(batch);
            }
            Err(e) => tracing::warn!("Feed {} unavailable: {}", source.name(), e),
        }
    }
    items
}

/// Lowercased alphanumeric words joined by single spaces.
pub fn normalize_title(title: &str) -> String {
    title
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| w.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Number of distinct feeds in the batch carrying the same headline,
/// keyed by each item's fingerprint.
pub fn source_counts(items: &[NewsItem]) -> HashMap<Fingerprint, u32> {
    let mut feeds_by_title: HashMap<String, HashSet<&str>> = HashMap::new();
    for item in items {
        feeds_by_title
            .entry(normalize_title(&item.title))
            .or_default()
            .insert(item.source.as_str());
    }

    items
        .iter()
        .map(|item| {
            let count = feeds_by_title
                .get(&normalize_title(&item.title))
                .map(|feeds| feeds.len() as u32)
                .unwrap_or(1);
            (item.fingerprint.clone(), count)
        })
        .collect()
}

/// Drop repeated fingerprints, keeping the first occurrence.
pub fn dedup_batch(items: Vec<NewsItem>) -> Vec<NewsItem> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.fingerprint.clone()))
        .collect()
}
