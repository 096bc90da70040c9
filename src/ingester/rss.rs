//! RSS 2.0 feed source

use super::NewsSource;
use crate::error::Result;
use crate::types::NewsItem;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use quick_xml::de::from_str;
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

/// Summaries longer than this are cut at a char boundary
const MAX_SUMMARY_CHARS: usize = 600;

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    title: Option<String>,
    #[serde(rename = "item", default)]
    item: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    description: Option<String>,
}

pub struct RssSource {
    http: Client,
    url: String,
}

impl RssSource {
    pub fn new(url: impl Into<String>, timeout_secs: u64) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent("news-signal-bot/0.1")
            .build()?;
        Ok(Self {
            http,
            url: url.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl NewsSource for RssSource {
    fn name(&self) -> String {
        self.url.clone()
    }

    async fn fetch_latest(&self) -> Result<Vec<NewsItem>> {
        let body = self
            .http
            .get(&self.url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        parse_feed(&body)
    }
}

/// Parse an RSS document. Items without a title or link are skipped; the
/// channel title becomes each item's source.
pub fn parse_feed(xml: &str) -> Result<Vec<NewsItem>> {
    let rss: Rss = from_str(xml)?;
    let source = rss
        .channel
        .title
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| "Unknown".to_string());

    let items = rss
        .channel
        .item
        .into_iter()
        .filter_map(|it| {
            let title = it.title.map(|t| strip_html(&t))?;
            let link = it.link.map(|l| l.trim().to_string())?;
            if title.is_empty() || link.is_empty() {
                return None;
            }
            let summary = it
                .description
                .as_deref()
                .map(strip_html)
                .map(|s| truncate_chars(&s, MAX_SUMMARY_CHARS))
                .unwrap_or_default();
            Some(NewsItem::new(
                title,
                summary,
                source.clone(),
                link,
                it.pub_date.unwrap_or_default(),
            ))
        })
        .collect();

    Ok(items)
}

static TAGS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)</?[^>]+>").expect("tag pattern"));
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("whitespace pattern"));

/// Plain text from an HTML fragment: tags dropped, entities decoded,
/// whitespace collapsed.
pub fn strip_html(html: &str) -> String {
    let text = TAGS.replace_all(html, " ");
    let decoded = html_escape::decode_html_entities(&text);
    WHITESPACE.replace_all(&decoded, " ").trim().to_string()
}

fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => format!("{}…", s[..idx].trim_end()),
        None => s.to_string(),
    }
}
