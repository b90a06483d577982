//! SerpApi `google_scholar_author` payloads.
//!
//! `cited_by.table` is a list of single-key maps (`citations`, `h_index`,
//! `i10_index`), each holding `all` and a `since_<year>` key whose name changes
//! every year. `cited_by.graph` lists `{year, citations}` newest first.

use once_cell::sync::Lazy;
use regex::Regex;
use scholarsnap_core::{CitationHistory, MetricRow, MetricsHeader, MetricsTable, Publication};
use serde_json::Value;

use crate::error::{Result, ScrapeError};
use crate::http::RequestKind;
use crate::paginate::PageSource;
use crate::profile::ProfileUrl;
use crate::snapshot::ProfileExtractor;

/// Largest `num` the author engine accepts.
pub const MAX_PAGE_SIZE: usize = 100;

static SINCE_KEY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^since_(\d{4})$").expect("valid regex"));

pub struct SerpApiPayload {
    value: Value,
}

impl SerpApiPayload {
    pub fn parse(body: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(body)
            .map_err(|e| ScrapeError::Parse(format!("invalid API payload: {e}")))?;
        Self::from_value(value)
    }

    pub fn from_value(value: Value) -> Result<Self> {
        if let Some(message) = value.get("error").and_then(Value::as_str) {
            return Err(ScrapeError::Api(message.to_string()));
        }
        if !value.is_object() {
            return Err(ScrapeError::parse("API payload is not a JSON object"));
        }
        Ok(Self { value })
    }

    pub fn metrics_table(&self) -> Result<MetricsTable> {
        let table = self
            .value
            .pointer("/cited_by/table")
            .and_then(Value::as_array)
            .ok_or_else(|| ScrapeError::parse("API payload has no cited_by.table"))?;

        let since_key = table.iter().find_map(since_key_of);
        let header = match since_key.as_deref().and_then(since_year) {
            Some(year) => MetricsHeader::new("", "All", format!("Since {year}")),
            None => MetricsHeader::fallback(),
        };

        let mut rows = Vec::new();
        for entry in table {
            let Some((name, values)) = entry.as_object().and_then(|o| o.iter().next()) else {
                continue;
            };
            let since = since_key
                .as_deref()
                .map(|key| scalar_text(values.get(key)))
                .unwrap_or_default();
            rows.push(MetricRow::new(
                display_metric_name(name),
                scalar_text(values.get("all")),
                since,
            ));
        }

        if rows.is_empty() {
            return Err(ScrapeError::parse(
                "API cited_by.table present, but no metrics rows parsed",
            ));
        }
        Ok(MetricsTable::new(header, rows))
    }

    pub fn citation_history(&self) -> Result<CitationHistory> {
        let graph = self
            .value
            .pointer("/cited_by/graph")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();
        Ok(CitationHistory::from_pairs(graph.iter().map(|point| {
            (
                scalar_text(point.get("year")),
                scalar_text(point.get("citations")),
            )
        })))
    }

    pub fn articles(&self) -> Result<Vec<Publication>> {
        let articles = self
            .value
            .get("articles")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();
        Ok(articles
            .iter()
            .map(|article| {
                let citations = scalar_text(article.pointer("/cited_by/value"));
                Publication {
                    title: scalar_text(article.get("title")),
                    authors: scalar_text(article.get("authors")),
                    venue: scalar_text(article.get("publication")),
                    year: scalar_text(article.get("year")),
                    citations: if citations.is_empty() {
                        "0".to_string()
                    } else {
                        citations
                    },
                }
            })
            .collect())
    }
}

impl ProfileExtractor for SerpApiPayload {
    fn format(&self) -> &'static str {
        "serpapi"
    }

    fn metrics(&self) -> Result<MetricsTable> {
        self.metrics_table()
    }

    fn history(&self) -> Result<CitationHistory> {
        self.citation_history()
    }

    fn publications(&self) -> Result<Vec<Publication>> {
        self.articles()
    }
}

// ─── Requests ────────────────────────────────────────────────────────────────

/// Author-engine requests for one profile.
#[derive(Debug, Clone)]
pub struct SerpApiProfile {
    base_url: String,
    author_id: String,
    hl: String,
    api_key: String,
}

impl SerpApiProfile {
    pub fn new(base_url: &str, profile: &ProfileUrl, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.to_string(),
            author_id: profile.user().to_string(),
            hl: profile.hl().to_string(),
            api_key: api_key.into(),
        }
    }

    pub fn page_url(&self, start: usize, num: usize) -> String {
        let separator = if self.base_url.contains('?') { '&' } else { '?' };
        format!(
            "{}{separator}engine=google_scholar_author&author_id={}&hl={}&start={start}&num={}&api_key={}",
            self.base_url,
            urlencoding::encode(&self.author_id),
            urlencoding::encode(&self.hl),
            num.clamp(1, MAX_PAGE_SIZE),
            urlencoding::encode(&self.api_key),
        )
    }
}

impl PageSource for SerpApiProfile {
    fn label(&self) -> &'static str {
        "structured API articles"
    }

    fn request_kind(&self) -> RequestKind {
        RequestKind::Api
    }

    fn page_urls(&self, offset: usize, page_size: usize) -> Vec<String> {
        vec![self.page_url(offset, page_size)]
    }

    fn parse_page(&self, body: &str) -> Result<Vec<Publication>> {
        SerpApiPayload::parse(body)?.articles()
    }
}

fn since_key_of(entry: &Value) -> Option<String> {
    entry
        .as_object()?
        .values()
        .filter_map(Value::as_object)
        .flat_map(|values| values.keys())
        .find(|key| SINCE_KEY_RE.is_match(key))
        .cloned()
}

fn since_year(key: &str) -> Option<&str> {
    SINCE_KEY_RE
        .captures(key)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

fn display_metric_name(key: &str) -> String {
    match key {
        "citations" => "Citations".to_string(),
        "h_index" => "h-index".to_string(),
        "i10_index" => "i10-index".to_string(),
        other => other.to_string(),
    }
}

fn scalar_text(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    }
}
