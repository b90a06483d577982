use reqwest::Url;
use scholarsnap_core::Publication;

use crate::error::{Result, ScrapeError};
use crate::extract::html;
use crate::http::RequestKind;
use crate::paginate::PageSource;

const DEFAULT_LANGUAGE: &str = "en";

/// A Scholar profile URL: `.../citations?user=<id>&hl=<lang>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileUrl {
    raw: String,
    origin: String,
    user: String,
    hl: String,
}

impl ProfileUrl {
    pub fn parse(raw: &str) -> Result<Self> {
        let url = Url::parse(raw.trim())
            .map_err(|e| ScrapeError::Configuration(format!("invalid profile URL {raw}: {e}")))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ScrapeError::Configuration(format!(
                "profile URL must be http(s): {raw}"
            )));
        }

        let param = |name: &str| {
            url.query_pairs()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let user = param("user").ok_or_else(|| {
            ScrapeError::Configuration(format!("profile URL has no user=<id> parameter: {raw}"))
        })?;
        let hl = param("hl").unwrap_or_else(|| DEFAULT_LANGUAGE.to_string());

        Ok(Self {
            raw: raw.trim().to_string(),
            origin: url.origin().ascii_serialization(),
            user,
            hl,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn hl(&self) -> &str {
        &self.hl
    }

    /// Default listing view for one page of publications.
    pub fn listing_url(&self, offset: usize, page_size: usize) -> String {
        format!(
            "{}/citations?user={}&hl={}&cstart={offset}&pagesize={page_size}",
            self.origin,
            urlencoding::encode(&self.user),
            urlencoding::encode(&self.hl),
        )
    }

    /// Explicit list view; the site renders different markup for it.
    pub fn list_works_url(&self, offset: usize, page_size: usize) -> String {
        format!(
            "{}&view_op=list_works",
            self.listing_url(offset, page_size)
        )
    }

    pub fn accept_language(&self) -> String {
        match self.hl.as_str() {
            "en" => "en-US,en;q=0.9".to_string(),
            hl => format!("{hl},en;q=0.8"),
        }
    }
}

impl PageSource for ProfileUrl {
    fn label(&self) -> &'static str {
        "profile listing"
    }

    fn request_kind(&self) -> RequestKind {
        RequestKind::Page
    }

    fn page_urls(&self, offset: usize, page_size: usize) -> Vec<String> {
        vec![
            self.listing_url(offset, page_size),
            self.list_works_url(offset, page_size),
        ]
    }

    fn parse_page(&self, body: &str) -> Result<Vec<Publication>> {
        html::HtmlSnapshot::parse(body).publication_rows()
    }
}
