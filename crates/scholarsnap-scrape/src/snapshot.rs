use std::path::Path;

use scholarsnap_core::{CitationHistory, MetricsTable, Publication, SnapshotOrigin};

use crate::error::{Result, ScrapeError};
use crate::extract::html::HtmlSnapshot;
use crate::extract::serpapi::SerpApiPayload;

/// Turns one snapshot format into the normalized record sets.
pub trait ProfileExtractor {
    /// Short name of the format, for logs.
    fn format(&self) -> &'static str;

    /// Metrics rows plus the header the snapshot actually carries.
    fn metrics(&self) -> Result<MetricsTable>;

    /// Always ascending by year, whatever order the snapshot uses.
    fn history(&self) -> Result<CitationHistory>;

    /// Publication rows in snapshot order, not deduplicated.
    fn publications(&self) -> Result<Vec<Publication>>;
}

/// A parsed document plus where it came from.
pub struct Snapshot {
    origin: SnapshotOrigin,
    extractor: Box<dyn ProfileExtractor>,
}

impl Snapshot {
    pub fn new(origin: SnapshotOrigin, extractor: Box<dyn ProfileExtractor>) -> Self {
        Self { origin, extractor }
    }

    pub fn from_html(origin: SnapshotOrigin, html: &str) -> Self {
        Self::new(origin, Box::new(HtmlSnapshot::parse(html)))
    }

    pub fn from_api_body(body: &str) -> Result<Self> {
        let payload = SerpApiPayload::parse(body)?;
        Ok(Self::new(SnapshotOrigin::StructuredApi, Box::new(payload)))
    }

    /// Reads a saved profile page. Invalid UTF-8 is replaced, not rejected.
    pub fn load_local(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path).map_err(|source| ScrapeError::LocalSnapshot {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::from_html(
            SnapshotOrigin::LocalFile,
            &String::from_utf8_lossy(&bytes),
        ))
    }

    pub fn origin(&self) -> SnapshotOrigin {
        self.origin
    }

    pub fn extractor(&self) -> &dyn ProfileExtractor {
        self.extractor.as_ref()
    }
}
