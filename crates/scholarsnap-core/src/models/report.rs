use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{CitationHistory, MetricsTable, Publication};

/// Where a snapshot came from. Only used for logging and the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotOrigin {
    LocalFile,
    LiveFetch,
    StructuredApi,
}

impl fmt::Display for SnapshotOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SnapshotOrigin::LocalFile => "local file",
            SnapshotOrigin::LiveFetch => "live fetch",
            SnapshotOrigin::StructuredApi => "structured API",
        };
        write!(f, "{s}")
    }
}

/// Everything one pipeline run produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileReport {
    pub origin: SnapshotOrigin,
    pub fetched_at: DateTime<Utc>,
    pub metrics: MetricsTable,
    pub history: CitationHistory,
    pub publications: Vec<Publication>,
}
