pub mod history;
pub mod metrics;
pub mod publication;
pub mod report;

pub use history::{CitationHistory, YearCount, numeric_year};
pub use metrics::{MetricRow, MetricsHeader, MetricsTable};
pub use publication::{Publication, PublicationSet};
pub use report::{ProfileReport, SnapshotOrigin};
