use serde::{Deserialize, Serialize};

/// Column labels of the metrics table. Read from the snapshot because the
/// "Since <year>" label moves every year.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsHeader {
    pub metric: String,
    pub all: String,
    pub since: String,
}

impl MetricsHeader {
    pub fn new(metric: impl Into<String>, all: impl Into<String>, since: impl Into<String>) -> Self {
        Self {
            metric: metric.into(),
            all: all.into(),
            since: since.into(),
        }
    }

    /// Used when the snapshot does not expose at least three header cells.
    pub fn fallback() -> Self {
        Self::new("Metric", "All", "Since")
    }

    /// First three header cells verbatim, or the fallback triple.
    pub fn from_cells(cells: &[String]) -> Self {
        match cells {
            [metric, all, since, ..] => Self::new(metric.as_str(), all.as_str(), since.as_str()),
            _ => Self::fallback(),
        }
    }

    pub fn as_record(&self) -> [&str; 3] {
        [&self.metric, &self.all, &self.since]
    }
}

impl Default for MetricsHeader {
    fn default() -> Self {
        Self::fallback()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricRow {
    pub name: String,
    pub all: String,
    pub since: String,
}

impl MetricRow {
    pub fn new(name: impl Into<String>, all: impl Into<String>, since: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            all: all.into(),
            since: since.into(),
        }
    }

    /// A metrics row has exactly three cells; anything else is malformed.
    pub fn from_cells(cells: Vec<String>) -> Option<Self> {
        let [name, all, since]: [String; 3] = cells.try_into().ok()?;
        Some(Self { name, all, since })
    }

    pub fn as_record(&self) -> [&str; 3] {
        [&self.name, &self.all, &self.since]
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsTable {
    pub header: MetricsHeader,
    pub rows: Vec<MetricRow>,
}

impl MetricsTable {
    pub fn new(header: MetricsHeader, rows: Vec<MetricRow>) -> Self {
        Self { header, rows }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&MetricRow> {
        self.rows.iter().find(|r| r.name == name)
    }
}
