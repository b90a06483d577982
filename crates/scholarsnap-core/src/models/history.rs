use std::collections::HashSet;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearCount {
    pub year: String,
    pub citations: String,
}

impl YearCount {
    pub fn new(year: impl Into<String>, citations: impl Into<String>) -> Self {
        Self {
            year: year.into(),
            citations: citations.into(),
        }
    }

    pub fn as_record(&self) -> [&str; 2] {
        [&self.year, &self.citations]
    }
}

/// Year label as a number, ignoring any non-digit characters.
pub fn numeric_year(label: &str) -> Option<u32> {
    let digits: String = label.chars().filter(char::is_ascii_digit).collect();
    digits.parse().ok()
}

/// Citations per year, always ascending by numeric year with one entry per year.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CitationHistory(Vec<YearCount>);

impl CitationHistory {
    /// Normalizes raw (year, count) pairs in whatever order the snapshot listed them.
    ///
    /// Pairs with an empty year are dropped, an empty count becomes `"0"`, the
    /// first occurrence of a year wins, and unparsable years sort as 0.
    pub fn from_pairs<I, Y, C>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (Y, C)>,
        Y: Into<String>,
        C: Into<String>,
    {
        let mut seen = HashSet::new();
        let mut points = Vec::new();
        for (year, citations) in pairs {
            let year = year.into().trim().to_string();
            if year.is_empty() {
                continue;
            }
            let key = numeric_year(&year)
                .map(|y| y.to_string())
                .unwrap_or_else(|| year.clone());
            if !seen.insert(key) {
                continue;
            }
            let citations = citations.into().trim().to_string();
            let citations = if citations.is_empty() {
                "0".to_string()
            } else {
                citations
            };
            points.push(YearCount { year, citations });
        }
        points.sort_by_key(|p| numeric_year(&p.year).unwrap_or(0));
        Self(points)
    }

    pub fn points(&self) -> &[YearCount] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &YearCount> {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sorts_descending_input_ascending() {
        let history = CitationHistory::from_pairs([("2023", "10"), ("2022", "4")]);
        assert_eq!(
            history.points(),
            &[YearCount::new("2022", "4"), YearCount::new("2023", "10")]
        );
    }

    #[test]
    fn drops_empty_years_and_duplicates() {
        let history = CitationHistory::from_pairs([
            ("2021", "3"),
            ("", "9"),
            ("2019", ""),
            ("2021", "5"),
            ("2020", "1"),
        ]);
        let years: Vec<_> = history.iter().map(|p| p.year.as_str()).collect();
        assert_eq!(years, ["2019", "2020", "2021"]);
        assert_eq!(history.points()[0].citations, "0");
        assert_eq!(history.points()[2].citations, "3");
    }

    #[test]
    fn strictly_ascending_for_shuffled_input() {
        let years = ["2018", "2024", "2015", "2020", "2016", "2024", "2019"];
        let history = CitationHistory::from_pairs(years.iter().map(|y| (*y, "1")));
        let numeric: Vec<u32> = history
            .iter()
            .map(|p| numeric_year(&p.year).unwrap())
            .collect();
        assert!(numeric.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(numeric.len(), 6);
    }

    #[test]
    fn numeric_year_strips_non_digits() {
        assert_eq!(numeric_year("\u{a0}2021 "), Some(2021));
        assert_eq!(numeric_year("n/a"), None);
    }
}
