use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// One row of the publication list. Fields are kept verbatim as rendered.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Publication {
    pub title: String,
    pub authors: String,
    pub venue: String,
    pub year: String,
    pub citations: String,
}

impl Publication {
    pub fn as_record(&self) -> [&str; 5] {
        [
            &self.title,
            &self.authors,
            &self.venue,
            &self.year,
            &self.citations,
        ]
    }
}

/// Publications keyed by title, first occurrence wins.
#[derive(Debug, Clone, Default)]
pub struct PublicationSet {
    seen: HashSet<String>,
    items: Vec<Publication>,
}

impl PublicationSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` for an empty title or a title already in the set.
    pub fn insert(&mut self, publication: Publication) -> bool {
        if publication.title.is_empty() || self.seen.contains(&publication.title) {
            return false;
        }
        self.seen.insert(publication.title.clone());
        self.items.push(publication);
        true
    }

    /// Inserts every row and returns how many were new.
    pub fn extend<I: IntoIterator<Item = Publication>>(&mut self, rows: I) -> usize {
        let mut added = 0;
        for row in rows {
            if self.insert(row) {
                added += 1;
            }
        }
        added
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn into_vec(self) -> Vec<Publication> {
        self.items
    }
}

impl FromIterator<Publication> for PublicationSet {
    fn from_iter<I: IntoIterator<Item = Publication>>(iter: I) -> Self {
        let mut set = Self::new();
        set.extend(iter);
        set
    }
}
