//! Snapshot formats. Each one implements [`crate::snapshot::ProfileExtractor`].

pub mod html;
pub mod serpapi;
