//! CSV output for a [`ProfileReport`].
//!
//! All three files are staged as temporary files in the output directory and
//! only moved over the previous outputs once every one of them was written.

use std::path::{Path, PathBuf};

use csv::{Terminator, WriterBuilder};
use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::{CoreError, Result};
use crate::models::ProfileReport;

pub const STATS_FILE: &str = "publications_stats.csv";
pub const HISTORY_FILE: &str = "citation_history.csv";
pub const PUBLICATIONS_FILE: &str = "publications.csv";

pub const HISTORY_HEADER: [&str; 2] = ["Year", "Citations"];
pub const PUBLICATIONS_HEADER: [&str; 5] = ["Title", "Authors", "Venue", "Year", "Citations"];

#[cfg(windows)]
const LINE_TERMINATOR: Terminator = Terminator::CRLF;
#[cfg(not(windows))]
const LINE_TERMINATOR: Terminator = Terminator::Any(b'\n');

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPaths {
    pub stats: PathBuf,
    pub history: PathBuf,
    pub publications: PathBuf,
}

impl OutputPaths {
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            stats: dir.join(STATS_FILE),
            history: dir.join(HISTORY_FILE),
            publications: dir.join(PUBLICATIONS_FILE),
        }
    }

    pub fn all(&self) -> [&Path; 3] {
        [&self.stats, &self.history, &self.publications]
    }
}

/// Writes `publications_stats.csv`, `citation_history.csv` and `publications.csv`.
pub fn write_report(out_dir: &Path, report: &ProfileReport) -> Result<OutputPaths> {
    std::fs::create_dir_all(out_dir)?;
    let paths = OutputPaths::in_dir(out_dir);

    let stats = stage(
        out_dir,
        report.metrics.header.as_record(),
        report.metrics.rows.iter().map(|r| r.as_record()),
    )?;
    let history = stage(
        out_dir,
        HISTORY_HEADER,
        report.history.iter().map(|p| p.as_record()),
    )?;
    let publications = stage(
        out_dir,
        PUBLICATIONS_HEADER,
        report.publications.iter().map(|p| p.as_record()),
    )?;

    for target in paths.all() {
        ensure_replaceable(target)?;
    }
    for (staged, target) in [stats, history, publications].into_iter().zip(paths.all()) {
        staged.persist(target).map_err(|e| CoreError::Io(e.error))?;
        debug!(path = %target.display(), "persisted");
    }
    Ok(paths)
}

/// A target must be absent or a plain file before any file is moved into place.
fn ensure_replaceable(target: &Path) -> Result<()> {
    match std::fs::symlink_metadata(target) {
        Ok(meta) if meta.is_dir() => Err(CoreError::Io(std::io::Error::other(format!(
            "cannot replace {}: it is a directory",
            target.display()
        )))),
        Ok(_) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err.into()),
    }
}

fn stage<H, I, R>(dir: &Path, header: H, rows: I) -> Result<NamedTempFile>
where
    H: IntoIterator,
    H::Item: AsRef<[u8]>,
    I: IntoIterator<Item = R>,
    R: IntoIterator,
    R::Item: AsRef<[u8]>,
{
    let mut file = NamedTempFile::new_in(dir)?;
    {
        let mut writer = WriterBuilder::new()
            .terminator(LINE_TERMINATOR)
            .from_writer(&mut file);
        writer.write_record(header)?;
        for row in rows {
            writer.write_record(row)?;
        }
        writer.flush()?;
    }
    Ok(file)
}
