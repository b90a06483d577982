use std::fmt;
use std::path::PathBuf;

use scholarsnap_core::CoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("blocked by {url}: {reason}")]
    Blocked { url: String, reason: String },

    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("failed to fetch {url} after {attempts} attempt(s): {source}")]
    Fetch {
        url: String,
        attempts: u32,
        #[source]
        source: Box<ScrapeError>,
    },

    #[error("could not read snapshot {}: {source}", path.display())]
    LocalSnapshot {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parse error: {0}")]
    Parse(String),

    #[error("API error: {0}")]
    Api(String),

    #[error(transparent)]
    Core(#[from] CoreError),
}

/// The coarse error classes the pipeline makes fallback decisions on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Blocked,
    Fetch,
    Parse,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::Configuration => "configuration",
            ErrorKind::Blocked => "blocked",
            ErrorKind::Fetch => "fetch",
            ErrorKind::Parse => "parse",
        };
        write!(f, "{s}")
    }
}

impl ScrapeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ScrapeError::Configuration(_) | ScrapeError::Core(CoreError::Config(_)) => {
                ErrorKind::Configuration
            }
            ScrapeError::Blocked { .. } => ErrorKind::Blocked,
            ScrapeError::Parse(_) | ScrapeError::Api(_) => ErrorKind::Parse,
            ScrapeError::Status { .. }
            | ScrapeError::Http(_)
            | ScrapeError::Fetch { .. }
            | ScrapeError::LocalSnapshot { .. }
            | ScrapeError::Core(_) => ErrorKind::Fetch,
        }
    }

    /// Every HTTP-level failure is retried until the attempt budget runs out.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ScrapeError::Blocked { .. } | ScrapeError::Http(_) | ScrapeError::Status { .. }
        )
    }

    /// The error at the bottom of a [`ScrapeError::Fetch`] chain.
    pub fn root_cause(&self) -> &ScrapeError {
        match self {
            ScrapeError::Fetch { source, .. } => source.root_cause(),
            other => other,
        }
    }

    pub(crate) fn parse(msg: impl Into<String>) -> Self {
        ScrapeError::Parse(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, ScrapeError>;
