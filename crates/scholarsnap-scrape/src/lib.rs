//! Acquisition and extraction of a Google Scholar author profile.

pub mod error;
pub mod extract;
pub mod http;
pub mod paginate;
pub mod pipeline;
pub mod profile;
pub mod resolver;
pub mod snapshot;

pub use error::{ErrorKind, Result, ScrapeError};
pub use http::{BrowserClient, RequestKind, RetryPolicy};
pub use paginate::{PageSettings, PageSource, Paginator};
pub use pipeline::{FailurePolicy, Pipeline, PipelineSettings, apply_policy};
pub use profile::ProfileUrl;
pub use resolver::{Origin, SourcePlan, resolve};
pub use snapshot::{ProfileExtractor, Snapshot};
