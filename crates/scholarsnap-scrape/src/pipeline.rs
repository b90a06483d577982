//! RESOLVE → ACQUIRE_AND_PARSE → report, with origin fallback and the
//! strict / lenient failure policy.

use chrono::Utc;
use scholarsnap_core::config::ApiMode;
use scholarsnap_core::{
    AppConfig, CitationHistory, MetricsTable, ProfileReport, Publication, PublicationSet,
    SnapshotOrigin,
};
use tracing::{error, info, warn};

use crate::error::{ErrorKind, Result, ScrapeError};
use crate::extract::serpapi::{MAX_PAGE_SIZE, SerpApiProfile};
use crate::http::{BrowserClient, RequestKind};
use crate::paginate::{PageSettings, Paginator};
use crate::profile::ProfileUrl;
use crate::resolver::{Origin, SourcePlan, resolve};
use crate::snapshot::Snapshot;

/// What happens to an unrecoverable error at the end of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Propagate, so the process exits nonzero.
    Strict,
    /// Log and finish successfully, leaving previous outputs untouched.
    #[default]
    Lenient,
}

impl FailurePolicy {
    pub fn from_strict(strict: bool) -> Self {
        if strict {
            FailurePolicy::Strict
        } else {
            FailurePolicy::Lenient
        }
    }
}

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub profile: ProfileUrl,
    pub sources: SourcePlan,
    pub pages: PageSettings,
    pub api: Option<SerpApiProfile>,
    pub policy: FailurePolicy,
}

impl PipelineSettings {
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        config.validate()?;
        let profile = ProfileUrl::parse(&config.profile.url)?;
        let api_key = config.resolve_api_key();

        let sources = SourcePlan {
            local_path: config.snapshot.html_file.clone(),
            prefer_local: config.snapshot.prefer_html,
            live: config.snapshot.live,
            api_mode: config.api.mode,
            api_key_present: api_key.is_some(),
            api_key_env: config.api.key_env.clone(),
        };
        let api = api_key
            .filter(|_| config.api.mode != ApiMode::Off)
            .map(|key| SerpApiProfile::new(&config.api.base_url, &profile, key));

        Ok(Self {
            profile,
            sources,
            pages: PageSettings::from_config(&config.pagination),
            api,
            policy: FailurePolicy::from_strict(config.strict),
        })
    }
}

/// Record sets extracted from one snapshot.
struct Extracted {
    origin: SnapshotOrigin,
    metrics: MetricsTable,
    history: CitationHistory,
    rows: Vec<Publication>,
}

pub struct Pipeline {
    settings: PipelineSettings,
    client: BrowserClient,
}

impl Pipeline {
    pub fn new(settings: PipelineSettings, client: BrowserClient) -> Self {
        let client = client.with_accept_language(settings.profile.accept_language());
        Self { settings, client }
    }

    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let settings = PipelineSettings::from_config(config)?;
        let client = BrowserClient::from_config(&config.fetch)?;
        Ok(Self::new(settings, client))
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Runs the pipeline, then applies the configured [`FailurePolicy`].
    pub async fn execute(&self) -> Result<Option<ProfileReport>> {
        apply_policy(self.run().await, self.settings.policy)
    }

    /// Tries every resolved origin in order until one yields metrics and history.
    pub async fn run(&self) -> Result<ProfileReport> {
        let origins = resolve(&self.settings.sources)?;
        info!(
            "Snapshot origins for user {}: {}",
            self.settings.profile.user(),
            origins
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(" -> ")
        );

        let mut last_error = None;
        for (idx, origin) in origins.iter().enumerate() {
            info!("Acquiring snapshot from {origin}");
            match self.acquire(origin).await {
                Ok(extracted) => {
                    let publications = self.collect_publications(origin, extracted.rows).await;
                    info!(
                        "Run complete via {}: {} metrics, {} history years, {} publications",
                        extracted.origin,
                        extracted.metrics.rows.len(),
                        extracted.history.len(),
                        publications.len()
                    );
                    return Ok(ProfileReport {
                        origin: extracted.origin,
                        fetched_at: Utc::now(),
                        metrics: extracted.metrics,
                        history: extracted.history,
                        publications,
                    });
                }
                Err(err) if err.kind() == ErrorKind::Configuration => return Err(err),
                Err(err) => {
                    warn!("{origin} failed ({} error): {err}", err.kind());
                    if let Some(next) = origins.get(idx + 1) {
                        info!("Falling back to {next}");
                    }
                    last_error = Some(err);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            ScrapeError::Configuration("no snapshot origin to try".to_string())
        }))
    }

    async fn acquire(&self, origin: &Origin) -> Result<Extracted> {
        let snapshot = match origin {
            Origin::Local { path, .. } => {
                info!("Loading local snapshot: {}", path.display());
                Snapshot::load_local(path)?
            }
            Origin::Live => {
                let body = self.client.fetch(self.settings.profile.as_str()).await?;
                Snapshot::from_html(SnapshotOrigin::LiveFetch, &body)
            }
            Origin::StructuredApi => {
                let api = self.api()?;
                let url = api.page_url(0, self.api_pages().page_size);
                let body = self
                    .client
                    .fetch_with(&url, self.client.retry_policy(), RequestKind::Api)
                    .await?;
                Snapshot::from_api_body(&body)?
            }
        };
        extract(&snapshot)
    }

    /// Full publication list for the origin that produced the snapshot, or the
    /// snapshot's own rows when pagination is unavailable or fails.
    async fn collect_publications(&self, origin: &Origin, primary: Vec<Publication>) -> Vec<Publication> {
        let walked = match origin {
            Origin::Live | Origin::Local { preferred: true, .. } if self.settings.sources.live => {
                let paginator = Paginator::new(&self.client, self.settings.pages.clone());
                Some(paginator.fetch_all(&self.settings.profile).await)
            }
            Origin::StructuredApi => match self.settings.api.as_ref() {
                Some(api) if primary.len() >= self.api_pages().page_size => {
                    let paginator = Paginator::new(&self.client, self.api_pages());
                    let seed: PublicationSet = primary.iter().cloned().collect();
                    Some(paginator.fetch_from(api, seed, 1).await)
                }
                _ => None,
            },
            _ => None,
        };

        match walked {
            Some(Ok(rows)) if !rows.is_empty() => rows,
            Some(Ok(_)) => {
                warn!("Pagination found no publications. Falling back to snapshot rows.");
                dedup(primary)
            }
            Some(Err(err)) => {
                warn!("Could not fetch full publication list: {err}. Falling back to snapshot rows.");
                dedup(primary)
            }
            None => dedup(primary),
        }
    }

    fn api(&self) -> Result<&SerpApiProfile> {
        self.settings.api.as_ref().ok_or_else(|| {
            ScrapeError::Configuration("structured API origin without credentials".to_string())
        })
    }

    fn api_pages(&self) -> PageSettings {
        let mut pages = self.settings.pages.clone();
        pages.page_size = pages.page_size.min(MAX_PAGE_SIZE);
        pages
    }
}

fn extract(snapshot: &Snapshot) -> Result<Extracted> {
    let extractor = snapshot.extractor();
    let metrics = extractor.metrics()?;
    let history = extractor.history()?;
    if history.is_empty() {
        warn!("No citation history in {} snapshot", snapshot.origin());
    }
    let rows = extractor.publications().unwrap_or_else(|err| {
        warn!("Could not read publication rows from snapshot: {err}");
        Vec::new()
    });
    info!(
        "Parsed {} snapshot with the {} extractor: {} metrics, {} history years (ascending), {} publication rows",
        snapshot.origin(),
        extractor.format(),
        metrics.rows.len(),
        history.len(),
        rows.len()
    );
    Ok(Extracted {
        origin: snapshot.origin(),
        metrics,
        history,
        rows,
    })
}

fn dedup(rows: Vec<Publication>) -> Vec<Publication> {
    rows.into_iter().collect::<PublicationSet>().into_vec()
}

/// Configuration errors always propagate. Any other error propagates under
/// [`FailurePolicy::Strict`] and is logged and swallowed otherwise.
pub fn apply_policy(
    result: Result<ProfileReport>,
    policy: FailurePolicy,
) -> Result<Option<ProfileReport>> {
    match result {
        Ok(report) => Ok(Some(report)),
        Err(err) if err.kind() == ErrorKind::Configuration => {
            error!("{err}");
            Err(err)
        }
        Err(err) => {
            error!("{err}");
            match policy {
                FailurePolicy::Strict => Err(err),
                FailurePolicy::Lenient => {
                    warn!("Non-strict mode: leaving existing CSVs unchanged.");
                    Ok(None)
                }
            }
        }
    }
}
