use std::fmt;
use std::path::PathBuf;

use scholarsnap_core::SnapshotOrigin;
use scholarsnap_core::config::ApiMode;

use crate::error::{Result, ScrapeError};

/// One place a snapshot can be obtained from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Origin {
    /// A saved profile page. `preferred` when it was asked for before any network access.
    Local { path: PathBuf, preferred: bool },
    Live,
    StructuredApi,
}

impl Origin {
    pub fn snapshot_origin(&self) -> SnapshotOrigin {
        match self {
            Origin::Local { .. } => SnapshotOrigin::LocalFile,
            Origin::Live => SnapshotOrigin::LiveFetch,
            Origin::StructuredApi => SnapshotOrigin::StructuredApi,
        }
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Origin::Local { path, preferred: true } => write!(f, "local snapshot {}", path.display()),
            Origin::Local { path, preferred: false } => {
                write!(f, "local snapshot {} (fallback)", path.display())
            }
            Origin::Live => write!(f, "live fetch"),
            Origin::StructuredApi => write!(f, "structured API"),
        }
    }
}

/// What the resolver needs to know about the run.
#[derive(Debug, Clone, Default)]
pub struct SourcePlan {
    pub local_path: Option<PathBuf>,
    pub prefer_local: bool,
    pub live: bool,
    pub api_mode: ApiMode,
    pub api_key_present: bool,
    /// Environment variable named in configuration errors.
    pub api_key_env: String,
}

/// Ordered list of origins to try.
///
/// A preferred local snapshot goes first. Otherwise live fetching goes first and
/// a local snapshot or the structured API only serve as fallbacks. A plan
/// without any origin is a configuration error, not a doomed network call.
pub fn resolve(plan: &SourcePlan) -> Result<Vec<Origin>> {
    if plan.api_mode != ApiMode::Off && !plan.api_key_present {
        let env = if plan.api_key_env.is_empty() {
            "the API key variable"
        } else {
            plan.api_key_env.as_str()
        };
        return Err(ScrapeError::Configuration(format!(
            "structured API mode '{}' requires a credential (--api-key or ${env})",
            plan.api_mode
        )));
    }
    if plan.prefer_local && plan.local_path.is_none() {
        return Err(ScrapeError::Configuration(
            "a preferred local snapshot was requested without a snapshot path".to_string(),
        ));
    }

    let mut origins = Vec::new();
    if let (Some(path), true) = (&plan.local_path, plan.prefer_local) {
        origins.push(Origin::Local {
            path: path.clone(),
            preferred: true,
        });
    }

    if plan.api_mode == ApiMode::Only {
        origins.push(Origin::StructuredApi);
        return Ok(origins);
    }

    if plan.live {
        origins.push(Origin::Live);
    }
    if let (Some(path), false) = (&plan.local_path, plan.prefer_local) {
        origins.push(Origin::Local {
            path: path.clone(),
            preferred: false,
        });
    }
    if plan.api_mode == ApiMode::Fallback {
        origins.push(Origin::StructuredApi);
    }

    if origins.is_empty() {
        return Err(ScrapeError::Configuration(
            "no snapshot origin: live fetching is disabled and no local snapshot or API fallback is configured"
                .to_string(),
        ));
    }
    Ok(origins)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn plan() -> SourcePlan {
        SourcePlan {
            live: true,
            api_key_env: "SERPAPI_API_KEY".into(),
            ..Default::default()
        }
    }

    fn local(preferred: bool) -> Origin {
        Origin::Local {
            path: PathBuf::from("snapshot.html"),
            preferred,
        }
    }

    #[test]
    fn live_only_by_default() {
        assert_eq!(resolve(&plan()).unwrap(), [Origin::Live]);
    }

    #[test]
    fn preferred_local_goes_first() {
        let mut p = plan();
        p.local_path = Some(PathBuf::from("snapshot.html"));
        p.prefer_local = true;
        p.live = false;
        assert_eq!(resolve(&p).unwrap(), [local(true)]);

        p.live = true;
        assert_eq!(resolve(&p).unwrap(), [local(true), Origin::Live]);
    }

    #[test]
    fn unpreferred_local_is_block_recovery() {
        let mut p = plan();
        p.local_path = Some(PathBuf::from("snapshot.html"));
        assert_eq!(resolve(&p).unwrap(), [Origin::Live, local(false)]);
    }

    #[test]
    fn api_fallback_and_only() {
        let mut p = plan();
        p.api_key_present = true;
        p.api_mode = ApiMode::Fallback;
        assert_eq!(resolve(&p).unwrap(), [Origin::Live, Origin::StructuredApi]);

        p.api_mode = ApiMode::Only;
        assert_eq!(resolve(&p).unwrap(), [Origin::StructuredApi]);
    }

    #[test]
    fn api_without_credential_fails_fast() {
        let mut p = plan();
        p.api_mode = ApiMode::Only;
        let err = resolve(&p).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(err.to_string().contains("SERPAPI_API_KEY"));
    }

    #[test]
    fn nothing_to_try_is_configuration_error() {
        let mut p = plan();
        p.live = false;
        assert_eq!(resolve(&p).unwrap_err().kind(), ErrorKind::Configuration);
    }

    #[test]
    fn prefer_without_path_is_configuration_error() {
        let mut p = plan();
        p.prefer_local = true;
        assert_eq!(resolve(&p).unwrap_err().kind(), ErrorKind::Configuration);
    }
}
