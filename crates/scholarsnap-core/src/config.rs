use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

pub const DEFAULT_PROFILE_URL: &str = "https://scholar.google.com.pk/citations?hl=en&user=6ZB86uYAAAAJ";

/// Root configuration, loaded from `~/.config/scholarsnap/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Fail the run (nonzero exit) instead of keeping the previous CSVs.
    pub strict: bool,
    pub profile: ProfileConfig,
    pub fetch: FetchConfig,
    pub pagination: PaginationConfig,
    pub snapshot: SnapshotConfig,
    pub api: ApiConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileConfig {
    pub url: String,
    pub out_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub backoff_secs: f64,
    pub jitter_secs: f64,
    /// Replaces the built-in browser identity pool when non-empty.
    pub user_agents: Vec<String>,
    /// Appended to the built-in challenge-page phrases.
    pub block_phrases: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PaginationConfig {
    pub page_size: usize,
    pub max_pages: usize,
    pub page_retries: u32,
    pub page_backoff_secs: f64,
    pub delay_secs: f64,
    pub delay_jitter_secs: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapshotConfig {
    pub html_file: Option<PathBuf>,
    pub prefer_html: bool,
    /// Allow live requests to the profile site.
    pub live: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiMode {
    #[default]
    Off,
    Fallback,
    Only,
}

impl fmt::Display for ApiMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ApiMode::Off => "off",
            ApiMode::Fallback => "fallback",
            ApiMode::Only => "only",
        };
        write!(f, "{s}")
    }
}

impl FromStr for ApiMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "off" | "none" => Ok(ApiMode::Off),
            "fallback" => Ok(ApiMode::Fallback),
            "only" => Ok(ApiMode::Only),
            other => Err(format!("unknown API mode '{other}' (expected off, fallback or only)")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub mode: ApiMode,
    /// Environment variable holding the API credential.
    pub key_env: String,
    pub base_url: String,
    /// Explicit credential. Never written back out.
    #[serde(skip_serializing)]
    pub key: Option<String>,
}

// ─── Defaults ──────────────────────────────────────────────

impl Default for ProfileConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_PROFILE_URL.to_string(),
            out_dir: PathBuf::from("data"),
        }
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            max_retries: 3,
            backoff_secs: 5.0,
            jitter_secs: 0.7,
            user_agents: Vec::new(),
            block_phrases: Vec::new(),
        }
    }
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            page_size: 100,
            max_pages: 20,
            page_retries: 2,
            page_backoff_secs: 3.0,
            delay_secs: 1.5,
            delay_jitter_secs: 0.7,
        }
    }
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            html_file: None,
            prefer_html: false,
            live: true,
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            mode: ApiMode::Off,
            key_env: "SERPAPI_API_KEY".to_string(),
            base_url: "https://serpapi.com/search.json".to_string(),
            key: None,
        }
    }
}

// ─── Load / Save ───────────────────────────────────────────

impl AppConfig {
    /// Standard config file path: `~/.config/scholarsnap/config.toml`
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("scholarsnap")
            .join("config.toml")
    }

    /// Load config from the standard path, falling back to defaults if it doesn't exist.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    /// Load config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load an explicitly requested file. Unlike [`AppConfig::load_from`] a missing file is an error.
    pub fn load_required(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(CoreError::Config(format!(
                "config file not found: {}",
                path.display()
            )));
        }
        Self::load_from(path)
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<()> {
        if self.pagination.page_size == 0 {
            return Err(CoreError::Config("pagination.page_size must be at least 1".into()));
        }
        if self.fetch.max_retries == 0 || self.pagination.page_retries == 0 {
            return Err(CoreError::Config("retry budgets must be at least 1".into()));
        }
        let delays = [
            self.fetch.backoff_secs,
            self.fetch.jitter_secs,
            self.pagination.page_backoff_secs,
            self.pagination.delay_secs,
            self.pagination.delay_jitter_secs,
        ];
        if delays.iter().any(|d| !d.is_finite() || *d < 0.0) {
            return Err(CoreError::Config("delays must be non-negative seconds".into()));
        }
        Ok(())
    }

    /// Explicit key first, then the configured environment variable.
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api
            .key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| {
                std::env::var(&self.api.key_env)
                    .ok()
                    .filter(|k| !k.trim().is_empty())
            })
    }
}

impl FetchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Converts configured seconds into a [`Duration`], clamping bad values to zero.
pub fn secs(value: f64) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or(Duration::ZERO)
}
