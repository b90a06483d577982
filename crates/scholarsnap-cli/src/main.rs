use std::path::PathBuf;
use std::time::Instant;

use anyhow::Result;
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use scholarsnap_core::config::ApiMode;
use scholarsnap_core::output::write_report;
use scholarsnap_core::{AppConfig, CoreError, ExitCode, ProfileReport};
use scholarsnap_scrape::{ErrorKind, FailurePolicy, Pipeline, ScrapeError};

// ─── CLI Definition ─────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "scholarsnap",
    about = "Snapshot a public Google Scholar profile into CSV files",
    version,
    long_about = None
)]
struct Cli {
    /// Public Google Scholar profile URL.
    #[arg(long)]
    profile_url: Option<String>,

    /// Output directory for the CSV files.
    #[arg(long)]
    out_dir: Option<PathBuf>,

    /// Local HTML snapshot of the profile page.
    #[arg(long)]
    html_file: Option<PathBuf>,

    /// Try the local snapshot before the network.
    #[arg(long)]
    prefer_html: bool,

    /// Never fetch the live profile page.
    #[arg(long)]
    offline: bool,

    /// Structured API usage: off, fallback or only.
    #[arg(long)]
    api_mode: Option<ApiMode>,

    /// Structured API key (otherwise read from the configured env var).
    #[arg(long)]
    api_key: Option<String>,

    /// Exit nonzero when every source fails.
    #[arg(long)]
    strict: bool,

    #[arg(long)]
    page_size: Option<usize>,

    #[arg(long)]
    max_pages: Option<usize>,

    /// Seconds to sleep between publication pages.
    #[arg(long)]
    sleep: Option<f64>,

    /// Attempts per profile fetch.
    #[arg(long)]
    max_retries: Option<u32>,

    /// Config file (default: the user config dir).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print the report as JSON on stdout.
    /// Also enabled by setting SCHOLARSNAP_JSON=1.
    #[arg(long)]
    json: bool,

    /// Run everything except writing the CSV files.
    #[arg(long)]
    dry_run: bool,

    /// Print the effective configuration as TOML and exit.
    #[arg(long)]
    print_config: bool,

    #[arg(short, long, conflicts_with = "quiet")]
    verbose: bool,

    #[arg(short, long)]
    quiet: bool,
}

impl Cli {
    fn apply_overrides(&self, config: &mut AppConfig) {
        if let Some(url) = &self.profile_url {
            config.profile.url = url.clone();
        }
        if let Some(dir) = &self.out_dir {
            config.profile.out_dir = dir.clone();
        }
        if let Some(path) = &self.html_file {
            config.snapshot.html_file = Some(path.clone());
        }
        if self.prefer_html {
            config.snapshot.prefer_html = true;
        }
        if self.offline {
            config.snapshot.live = false;
        }
        if let Some(mode) = self.api_mode {
            config.api.mode = mode;
        }
        if let Some(key) = &self.api_key {
            config.api.key = Some(key.clone());
        }
        if self.strict {
            config.strict = true;
        }
        if let Some(size) = self.page_size {
            config.pagination.page_size = size;
        }
        if let Some(pages) = self.max_pages {
            config.pagination.max_pages = pages;
        }
        if let Some(sleep) = self.sleep {
            config.pagination.delay_secs = sleep;
        }
        if let Some(retries) = self.max_retries {
            config.fetch.max_retries = retries;
        }
    }

    fn log_directive(&self) -> &'static str {
        if self.verbose {
            "scholarsnap=debug"
        } else if self.quiet {
            "scholarsnap=warn"
        } else {
            "scholarsnap=info"
        }
    }
}

// ─── Main ────────────────────────────────────────────────────────────────────

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cli.log_directive()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let code = match run(cli).await {
        Ok(code) => code,
        Err(err) => {
            error!("{err:#}");
            exit_code_for(&err)
        }
    };
    std::process::exit(code.into());
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let start = Instant::now();
    let json_output = cli.json || std::env::var("SCHOLARSNAP_JSON").as_deref() == Ok("1");

    let mut config = match &cli.config {
        Some(path) => AppConfig::load_required(path)?,
        None => AppConfig::load()?,
    };
    cli.apply_overrides(&mut config);
    config.validate()?;

    if cli.print_config {
        print!("{}", config.to_toml()?);
        return Ok(ExitCode::Success);
    }

    let pipeline = Pipeline::from_config(&config)?;
    let Some(report) = pipeline.execute().await? else {
        return Ok(ExitCode::Success);
    };

    if cli.dry_run {
        info!("Dry run: leaving CSVs in {} untouched", config.profile.out_dir.display());
    } else if let Err(err) = write_outputs(&config, &report) {
        return match pipeline.settings().policy {
            FailurePolicy::Strict => Err(err.into()),
            FailurePolicy::Lenient => {
                error!("{err}");
                warn!("Non-strict mode: leaving existing CSVs unchanged.");
                Ok(ExitCode::Success)
            }
        };
    }

    if json_output {
        print_json(&serde_json::json!({
            "status": "ok",
            "data": report,
            "meta": { "duration_ms": start.elapsed().as_millis() }
        }))?;
    }
    Ok(ExitCode::Success)
}

fn write_outputs(config: &AppConfig, report: &ProfileReport) -> Result<(), CoreError> {
    let paths = write_report(&config.profile.out_dir, report)?;
    for path in paths.all() {
        info!("Wrote: {}", path.display());
    }
    Ok(())
}

fn print_json(val: &serde_json::Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(val)?);
    Ok(())
}

fn exit_code_for(err: &anyhow::Error) -> ExitCode {
    if let Some(err) = err.downcast_ref::<ScrapeError>() {
        return match err.kind() {
            ErrorKind::Configuration => ExitCode::Configuration,
            _ => ExitCode::Failure,
        };
    }
    match err.downcast_ref::<CoreError>() {
        Some(CoreError::Config(_) | CoreError::TomlParse(_)) => ExitCode::Configuration,
        _ => ExitCode::Failure,
    }
}
