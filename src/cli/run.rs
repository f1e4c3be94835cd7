//! CLI argument surface and run wiring

use crate::cli::error::CliError;
use crate::discovery::{CkanClient, Resource, DEFAULT_DATASET_ID};
use crate::downloader::client::ResourceDownloader;
use crate::downloader::config::{
    DownloadConfig, DEFAULT_BASE_BACKOFF_SECS, DEFAULT_MAX_RETRIES, DEFAULT_MAX_WORKERS,
    DEFAULT_RATE_LIMIT, DEFAULT_TIMEOUT_SECS, MAX_WORKERS,
};
use crate::downloader::executor::{DownloadExecutor, RunOutcome, RunReport};
use crate::downloader::rate_limit::RateLimiter;
use crate::manifest::ManifestStore;
use crate::shutdown::SharedShutdown;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

/// Resilient bulk downloader for SEAO open-data resources.
///
/// Discovers JSON resources in a CKAN dataset and downloads them with
/// rate limiting, retries, and a resumable manifest.
#[derive(Debug, Parser)]
#[command(name = "seao-downloader", version, about)]
pub struct Cli {
    /// Output directory for downloaded files and the manifest
    #[arg(long, default_value = "./seao_data")]
    pub out_dir: PathBuf,

    /// CKAN dataset identifier to download
    #[arg(long, default_value = DEFAULT_DATASET_ID)]
    pub dataset_id: String,

    /// Maximum requests per second across all workers (0 disables)
    #[arg(long, default_value_t = DEFAULT_RATE_LIMIT)]
    pub rate_limit: f64,

    /// Number of concurrent download workers
    #[arg(long, default_value_t = DEFAULT_MAX_WORKERS, value_parser = parse_workers)]
    pub max_workers: usize,

    /// Retries per resource for transient failures
    #[arg(long, default_value_t = DEFAULT_MAX_RETRIES)]
    pub max_retries: u32,

    /// Base delay for exponential backoff, in seconds
    #[arg(long, default_value_t = DEFAULT_BASE_BACKOFF_SECS)]
    pub base_backoff: f64,

    /// Per-request timeout, in seconds
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECS)]
    pub timeout: u64,

    /// Skip resources already recorded as valid in the manifest
    #[arg(long)]
    pub resume: bool,

    /// Show what would be downloaded without transferring anything
    #[arg(long)]
    pub dry_run: bool,

    /// List every resource in the dataset (all formats) and exit
    #[arg(long)]
    pub list_all: bool,

    /// Disable TLS certificate verification (not recommended)
    #[arg(long)]
    pub no_verify_ssl: bool,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,
}

fn parse_workers(value: &str) -> Result<usize, String> {
    let workers: usize = value
        .parse()
        .map_err(|_| format!("`{value}` is not a valid worker count"))?;
    if workers < 1 {
        return Err("worker count must be at least 1".to_string());
    }
    if workers > MAX_WORKERS {
        return Err(format!("worker count must be at most {MAX_WORKERS}"));
    }
    Ok(workers)
}

impl Cli {
    fn download_config(&self) -> DownloadConfig {
        DownloadConfig {
            rate_limit: self.rate_limit,
            max_retries: self.max_retries,
            base_backoff_secs: self.base_backoff,
            timeout_secs: self.timeout,
            verify_tls: !self.no_verify_ssl,
        }
    }
}

/// Run the CLI to completion and return the process exit code.
pub async fn execute(cli: Cli, shutdown: SharedShutdown) -> Result<i32, CliError> {
    let ckan = CkanClient::new(cli.dataset_id.clone(), !cli.no_verify_ssl)?;

    if cli.list_all {
        let resources = ckan.discover_all_resources().await?;
        print_resource_list(&resources);
        return Ok(0);
    }

    let resources = ckan.discover_json_resources().await?;
    if resources.is_empty() {
        warn!(dataset_id = %cli.dataset_id, "No JSON resources found in dataset");
        println!("No JSON resources found in dataset `{}`.", cli.dataset_id);
        return Ok(0);
    }

    let config = cli.download_config();
    let rate_limiter = RateLimiter::shared(config.rate_limit);
    let downloader =
        ResourceDownloader::new(&config, rate_limiter)?.with_shutdown(shutdown.clone());
    let store = ManifestStore::open(&cli.out_dir, &cli.dataset_id);

    let executor = DownloadExecutor::new(Arc::new(downloader), store, &cli.out_dir)
        .with_workers(cli.max_workers)
        .with_resume(cli.resume)
        .with_dry_run(cli.dry_run)
        .with_shutdown(shutdown);

    let report = executor.run(resources).await?;
    if !cli.dry_run {
        print_summary(&report);
    }
    Ok(report.exit_code())
}

fn print_resource_list(resources: &[Resource]) {
    println!("\nResources in dataset ({} total):\n", resources.len());
    for (i, resource) in resources.iter().enumerate() {
        let size = resource
            .size
            .map(format_size)
            .unwrap_or_else(|| "unknown size".to_string());
        println!(
            "  {:>3}. [{}] {} ({})",
            i + 1,
            resource.format,
            resource.name,
            size
        );
        println!("       {}", resource.url);
    }

    let mut by_format: Vec<(String, usize)> = Vec::new();
    for resource in resources {
        let format = resource.format.to_uppercase();
        match by_format.iter_mut().find(|(f, _)| *f == format) {
            Some((_, count)) => *count += 1,
            None => by_format.push((format, 1)),
        }
    }
    by_format.sort_by(|a, b| b.1.cmp(&a.1));

    println!("\nBy format:");
    for (format, count) in by_format {
        println!("  {format}: {count}");
    }
}

fn print_summary(report: &RunReport) {
    info!(
        succeeded = report.succeeded,
        failed = report.failed,
        skipped = report.skipped,
        total_bytes = report.total_bytes,
        "Run finished"
    );

    println!("\n{}", "=".repeat(60));
    println!("Download Summary");
    println!("{}", "=".repeat(60));
    println!("  Succeeded: {}", report.succeeded);
    println!("  Failed:    {}", report.failed);
    println!("  Skipped:   {}", report.skipped);
    println!("  Total:     {}", format_size(report.total_bytes));
    println!("  Manifest:  {}", report.manifest_path.display());

    match &report.outcome {
        RunOutcome::Completed => {}
        RunOutcome::FatalStop(signal) => {
            println!("\n  STOPPED: {signal}");
            println!("  {}", signal.remediation());
        }
        RunOutcome::Interrupted => {
            println!("\n  Interrupted; re-run with --resume to continue.");
        }
    }
    println!("{}", "=".repeat(60));
}

/// Human-readable byte count, decimal units.
fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1000.0 && unit < UNITS.len() - 1 {
        size /= 1000.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} {}", UNITS[0])
    } else {
        format!("{size:.1} {}", UNITS[unit])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let cli = Cli::parse_from(["seao-downloader"]);
        assert_eq!(cli.out_dir, PathBuf::from("./seao_data"));
        assert_eq!(cli.dataset_id, DEFAULT_DATASET_ID);
        assert_eq!(cli.rate_limit, 1.0);
        assert_eq!(cli.max_workers, 2);
        assert_eq!(cli.max_retries, 3);
        assert_eq!(cli.base_backoff, 2.0);
        assert_eq!(cli.timeout, 60);
        assert!(!cli.resume);
        assert!(!cli.dry_run);
        assert!(!cli.no_verify_ssl);
    }

    #[test]
    fn rejects_zero_workers() {
        assert!(Cli::try_parse_from(["seao-downloader", "--max-workers", "0"]).is_err());
    }

    #[test]
    fn rejects_excessive_workers() {
        assert!(Cli::try_parse_from(["seao-downloader", "--max-workers", "33"]).is_err());
        assert!(Cli::try_parse_from(["seao-downloader", "--max-workers", "32"]).is_ok());
    }

    #[test]
    fn format_size_picks_sensible_units() {
        assert_eq!(format_size(0), "0 B");
        assert_eq!(format_size(999), "999 B");
        assert_eq!(format_size(1500), "1.5 KB");
        assert_eq!(format_size(2_000_000), "2.0 MB");
        assert_eq!(format_size(3_500_000_000), "3.5 GB");
    }
}
