//! Download executor
//!
//! Fans a discovered resource list out across a bounded worker pool,
//! applies the shared rate limiter and transfer client per resource,
//! records every outcome in the manifest, and enforces the run-level stop
//! policies: fail-fast on 403/429 and graceful shutdown on Ctrl+C.

use crate::discovery::Resource;
use crate::downloader::client::{FatalSignal, Transfer};
use crate::downloader::DownloadError;
use crate::manifest::{file_name, validate_json_file, ManifestStore};
use crate::shutdown::{self, SharedShutdown};
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::Mutex as AsyncMutex;
use tracing::{error, info, warn};

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// The work list was drained (individual resources may still have failed)
    Completed,
    /// A server restriction (403/429) halted all further dispatch
    FatalStop(FatalSignal),
    /// A cancellation signal ended the run early
    Interrupted,
}

/// Aggregated result of one executor run.
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Resources downloaded and validated successfully
    pub succeeded: u64,
    /// Resources that failed to transfer or validate
    pub failed: u64,
    /// Resources skipped by resume filtering
    pub skipped: u64,
    /// Total bytes written for successful resources
    pub total_bytes: u64,
    /// Path of the flushed manifest
    pub manifest_path: PathBuf,
    /// How the run ended
    pub outcome: RunOutcome,
    /// Planned destination paths (populated by dry runs only)
    pub planned: Vec<PathBuf>,
}

impl RunReport {
    /// Process exit code for this run: 0 when everything succeeded (or
    /// there was nothing to do), 1 on any failure or fatal stop, 130 when
    /// interrupted.
    pub fn exit_code(&self) -> i32 {
        match self.outcome {
            RunOutcome::Interrupted => 130,
            RunOutcome::FatalStop(_) => 1,
            RunOutcome::Completed => {
                if self.failed > 0 {
                    1
                } else {
                    0
                }
            }
        }
    }
}

#[derive(Debug, Default)]
struct Totals {
    succeeded: u64,
    failed: u64,
    total_bytes: u64,
}

/// Shared state handed to every worker.
#[derive(Clone)]
struct WorkerContext {
    transfer: Arc<dyn Transfer>,
    store: Arc<AsyncMutex<ManifestStore>>,
    out_dir: PathBuf,
    queue: Arc<StdMutex<VecDeque<Resource>>>,
    totals: Arc<StdMutex<Totals>>,
    stop: Arc<AtomicBool>,
    fatal: Arc<StdMutex<Option<FatalSignal>>>,
    shutdown: Option<SharedShutdown>,
}

impl WorkerContext {
    fn shutdown_requested(&self) -> bool {
        self.shutdown
            .as_ref()
            .map(|s| s.is_shutdown_requested())
            .unwrap_or(false)
    }
}

/// Orchestrates the complete download workflow.
pub struct DownloadExecutor {
    transfer: Arc<dyn Transfer>,
    store: Arc<AsyncMutex<ManifestStore>>,
    out_dir: PathBuf,
    workers: usize,
    resume: bool,
    dry_run: bool,
    shutdown: Option<SharedShutdown>,
}

impl DownloadExecutor {
    /// Create an executor over a transfer client and manifest store.
    pub fn new(
        transfer: Arc<dyn Transfer>,
        store: ManifestStore,
        out_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            transfer,
            store: Arc::new(AsyncMutex::new(store)),
            out_dir: out_dir.into(),
            workers: 1,
            resume: false,
            dry_run: false,
            shutdown: shutdown::get_global_shutdown(),
        }
    }

    /// Set the worker count (minimum 1). One worker is exactly sequential.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Skip resources that already have a valid manifest entry.
    pub fn with_resume(mut self, resume: bool) -> Self {
        self.resume = resume;
        self
    }

    /// Plan destinations without any transfer activity.
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Attach a shared shutdown handle for graceful cancellation.
    pub fn with_shutdown(mut self, shutdown: SharedShutdown) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Planned destination path for each resource, in input order.
    pub fn planned_paths(&self, resources: &[Resource]) -> Vec<PathBuf> {
        resources
            .iter()
            .map(|r| self.out_dir.join(file_name(r)))
            .collect()
    }

    /// Execute the workflow over the discovered resource list.
    ///
    /// The manifest is flushed after every recorded outcome and once more
    /// unconditionally before returning, so an interrupted or halted run
    /// still leaves a durable record of everything that completed.
    pub async fn run(&self, resources: Vec<Resource>) -> Result<RunReport, DownloadError> {
        let manifest_path = { self.store.lock().await.manifest_path().to_path_buf() };

        let mut resources = resources;
        let mut skipped = 0u64;
        if self.resume {
            let completed = { self.store.lock().await.completed_ids() };
            let before = resources.len();
            resources.retain(|r| !completed.contains(&r.id));
            skipped = (before - resources.len()) as u64;
            if skipped > 0 {
                info!(skipped, "Resuming: skipping already downloaded resources");
            }
        }

        if self.dry_run {
            return Ok(self.dry_run_report(&resources, skipped, manifest_path));
        }

        std::fs::create_dir_all(&self.out_dir)
            .map_err(|e| DownloadError::IoError(e.to_string()))?;

        info!(
            count = resources.len(),
            out_dir = %self.out_dir.display(),
            workers = self.workers,
            "Starting downloads"
        );

        let context = WorkerContext {
            transfer: self.transfer.clone(),
            store: self.store.clone(),
            out_dir: self.out_dir.clone(),
            queue: Arc::new(StdMutex::new(resources.into_iter().collect())),
            totals: Arc::new(StdMutex::new(Totals::default())),
            stop: Arc::new(AtomicBool::new(false)),
            fatal: Arc::new(StdMutex::new(None)),
            shutdown: self.shutdown.clone(),
        };

        let mut handles = Vec::with_capacity(self.workers);
        for _ in 0..self.workers {
            let context = context.clone();
            handles.push(tokio::spawn(worker_loop(context)));
        }
        for handle in handles {
            // Worker panics should not skip the final flush
            if let Err(e) = handle.await {
                error!(error = %e, "Worker task failed");
            }
        }

        // Unconditional final flush, including after fatal stop or interrupt
        self.store.lock().await.flush()?;

        let fatal = context
            .fatal
            .lock()
            .expect("fatal mutex poisoned")
            .take();
        let outcome = if let Some(signal) = fatal {
            RunOutcome::FatalStop(signal)
        } else if context.shutdown_requested() {
            warn!("Run interrupted, manifest saved");
            RunOutcome::Interrupted
        } else {
            RunOutcome::Completed
        };

        let totals = context.totals.lock().expect("totals mutex poisoned");
        Ok(RunReport {
            succeeded: totals.succeeded,
            failed: totals.failed,
            skipped,
            total_bytes: totals.total_bytes,
            manifest_path,
            outcome,
            planned: Vec::new(),
        })
    }

    fn dry_run_report(
        &self,
        resources: &[Resource],
        skipped: u64,
        manifest_path: PathBuf,
    ) -> RunReport {
        let planned = self.planned_paths(resources);

        println!("\n[DRY RUN] Would download the following resources:\n");
        for (i, (resource, dest)) in resources.iter().zip(&planned).enumerate() {
            println!("  {:>3}. {}", i + 1, resource.name);
            println!("       ID:  {}", resource.id);
            println!("       URL: {}", resource.url);
            println!("       -> {}", dest.display());
            println!();
        }
        println!("Total: {} JSON resources", resources.len());
        println!("Output directory: {}", self.out_dir.display());

        RunReport {
            succeeded: 0,
            failed: 0,
            skipped,
            total_bytes: 0,
            manifest_path,
            outcome: RunOutcome::Completed,
            planned,
        }
    }
}

/// One worker: pull the next resource, transfer it, validate, record.
///
/// Stops pulling as soon as the stop flag is set (fatal signal observed by
/// any worker) or shutdown is requested; work already in flight finishes
/// and records normally.
async fn worker_loop(context: WorkerContext) {
    loop {
        if context.stop.load(Ordering::SeqCst) || context.shutdown_requested() {
            break;
        }

        let resource = {
            let mut queue = context.queue.lock().expect("queue mutex poisoned");
            queue.pop_front()
        };
        let Some(resource) = resource else {
            break;
        };

        let dest = context.out_dir.join(file_name(&resource));
        info!(resource = %resource.name, url = %resource.url, "Downloading");

        match context.transfer.transfer(&resource.url, &dest).await {
            Ok(outcome) => {
                let is_valid = outcome.success && validate_json_file(&dest);
                if outcome.success && !is_valid {
                    warn!(path = %dest.display(), "Downloaded file is not valid JSON");
                }

                {
                    let mut store = context.store.lock().await;
                    store.record(&resource, &outcome, is_valid);
                    if let Err(e) = store.flush() {
                        warn!(error = %e, "Failed to flush manifest after append");
                    }
                }

                let mut totals = context.totals.lock().expect("totals mutex poisoned");
                if outcome.success && is_valid {
                    totals.succeeded += 1;
                    totals.total_bytes += outcome.bytes_written;
                    info!(
                        resource = %resource.name,
                        bytes = outcome.bytes_written,
                        "Download succeeded"
                    );
                } else {
                    totals.failed += 1;
                    error!(
                        resource = %resource.name,
                        error = outcome
                            .error_message
                            .as_deref()
                            .unwrap_or("invalid JSON"),
                        "Download failed"
                    );
                }
            }
            Err(signal) => {
                error!(
                    resource = %resource.name,
                    error = %signal,
                    "Stopping all downloads due to server restriction"
                );
                {
                    let mut fatal = context.fatal.lock().expect("fatal mutex poisoned");
                    fatal.get_or_insert(signal);
                }
                context.stop.store(true, Ordering::SeqCst);
                context
                    .totals
                    .lock()
                    .expect("totals mutex poisoned")
                    .failed += 1;
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_code_reflects_outcome() {
        let report = |failed, outcome| RunReport {
            succeeded: 0,
            failed,
            skipped: 0,
            total_bytes: 0,
            manifest_path: PathBuf::from("manifest.json"),
            outcome,
            planned: Vec::new(),
        };

        assert_eq!(report(0, RunOutcome::Completed).exit_code(), 0);
        assert_eq!(report(2, RunOutcome::Completed).exit_code(), 1);
        assert_eq!(
            report(
                1,
                RunOutcome::FatalStop(FatalSignal::RateLimited {
                    url: "https://example.org/a.json".to_string()
                })
            )
            .exit_code(),
            1
        );
        assert_eq!(report(0, RunOutcome::Interrupted).exit_code(), 130);
    }
}
