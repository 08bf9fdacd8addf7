//! Pipeline orchestration
//!
//! An orchestrator run enumerates a tree, loads each file sequentially and
//! feeds the rows to a fixed pool of worker threads through one bounded
//! queue. The repair run additionally fans every worker's deletion signals
//! into a single aggregator thread.
//!
//! ```text
//!   enumerate ─► load ─► [work queue] ─► worker × N ─► write back
//!                                             │
//!                                             └─► [signal queue] ─► aggregator ─► remove dirs
//! ```

pub mod aggregator;
pub mod worker;

pub use aggregator::{DeletionAggregator, RemovalFailure, RetentionReport};
pub use worker::{run_worker, EnrichTask, FileTask, RepairTask, TaskVerdict, WorkerStats};

use crate::config::Config;
use crate::data::{enumerate_files, load_rows_lossy};
use crate::error::{ChainError, Result};
use crate::types::{DeletionSignal, WorkItem};
use crossbeam_channel::{bounded, Sender};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

/// Which orchestrator run produced a report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunKind {
    Enrich,
    Clean,
}

/// Summary of one orchestrator run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub kind: RunKind,
    pub root: PathBuf,
    pub files_enqueued: usize,
    /// Files that failed to load completely and were enqueued partial
    pub load_failures: usize,
    pub workers: usize,
    pub stats: WorkerStats,
    /// Present for runs with a deletion sink
    pub retention: Option<RetentionReport>,
    pub elapsed_ms: u64,
}

/// Reports of a composed enrich-then-clean run
#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    pub enrich: RunReport,
    pub clean: RunReport,
}

/// Drives worker pools over a tree of option-chain files
#[derive(Debug, Clone)]
pub struct Orchestrator {
    config: Config,
}

impl Orchestrator {
    /// Create an orchestrator, rejecting settings it cannot run with
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Analytics run: enrich every file under `root` in place
    pub fn enrich(&self, root: &Path) -> Result<RunReport> {
        let task = Arc::new(EnrichTask::new(&self.config.pricing));
        self.run(RunKind::Enrich, root, task, false)
    }

    /// Repair run: repair every file under `root`, then remove directories
    /// that accumulated too many deletion signals
    pub fn clean(&self, root: &Path) -> Result<RunReport> {
        let task = Arc::new(RepairTask::new(&self.config.repair));
        self.run(RunKind::Clean, root, task, true)
    }

    /// Analytics run followed by a repair run over the same tree
    pub fn process(&self, root: &Path) -> Result<PipelineReport> {
        let enrich = self.enrich(root)?;
        let clean = self.clean(root)?;
        Ok(PipelineReport { enrich, clean })
    }

    fn run<T: FileTask + 'static>(
        &self,
        kind: RunKind,
        root: &Path,
        task: Arc<T>,
        with_retention: bool,
    ) -> Result<RunReport> {
        let start = Instant::now();
        let settings = &self.config.pipeline;

        let files = enumerate_files(root)?;
        log::info!(
            "Starting {} run over {} files in {}",
            task.label(),
            files.len(),
            root.display()
        );

        let capacity = settings.queue_capacity.unwrap_or(files.len()).max(1);
        let (work_tx, work_rx) = bounded::<WorkItem>(capacity);

        // Single consumer for every worker's signals
        let (signal_tx, aggregator) = if with_retention {
            let (tx, rx) = bounded::<DeletionSignal>(capacity);
            let mut aggregator = DeletionAggregator::new(&self.config.retention);
            if self.config.retention.protect_root {
                aggregator = aggregator.with_protected_root(root);
            }
            let handle = thread::Builder::new()
                .name("deletion-aggregator".to_string())
                .spawn(move || aggregator.run(rx))?;
            (Some(tx), Some(handle))
        } else {
            (None, None)
        };

        let mut handles = Vec::with_capacity(settings.workers);
        for id in 0..settings.workers {
            let task = Arc::clone(&task);
            let queue = work_rx.clone();
            let signals: Option<Sender<DeletionSignal>> = signal_tx.clone();
            let handle = thread::Builder::new()
                .name(format!("{}-worker-{}", task.label(), id))
                .spawn(move || run_worker(id, task.as_ref(), queue, signals))?;
            handles.push(handle);
        }
        // Workers hold the only remaining ends
        drop(work_rx);
        drop(signal_tx);

        let progress_every = settings.progress_every.max(1);
        let mut load_failures = 0;
        for (index, path) in files.iter().enumerate() {
            let outcome = load_rows_lossy(path);
            let item = match outcome.error {
                None => WorkItem::new(path.clone(), outcome.rows),
                Some(e) => {
                    log::warn!("Error loading file {}: {}", path.display(), e);
                    load_failures += 1;
                    WorkItem::partial(path.clone(), outcome.rows)
                }
            };

            if work_tx.send(item).is_err() {
                log::error!("All workers exited before the queue was filled");
                break;
            }
            if (index + 1) % progress_every == 0 {
                log::info!("Processed {} files", index + 1);
            }
        }
        // Close the queue; workers exit once it drains
        drop(work_tx);

        let mut stats = WorkerStats::default();
        let mut panicked = None;
        for (id, handle) in handles.into_iter().enumerate() {
            match handle.join() {
                Ok(worker_stats) => stats.merge(&worker_stats),
                Err(_) => {
                    log::error!("{} worker {} panicked", task.label(), id);
                    panicked.get_or_insert(id);
                }
            }
        }

        // Joins only after every sender is gone, so the tally is complete
        let retention = match aggregator {
            Some(handle) => Some(handle.join().map_err(|_| {
                ChainError::WorkerPanicked("deletion aggregator".to_string())
            })?),
            None => None,
        };

        if let Some(id) = panicked {
            return Err(ChainError::WorkerPanicked(format!(
                "{} worker {}",
                task.label(),
                id
            )));
        }

        let report = RunReport {
            kind,
            root: root.to_path_buf(),
            files_enqueued: files.len(),
            load_failures,
            workers: settings.workers,
            stats,
            retention,
            elapsed_ms: start.elapsed().as_millis() as u64,
        };
        log::info!(
            "Finished {} run: {} files processed, {} written, {} signals in {} ms",
            task.label(),
            report.stats.files_processed,
            report.stats.files_written,
            report.stats.deletion_signals,
            report.elapsed_ms
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{load_rows, write_rows};
    use crate::types::OptionChainRow;
    use std::fs;
    use tempfile::TempDir;

    fn small_config(workers: usize) -> Config {
        let mut config = Config::default();
        config.pipeline.workers = workers;
        config
    }

    fn complete_rows() -> Vec<OptionChainRow> {
        [21900.0, 22000.0, 22100.0]
            .iter()
            .map(|&k| {
                let mut row = OptionChainRow::quote(k, 120.0, 95.0, 22000.0, 9.0);
                for field in crate::repair::PRIMARY_FIELDS {
                    if field.get(&row).is_nan() {
                        field.set(&mut row, 1.0);
                    }
                }
                row.vega_call = 1.0;
                row.vega_put = 1.0;
                row
            })
            .collect()
    }

    #[test]
    fn test_new_rejects_zero_workers() {
        let err = Orchestrator::new(small_config(0)).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_missing_root_is_fatal() {
        let orchestrator = Orchestrator::new(small_config(2)).unwrap();
        let err = orchestrator
            .enrich(Path::new("/definitely/not/a/real/root"))
            .unwrap_err();
        assert!(matches!(err, ChainError::Enumeration { .. }));
    }

    #[test]
    fn test_empty_tree_completes() {
        let tmp = TempDir::new().unwrap();
        let orchestrator = Orchestrator::new(small_config(3)).unwrap();
        let report = orchestrator.clean(tmp.path()).unwrap();
        assert_eq!(report.files_enqueued, 0);
        assert_eq!(report.stats.files_processed, 0);
        assert_eq!(report.retention.map(|r| r.signals_received), Some(0));
    }

    #[test]
    fn test_enrich_run_processes_every_file() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("NIFTY");
        fs::create_dir_all(&dir).unwrap();
        for i in 0..5 {
            let rows = vec![OptionChainRow::quote(22000.0, 120.0, 95.0, 22000.0, 9.0)];
            write_rows(&dir.join(format!("{i}.csv")), &rows).unwrap();
        }

        let orchestrator = Orchestrator::new(small_config(2)).unwrap();
        let report = orchestrator.enrich(tmp.path()).unwrap();
        assert_eq!(report.kind, RunKind::Enrich);
        assert_eq!(report.files_enqueued, 5);
        assert_eq!(report.stats.files_processed, 5);
        assert_eq!(report.stats.files_written, 5);
        assert!(report.retention.is_none());

        let rows = load_rows(&dir.join("3.csv")).unwrap();
        assert!(rows[0].iv_call.is_finite());
    }

    #[test]
    fn test_partial_load_is_not_written() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("broken.csv");
        let mut contents = String::from("Strike Price,CALL_LTP,PUT_LTP,Underlying LTP,Days to Expiry\n");
        contents.push_str("22000,120,95,22000,9\n");
        contents.push_str("22100,abc,80,22000,9\n");
        fs::write(&path, &contents).unwrap();

        let orchestrator = Orchestrator::new(small_config(1)).unwrap();
        let report = orchestrator.enrich(tmp.path()).unwrap();
        assert_eq!(report.load_failures, 1);
        assert_eq!(report.stats.partial_not_written, 1);
        assert_eq!(fs::read_to_string(&path).unwrap(), contents);
    }

    #[test]
    fn test_small_queue_applies_backpressure() {
        let tmp = TempDir::new().unwrap();
        for i in 0..12 {
            write_rows(&tmp.path().join(format!("{i:02}.csv")), &complete_rows()).unwrap();
        }

        let mut config = small_config(2);
        config.pipeline.queue_capacity = Some(1);
        let report = Orchestrator::new(config).unwrap().clean(tmp.path()).unwrap();
        assert_eq!(report.stats.files_processed, 12);
        // Nothing was missing, so nothing changed
        assert_eq!(report.stats.files_written, 0);
        assert_eq!(report.stats.deletion_signals, 0);
    }

    #[test]
    fn test_report_serializes() {
        let tmp = TempDir::new().unwrap();
        let report = Orchestrator::new(small_config(1))
            .unwrap()
            .clean(tmp.path())
            .unwrap();
        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("\"kind\":\"clean\""));
    }
}
