//! Pool workers and the per-file tasks they run

use crate::analytics::AnalyticsEngine;
use crate::config::{PricingConfig, RepairConfig};
use crate::data::write_rows;
use crate::error::Result;
use crate::repair::RepairPass;
use crate::types::{DeletionSignal, WorkItem};
use crossbeam_channel::{Receiver, Sender};
use serde::Serialize;

/// Counters kept by one worker and summed after the pool joins
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WorkerStats {
    pub files_processed: usize,
    pub files_written: usize,
    pub write_failures: usize,
    /// Files a task refused to process (unsorted strikes)
    pub files_rejected: usize,
    /// Partially loaded files that would otherwise have been written
    pub partial_not_written: usize,
    pub rows_enriched: usize,
    pub rows_without_underlying: usize,
    pub rows_repaired: usize,
    pub deletion_signals: usize,
}

impl WorkerStats {
    pub fn merge(&mut self, other: &WorkerStats) {
        self.files_processed += other.files_processed;
        self.files_written += other.files_written;
        self.write_failures += other.write_failures;
        self.files_rejected += other.files_rejected;
        self.partial_not_written += other.partial_not_written;
        self.rows_enriched += other.rows_enriched;
        self.rows_without_underlying += other.rows_without_underlying;
        self.rows_repaired += other.rows_repaired;
        self.deletion_signals += other.deletion_signals;
    }
}

/// What a task decided about one file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskVerdict {
    pub persist: bool,
    pub signal: Option<DeletionSignal>,
}

/// Per-file work applied by every worker of a pool
pub trait FileTask: Send + Sync {
    /// Short name used in thread names and logs
    fn label(&self) -> &'static str;

    /// Transform the item's rows in place and decide what happens to the file
    fn apply(&self, item: &mut WorkItem, stats: &mut WorkerStats) -> Result<TaskVerdict>;
}

/// Analytics run: enrich every row, always write back
#[derive(Debug, Clone, Default)]
pub struct EnrichTask {
    engine: AnalyticsEngine,
}

impl EnrichTask {
    pub fn new(config: &PricingConfig) -> Self {
        Self {
            engine: AnalyticsEngine::new(config),
        }
    }
}

impl FileTask for EnrichTask {
    fn label(&self) -> &'static str {
        "enrich"
    }

    fn apply(&self, item: &mut WorkItem, stats: &mut WorkerStats) -> Result<TaskVerdict> {
        let summary = self.engine.enrich_rows(&mut item.rows);
        stats.rows_enriched += summary.enriched;
        stats.rows_without_underlying += summary.no_underlying;
        if summary.no_underlying > 0 {
            log::debug!(
                "{} rows without underlying price in {}",
                summary.no_underlying,
                item.path.display()
            );
        }

        Ok(TaskVerdict {
            persist: true,
            signal: None,
        })
    }
}

/// Repair run: interpolate gaps, write back only salvageable changes,
/// flag unsalvageable files
#[derive(Debug, Clone, Default)]
pub struct RepairTask {
    pass: RepairPass,
}

impl RepairTask {
    pub fn new(config: &RepairConfig) -> Self {
        Self {
            pass: RepairPass::new(config),
        }
    }
}

impl FileTask for RepairTask {
    fn label(&self) -> &'static str {
        "repair"
    }

    fn apply(&self, item: &mut WorkItem, stats: &mut WorkerStats) -> Result<TaskVerdict> {
        let outcome = self.pass.repair(&item.path, &mut item.rows)?;
        stats.rows_repaired += outcome.rows_changed;

        let signal = outcome.flagged.map(|reason| {
            log::info!(
                "Flagging {} for deletion ({:?}, deficiency {})",
                item.path.display(),
                reason,
                outcome.deficiency
            );
            DeletionSignal::new(item.path.clone())
        });

        Ok(TaskVerdict {
            persist: self.pass.should_persist(&outcome),
            signal,
        })
    }
}

/// Worker loop: drain the queue until it is closed and empty
pub fn run_worker<T: FileTask + ?Sized>(
    id: usize,
    task: &T,
    queue: Receiver<WorkItem>,
    signals: Option<Sender<DeletionSignal>>,
) -> WorkerStats {
    let mut stats = WorkerStats::default();

    for mut item in queue.iter() {
        log::debug!(
            "Worker {} ({}) started processing: {}",
            id,
            task.label(),
            item.path.display()
        );

        match task.apply(&mut item, &mut stats) {
            Ok(verdict) => {
                if let Some(signal) = verdict.signal {
                    stats.deletion_signals += 1;
                    match &signals {
                        Some(tx) => {
                            if tx.send(signal).is_err() {
                                log::warn!("Deletion aggregator stopped; signal for {} dropped", item.path.display());
                            }
                        }
                        None => log::warn!(
                            "No deletion sink for {} run; signal for {} dropped",
                            task.label(),
                            item.path.display()
                        ),
                    }
                }

                if verdict.persist {
                    persist(&item, &mut stats);
                }
            }
            Err(e) => {
                log::warn!("Skipping {}: {}", item.path.display(), e);
                stats.files_rejected += 1;
            }
        }

        stats.files_processed += 1;
        log::debug!("Finished processing {}", item.path.display());
    }

    stats
}

fn persist(item: &WorkItem, stats: &mut WorkerStats) {
    if item.partial {
        log::warn!(
            "Not writing partially loaded file {}",
            item.path.display()
        );
        stats.partial_not_written += 1;
        return;
    }

    match write_rows(&item.path, &item.rows) {
        Ok(()) => stats.files_written += 1,
        Err(e) => {
            log::warn!("Error writing file {}: {}", item.path.display(), e);
            stats.write_failures += 1;
        }
    }
}
