//! Deletion aggregator
//!
//! Single consumer of the deletion-signal queue. Tallies signals per parent
//! directory and, once every producer has finished, removes the directories
//! whose tally crossed the retention threshold.
//!
//! The tally map has exactly one owner (the aggregator thread), so it needs
//! no locking; the queue provides the only synchronization.

use crate::config::RetentionConfig;
use crate::types::DeletionSignal;
use crossbeam_channel::Receiver;
use hashbrown::HashMap;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// A directory that failed to be removed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemovalFailure {
    pub directory: PathBuf,
    pub error: String,
}

/// Outcome of one aggregator run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RetentionReport {
    pub signals_received: usize,
    /// Directories selected for removal, with how many times each crossed
    /// the threshold
    pub removal_set: BTreeMap<PathBuf, usize>,
    pub removed: Vec<PathBuf>,
    /// Selected directories left in place because they are the protected root
    pub skipped: Vec<PathBuf>,
    pub failures: Vec<RemovalFailure>,
    /// Directories that collected signals but never crossed the threshold
    pub leftover: BTreeMap<PathBuf, usize>,
    pub dry_run: bool,
}

/// Per-directory tally of deletion signals
#[derive(Debug)]
pub struct DeletionAggregator {
    threshold: usize,
    dry_run: bool,
    protected: Option<PathBuf>,
    tallies: HashMap<PathBuf, usize>,
    removal_set: BTreeMap<PathBuf, usize>,
    signals_received: usize,
}

impl DeletionAggregator {
    pub fn new(config: &RetentionConfig) -> Self {
        Self {
            threshold: config.directory_threshold,
            dry_run: config.dry_run,
            protected: None,
            tallies: HashMap::new(),
            removal_set: BTreeMap::new(),
            signals_received: 0,
        }
    }

    /// Never remove `root` itself, even if files directly under it are flagged.
    /// A skipped root is listed in [`RetentionReport::skipped`].
    pub fn with_protected_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.protected = Some(root.into());
        self
    }

    /// Count one signal. Returns the directory if this signal pushed its
    /// tally over the threshold.
    pub fn record(&mut self, signal: &DeletionSignal) -> Option<PathBuf> {
        self.signals_received += 1;

        let directory = match signal.directory() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => {
                log::warn!(
                    "Deletion signal for {} has no parent directory",
                    signal.path.display()
                );
                return None;
            }
        };

        let tally = self.tallies.entry(directory.clone()).or_insert(0);
        *tally += 1;
        if *tally <= self.threshold {
            return None;
        }

        // Forget the tally so the directory must re-accumulate from zero
        self.tallies.remove(&directory);
        *self.removal_set.entry(directory.clone()).or_insert(0) += 1;
        log::info!(
            "Directory {} crossed the retention threshold ({} signals)",
            directory.display(),
            self.threshold + 1
        );
        Some(directory)
    }

    /// Current live tally for a directory
    pub fn tally(&self, directory: &Path) -> usize {
        self.tallies.get(directory).copied().unwrap_or(0)
    }

    pub fn removal_set(&self) -> &BTreeMap<PathBuf, usize> {
        &self.removal_set
    }

    /// Consume signals until every producer has hung up, then remove
    pub fn run(mut self, signals: Receiver<DeletionSignal>) -> RetentionReport {
        for signal in signals.iter() {
            self.record(&signal);
        }
        self.finalize()
    }

    /// Remove every selected directory and report leftovers. Removal
    /// failures are logged and the remaining directories are still tried.
    pub fn finalize(self) -> RetentionReport {
        let mut report = RetentionReport {
            signals_received: self.signals_received,
            removal_set: self.removal_set,
            dry_run: self.dry_run,
            ..RetentionReport::default()
        };

        for directory in report.removal_set.keys() {
            if self.protected.as_deref() == Some(directory.as_path()) {
                log::warn!("Keeping protected run root {}", directory.display());
                report.skipped.push(directory.clone());
                continue;
            }
            if self.dry_run {
                log::info!("Would remove directory {}", directory.display());
                continue;
            }
            if !directory.exists() {
                log::debug!("Directory {} already gone", directory.display());
                continue;
            }

            match fs::remove_dir_all(directory) {
                Ok(()) => {
                    log::info!("Removed directory {}", directory.display());
                    report.removed.push(directory.clone());
                }
                Err(e) => {
                    log::error!("Failed to remove {}: {}", directory.display(), e);
                    report.failures.push(RemovalFailure {
                        directory: directory.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        // A directory already selected is not a leftover, whatever it re-accumulated
        report.leftover = self
            .tallies
            .into_iter()
            .filter(|(directory, _)| !report.removal_set.contains_key(directory))
            .collect();
        for (directory, count) in &report.leftover {
            log::info!(
                "Directory {} kept with {} deletion signals",
                directory.display(),
                count
            );
        }

        report
    }
}
