//! Option-chain files on disk
//!
//! Enumerates a snapshot tree and moves rows between CSV files and
//! [`OptionChainRow`] values. Column identity and the missing-value encoding
//! survive a load/write cycle.

use crate::error::{ChainError, Result};
use crate::types::{OptionChainRow, COLUMNS};
use csv::{ReaderBuilder, Trim, WriterBuilder};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Every non-directory entry under `root`, recursively, sorted by path.
///
/// Any traversal error is fatal: without a complete file list there is
/// nothing sound to process.
pub fn enumerate_files(root: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(|source| ChainError::Enumeration {
            root: root.to_path_buf(),
            source,
        })?;
        if !entry.file_type().is_dir() {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

/// Rows decoded from a file, possibly cut short by a failure
#[derive(Debug)]
pub struct LoadOutcome {
    pub rows: Vec<OptionChainRow>,
    pub error: Option<ChainError>,
}

impl LoadOutcome {
    pub fn is_complete(&self) -> bool {
        self.error.is_none()
    }
}

/// Best-effort load: keeps every row decoded before the first failure
pub fn load_rows_lossy(path: &Path) -> LoadOutcome {
    let mut reader = match ReaderBuilder::new()
        .has_headers(true)
        .trim(Trim::All)
        .from_path(path)
    {
        Ok(reader) => reader,
        Err(e) => {
            return LoadOutcome {
                rows: Vec::new(),
                error: Some(e.into()),
            }
        }
    };

    let mut rows = Vec::new();
    for record in reader.deserialize::<OptionChainRow>() {
        match record {
            Ok(row) => rows.push(row),
            Err(e) => {
                return LoadOutcome {
                    rows,
                    error: Some(e.into()),
                }
            }
        }
    }

    LoadOutcome { rows, error: None }
}

/// Strict load: any undecodable record fails the whole file
pub fn load_rows(path: &Path) -> Result<Vec<OptionChainRow>> {
    let outcome = load_rows_lossy(path);
    match outcome.error {
        Some(e) => Err(e),
        None => Ok(outcome.rows),
    }
}

/// Overwrite `path` with `rows`, header first
pub fn write_rows(path: &Path, rows: &[OptionChainRow]) -> Result<()> {
    let mut writer = WriterBuilder::new().has_headers(true).from_path(path)?;
    if rows.is_empty() {
        writer.write_record(COLUMNS)?;
    }
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}
