//! Concurrent loading of input files into the record store.

use super::reader::{discover_inputs, read_rows};
use super::validate::RowValidator;
use crate::config::{IngestConfig, InvalidRecordPolicy};
use crate::error::IngestError;
use crate::models::OrderRecord;
use crate::store::OrderStore;
use futures::future::join_all;
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Options controlling how rows are validated and rejected.
#[derive(Debug, Clone)]
pub struct IngestOptions {
    pub date_format: String,
    pub on_invalid: InvalidRecordPolicy,
    /// Show a progress bar on stderr.
    pub show_progress: bool,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self::from(&IngestConfig::default())
    }
}

impl From<&IngestConfig> for IngestOptions {
    fn from(config: &IngestConfig) -> Self {
        Self {
            date_format: config.date_format.clone(),
            on_invalid: config.on_invalid,
            show_progress: false,
        }
    }
}

/// Counts from one ingestion run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestSummary {
    pub files: usize,
    /// Rows read, including malformed ones.
    pub rows: usize,
    pub accepted: usize,
    /// Rows that failed to parse or validate.
    pub rejected: usize,
    /// Valid rows whose `order_id` was already loaded.
    pub duplicates: usize,
}

impl IngestSummary {
    fn merge(&mut self, other: IngestSummary) {
        self.files += other.files;
        self.rows += other.rows;
        self.accepted += other.accepted;
        self.rejected += other.rejected;
        self.duplicates += other.duplicates;
    }
}

/// Records parsed from one file, not yet in the store.
#[derive(Debug)]
struct FileBatch {
    path: PathBuf,
    summary: IngestSummary,
    records: Vec<OrderRecord>,
}

/// Load every input under `paths` into `store`.
///
/// Files are read and validated on blocking tasks in parallel, then
/// appended in sorted path order, so the first occurrence of an
/// `order_id` wins regardless of which task finishes first. With
/// [`InvalidRecordPolicy::Fail`] the first bad row or duplicate aborts
/// the run before anything is appended.
pub async fn load_inputs(
    paths: &[PathBuf],
    store: Arc<OrderStore>,
    options: &IngestOptions,
) -> Result<IngestSummary, IngestError> {
    let files = discover_inputs(paths)?;
    info!("Loading {} input files", files.len());

    let progress = if options.show_progress {
        let bar = ProgressBar::new(files.len() as u64);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:30.cyan/blue}] {pos}/{len} files {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        bar
    } else {
        ProgressBar::hidden()
    };

    let tasks = files.into_iter().map(|path| {
        let options = options.clone();
        let progress = progress.clone();
        tokio::task::spawn_blocking(move || {
            let result = read_file(path, &options);
            progress.inc(1);
            result
        })
    });

    // join_all keeps the sorted order of `files`
    let mut batches = Vec::new();
    for joined in join_all(tasks).await {
        batches.push(joined??);
    }
    progress.finish_and_clear();

    let summary = append_batches(&store, batches, options.on_invalid)?;
    info!(
        "Ingested {} rows: {} accepted, {} rejected, {} duplicates",
        summary.rows, summary.accepted, summary.rejected, summary.duplicates
    );

    Ok(summary)
}

/// Read and validate one file without touching the store.
fn read_file(path: PathBuf, options: &IngestOptions) -> Result<FileBatch, IngestError> {
    let read = read_rows(&path)?;
    let fail_fast = options.on_invalid == InvalidRecordPolicy::Fail;

    let mut summary = IngestSummary {
        files: 1,
        rows: read.rows.len() + read.malformed.len(),
        ..Default::default()
    };

    for err in read.malformed {
        if fail_fast {
            return Err(err);
        }
        warn!("Skipping malformed row: {}", err);
        summary.rejected += 1;
    }

    let validator = RowValidator::new(options.date_format.clone());
    let mut records = Vec::with_capacity(read.rows.len());

    for row in read.rows {
        match validator.validate(row) {
            Ok(record) => records.push(record),
            Err(source) if fail_fast => return Err(IngestError::Validation { path, source }),
            Err(err) => {
                warn!("Rejected record in {} ({}): {}", path.display(), err.invariant(), err);
                summary.rejected += 1;
            }
        }
    }

    debug!(
        "{}: {} rows, {} valid",
        path.display(),
        summary.rows,
        records.len()
    );

    Ok(FileBatch {
        path,
        summary,
        records,
    })
}

/// Append batches in order and total their summaries.
fn append_batches(
    store: &OrderStore,
    batches: Vec<FileBatch>,
    policy: InvalidRecordPolicy,
) -> Result<IngestSummary, IngestError> {
    let mut summary = IngestSummary::default();
    for batch in &batches {
        summary.merge(batch.summary);
    }

    match policy {
        InvalidRecordPolicy::Fail => {
            let sizes: Vec<(PathBuf, usize)> = batches
                .iter()
                .map(|batch| (batch.path.clone(), batch.records.len()))
                .collect();
            let records = batches.into_iter().flat_map(|batch| batch.records).collect();

            summary.accepted = store.try_append(records).map_err(|rejected| {
                IngestError::Validation {
                    path: file_at(&sizes, rejected.index),
                    source: rejected.error,
                }
            })?;
        }
        InvalidRecordPolicy::Skip => {
            for batch in batches {
                let outcome = store.append(batch.records);
                summary.accepted += outcome.accepted;
                summary.duplicates += outcome.duplicates.len();

                if let Some(first) = outcome.duplicates.first() {
                    warn!(
                        "{}: dropped {} duplicate orders (first: {})",
                        batch.path.display(),
                        outcome.duplicates.len(),
                        first.order_id()
                    );
                }
            }
        }
    }

    Ok(summary)
}

/// The file holding the `index`-th record of the concatenated batches.
fn file_at(sizes: &[(PathBuf, usize)], mut index: usize) -> PathBuf {
    for (path, len) in sizes {
        if index < *len {
            return path.clone();
        }
        index -= len;
    }
    PathBuf::new()
}
