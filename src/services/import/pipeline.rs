//! Import pipeline orchestrator
//!
//! Runs one import job end to end: entry guard, pending -> processing,
//! an optional counting pass, then a streaming pass that applies every
//! record in file order and folds the outcomes into the final summary.
//!
//! CSV reading is blocking, so both passes run on the blocking pool. The
//! streaming pass hands records over a bounded channel, which keeps memory
//! flat for large files and preserves order.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Local;
use csv::StringRecord;
use tokio::sync::mpsc;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::defaults::{DEFAULT_CHECKPOINT_INTERVAL, IMPORT_ROW_BUFFER};
use crate::error::{ImportError, RowError, StoreError};
use crate::types::{ImportJobStatus, ImportSummary, RowDiagnostic};

use super::progress::ProgressTracker;
use super::row::{DateFallback, RowParser, SurveyCsvRow};
use super::store::{ImportJobStore, SurveyStore};
use super::tally::{ImportTally, RowOutcome};
use super::transaction::apply_row;

/// Tunables of a pipeline run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportSettings {
    /// Rows between progress checkpoints, at least 1
    pub checkpoint_interval: usize,
    pub date_fallback: DateFallback,
    /// Count records before importing so pollers see a percentage
    pub precount: bool,
}

impl Default for ImportSettings {
    fn default() -> Self {
        Self {
            checkpoint_interval: DEFAULT_CHECKPOINT_INTERVAL,
            date_fallback: DateFallback::default(),
            precount: true,
        }
    }
}

/// Result of a pipeline invocation that did not fail
#[derive(Debug, Clone, PartialEq)]
pub enum ImportRunOutcome {
    /// The job was not pending; nothing was touched
    Skipped(ImportJobStatus),
    Completed(ImportSummary),
}

/// One CSV record as it comes off the reader
#[derive(Debug)]
struct CsvRecord {
    line: u64,
    row: Result<SurveyCsvRow, String>,
}

pub struct ImportPipeline {
    rows: Arc<dyn SurveyStore>,
    jobs: Arc<dyn ImportJobStore>,
    settings: ImportSettings,
}

impl ImportPipeline {
    pub fn new(rows: Arc<dyn SurveyStore>, jobs: Arc<dyn ImportJobStore>, settings: ImportSettings) -> Self {
        Self {
            rows,
            jobs,
            settings: ImportSettings {
                checkpoint_interval: settings.checkpoint_interval.max(1),
                ..settings
            },
        }
    }

    /// Run the import job `job_id`.
    ///
    /// Jobs that are already processing or finished are skipped. A fatal
    /// error moves the job to failed and is returned to the caller; when
    /// that write fails too the error comes back as `FailureUnrecorded`.
    pub async fn run(&self, job_id: Uuid) -> Result<ImportRunOutcome, ImportError> {
        let job = self
            .jobs
            .find_job(job_id)
            .await?
            .ok_or(ImportError::JobNotFound(job_id))?;

        if matches!(job.status, ImportJobStatus::Processing | ImportJobStatus::Completed) {
            info!("Import {} is already {}, skipping", job_id, job.status.as_str());
            return Ok(ImportRunOutcome::Skipped(job.status));
        }

        let tracker = ProgressTracker::new(Arc::clone(&self.jobs), job_id);
        if !tracker.start().await? {
            let status = self
                .jobs
                .find_job(job_id)
                .await?
                .map(|j| j.status)
                .unwrap_or(job.status);
            info!("Import {} could not be started ({}), skipping", job_id, status.as_str());
            return Ok(ImportRunOutcome::Skipped(status));
        }

        info!("Import {} started: {}", job_id, job.file_name);

        let result = match self.import_file(&tracker, Path::new(&job.file_path)).await {
            Ok(summary) => tracker.finish_success(&summary).await.map(|()| summary),
            Err(e) => Err(e),
        };

        match result {
            Ok(summary) => {
                info!(
                    "Import {} completed: {} rows, {} employees created, {} responses created, {} errors",
                    job_id,
                    summary.processed_rows,
                    summary.employees_created,
                    summary.responses_created,
                    summary.errors.len()
                );
                Ok(ImportRunOutcome::Completed(summary))
            }
            Err(e) => {
                error!("Import {} failed: {}", job_id, e);
                match tracker.finish_failure(&e.to_string()).await {
                    Ok(()) => Err(e),
                    Err(record_err) => {
                        error!("Failed to mark import {} as failed: {}", job_id, record_err);
                        Err(ImportError::FailureUnrecorded {
                            error: Box::new(e),
                            record_error: Box::new(record_err),
                        })
                    }
                }
            }
        }
    }

    async fn import_file(&self, tracker: &ProgressTracker, path: &Path) -> Result<ImportSummary, ImportError> {
        match tokio::fs::try_exists(path).await {
            Ok(true) => {}
            Ok(false) => return Err(ImportError::FileNotFound(path.to_path_buf())),
            Err(source) => {
                return Err(ImportError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        }

        let total = if self.settings.precount {
            let total = count_records(path.to_path_buf()).await?;
            tracker.checkpoint(0, Some(total)).await;
            Some(total)
        } else {
            None
        };

        let parser = RowParser::new(self.settings.date_fallback, Local::now().date_naive());
        let (mut records, reader_task) = stream_records(path.to_path_buf()).await?;

        let mut tally = ImportTally::default();
        while let Some(record) = records.recv().await {
            let outcome = self.import_record(&parser, record?).await?;
            tally = tally.absorb(outcome);

            if tally.processed() as usize % self.settings.checkpoint_interval == 0 {
                tracker.checkpoint(tally.processed(), None).await;
            }
        }

        reader_task
            .await
            .map_err(|e| ImportError::Task(e.to_string()))?;

        let processed = tally.processed();
        tracker.checkpoint(processed, Some(total.unwrap_or(processed))).await;

        Ok(tally.into_summary())
    }

    async fn import_record(&self, parser: &RowParser, record: CsvRecord) -> Result<RowOutcome, ImportError> {
        let CsvRecord { line, row } = record;

        let raw = match row {
            Ok(raw) => raw,
            Err(message) => return Ok(rejected(line, None, RowError::Malformed(message))),
        };
        let subject = raw.subject();

        let row = match parser.parse(&raw) {
            Ok(row) => row,
            Err(e) => return Ok(rejected(line, subject, e)),
        };

        match apply_row(self.rows.as_ref(), &row).await {
            Ok(applied) => Ok(RowOutcome::Imported { employee_created: applied.employee_created }),
            Err(StoreError::Row(e)) => Ok(rejected(line, subject, e)),
            Err(StoreError::Fatal(e)) => Err(e),
        }
    }
}

fn rejected(line: u64, subject: Option<String>, err: RowError) -> RowOutcome {
    debug!("Row {} rejected: {}", line, err);
    RowOutcome::Rejected(RowDiagnostic {
        line,
        subject,
        message: err.to_string(),
    })
}

/// Semicolon-separated reader positioned after a non-empty header row
fn open_reader(path: &Path) -> Result<(csv::Reader<File>, StringRecord), ImportError> {
    let file = File::open(path).map_err(|source| ImportError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b';')
        .flexible(true)
        .from_reader(file);

    let headers = reader.headers()?.clone();
    if headers.iter().all(|h| h.trim().is_empty()) {
        return Err(ImportError::MissingHeader);
    }
    Ok((reader, headers))
}

/// Number of data records, header excluded
async fn count_records(path: PathBuf) -> Result<i32, ImportError> {
    tokio::task::spawn_blocking(move || {
        let (mut reader, _) = open_reader(&path)?;
        let mut count: i32 = 0;
        for record in reader.byte_records() {
            if let Err(e) = record {
                if matches!(e.kind(), csv::ErrorKind::Io(_)) {
                    return Err(ImportError::Csv(e));
                }
            }
            count = count.saturating_add(1);
        }
        Ok(count)
    })
    .await
    .map_err(|e| ImportError::Task(e.to_string()))?
}

type RecordReceiver = mpsc::Receiver<Result<CsvRecord, ImportError>>;

/// Read records on the blocking pool and hand them over in file order.
///
/// Undecodable records are forwarded as row failures. A read error ends
/// the stream after being forwarded.
async fn stream_records(
    path: PathBuf,
) -> Result<(RecordReceiver, tokio::task::JoinHandle<()>), ImportError> {
    let (mut reader, headers) = tokio::task::spawn_blocking(move || open_reader(&path))
        .await
        .map_err(|e| ImportError::Task(e.to_string()))??;

    let (tx, rx) = mpsc::channel(IMPORT_ROW_BUFFER);
    let handle = tokio::task::spawn_blocking(move || {
        let mut record = StringRecord::new();
        // Header is line 1
        let mut next_line: u64 = 2;
        loop {
            let item = match reader.read_record(&mut record) {
                Ok(false) => break,
                Ok(true) => {
                    let line = record.position().map_or(next_line, |p| p.line());
                    Ok(CsvRecord {
                        line,
                        row: record
                            .deserialize::<SurveyCsvRow>(Some(&headers))
                            .map_err(|e| e.to_string()),
                    })
                }
                Err(e) if matches!(e.kind(), csv::ErrorKind::Io(_)) => Err(ImportError::Csv(e)),
                Err(e) => Ok(CsvRecord {
                    line: e.position().map_or(next_line, |p| p.line()),
                    row: Err(e.to_string()),
                }),
            };

            let stop = item.is_err();
            if let Ok(parsed) = &item {
                next_line = parsed.line + 1;
            }
            if tx.blocking_send(item).is_err() || stop {
                break;
            }
        }
    });

    Ok((rx, handle))
}
