//! Import JetStream processor
//!
//! Accepts survey uploads, persists them as pending import jobs and runs
//! the import pipeline for every queued job.
//!
//! ## Streams
//! - `ENGAGEMENT_IMPORT_JOBS` - one message per accepted upload

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use async_nats::jetstream::{self, AckKind, Context as JsContext};
use async_nats::Client;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::defaults::IMPORT_RETRY_DELAY;
use crate::error::ImportError;
use crate::services::import::{ImportJobStore, ImportPipeline, ImportRunOutcome};
use crate::types::{
    ImportJob, ImportJobStatus, ImportJobStatusUpdate, ImportSubmitResponse, QueuedImportJob,
};

// Stream and consumer names
const STREAM_NAME: &str = "ENGAGEMENT_IMPORT_JOBS";
const CONSUMER_NAME: &str = "import_workers";
const SUBJECT: &str = "engagement.jobs.import";
const STATUS_PREFIX: &str = "engagement.job.import.status";

/// What to tell JetStream once a delivery has been handled
#[derive(Debug, Clone, PartialEq, Eq)]
enum Disposition {
    /// Done for good; the upload can go
    Ack,
    /// Redeliver later; the upload is kept
    Retry,
    /// Another worker owns the job; leave the upload alone
    AckKeepFile,
    /// Write this failure message before acking, however long it takes
    FailThenAck(String),
}

/// Import job processor with JetStream integration
pub struct ImportProcessor {
    client: Client,
    js: JsContext,
    jobs: Arc<dyn ImportJobStore>,
    pipeline: Arc<ImportPipeline>,
    upload_dir: PathBuf,
    max_deliver: i64,
}

impl ImportProcessor {
    /// Create a new import processor, initializing the JetStream stream
    pub async fn new(
        client: Client,
        jobs: Arc<dyn ImportJobStore>,
        pipeline: Arc<ImportPipeline>,
        upload_dir: PathBuf,
        max_deliver: i64,
    ) -> Result<Self> {
        let js = jetstream::new(client.clone());

        let stream_config = jetstream::stream::Config {
            name: STREAM_NAME.to_string(),
            subjects: vec![SUBJECT.to_string()],
            max_messages: 10_000,
            retention: jetstream::stream::RetentionPolicy::WorkQueue,
            ..Default::default()
        };
        js.get_or_create_stream(stream_config).await?;
        info!("JetStream import stream '{}' ready", STREAM_NAME);

        Ok(Self {
            client,
            js,
            jobs,
            pipeline,
            upload_dir,
            max_deliver,
        })
    }

    /// Store an upload, create its pending job and queue it
    pub async fn submit_upload(&self, file_name: &str, csv_content: &str) -> Result<ImportSubmitResponse> {
        tokio::fs::create_dir_all(&self.upload_dir).await?;
        let path = upload_path(&self.upload_dir, file_name, Utc::now(), Uuid::new_v4());
        tokio::fs::write(&path, csv_content).await?;

        let job = match self.jobs.create_job(file_name, &path.to_string_lossy()).await {
            Ok(job) => job,
            Err(e) => {
                remove_upload(&path).await;
                return Err(e.into());
            }
        };

        let payload = serde_json::to_vec(&QueuedImportJob::new(job.id))?;
        let published = match self.js.publish(SUBJECT, payload.into()).await {
            Ok(ack) => ack.await.map(|_| ()).map_err(anyhow::Error::from),
            Err(e) => Err(e.into()),
        };
        if let Err(e) = published {
            error!("Failed to queue import {}: {}", job.id, e);
            if let Err(mark_err) = self.jobs.mark_failed(job.id, "could not queue import").await {
                error!("Failed to mark import {} as failed: {}", job.id, mark_err);
            }
            remove_upload(&path).await;
            return Err(e);
        }

        info!("Import {} queued: {} ({} bytes)", job.id, file_name, csv_content.len());
        self.publish_status(&job).await;

        Ok(ImportSubmitResponse {
            job_id: job.id,
            status: job.status,
            message: "Import queued for processing".to_string(),
        })
    }

    /// Broadcast the job's current state; best effort
    pub async fn publish_status(&self, job: &ImportJob) {
        let update = ImportJobStatusUpdate::from_job(job);
        let subject = format!("{}.{}", STATUS_PREFIX, job.id);
        let result = match serde_json::to_vec(&update) {
            Ok(payload) => self.client.publish(subject, payload.into()).await.map_err(anyhow::Error::from),
            Err(e) => Err(e.into()),
        };
        if let Err(e) = result {
            warn!("Failed to publish status of import {}: {}", job.id, e);
        }
    }

    /// Start processing import jobs from the queue
    pub async fn start_processing(self: Arc<Self>) -> Result<()> {
        let stream = self.js.get_stream(STREAM_NAME).await?;

        let consumer_config = jetstream::consumer::pull::Config {
            durable_name: Some(CONSUMER_NAME.to_string()),
            ack_policy: jetstream::consumer::AckPolicy::Explicit,
            max_deliver: self.max_deliver,
            ..Default::default()
        };

        let consumer = stream.get_or_create_consumer(CONSUMER_NAME, consumer_config).await?;
        info!("JetStream import consumer '{}' ready", CONSUMER_NAME);

        let mut messages = consumer.messages().await?;

        while let Some(msg) = messages.next().await {
            match msg {
                Ok(msg) => {
                    let processor = Arc::clone(&self);
                    tokio::spawn(async move {
                        if let Err(e) = processor.process_job(msg).await {
                            error!("Failed to process import job: {}", e);
                        }
                    });
                }
                Err(e) => {
                    error!("Error receiving import message: {}", e);
                }
            }
        }

        Ok(())
    }

    async fn process_job(&self, msg: jetstream::Message) -> Result<()> {
        let queued: QueuedImportJob = match serde_json::from_slice(&msg.payload) {
            Ok(queued) => queued,
            Err(e) => {
                error!("Dropping unreadable import message: {}", e);
                ack(&msg, AckKind::Ack).await;
                return Ok(());
            }
        };
        let job_id = queued.job_id;
        let delivered = msg.info().map(|info| info.delivered).unwrap_or(1);
        debug!("Import {} delivery {} (queued {})", job_id, delivered, queued.submitted_at);

        let result = self.pipeline.run(job_id).await;

        let current = match &result {
            Err(_) => Some(self.jobs.find_job(job_id).await),
            Ok(_) => None,
        };
        let disposition = choose_disposition(&result, current.as_ref(), delivered, self.max_deliver);

        if let Disposition::FailThenAck(message) = &disposition {
            warn!("Import {} needs its failure recorded: {}", job_id, message);
            let delivery = &msg;
            let recorded = record_failure(self.jobs.as_ref(), job_id, message, move || async move {
                ack(delivery, AckKind::Progress).await;
                tokio::time::sleep(IMPORT_RETRY_DELAY).await;
            })
            .await;
            if !recorded {
                error!("Gave up recording the failure of import {}", job_id);
            }
        }

        match disposition {
            Disposition::Retry => {
                warn!("Import {} hit a transient error, retrying in {:?}", job_id, IMPORT_RETRY_DELAY);
                ack(&msg, AckKind::Nak(Some(IMPORT_RETRY_DELAY))).await;
            }
            Disposition::AckKeepFile => {
                ack(&msg, AckKind::Ack).await;
            }
            Disposition::Ack | Disposition::FailThenAck(_) => {
                if let Ok(Some(job)) = self.jobs.find_job(job_id).await {
                    self.publish_status(&job).await;
                    remove_upload(Path::new(&job.file_path)).await;
                }
                ack(&msg, AckKind::Ack).await;
            }
        }

        result.map(|_| ()).map_err(anyhow::Error::from)
    }
}

/// Decide how a delivery ends from the run result and, for failed runs,
/// the job as it reads now
fn choose_disposition(
    result: &Result<ImportRunOutcome, ImportError>,
    current: Option<&Result<Option<ImportJob>, ImportError>>,
    delivered: i64,
    max_deliver: i64,
) -> Disposition {
    let error = match result {
        Ok(ImportRunOutcome::Skipped(ImportJobStatus::Processing)) => return Disposition::AckKeepFile,
        Ok(_) => return Disposition::Ack,
        Err(error) => error,
    };

    // The job reads as processing; a redelivery would only skip it
    if let ImportError::FailureUnrecorded { error, .. } = error {
        return Disposition::FailThenAck(error.to_string());
    }

    if !current.is_some_and(|current| should_retry(error, current)) {
        return Disposition::Ack;
    }
    if delivered >= max_deliver {
        return Disposition::FailThenAck(format!("gave up after {} attempts: {}", delivered, error));
    }
    Disposition::Retry
}

/// Keep writing the failure until it lands, calling `wait` between
/// attempts. False only when the store rejects it for good.
async fn record_failure<F, Fut>(jobs: &dyn ImportJobStore, job_id: Uuid, message: &str, mut wait: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ()>,
{
    let mut attempt: u32 = 1;
    loop {
        match jobs.mark_failed(job_id, message).await {
            Ok(true) => {
                info!("Import {} marked as failed after {} attempt(s)", job_id, attempt);
                return true;
            }
            Ok(false) => {
                debug!("Import {} already terminal", job_id);
                return true;
            }
            Err(e) if e.is_transient() => {
                warn!("Failed to mark import {} as failed (attempt {}): {}", job_id, attempt, e);
                wait().await;
                attempt = attempt.saturating_add(1);
            }
            Err(e) => {
                error!("Failed to mark import {} as failed: {}", job_id, e);
                return false;
            }
        }
    }
}

/// Redeliver only infrastructure failures that left the job untouched
fn should_retry(error: &ImportError, current: &Result<Option<ImportJob>, ImportError>) -> bool {
    if !error.is_transient() {
        return false;
    }
    match current {
        Ok(Some(job)) => job.status == ImportJobStatus::Pending,
        Ok(None) => false,
        Err(_) => true,
    }
}

async fn ack(msg: &jetstream::Message, kind: AckKind) {
    if let Err(e) = msg.ack_with(kind).await {
        error!("Failed to acknowledge import message: {:?}", e);
    }
}

/// Delete an upload; a file that is already gone is fine
async fn remove_upload(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => info!("Cleaned up upload: {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to clean up upload {}: {}", path.display(), e),
    }
}

/// `<dir>/<stem>_<timestamp>_<suffix><.ext>` with the stem reduced to
/// filename-safe characters
fn upload_path(dir: &Path, file_name: &str, now: DateTime<Utc>, nonce: Uuid) -> PathBuf {
    let original = Path::new(file_name);
    let stem: String = original
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    let stem = if stem.is_empty() { "upload".to_string() } else { stem };
    let extension = original
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    let suffix: String = nonce.simple().to_string().chars().take(8).collect();

    dir.join(format!("{}_{}_{}{}", stem, now.format("%Y%m%d%H%M%S"), suffix, extension))
}

// ==========================================================================
// Tests
// ==========================================================================
