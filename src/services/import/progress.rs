//! Progress tracker over the persisted import record

use std::sync::Arc;

use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::ImportError;
use crate::types::ImportSummary;

use super::store::ImportJobStore;

#[derive(Clone)]
pub struct ProgressTracker {
    jobs: Arc<dyn ImportJobStore>,
    job_id: Uuid,
}

impl ProgressTracker {
    pub fn new(jobs: Arc<dyn ImportJobStore>, job_id: Uuid) -> Self {
        Self { jobs, job_id }
    }

    /// pending -> processing. False when the job had already left pending.
    pub async fn start(&self) -> Result<bool, ImportError> {
        self.jobs.mark_processing(self.job_id).await
    }

    /// Best effort: a failed write is logged and the import carries on
    pub async fn checkpoint(&self, processed: i32, total: Option<i32>) {
        match self.jobs.record_progress(self.job_id, processed, total).await {
            Ok(()) => debug!("Import {} checkpoint: {} rows", self.job_id, processed),
            Err(e) => warn!("Failed to record progress for import {}: {}", self.job_id, e),
        }
    }

    pub async fn finish_success(&self, summary: &ImportSummary) -> Result<(), ImportError> {
        if !self.jobs.mark_completed(self.job_id, summary).await? {
            warn!("Import {} was no longer processing, completion not recorded", self.job_id);
        }
        Ok(())
    }

    pub async fn finish_failure(&self, message: &str) -> Result<(), ImportError> {
        if !self.jobs.mark_failed(self.job_id, message).await? {
            warn!("Import {} already terminal, failure not recorded", self.job_id);
        }
        Ok(())
    }
}
