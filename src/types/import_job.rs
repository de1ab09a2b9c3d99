//! Import job types
//!
//! The persisted import record plus the wire types used to submit an
//! upload, poll its progress and list recent imports.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::{FromRow, Type};
use uuid::Uuid;

use super::response::round_to;

// ==========================================================================
// Tests First (TDD)
// ==========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn job_with(processed: i32, total: i32) -> ImportJob {
        let mut job = ImportJob::new("respostas.csv", "/tmp/respostas.csv");
        job.processed_rows = processed;
        job.total_rows = total;
        job
    }

    #[test]
    fn test_progress_percentage_is_zero_without_rows() {
        assert_eq!(job_with(0, 0).progress_percentage(), 0.0);
        assert_eq!(job_with(5, 0).progress_percentage(), 0.0);
    }

    #[test]
    fn test_progress_percentage_rounds_to_one_decimal() {
        assert_eq!(job_with(1, 3).progress_percentage(), 33.3);
        assert_eq!(job_with(2, 3).progress_percentage(), 66.7);
        assert_eq!(job_with(50, 100).progress_percentage(), 50.0);
        assert_eq!(job_with(100, 100).progress_percentage(), 100.0);
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(!ImportJobStatus::Pending.is_terminal());
        assert!(!ImportJobStatus::Processing.is_terminal());
        assert!(ImportJobStatus::Completed.is_terminal());
        assert!(ImportJobStatus::Failed.is_terminal());
    }

    #[test]
    fn test_new_job_is_pending_and_empty() {
        let job = ImportJob::new("respostas.csv", "/tmp/respostas.csv");
        assert_eq!(job.status, ImportJobStatus::Pending);
        assert!(job.import_errors.0.is_empty());
        assert!(job.started_at.is_none());
        assert!(job.duration_seconds().is_none());
    }

    #[test]
    fn test_view_serializes_progress_and_results() {
        let mut job = job_with(1, 2);
        job.import_errors = Json(vec![RowDiagnostic {
            line: 3,
            subject: Some("João".to_string()),
            message: "duplicate".to_string(),
        }]);
        let view = ImportJobView::from(&job);
        let json = serde_json::to_string(&view).unwrap();

        assert!(json.contains("\"status\":\"pending\""));
        assert!(json.contains("\"processedRows\":1"));
        assert!(json.contains("\"percentage\":50.0"));
        assert!(json.contains("\"line\":3"));
        assert!(json.contains("\"employeesCreated\":0"));
    }

    #[test]
    fn test_queued_job_round_trips_job_id() {
        let queued = QueuedImportJob::new(Uuid::nil());
        let json = serde_json::to_vec(&queued).unwrap();
        let parsed: QueuedImportJob = serde_json::from_slice(&json).unwrap();
        assert_eq!(parsed.job_id, Uuid::nil());
    }

    #[test]
    fn test_submit_request_deserializes_from_camel_case() {
        let json = r#"{"fileName":"pesquisa.csv","csvContent":"nome;email\n"}"#;
        let request: ImportSubmitRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.file_name, "pesquisa.csv");
    }
}

// ==========================================================================
// Persisted import record
// ==========================================================================

/// Lifecycle of an import: pending -> processing -> completed | failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[sqlx(type_name = "import_job_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ImportJobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl ImportJobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImportJobStatus::Pending => "pending",
            ImportJobStatus::Processing => "processing",
            ImportJobStatus::Completed => "completed",
            ImportJobStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ImportJobStatus::Completed | ImportJobStatus::Failed)
    }

    /// Human readable label for status screens
    pub fn label(&self) -> &'static str {
        match self {
            ImportJobStatus::Pending => "Aguardando processamento",
            ImportJobStatus::Processing => "Processando",
            ImportJobStatus::Completed => "Concluído",
            ImportJobStatus::Failed => "Falhou",
        }
    }
}

/// Diagnostic for one rejected CSV row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RowDiagnostic {
    /// 1-based file line; the header is line 1
    pub line: u64,
    /// Employee the row refers to, when the row names one
    pub subject: Option<String>,
    pub message: String,
}

/// Import record, advanced by the pipeline and read by pollers
#[derive(Debug, Clone, FromRow)]
pub struct ImportJob {
    pub id: Uuid,
    pub file_name: String,
    pub file_path: String,
    pub status: ImportJobStatus,
    pub total_rows: i32,
    pub processed_rows: i32,
    pub employees_created: i32,
    pub responses_created: i32,
    pub import_errors: Json<Vec<RowDiagnostic>>,
    pub error_message: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ImportJob {
    pub fn new(file_name: &str, file_path: &str) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            file_name: file_name.to_string(),
            file_path: file_path.to_string(),
            status: ImportJobStatus::Pending,
            total_rows: 0,
            processed_rows: 0,
            employees_created: 0,
            responses_created: 0,
            import_errors: Json(Vec::new()),
            error_message: None,
            started_at: None,
            completed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// processed / total * 100, one decimal; 0 when nothing was counted
    pub fn progress_percentage(&self) -> f64 {
        if self.total_rows <= 0 {
            return 0.0;
        }
        round_to(self.processed_rows as f64 / self.total_rows as f64 * 100.0, 1)
    }

    /// Seconds since start, up to completion or now
    pub fn duration_seconds(&self) -> Option<f64> {
        let started_at = self.started_at?;
        let end = self.completed_at.unwrap_or_else(Utc::now);
        Some((end - started_at).num_milliseconds() as f64 / 1000.0)
    }

    pub fn has_import_errors(&self) -> bool {
        !self.import_errors.0.is_empty()
    }
}

/// Final counts of a finished import
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    pub processed_rows: i32,
    pub employees_created: i32,
    pub responses_created: i32,
    pub errors: Vec<RowDiagnostic>,
}

// ==========================================================================
// Wire types
// ==========================================================================

/// Upload submitted for import
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSubmitRequest {
    pub file_name: String,
    pub csv_content: String,
}

/// Returned as soon as the upload is accepted
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSubmitResponse {
    pub job_id: Uuid,
    pub status: ImportJobStatus,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportStatusRequest {
    pub job_id: Uuid,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportListRequest {
    #[serde(default)]
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportProgressView {
    pub total_rows: i32,
    pub processed_rows: i32,
    pub percentage: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportResultsView {
    pub employees_created: i32,
    pub responses_created: i32,
    pub errors: Vec<RowDiagnostic>,
}

/// Full status of one import, as seen by a polling client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportJobView {
    pub id: Uuid,
    pub status: ImportJobStatus,
    pub status_label: String,
    pub file_name: String,
    pub progress: ImportProgressView,
    pub results: ImportResultsView,
    pub error_message: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub duration_seconds: Option<f64>,
}

impl From<&ImportJob> for ImportJobView {
    fn from(job: &ImportJob) -> Self {
        Self {
            id: job.id,
            status: job.status,
            status_label: job.status.label().to_string(),
            file_name: job.file_name.clone(),
            progress: ImportProgressView {
                total_rows: job.total_rows,
                processed_rows: job.processed_rows,
                percentage: job.progress_percentage(),
            },
            results: ImportResultsView {
                employees_created: job.employees_created,
                responses_created: job.responses_created,
                errors: job.import_errors.0.clone(),
            },
            error_message: job.error_message.clone(),
            started_at: job.started_at,
            completed_at: job.completed_at,
            duration_seconds: job.duration_seconds(),
        }
    }
}

/// Row of the recent imports listing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportJobListItem {
    pub id: Uuid,
    pub status: ImportJobStatus,
    pub status_label: String,
    pub file_name: String,
    pub progress_percentage: f64,
    pub employees_created: i32,
    pub responses_created: i32,
    pub has_errors: bool,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<&ImportJob> for ImportJobListItem {
    fn from(job: &ImportJob) -> Self {
        Self {
            id: job.id,
            status: job.status,
            status_label: job.status.label().to_string(),
            file_name: job.file_name.clone(),
            progress_percentage: job.progress_percentage(),
            employees_created: job.employees_created,
            responses_created: job.responses_created,
            has_errors: job.has_import_errors(),
            created_at: job.created_at,
            completed_at: job.completed_at,
        }
    }
}

// ==========================================================================
// JetStream payloads
// ==========================================================================

/// Queue entry pointing at a persisted import record
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuedImportJob {
    pub job_id: Uuid,
    pub submitted_at: DateTime<Utc>,
}

impl QueuedImportJob {
    pub fn new(job_id: Uuid) -> Self {
        Self {
            job_id,
            submitted_at: Utc::now(),
        }
    }
}

/// Broadcast when an import is queued and when it reaches a terminal state
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportJobStatusUpdate {
    pub job_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub status: ImportJobStatus,
    pub progress_percentage: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl ImportJobStatusUpdate {
    pub fn from_job(job: &ImportJob) -> Self {
        Self {
            job_id: job.id,
            timestamp: Utc::now(),
            status: job.status,
            progress_percentage: job.progress_percentage(),
            error_message: job.error_message.clone(),
        }
    }
}
