//! Storage seams used by the import pipeline
//!
//! Postgres implements both traits in production (`db::store`); the
//! in-memory store backs dry runs and tests.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::{ImportError, StoreError};
use crate::types::{Employee, EmployeeKey, ImportJob, ImportSummary, NewResponse, Response};

/// Unit of work for one CSV row.
///
/// Dropping the transaction without calling `commit` discards every write
/// made through it.
#[async_trait]
pub trait RowTransaction: Send {
    async fn find_employee(&mut self, key: EmployeeKey<'_>) -> Result<Option<Employee>, StoreError>;

    async fn insert_employee(&mut self, employee: &Employee) -> Result<(), StoreError>;

    async fn update_employee(&mut self, employee: &Employee) -> Result<(), StoreError>;

    /// Fails with `RowError::DuplicateResponse` when the employee already
    /// answered on that date.
    async fn insert_response(&mut self, response: &NewResponse) -> Result<Response, StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;
}

/// Employee and response storage
#[async_trait]
pub trait SurveyStore: Send + Sync {
    async fn begin_row(&self) -> Result<Box<dyn RowTransaction>, StoreError>;
}

/// Persisted import records.
///
/// Status changes are conditional so two workers racing on the same job
/// cannot both move it forward.
#[async_trait]
pub trait ImportJobStore: Send + Sync {
    async fn create_job(&self, file_name: &str, file_path: &str) -> Result<ImportJob, ImportError>;

    async fn find_job(&self, id: Uuid) -> Result<Option<ImportJob>, ImportError>;

    async fn list_recent_jobs(&self, limit: i64) -> Result<Vec<ImportJob>, ImportError>;

    /// pending -> processing; returns false when the job was not pending
    async fn mark_processing(&self, id: Uuid) -> Result<bool, ImportError>;

    /// Never moves `processed_rows` backwards
    async fn record_progress(&self, id: Uuid, processed: i32, total: Option<i32>) -> Result<(), ImportError>;

    /// processing -> completed
    async fn mark_completed(&self, id: Uuid, summary: &ImportSummary) -> Result<bool, ImportError>;

    /// pending | processing -> failed
    async fn mark_failed(&self, id: Uuid, message: &str) -> Result<bool, ImportError>;
}
