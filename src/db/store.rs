//! Postgres implementation of the import storage seams

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::error::{ImportError, RowError, StoreError};
use crate::services::import::{ImportJobStore, RowTransaction, SurveyStore};
use crate::types::{Employee, EmployeeKey, ImportJob, ImportSummary, NewResponse, Response};

use super::queries::{employee, import_job, response};

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Name of the violated unique constraint, if `err` is a unique violation
fn unique_violation(err: &sqlx::Error) -> Option<String> {
    match err {
        sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("23505") => {
            db_err.constraint().map(str::to_string)
        }
        _ => None,
    }
}

/// Employee writes can collide with another row's emails
fn employee_write_error(err: sqlx::Error, employee: &Employee) -> StoreError {
    let taken = match unique_violation(&err).as_deref() {
        Some(employee::CORPORATE_EMAIL_INDEX) => employee
            .corporate_email
            .clone()
            .map(RowError::CorporateEmailTaken),
        Some(employee::EMAIL_INDEX) => employee.email.clone().map(RowError::EmailTaken),
        _ => None,
    };
    match taken {
        Some(row_error) => row_error.into(),
        None => err.into(),
    }
}

#[async_trait]
impl SurveyStore for PgStore {
    async fn begin_row(&self) -> Result<Box<dyn RowTransaction>, StoreError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgRowTransaction { tx }))
    }
}

/// One row's writes; rolled back by sqlx when dropped uncommitted
struct PgRowTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl RowTransaction for PgRowTransaction {
    async fn find_employee(&mut self, key: EmployeeKey<'_>) -> Result<Option<Employee>, StoreError> {
        Ok(employee::find_by_key(&mut *self.tx, key).await?)
    }

    async fn insert_employee(&mut self, employee: &Employee) -> Result<(), StoreError> {
        employee::insert_employee(&mut *self.tx, employee)
            .await
            .map_err(|e| employee_write_error(e, employee))
    }

    async fn update_employee(&mut self, employee: &Employee) -> Result<(), StoreError> {
        employee::update_profile(&mut *self.tx, employee)
            .await
            .map_err(|e| employee_write_error(e, employee))
    }

    async fn insert_response(&mut self, new_response: &NewResponse) -> Result<Response, StoreError> {
        response::insert_response(&mut *self.tx, new_response)
            .await
            .map_err(|e| match unique_violation(&e).as_deref() {
                Some(response::EMPLOYEE_DATE_CONSTRAINT) => {
                    RowError::DuplicateResponse(new_response.response_date).into()
                }
                _ => e.into(),
            })
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl ImportJobStore for PgStore {
    async fn create_job(&self, file_name: &str, file_path: &str) -> Result<ImportJob, ImportError> {
        let job = ImportJob::new(file_name, file_path);
        Ok(import_job::create_import_job(&self.pool, &job).await?)
    }

    async fn find_job(&self, id: Uuid) -> Result<Option<ImportJob>, ImportError> {
        Ok(import_job::get_import_job(&self.pool, id).await?)
    }

    async fn list_recent_jobs(&self, limit: i64) -> Result<Vec<ImportJob>, ImportError> {
        Ok(import_job::list_recent_import_jobs(&self.pool, limit).await?)
    }

    async fn mark_processing(&self, id: Uuid) -> Result<bool, ImportError> {
        Ok(import_job::mark_processing(&self.pool, id).await?)
    }

    async fn record_progress(&self, id: Uuid, processed: i32, total: Option<i32>) -> Result<(), ImportError> {
        Ok(import_job::record_progress(&self.pool, id, processed, total).await?)
    }

    async fn mark_completed(&self, id: Uuid, summary: &ImportSummary) -> Result<bool, ImportError> {
        Ok(import_job::mark_completed(&self.pool, id, summary).await?)
    }

    async fn mark_failed(&self, id: Uuid, message: &str) -> Result<bool, ImportError> {
        Ok(import_job::mark_failed(&self.pool, id, message).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_database_errors_are_not_unique_violations() {
        assert_eq!(unique_violation(&sqlx::Error::RowNotFound), None);
    }

    #[test]
    fn test_employee_write_error_falls_back_to_fatal() {
        let employee = Employee::from_profile("Ana".to_string(), &Default::default());
        let err = employee_write_error(sqlx::Error::PoolTimedOut, &employee);
        assert!(matches!(err, StoreError::Fatal(ImportError::Storage(_))));
    }
}
