//! In-memory storage for dry runs and tests
//!
//! Row transactions stage only their own writes and merge them on commit;
//! reads see the staged rows first, then the indexed shared data. A tokio
//! mutex held for the lifetime of the transaction keeps rows serialized the
//! same way row locks do in Postgres.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use parking_lot::RwLock;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::error::{ImportError, RowError, StoreError};
use crate::types::{
    Employee, EmployeeKey, ImportJob, ImportJobStatus, ImportSummary, NewResponse, Response,
};

use super::store::{ImportJobStore, RowTransaction, SurveyStore};

/// Employees and responses with the lookups a row needs kept in O(1)
#[derive(Debug, Default)]
struct SurveyData {
    employees: Vec<Employee>,
    positions: HashMap<Uuid, usize>,
    corporate_emails: HashMap<String, Uuid>,
    emails: HashMap<String, Uuid>,
    responses: Vec<Response>,
    response_dates: HashSet<(Uuid, NaiveDate)>,
}

fn email_key(email: &str) -> String {
    email.to_ascii_lowercase()
}

impl SurveyData {
    fn employee(&self, id: Uuid) -> Option<&Employee> {
        self.positions.get(&id).and_then(|pos| self.employees.get(*pos))
    }

    fn owner(&self, key: EmployeeKey<'_>) -> Option<Uuid> {
        let index = match key {
            EmployeeKey::CorporateEmail(_) => &self.corporate_emails,
            EmployeeKey::Email(_) => &self.emails,
        };
        index.get(&email_key(key.value())).copied()
    }

    fn upsert_employee(&mut self, employee: Employee) {
        let id = employee.id;
        if let Some(previous) = self.employee(id).cloned() {
            for (index, email) in [
                (&mut self.corporate_emails, previous.corporate_email),
                (&mut self.emails, previous.email),
            ] {
                if let Some(email) = email {
                    let key = email_key(&email);
                    if index.get(&key) == Some(&id) {
                        index.remove(&key);
                    }
                }
            }
        }
        if let Some(corporate) = &employee.corporate_email {
            self.corporate_emails.insert(email_key(corporate), id);
        }
        if let Some(email) = &employee.email {
            self.emails.insert(email_key(email), id);
        }
        match self.positions.get(&id) {
            Some(&pos) => self.employees[pos] = employee,
            None => {
                self.positions.insert(id, self.employees.len());
                self.employees.push(employee);
            }
        }
    }

    fn push_response(&mut self, response: Response) {
        self.response_dates.insert((response.employee_id, response.response_date));
        self.responses.push(response);
    }
}

#[derive(Debug, Default)]
struct JobData {
    jobs: HashMap<Uuid, ImportJob>,
    checkpoints: HashMap<Uuid, Vec<(i32, Option<i32>)>>,
}

/// Shared in-memory store; clones see the same data
#[derive(Clone, Default)]
pub struct MemoryStore {
    survey: Arc<RwLock<SurveyData>>,
    jobs: Arc<RwLock<JobData>>,
    row_gate: Arc<Mutex<()>>,
    storage_down: Arc<AtomicBool>,
    checkpoints_down: Arc<AtomicBool>,
    terminal_writes_down: Arc<AtomicBool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn employees(&self) -> Vec<Employee> {
        self.survey.read().employees.clone()
    }

    #[cfg(test)]
    pub fn responses(&self) -> Vec<Response> {
        self.survey.read().responses.clone()
    }

    /// Every `record_progress` call for the job, in order
    #[cfg(test)]
    pub fn checkpoints(&self, job_id: Uuid) -> Vec<(i32, Option<i32>)> {
        self.jobs.read().checkpoints.get(&job_id).cloned().unwrap_or_default()
    }

    /// Store a job as-is, whatever its status
    pub fn insert_job(&self, job: ImportJob) {
        self.jobs.write().jobs.insert(job.id, job);
    }

    /// Make every new row transaction fail as if the database went away
    #[cfg(test)]
    pub fn set_storage_unavailable(&self, down: bool) {
        self.storage_down.store(down, Ordering::SeqCst);
    }

    /// Make checkpoint writes fail while leaving everything else working
    #[cfg(test)]
    pub fn set_checkpoints_unavailable(&self, down: bool) {
        self.checkpoints_down.store(down, Ordering::SeqCst);
    }

    /// Make completion and failure writes fail
    #[cfg(test)]
    pub fn set_terminal_writes_unavailable(&self, down: bool) {
        self.terminal_writes_down.store(down, Ordering::SeqCst);
    }

    fn terminal_write_guard(&self) -> Result<(), ImportError> {
        if self.terminal_writes_down.load(Ordering::SeqCst) {
            return Err(ImportError::StorageUnavailable("terminal status write refused".to_string()));
        }
        Ok(())
    }

    fn with_job<T>(&self, id: Uuid, f: impl FnOnce(&mut ImportJob) -> T) -> Result<T, ImportError> {
        let mut data = self.jobs.write();
        let job = data.jobs.get_mut(&id).ok_or(ImportError::JobNotFound(id))?;
        let result = f(job);
        job.updated_at = Utc::now();
        Ok(result)
    }
}

#[async_trait]
impl SurveyStore for MemoryStore {
    async fn begin_row(&self) -> Result<Box<dyn RowTransaction>, StoreError> {
        if self.storage_down.load(Ordering::SeqCst) {
            return Err(ImportError::StorageUnavailable("memory store offline".to_string()).into());
        }
        let gate = self.row_gate.clone().lock_owned().await;
        Ok(Box::new(MemoryRowTransaction {
            _gate: gate,
            target: self.survey.clone(),
            employees: Vec::new(),
            responses: Vec::new(),
        }))
    }
}

/// Writes of one row, merged into the shared data on commit
struct MemoryRowTransaction {
    _gate: OwnedMutexGuard<()>,
    target: Arc<RwLock<SurveyData>>,
    employees: Vec<Employee>,
    responses: Vec<Response>,
}

impl MemoryRowTransaction {
    fn staged(&self, id: Uuid) -> Option<&Employee> {
        self.employees.iter().find(|e| e.id == id)
    }

    /// Current holder of `key`, staged rows shadowing committed ones
    fn lookup(&self, key: EmployeeKey<'_>) -> Option<Employee> {
        if let Some(found) = self.employees.iter().find(|e| key.matches(e)) {
            return Some(found.clone());
        }
        let data = self.target.read();
        let id = data.owner(key)?;
        match self.staged(id) {
            // Staged version no longer carries this email
            Some(_) => None,
            None => data.employee(id).cloned(),
        }
    }

    fn check_unique_emails(&self, employee: &Employee) -> Result<(), RowError> {
        if let Some(corporate) = &employee.corporate_email {
            if self
                .lookup(EmployeeKey::CorporateEmail(corporate))
                .is_some_and(|other| other.id != employee.id)
            {
                return Err(RowError::CorporateEmailTaken(corporate.clone()));
            }
        }
        if let Some(email) = &employee.email {
            if self
                .lookup(EmployeeKey::Email(email))
                .is_some_and(|other| other.id != employee.id)
            {
                return Err(RowError::EmailTaken(email.clone()));
            }
        }
        Ok(())
    }

    fn stage_employee(&mut self, employee: &Employee) {
        match self.employees.iter_mut().find(|e| e.id == employee.id) {
            Some(staged) => *staged = employee.clone(),
            None => self.employees.push(employee.clone()),
        }
    }
}

#[async_trait]
impl RowTransaction for MemoryRowTransaction {
    async fn find_employee(&mut self, key: EmployeeKey<'_>) -> Result<Option<Employee>, StoreError> {
        Ok(self.lookup(key))
    }

    async fn insert_employee(&mut self, employee: &Employee) -> Result<(), StoreError> {
        self.check_unique_emails(employee)?;
        self.stage_employee(employee);
        Ok(())
    }

    async fn update_employee(&mut self, employee: &Employee) -> Result<(), StoreError> {
        let known = self.staged(employee.id).is_some() || self.target.read().employee(employee.id).is_some();
        if !known {
            return Err(ImportError::StorageUnavailable(format!("employee {} vanished", employee.id)).into());
        }
        self.check_unique_emails(employee)?;
        self.stage_employee(employee);
        Ok(())
    }

    async fn insert_response(&mut self, response: &NewResponse) -> Result<Response, StoreError> {
        let key = (response.employee_id, response.response_date);
        let duplicate = self
            .responses
            .iter()
            .any(|r| (r.employee_id, r.response_date) == key)
            || self.target.read().response_dates.contains(&key);
        if duplicate {
            return Err(RowError::DuplicateResponse(response.response_date).into());
        }
        let stored = response.clone().into_response();
        self.responses.push(stored.clone());
        Ok(stored)
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let this = *self;
        let mut data = this.target.write();
        for employee in this.employees {
            data.upsert_employee(employee);
        }
        for response in this.responses {
            data.push_response(response);
        }
        Ok(())
    }
}

#[async_trait]
impl ImportJobStore for MemoryStore {
    async fn create_job(&self, file_name: &str, file_path: &str) -> Result<ImportJob, ImportError> {
        let job = ImportJob::new(file_name, file_path);
        self.insert_job(job.clone());
        Ok(job)
    }

    async fn find_job(&self, id: Uuid) -> Result<Option<ImportJob>, ImportError> {
        Ok(self.jobs.read().jobs.get(&id).cloned())
    }

    async fn list_recent_jobs(&self, limit: i64) -> Result<Vec<ImportJob>, ImportError> {
        let mut jobs: Vec<ImportJob> = self.jobs.read().jobs.values().cloned().collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        jobs.truncate(limit.max(0) as usize);
        Ok(jobs)
    }

    async fn mark_processing(&self, id: Uuid) -> Result<bool, ImportError> {
        self.with_job(id, |job| {
            if job.status != ImportJobStatus::Pending {
                return false;
            }
            job.status = ImportJobStatus::Processing;
            job.started_at = Some(Utc::now());
            true
        })
    }

    async fn record_progress(&self, id: Uuid, processed: i32, total: Option<i32>) -> Result<(), ImportError> {
        if self.checkpoints_down.load(Ordering::SeqCst) {
            return Err(ImportError::StorageUnavailable("checkpoint write refused".to_string()));
        }
        self.with_job(id, |job| {
            job.processed_rows = job.processed_rows.max(processed);
            if let Some(total) = total {
                job.total_rows = total;
            }
        })?;
        self.jobs.write().checkpoints.entry(id).or_default().push((processed, total));
        Ok(())
    }

    async fn mark_completed(&self, id: Uuid, summary: &ImportSummary) -> Result<bool, ImportError> {
        self.terminal_write_guard()?;
        self.with_job(id, |job| {
            if job.status != ImportJobStatus::Processing {
                return false;
            }
            job.status = ImportJobStatus::Completed;
            job.processed_rows = job.processed_rows.max(summary.processed_rows);
            job.employees_created = summary.employees_created;
            job.responses_created = summary.responses_created;
            job.import_errors.0 = summary.errors.clone();
            job.completed_at = Some(Utc::now());
            true
        })
    }

    async fn mark_failed(&self, id: Uuid, message: &str) -> Result<bool, ImportError> {
        self.terminal_write_guard()?;
        self.with_job(id, |job| {
            if job.status.is_terminal() {
                return false;
            }
            job.status = ImportJobStatus::Failed;
            job.error_message = Some(message.to_string());
            job.completed_at = Some(Utc::now());
            true
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EmployeeProfile;

    fn employee(corporate: &str, email: Option<&str>) -> Employee {
        let profile = EmployeeProfile {
            corporate_email: Some(corporate.to_string()),
            email: email.map(str::to_string),
            ..Default::default()
        };
        Employee::from_profile("Ana".to_string(), &profile)
    }

    #[tokio::test]
    async fn test_uncommitted_writes_are_discarded() {
        let store = MemoryStore::new();
        {
            let mut tx = store.begin_row().await.unwrap();
            tx.insert_employee(&employee("ana@empresa.com", None)).await.unwrap();
        }
        assert!(store.employees().is_empty());
    }

    #[tokio::test]
    async fn test_personal_email_is_unique() {
        let store = MemoryStore::new();
        let mut tx = store.begin_row().await.unwrap();
        tx.insert_employee(&employee("ana@empresa.com", Some("ana@gmail.com"))).await.unwrap();

        let err = tx
            .insert_employee(&employee("outra@empresa.com", Some("ANA@gmail.com")))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Row(RowError::EmailTaken(_))));
    }

    #[tokio::test]
    async fn test_changed_email_is_released_for_others() {
        let store = MemoryStore::new();
        let mut ana = employee("ana@empresa.com", Some("ana@gmail.com"));
        let mut tx = store.begin_row().await.unwrap();
        tx.insert_employee(&ana).await.unwrap();
        tx.commit().await.unwrap();

        ana.email = Some("ana.lima@gmail.com".to_string());
        let mut tx = store.begin_row().await.unwrap();
        tx.update_employee(&ana).await.unwrap();
        assert!(tx.find_employee(EmployeeKey::Email("ana@gmail.com")).await.unwrap().is_none());
        tx.commit().await.unwrap();

        let mut tx = store.begin_row().await.unwrap();
        let found = tx.find_employee(EmployeeKey::Email("ANA.LIMA@gmail.com")).await.unwrap();
        assert_eq!(found.map(|e| e.id), Some(ana.id));
        tx.insert_employee(&employee("bruno@empresa.com", Some("ana@gmail.com"))).await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(store.employees().len(), 2);
        assert_eq!(store.employees()[0].email.as_deref(), Some("ana.lima@gmail.com"));
    }

    #[tokio::test]
    async fn test_committed_response_dates_are_unique() {
        let store = MemoryStore::new();
        let ana = employee("ana@empresa.com", None);
        let date = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        let answer = NewResponse {
            employee_id: ana.id,
            response_date: date,
            answers: Default::default(),
        };

        let mut tx = store.begin_row().await.unwrap();
        tx.insert_employee(&ana).await.unwrap();
        tx.insert_response(&answer).await.unwrap();
        tx.commit().await.unwrap();

        let mut tx = store.begin_row().await.unwrap();
        let err = tx.insert_response(&answer).await.unwrap_err();
        assert!(matches!(err, StoreError::Row(RowError::DuplicateResponse(d)) if d == date));
        drop(tx);
        assert_eq!(store.responses().len(), 1);
    }

    #[tokio::test]
    async fn test_many_rows_stay_indexed() {
        let store = MemoryStore::new();
        for i in 0..2_000 {
            let mut tx = store.begin_row().await.unwrap();
            tx.insert_employee(&employee(&format!("p{i}@empresa.com"), None)).await.unwrap();
            tx.commit().await.unwrap();
        }

        let mut tx = store.begin_row().await.unwrap();
        let found = tx.find_employee(EmployeeKey::CorporateEmail("P1999@EMPRESA.COM")).await.unwrap();
        assert_eq!(found.and_then(|e| e.corporate_email).as_deref(), Some("p1999@empresa.com"));
        assert_eq!(store.employees().len(), 2_000);
    }

    #[tokio::test]
    async fn test_status_transitions_are_one_way() {
        let store = MemoryStore::new();
        let job = store.create_job("a.csv", "/tmp/a.csv").await.unwrap();

        assert!(store.mark_processing(job.id).await.unwrap());
        assert!(!store.mark_processing(job.id).await.unwrap());
        assert!(store.mark_completed(job.id, &ImportSummary::default()).await.unwrap());
        assert!(!store.mark_failed(job.id, "late failure").await.unwrap());

        let job = store.find_job(job.id).await.unwrap().unwrap();
        assert_eq!(job.status, ImportJobStatus::Completed);
        assert!(job.error_message.is_none());
    }

    #[tokio::test]
    async fn test_progress_never_moves_backwards() {
        let store = MemoryStore::new();
        let job = store.create_job("a.csv", "/tmp/a.csv").await.unwrap();

        store.record_progress(job.id, 50, Some(100)).await.unwrap();
        store.record_progress(job.id, 20, None).await.unwrap();

        let job_after = store.find_job(job.id).await.unwrap().unwrap();
        assert_eq!(job_after.processed_rows, 50);
        assert_eq!(job_after.total_rows, 100);
        assert_eq!(store.checkpoints(job.id), vec![(50, Some(100)), (20, None)]);
    }

    #[tokio::test]
    async fn test_unknown_job_is_reported() {
        let store = MemoryStore::new();
        let err = store.mark_processing(Uuid::nil()).await.unwrap_err();
        assert!(matches!(err, ImportError::JobNotFound(_)));
    }
}
