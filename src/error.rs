//! Import error taxonomy
//!
//! Row errors are recorded as diagnostics and never stop an import.
//! Import errors abort the whole run and move the job to `failed`.

use std::path::PathBuf;

use chrono::NaiveDate;
use thiserror::Error;
use uuid::Uuid;

/// Business failure scoped to a single CSV row
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RowError {
    #[error("row has neither email_corporativo nor email")]
    MissingIdentity,

    #[error("name can't be blank for a new employee")]
    MissingName,

    #[error("{field} is not a valid email address: {value}")]
    InvalidEmail { field: &'static str, value: String },

    #[error("email {0} is already used by another employee")]
    EmailTaken(String),

    #[error("email_corporativo {0} was taken by a concurrent import")]
    CorporateEmailTaken(String),

    #[error("{label} must be between 1 and 7 (got {value})")]
    ScoreOutOfRange { label: &'static str, value: i32 },

    #[error("eNPS must be between 0 and 10 (got {0})")]
    EnpsOutOfRange(i32),

    #[error("employee already has a response dated {0}")]
    DuplicateResponse(NaiveDate),

    #[error("invalid response date: {0}")]
    InvalidDate(String),

    #[error("malformed CSV record: {0}")]
    Malformed(String),
}

/// Failure that aborts the whole import
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("import job {0} not found")]
    JobNotFound(Uuid),

    #[error("CSV file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("CSV file has no header row")]
    MissingHeader,

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("import task aborted: {0}")]
    Task(String),

    /// The run failed after leaving pending and the failure could not be
    /// written, so the job still reads as processing
    #[error("{error} (failure not recorded: {record_error})")]
    FailureUnrecorded {
        error: Box<ImportError>,
        record_error: Box<ImportError>,
    },
}

impl ImportError {
    /// Infrastructure failures worth retrying at the job level.
    /// Business and file problems are never retried.
    pub fn is_transient(&self) -> bool {
        match self {
            ImportError::StorageUnavailable(_) => true,
            ImportError::Storage(err) => is_transient_sqlx(err),
            _ => false,
        }
    }
}

fn is_transient_sqlx(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Io(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed => true,
        sqlx::Error::Database(db_err) => match db_err.code().as_deref() {
            // serialization_failure, deadlock_detected, admin_shutdown
            Some("40001") | Some("40P01") | Some("57P01") => true,
            // connection_exception class
            Some(code) => code.starts_with("08"),
            None => false,
        },
        _ => false,
    }
}

/// Error crossing the storage seam: either the row is rejected or the
/// store itself failed
#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Row(#[from] RowError),

    #[error(transparent)]
    Fatal(#[from] ImportError),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::Fatal(ImportError::Storage(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_error_messages_name_the_field() {
        let err = RowError::ScoreOutOfRange { label: "Feedback", value: 9 };
        assert_eq!(err.to_string(), "Feedback must be between 1 and 7 (got 9)");

        let err = RowError::InvalidEmail { field: "email_corporativo", value: "nope".to_string() };
        assert!(err.to_string().contains("email_corporativo"));
    }

    #[test]
    fn test_file_errors_are_not_transient() {
        assert!(!ImportError::FileNotFound(PathBuf::from("/tmp/x.csv")).is_transient());
        assert!(!ImportError::MissingHeader.is_transient());
        assert!(!ImportError::JobNotFound(Uuid::nil()).is_transient());
    }

    #[test]
    fn test_unrecorded_failure_is_not_transient() {
        let err = ImportError::FailureUnrecorded {
            error: Box::new(ImportError::StorageUnavailable("rows".to_string())),
            record_error: Box::new(ImportError::StorageUnavailable("status".to_string())),
        };
        assert!(!err.is_transient());
        assert_eq!(
            err.to_string(),
            "storage unavailable: rows (failure not recorded: storage unavailable: status)"
        );
    }

    #[test]
    fn test_connection_failures_are_transient() {
        assert!(ImportError::Storage(sqlx::Error::PoolTimedOut).is_transient());
        assert!(ImportError::StorageUnavailable("down".to_string()).is_transient());
        assert!(!ImportError::Storage(sqlx::Error::RowNotFound).is_transient());
    }

    #[test]
    fn test_sqlx_error_converts_to_fatal_store_error() {
        let err: StoreError = sqlx::Error::PoolTimedOut.into();
        assert!(matches!(err, StoreError::Fatal(ImportError::Storage(_))));
    }
}
