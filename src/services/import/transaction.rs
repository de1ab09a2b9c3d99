//! Per-row atomic unit: identity upsert plus response insert
//!
//! Either both writes commit or neither does. There is no transaction
//! spanning the file, so one bad row never affects its siblings.

use uuid::Uuid;

use crate::error::StoreError;

use super::identity::resolve_employee;
use super::responses::write_response;
use super::row::SurveyRow;
use super::store::SurveyStore;

/// Committed effect of one row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowApplied {
    pub employee_id: Uuid,
    pub employee_created: bool,
    pub response_id: Uuid,
}

pub async fn apply_row(store: &dyn SurveyStore, row: &SurveyRow) -> Result<RowApplied, StoreError> {
    let mut tx = store.begin_row().await?;

    let resolved = resolve_employee(tx.as_mut(), &row.profile).await?;
    let response = write_response(tx.as_mut(), &resolved.employee, row).await?;

    tx.commit().await?;

    Ok(RowApplied {
        employee_id: resolved.employee.id,
        employee_created: resolved.created,
        response_id: response.id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use crate::error::RowError;
    use crate::services::import::memory::MemoryStore;
    use crate::types::{EmployeeProfile, SurveyAnswers};

    fn row(corporate: &str, name: &str, date: (i32, u32, u32), feedback: i32) -> SurveyRow {
        SurveyRow {
            profile: EmployeeProfile {
                corporate_email: Some(corporate.to_string()),
                name: Some(name.to_string()),
                position: Some("Analista".to_string()),
                ..Default::default()
            },
            response_date: NaiveDate::from_ymd_opt(date.0, date.1, date.2).unwrap(),
            answers: SurveyAnswers {
                feedback: Some(feedback),
                ..Default::default()
            },
        }
    }

    #[tokio::test]
    async fn test_valid_row_commits_employee_and_response() {
        let store = MemoryStore::new();
        let applied = apply_row(&store, &row("ana@empresa.com", "Ana", (2025, 6, 1), 6))
            .await
            .unwrap();

        assert!(applied.employee_created);
        assert_eq!(store.employees().len(), 1);
        assert_eq!(store.responses().len(), 1);
        assert_eq!(store.responses()[0].employee_id, applied.employee_id);
    }

    #[tokio::test]
    async fn test_invalid_response_leaves_no_new_employee() {
        let store = MemoryStore::new();
        let err = apply_row(&store, &row("ana@empresa.com", "Ana", (2025, 6, 1), 9))
            .await
            .unwrap_err();

        assert!(matches!(err, StoreError::Row(RowError::ScoreOutOfRange { value: 9, .. })));
        assert!(store.employees().is_empty());
        assert!(store.responses().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_date_rolls_back_profile_update() {
        let store = MemoryStore::new();
        apply_row(&store, &row("ana@empresa.com", "Ana", (2025, 6, 1), 6)).await.unwrap();

        let mut again = row("ana@empresa.com", "Ana Paula", (2025, 6, 1), 5);
        again.profile.position = Some("Gerente".to_string());
        let err = apply_row(&store, &again).await.unwrap_err();

        assert!(matches!(err, StoreError::Row(RowError::DuplicateResponse(_))));
        let employees = store.employees();
        assert_eq!(employees.len(), 1);
        assert_eq!(employees[0].name, "Ana");
        assert_eq!(employees[0].position.as_deref(), Some("Analista"));
        assert_eq!(store.responses().len(), 1);
    }

    #[tokio::test]
    async fn test_same_employee_different_dates() {
        let store = MemoryStore::new();
        let first = apply_row(&store, &row("ana@empresa.com", "Ana", (2025, 6, 1), 6)).await.unwrap();
        let second = apply_row(&store, &row("ana@empresa.com", "Ana", (2025, 7, 1), 7)).await.unwrap();

        assert!(first.employee_created);
        assert!(!second.employee_created);
        assert_eq!(first.employee_id, second.employee_id);
        assert_eq!(store.responses().len(), 2);
    }
}
