//! Employee identity resolution
//!
//! Finds the employee a row belongs to by natural key and applies the
//! row's profile on top of it, or creates the employee.

use crate::error::{RowError, StoreError};
use crate::types::{Employee, EmployeeKey, EmployeeProfile};

use super::store::RowTransaction;

/// Employee after the row's profile has been written
#[derive(Debug, Clone)]
pub struct ResolvedEmployee {
    pub employee: Employee,
    pub created: bool,
}

/// Find-or-create the employee and persist the merged profile
pub async fn resolve_employee(
    tx: &mut dyn RowTransaction,
    profile: &EmployeeProfile,
) -> Result<ResolvedEmployee, StoreError> {
    let key = validate_profile(profile)?;

    match tx.find_employee(key).await? {
        Some(mut employee) => {
            employee.apply_profile(profile);
            tx.update_employee(&employee).await?;
            Ok(ResolvedEmployee { employee, created: false })
        }
        None => {
            let name = profile.name.clone().ok_or(RowError::MissingName)?;
            let employee = Employee::from_profile(name, profile);
            tx.insert_employee(&employee).await?;
            Ok(ResolvedEmployee { employee, created: true })
        }
    }
}

/// Emails must be well formed and at least one must be present
pub fn validate_profile(profile: &EmployeeProfile) -> Result<EmployeeKey<'_>, RowError> {
    if let Some(email) = &profile.corporate_email {
        validate_email("email_corporativo", email)?;
    }
    if let Some(email) = &profile.email {
        validate_email("email", email)?;
    }
    profile.key().ok_or(RowError::MissingIdentity)
}

fn validate_email(field: &'static str, email: &str) -> Result<(), RowError> {
    if is_valid_email(email) {
        Ok(())
    } else {
        Err(RowError::InvalidEmail { field, value: email.to_string() })
    }
}

pub fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::import::memory::MemoryStore;
    use crate::services::import::store::SurveyStore;

    fn profile(corporate: &str, name: Option<&str>) -> EmployeeProfile {
        EmployeeProfile {
            corporate_email: Some(corporate.to_string()),
            name: name.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn test_email_validation() {
        assert!(is_valid_email("ana.souza@empresa.com.br"));
        assert!(!is_valid_email("ana.souza"));
        assert!(!is_valid_email("@empresa.com"));
        assert!(!is_valid_email("ana@empresa"));
        assert!(!is_valid_email("ana@@empresa.com"));
        assert!(!is_valid_email("ana souza@empresa.com"));
    }

    #[test]
    fn test_validate_profile_requires_identity() {
        let empty = EmployeeProfile::default();
        assert_eq!(validate_profile(&empty), Err(RowError::MissingIdentity));

        let bad = profile("not-an-email", Some("Ana"));
        assert!(matches!(
            validate_profile(&bad),
            Err(RowError::InvalidEmail { field: "email_corporativo", .. })
        ));
    }

    #[tokio::test]
    async fn test_creates_then_updates_same_employee() {
        let store = MemoryStore::new();

        let mut tx = store.begin_row().await.unwrap();
        let first = resolve_employee(tx.as_mut(), &profile("ana@empresa.com", Some("Ana")))
            .await
            .unwrap();
        tx.commit().await.unwrap();
        assert!(first.created);

        let mut update = profile("ANA@empresa.com", None);
        update.position = Some("Coordenadora".to_string());
        let mut tx = store.begin_row().await.unwrap();
        let second = resolve_employee(tx.as_mut(), &update).await.unwrap();
        tx.commit().await.unwrap();

        assert!(!second.created);
        assert_eq!(second.employee.id, first.employee.id);
        assert_eq!(second.employee.name, "Ana");
        assert_eq!(second.employee.position.as_deref(), Some("Coordenadora"));
        assert_eq!(store.employees().len(), 1);
    }

    #[tokio::test]
    async fn test_new_employee_without_name_is_rejected() {
        let store = MemoryStore::new();
        let mut tx = store.begin_row().await.unwrap();

        let err = resolve_employee(tx.as_mut(), &profile("ana@empresa.com", None))
            .await
            .unwrap_err();

        assert!(matches!(err, StoreError::Row(RowError::MissingName)));
    }

    #[tokio::test]
    async fn test_falls_back_to_personal_email() {
        let store = MemoryStore::new();
        let personal = EmployeeProfile {
            name: Some("Bruno".to_string()),
            email: Some("bruno@gmail.com".to_string()),
            ..Default::default()
        };

        for _ in 0..2 {
            let mut tx = store.begin_row().await.unwrap();
            resolve_employee(tx.as_mut(), &personal).await.unwrap();
            tx.commit().await.unwrap();
        }

        assert_eq!(store.employees().len(), 1);
    }
}
