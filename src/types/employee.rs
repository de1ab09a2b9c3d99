//! Employee types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Employee entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Employee {
    pub id: Uuid,
    pub name: String,
    pub corporate_email: Option<String>,
    pub email: Option<String>,
    pub mobile_phone: Option<String>,
    pub department: Option<String>,
    pub position: Option<String>,
    pub function: Option<String>,
    pub location: Option<String>,
    pub company_tenure_months: Option<i32>,
    pub gender: Option<String>,
    pub generation: Option<String>,

    // Organisational hierarchy, company down to area
    pub n0_company: Option<String>,
    pub n1_directorate: Option<String>,
    pub n2_management: Option<String>,
    pub n3_coordination: Option<String>,
    pub n4_area: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Employee {
    /// Build a new, not yet persisted employee from an imported profile.
    pub fn from_profile(name: String, profile: &EmployeeProfile) -> Self {
        let now = Utc::now();
        let mut employee = Self {
            id: Uuid::new_v4(),
            name,
            corporate_email: profile.corporate_email.clone(),
            email: None,
            mobile_phone: None,
            department: None,
            position: None,
            function: None,
            location: None,
            company_tenure_months: None,
            gender: None,
            generation: None,
            n0_company: None,
            n1_directorate: None,
            n2_management: None,
            n3_coordination: None,
            n4_area: None,
            created_at: now,
            updated_at: now,
        };
        employee.apply_profile(profile);
        employee
    }

    /// Overwrite every mutable profile field (last write wins).
    ///
    /// The name is only replaced when the profile carries one. The corporate
    /// email is the identity and is only set on creation.
    pub fn apply_profile(&mut self, profile: &EmployeeProfile) {
        if let Some(name) = &profile.name {
            self.name = name.clone();
        }
        self.email = profile.email.clone();
        self.mobile_phone = profile.mobile_phone.clone();
        self.department = profile.department.as_deref().map(normalize_department);
        self.position = profile.position.clone();
        self.function = profile.function.clone();
        self.location = profile.location.clone();
        self.company_tenure_months = profile.company_tenure_months;
        self.gender = profile.gender.clone();
        self.generation = profile.generation.clone();
        self.n0_company = profile.n0_company.clone();
        self.n1_directorate = profile.n1_directorate.clone();
        self.n2_management = profile.n2_management.clone();
        self.n3_coordination = profile.n3_coordination.clone();
        self.n4_area = profile.n4_area.clone();
        self.updated_at = Utc::now();
    }
}

/// Departments are stored lowercase so grouping is stable across exports.
pub fn normalize_department(department: &str) -> String {
    department.trim().to_lowercase()
}

/// Typed employee columns of one survey row
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EmployeeProfile {
    pub name: Option<String>,
    pub corporate_email: Option<String>,
    pub email: Option<String>,
    pub mobile_phone: Option<String>,
    pub department: Option<String>,
    pub position: Option<String>,
    pub function: Option<String>,
    pub location: Option<String>,
    pub company_tenure_months: Option<i32>,
    pub gender: Option<String>,
    pub generation: Option<String>,
    pub n0_company: Option<String>,
    pub n1_directorate: Option<String>,
    pub n2_management: Option<String>,
    pub n3_coordination: Option<String>,
    pub n4_area: Option<String>,
}

impl EmployeeProfile {
    /// Natural key used to find the employee: corporate email first, then
    /// the personal email.
    pub fn key(&self) -> Option<EmployeeKey<'_>> {
        self.corporate_email
            .as_deref()
            .map(EmployeeKey::CorporateEmail)
            .or_else(|| self.email.as_deref().map(EmployeeKey::Email))
    }
}

/// Lookup key for an employee
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmployeeKey<'a> {
    CorporateEmail(&'a str),
    Email(&'a str),
}

impl EmployeeKey<'_> {
    /// Case-insensitive match against a stored employee
    pub fn matches(&self, employee: &Employee) -> bool {
        let stored = match self {
            EmployeeKey::CorporateEmail(_) => employee.corporate_email.as_deref(),
            EmployeeKey::Email(_) => employee.email.as_deref(),
        };
        stored.is_some_and(|s| s.eq_ignore_ascii_case(self.value()))
    }

    pub fn value(&self) -> &str {
        match self {
            EmployeeKey::CorporateEmail(v) | EmployeeKey::Email(v) => v,
        }
    }
}
