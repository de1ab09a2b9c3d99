//! Employee database queries
//!
//! These run inside the per-row import transaction, so they take a
//! connection instead of the pool and return plain `sqlx` errors for the
//! caller to classify.

use sqlx::PgConnection;

use crate::types::{Employee, EmployeeKey};

const EMPLOYEE_COLUMNS: &str = "id, name, corporate_email, email, mobile_phone, department, position, \
     function, location, company_tenure_months, gender, generation, n0_company, n1_directorate, \
     n2_management, n3_coordination, n4_area, created_at, updated_at";

/// Unique index on `LOWER(corporate_email)`
pub const CORPORATE_EMAIL_INDEX: &str = "idx_employees_corporate_email";

/// Unique index on `LOWER(email)`
pub const EMAIL_INDEX: &str = "idx_employees_email";

/// Find by natural key (case-insensitive), locking the row for the
/// rest of the transaction
pub async fn find_by_key(conn: &mut PgConnection, key: EmployeeKey<'_>) -> sqlx::Result<Option<Employee>> {
    let column = match key {
        EmployeeKey::CorporateEmail(_) => "corporate_email",
        EmployeeKey::Email(_) => "email",
    };
    let sql = format!(
        "SELECT {} FROM employees WHERE LOWER({}) = LOWER($1) LIMIT 1 FOR UPDATE",
        EMPLOYEE_COLUMNS, column
    );

    sqlx::query_as::<_, Employee>(&sql)
        .bind(key.value())
        .fetch_optional(conn)
        .await
}

pub async fn insert_employee(conn: &mut PgConnection, employee: &Employee) -> sqlx::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO employees (
            id, name, corporate_email, email, mobile_phone, department, position,
            function, location, company_tenure_months, gender, generation,
            n0_company, n1_directorate, n2_management, n3_coordination, n4_area,
            created_at, updated_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19)
        "#,
    )
    .bind(employee.id)
    .bind(&employee.name)
    .bind(&employee.corporate_email)
    .bind(&employee.email)
    .bind(&employee.mobile_phone)
    .bind(&employee.department)
    .bind(&employee.position)
    .bind(&employee.function)
    .bind(&employee.location)
    .bind(employee.company_tenure_months)
    .bind(&employee.gender)
    .bind(&employee.generation)
    .bind(&employee.n0_company)
    .bind(&employee.n1_directorate)
    .bind(&employee.n2_management)
    .bind(&employee.n3_coordination)
    .bind(&employee.n4_area)
    .bind(employee.created_at)
    .bind(employee.updated_at)
    .execute(conn)
    .await?;

    Ok(())
}

/// Overwrite the profile columns; the corporate email is left alone
pub async fn update_profile(conn: &mut PgConnection, employee: &Employee) -> sqlx::Result<()> {
    sqlx::query(
        r#"
        UPDATE employees SET
            name = $2,
            email = $3,
            mobile_phone = $4,
            department = $5,
            position = $6,
            function = $7,
            location = $8,
            company_tenure_months = $9,
            gender = $10,
            generation = $11,
            n0_company = $12,
            n1_directorate = $13,
            n2_management = $14,
            n3_coordination = $15,
            n4_area = $16,
            updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(employee.id)
    .bind(&employee.name)
    .bind(&employee.email)
    .bind(&employee.mobile_phone)
    .bind(&employee.department)
    .bind(&employee.position)
    .bind(&employee.function)
    .bind(&employee.location)
    .bind(employee.company_tenure_months)
    .bind(&employee.gender)
    .bind(&employee.generation)
    .bind(&employee.n0_company)
    .bind(&employee.n1_directorate)
    .bind(&employee.n2_management)
    .bind(&employee.n3_coordination)
    .bind(&employee.n4_area)
    .execute(conn)
    .await?;

    Ok(())
}
