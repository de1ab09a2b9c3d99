//! Analytics database queries

use anyhow::Result;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::types::{normalize_department, Response};

/// Optional filters of the analytics endpoints
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsFilter {
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub department: Option<String>,
}

impl AnalyticsFilter {
    fn department(&self) -> Option<String> {
        self.department
            .as_deref()
            .map(normalize_department)
            .filter(|d| !d.is_empty())
    }
}

/// Responses within the date range whose employee matches the department
pub async fn list_responses(pool: &PgPool, filter: &AnalyticsFilter) -> Result<Vec<Response>> {
    let responses = sqlx::query_as::<_, Response>(
        r#"
        SELECT r.*
        FROM responses r
        JOIN employees e ON e.id = r.employee_id
        WHERE ($1::date IS NULL OR r.response_date >= $1)
          AND ($2::date IS NULL OR r.response_date <= $2)
          AND ($3::text IS NULL OR e.department = $3)
        ORDER BY r.response_date, r.created_at
        "#,
    )
    .bind(filter.date_from)
    .bind(filter.date_to)
    .bind(filter.department())
    .fetch_all(pool)
    .await?;

    Ok(responses)
}

pub async fn count_employees(pool: &PgPool, filter: &AnalyticsFilter) -> Result<i64> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM employees WHERE ($1::text IS NULL OR department = $1)",
    )
    .bind(filter.department())
    .fetch_one(pool)
    .await?;

    Ok(count)
}
