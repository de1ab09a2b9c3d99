//! Import job database queries
//!
//! Status changes are guarded in the WHERE clause so they only apply from
//! the expected source state.

use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::types::{ImportJob, ImportSummary};

pub async fn create_import_job(pool: &PgPool, job: &ImportJob) -> sqlx::Result<ImportJob> {
    sqlx::query_as::<_, ImportJob>(
        r#"
        INSERT INTO import_jobs (id, file_name, file_path, status, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING *
        "#,
    )
    .bind(job.id)
    .bind(&job.file_name)
    .bind(&job.file_path)
    .bind(job.status)
    .bind(job.created_at)
    .bind(job.updated_at)
    .fetch_one(pool)
    .await
}

pub async fn get_import_job(pool: &PgPool, id: Uuid) -> sqlx::Result<Option<ImportJob>> {
    sqlx::query_as::<_, ImportJob>("SELECT * FROM import_jobs WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn list_recent_import_jobs(pool: &PgPool, limit: i64) -> sqlx::Result<Vec<ImportJob>> {
    sqlx::query_as::<_, ImportJob>("SELECT * FROM import_jobs ORDER BY created_at DESC LIMIT $1")
        .bind(limit)
        .fetch_all(pool)
        .await
}

pub async fn mark_processing(pool: &PgPool, id: Uuid) -> sqlx::Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE import_jobs
        SET status = 'processing', started_at = NOW(), updated_at = NOW()
        WHERE id = $1 AND status = 'pending'
        "#,
    )
    .bind(id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

pub async fn record_progress(pool: &PgPool, id: Uuid, processed: i32, total: Option<i32>) -> sqlx::Result<()> {
    sqlx::query(
        r#"
        UPDATE import_jobs
        SET processed_rows = GREATEST(processed_rows, $2),
            total_rows = COALESCE($3, total_rows),
            updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(id)
    .bind(processed)
    .bind(total)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn mark_completed(pool: &PgPool, id: Uuid, summary: &ImportSummary) -> sqlx::Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE import_jobs
        SET status = 'completed',
            processed_rows = GREATEST(processed_rows, $2),
            employees_created = $3,
            responses_created = $4,
            import_errors = $5,
            completed_at = NOW(),
            updated_at = NOW()
        WHERE id = $1 AND status = 'processing'
        "#,
    )
    .bind(id)
    .bind(summary.processed_rows)
    .bind(summary.employees_created)
    .bind(summary.responses_created)
    .bind(Json(&summary.errors))
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

pub async fn mark_failed(pool: &PgPool, id: Uuid, message: &str) -> sqlx::Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE import_jobs
        SET status = 'failed', error_message = $2, completed_at = NOW(), updated_at = NOW()
        WHERE id = $1 AND status IN ('pending', 'processing')
        "#,
    )
    .bind(id)
    .bind(message)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}
