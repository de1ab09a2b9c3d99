//! Response database queries

use sqlx::PgConnection;
use uuid::Uuid;

use crate::types::{NewResponse, Response};

/// UNIQUE (employee_id, response_date)
pub const EMPLOYEE_DATE_CONSTRAINT: &str = "uq_responses_employee_date";

pub async fn insert_response(conn: &mut PgConnection, response: &NewResponse) -> sqlx::Result<Response> {
    let answers = &response.answers;

    sqlx::query_as::<_, Response>(
        r#"
        INSERT INTO responses (
            id, employee_id, response_date,
            interest_in_position, interest_in_position_comment,
            contribution, contribution_comment,
            learning_and_development, learning_and_development_comment,
            feedback, feedback_comment,
            interaction_with_manager, interaction_with_manager_comment,
            career_opportunity_clarity, career_opportunity_clarity_comment,
            permanence_expectation, permanence_expectation_comment,
            enps, enps_open_comment
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(response.employee_id)
    .bind(response.response_date)
    .bind(answers.interest_in_position)
    .bind(&answers.interest_in_position_comment)
    .bind(answers.contribution)
    .bind(&answers.contribution_comment)
    .bind(answers.learning_and_development)
    .bind(&answers.learning_and_development_comment)
    .bind(answers.feedback)
    .bind(&answers.feedback_comment)
    .bind(answers.interaction_with_manager)
    .bind(&answers.interaction_with_manager_comment)
    .bind(answers.career_opportunity_clarity)
    .bind(&answers.career_opportunity_clarity_comment)
    .bind(answers.permanence_expectation)
    .bind(&answers.permanence_expectation_comment)
    .bind(answers.enps)
    .bind(&answers.enps_open_comment)
    .fetch_one(conn)
    .await
}
