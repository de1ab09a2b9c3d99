//! Response writer

use crate::error::{RowError, StoreError};
use crate::types::{
    Employee, LikertDimension, NewResponse, Response, SurveyAnswers, ENPS_MAX, ENPS_MIN,
    LIKERT_MAX, LIKERT_MIN,
};

use super::row::SurveyRow;
use super::store::RowTransaction;

/// Insert the row's answer set for `employee`
pub async fn write_response(
    tx: &mut dyn RowTransaction,
    employee: &Employee,
    row: &SurveyRow,
) -> Result<Response, StoreError> {
    let response = build_response(employee, row)?;
    tx.insert_response(&response).await
}

pub fn build_response(employee: &Employee, row: &SurveyRow) -> Result<NewResponse, RowError> {
    validate_answers(&row.answers)?;
    Ok(NewResponse {
        employee_id: employee.id,
        response_date: row.response_date,
        answers: row.answers.clone(),
    })
}

/// Likert scores must be 1-7 and eNPS 0-10 when answered
pub fn validate_answers(answers: &SurveyAnswers) -> Result<(), RowError> {
    for dimension in LikertDimension::ALL {
        if let Some(value) = answers.score(dimension) {
            if !(LIKERT_MIN..=LIKERT_MAX).contains(&value) {
                return Err(RowError::ScoreOutOfRange { label: dimension.label(), value });
            }
        }
    }

    match answers.enps {
        Some(value) if !(ENPS_MIN..=ENPS_MAX).contains(&value) => Err(RowError::EnpsOutOfRange(value)),
        _ => Ok(()),
    }
}
