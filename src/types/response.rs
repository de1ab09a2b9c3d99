//! Survey response types

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Likert questions are scored on a 1-7 scale
pub const LIKERT_MIN: i32 = 1;
pub const LIKERT_MAX: i32 = 7;

/// eNPS is scored 0-10
pub const ENPS_MIN: i32 = 0;
pub const ENPS_MAX: i32 = 10;

/// One of the seven fixed Likert survey questions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LikertDimension {
    InterestInPosition,
    Contribution,
    LearningAndDevelopment,
    Feedback,
    InteractionWithManager,
    CareerOpportunityClarity,
    PermanenceExpectation,
}

impl LikertDimension {
    pub const ALL: [LikertDimension; 7] = [
        LikertDimension::InterestInPosition,
        LikertDimension::Contribution,
        LikertDimension::LearningAndDevelopment,
        LikertDimension::Feedback,
        LikertDimension::InteractionWithManager,
        LikertDimension::CareerOpportunityClarity,
        LikertDimension::PermanenceExpectation,
    ];

    /// Question label as it appears in the survey export header
    pub fn label(&self) -> &'static str {
        match self {
            LikertDimension::InterestInPosition => "Interesse no Cargo",
            LikertDimension::Contribution => "Contribuição",
            LikertDimension::LearningAndDevelopment => "Aprendizado e Desenvolvimento",
            LikertDimension::Feedback => "Feedback",
            LikertDimension::InteractionWithManager => "Interação com Gestor",
            LikertDimension::CareerOpportunityClarity => "Clareza sobre Possibilidades de Carreira",
            LikertDimension::PermanenceExpectation => "Expectativa de Permanência",
        }
    }
}

/// eNPS band of a single score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnpsCategory {
    Promoter,
    Passive,
    Detractor,
}

impl EnpsCategory {
    pub fn from_score(score: i32) -> Option<Self> {
        match score {
            9..=10 => Some(EnpsCategory::Promoter),
            7..=8 => Some(EnpsCategory::Passive),
            0..=6 => Some(EnpsCategory::Detractor),
            _ => None,
        }
    }
}

/// Scores and comments of one answer set
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct SurveyAnswers {
    pub interest_in_position: Option<i32>,
    pub interest_in_position_comment: Option<String>,
    pub contribution: Option<i32>,
    pub contribution_comment: Option<String>,
    pub learning_and_development: Option<i32>,
    pub learning_and_development_comment: Option<String>,
    pub feedback: Option<i32>,
    pub feedback_comment: Option<String>,
    pub interaction_with_manager: Option<i32>,
    pub interaction_with_manager_comment: Option<String>,
    pub career_opportunity_clarity: Option<i32>,
    pub career_opportunity_clarity_comment: Option<String>,
    pub permanence_expectation: Option<i32>,
    pub permanence_expectation_comment: Option<String>,
    pub enps: Option<i32>,
    pub enps_open_comment: Option<String>,
}

impl SurveyAnswers {
    pub fn score(&self, dimension: LikertDimension) -> Option<i32> {
        match dimension {
            LikertDimension::InterestInPosition => self.interest_in_position,
            LikertDimension::Contribution => self.contribution,
            LikertDimension::LearningAndDevelopment => self.learning_and_development,
            LikertDimension::Feedback => self.feedback,
            LikertDimension::InteractionWithManager => self.interaction_with_manager,
            LikertDimension::CareerOpportunityClarity => self.career_opportunity_clarity,
            LikertDimension::PermanenceExpectation => self.permanence_expectation,
        }
    }

    /// Answered Likert scores, in dimension order
    pub fn likert_scores(&self) -> impl Iterator<Item = i32> + '_ {
        LikertDimension::ALL.iter().filter_map(|d| self.score(*d))
    }

    pub fn enps_category(&self) -> Option<EnpsCategory> {
        self.enps.and_then(EnpsCategory::from_score)
    }

    pub fn average_likert_score(&self) -> f64 {
        let scores: Vec<i32> = self.likert_scores().collect();
        if scores.is_empty() {
            return 0.0;
        }
        round_to(scores.iter().sum::<i32>() as f64 / scores.len() as f64, 2)
    }

    /// Low average engagement or a detractor eNPS
    pub fn is_at_risk(&self) -> bool {
        self.average_likert_score() < crate::defaults::AT_RISK_AVERAGE
            || self.enps_category() == Some(EnpsCategory::Detractor)
    }
}

/// Round half away from zero to `places` decimals
pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

/// Stored survey response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    pub id: Uuid,
    pub employee_id: Uuid,
    pub response_date: NaiveDate,
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub answers: SurveyAnswers,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Response about to be inserted
#[derive(Debug, Clone, PartialEq)]
pub struct NewResponse {
    pub employee_id: Uuid,
    pub response_date: NaiveDate,
    pub answers: SurveyAnswers,
}

impl NewResponse {
    pub fn into_response(self) -> Response {
        let now = Utc::now();
        Response {
            id: Uuid::new_v4(),
            employee_id: self.employee_id,
            response_date: self.response_date,
            answers: self.answers,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enps_category_bands() {
        assert_eq!(EnpsCategory::from_score(10), Some(EnpsCategory::Promoter));
        assert_eq!(EnpsCategory::from_score(9), Some(EnpsCategory::Promoter));
        assert_eq!(EnpsCategory::from_score(8), Some(EnpsCategory::Passive));
        assert_eq!(EnpsCategory::from_score(7), Some(EnpsCategory::Passive));
        assert_eq!(EnpsCategory::from_score(6), Some(EnpsCategory::Detractor));
        assert_eq!(EnpsCategory::from_score(0), Some(EnpsCategory::Detractor));
        assert_eq!(EnpsCategory::from_score(11), None);
    }

    #[test]
    fn test_average_ignores_unanswered_questions() {
        let answers = SurveyAnswers {
            interest_in_position: Some(7),
            contribution: Some(6),
            feedback: Some(3),
            ..Default::default()
        };
        assert_eq!(answers.average_likert_score(), 5.33);
    }

    #[test]
    fn test_empty_answers_have_zero_metrics() {
        let answers = SurveyAnswers::default();
        assert_eq!(answers.average_likert_score(), 0.0);
        assert!(answers.enps_category().is_none());
    }

    #[test]
    fn test_detractor_is_at_risk_even_with_high_scores() {
        let answers = SurveyAnswers {
            interest_in_position: Some(7),
            enps: Some(5),
            ..Default::default()
        };
        assert!(answers.is_at_risk());
    }

    #[test]
    fn test_response_serializes_answers_inline() {
        let response = NewResponse {
            employee_id: Uuid::nil(),
            response_date: NaiveDate::from_ymd_opt(2025, 3, 10).unwrap(),
            answers: SurveyAnswers {
                enps: Some(9),
                ..Default::default()
            },
        }
        .into_response();

        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("\"employeeId\""));
        assert!(json.contains("\"responseDate\":\"2025-03-10\""));
        assert!(json.contains("\"enps\":9"));
        assert!(!json.contains("answers"));
    }

    #[test]
    fn test_dimension_labels_are_distinct() {
        let mut labels: Vec<&str> = LikertDimension::ALL.iter().map(|d| d.label()).collect();
        labels.sort();
        labels.dedup();
        assert_eq!(labels.len(), 7);
    }
}
