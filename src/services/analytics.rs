//! Survey analytics
//!
//! Pure functions over a collection of responses: eNPS, favorability per
//! Likert dimension and participation.

use serde::{Deserialize, Serialize};

use crate::defaults::FAVORABLE_THRESHOLD;
use crate::types::{round_to, EnpsCategory, LikertDimension, Response};

/// Band of an eNPS score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NpsLevel {
    NoData,
    Critical,
    NeedsImprovement,
    Good,
    VeryGood,
    Excellent,
}

impl NpsLevel {
    pub fn from_score(score: f64) -> Self {
        if score < 0.0 {
            NpsLevel::Critical
        } else if score < 30.0 {
            NpsLevel::NeedsImprovement
        } else if score < 50.0 {
            NpsLevel::Good
        } else if score < 70.0 {
            NpsLevel::VeryGood
        } else {
            NpsLevel::Excellent
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryShare {
    pub count: usize,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NpsSummary {
    pub score: f64,
    pub level: NpsLevel,
    pub total_responses: usize,
    pub promoters: CategoryShare,
    pub passives: CategoryShare,
    pub detractors: CategoryShare,
    pub average_score: f64,
}

/// eNPS = %promoters - %detractors over responses that answered eNPS
pub fn nps_summary(responses: &[Response]) -> NpsSummary {
    let scores: Vec<i32> = responses.iter().filter_map(|r| r.answers.enps).collect();
    let total = scores.len();

    if total == 0 {
        return NpsSummary {
            score: 0.0,
            level: NpsLevel::NoData,
            total_responses: 0,
            promoters: CategoryShare::default(),
            passives: CategoryShare::default(),
            detractors: CategoryShare::default(),
            average_score: 0.0,
        };
    }

    let share = |category: EnpsCategory| {
        let count = scores
            .iter()
            .filter(|s| EnpsCategory::from_score(**s) == Some(category))
            .count();
        CategoryShare {
            count,
            percentage: percentage(count, total),
        }
    };

    let promoters = share(EnpsCategory::Promoter);
    let passives = share(EnpsCategory::Passive);
    let detractors = share(EnpsCategory::Detractor);
    let score = round_to(promoters.percentage - detractors.percentage, 2);

    NpsSummary {
        score,
        level: NpsLevel::from_score(score),
        total_responses: total,
        promoters,
        passives,
        detractors,
        average_score: round_to(scores.iter().sum::<i32>() as f64 / total as f64, 2),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DimensionFavorability {
    pub dimension: LikertDimension,
    pub label: String,
    pub percentage: f64,
    pub favorable_count: usize,
    pub unfavorable_count: usize,
    pub total_count: usize,
}

/// Favorable (>= 6) share of the answered scores of one dimension
pub fn dimension_favorability(responses: &[Response], dimension: LikertDimension) -> DimensionFavorability {
    let scores: Vec<i32> = responses.iter().filter_map(|r| r.answers.score(dimension)).collect();
    let total = scores.len();
    let favorable = scores.iter().filter(|s| **s >= FAVORABLE_THRESHOLD).count();

    DimensionFavorability {
        dimension,
        label: dimension.label().to_string(),
        percentage: percentage(favorable, total),
        favorable_count: favorable,
        unfavorable_count: total - favorable,
        total_count: total,
    }
}

/// All seven dimensions, in survey order
pub fn favorability(responses: &[Response]) -> Vec<DimensionFavorability> {
    LikertDimension::ALL
        .iter()
        .map(|d| dimension_favorability(responses, *d))
        .collect()
}

/// Dimensions sorted best first
pub fn favorability_ranking(responses: &[Response]) -> Vec<DimensionFavorability> {
    let mut ranked = favorability(responses);
    ranked.sort_by(|a, b| b.percentage.total_cmp(&a.percentage));
    ranked
}

/// Mean of the dimension percentages that have answers
pub fn overall_favorability(responses: &[Response]) -> f64 {
    let answered: Vec<f64> = favorability(responses)
        .into_iter()
        .filter(|d| d.total_count > 0)
        .map(|d| d.percentage)
        .collect();

    if answered.is_empty() {
        return 0.0;
    }
    round_to(answered.iter().sum::<f64>() / answered.len() as f64, 2)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngagementLevel {
    Low,
    Medium,
    Good,
    Excellent,
}

impl EngagementLevel {
    pub fn from_rate(rate: f64) -> Self {
        if rate < 30.0 {
            EngagementLevel::Low
        } else if rate < 60.0 {
            EngagementLevel::Medium
        } else if rate < 80.0 {
            EngagementLevel::Good
        } else {
            EngagementLevel::Excellent
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participation {
    pub total_employees: usize,
    pub employees_responded: usize,
    pub total_responses: usize,
    pub response_rate: f64,
    pub engagement_level: EngagementLevel,
}

/// Share of `total_employees` with at least one response in `responses`
pub fn participation(total_employees: usize, responses: &[Response]) -> Participation {
    let mut responded: Vec<_> = responses.iter().map(|r| r.employee_id).collect();
    responded.sort_unstable();
    responded.dedup();

    let rate = percentage(responded.len(), total_employees);
    Participation {
        total_employees,
        employees_responded: responded.len(),
        total_responses: responses.len(),
        response_rate: rate,
        engagement_level: EngagementLevel::from_rate(rate),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsOverview {
    pub participation: Participation,
    pub enps: NpsSummary,
    pub favorability: Vec<DimensionFavorability>,
    pub overall_favorability: f64,
    pub at_risk_responses: usize,
}

pub fn overview(total_employees: usize, responses: &[Response]) -> AnalyticsOverview {
    AnalyticsOverview {
        participation: participation(total_employees, responses),
        enps: nps_summary(responses),
        favorability: favorability_ranking(responses),
        overall_favorability: overall_favorability(responses),
        at_risk_responses: responses.iter().filter(|r| r.answers.is_at_risk()).count(),
    }
}

fn percentage(part: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    round_to(part as f64 / total as f64 * 100.0, 2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use uuid::Uuid;

    use crate::types::{NewResponse, SurveyAnswers};

    fn response(employee_id: Uuid, answers: SurveyAnswers) -> Response {
        NewResponse {
            employee_id,
            response_date: NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
            answers,
        }
        .into_response()
    }

    fn enps(score: Option<i32>) -> Response {
        response(Uuid::new_v4(), SurveyAnswers { enps: score, ..Default::default() })
    }

    #[test]
    fn test_nps_without_answers_has_no_data() {
        let summary = nps_summary(&[enps(None)]);
        assert_eq!(summary.level, NpsLevel::NoData);
        assert_eq!(summary.total_responses, 0);
        assert_eq!(summary.score, 0.0);
    }

    #[test]
    fn test_nps_score_and_bands() {
        // 2 promoters, 1 passive, 1 detractor -> 50 - 25 = 25
        let responses = vec![enps(Some(10)), enps(Some(9)), enps(Some(7)), enps(Some(3)), enps(None)];
        let summary = nps_summary(&responses);

        assert_eq!(summary.total_responses, 4);
        assert_eq!(summary.promoters, CategoryShare { count: 2, percentage: 50.0 });
        assert_eq!(summary.passives.count, 1);
        assert_eq!(summary.detractors.percentage, 25.0);
        assert_eq!(summary.score, 25.0);
        assert_eq!(summary.level, NpsLevel::NeedsImprovement);
        assert_eq!(summary.average_score, 7.25);
    }

    #[test]
    fn test_nps_levels() {
        assert_eq!(NpsLevel::from_score(-0.5), NpsLevel::Critical);
        assert_eq!(NpsLevel::from_score(0.0), NpsLevel::NeedsImprovement);
        assert_eq!(NpsLevel::from_score(30.0), NpsLevel::Good);
        assert_eq!(NpsLevel::from_score(69.99), NpsLevel::VeryGood);
        assert_eq!(NpsLevel::from_score(100.0), NpsLevel::Excellent);
    }

    #[test]
    fn test_favorability_counts_only_answered_scores() {
        let employee = Uuid::new_v4();
        let responses = vec![
            response(employee, SurveyAnswers { feedback: Some(7), contribution: Some(2), ..Default::default() }),
            response(employee, SurveyAnswers { feedback: Some(6), ..Default::default() }),
            response(employee, SurveyAnswers { feedback: Some(5), ..Default::default() }),
            response(employee, SurveyAnswers { feedback: Some(6), ..Default::default() }),
        ];

        let feedback = dimension_favorability(&responses, LikertDimension::Feedback);
        assert_eq!(feedback.total_count, 4);
        assert_eq!(feedback.favorable_count, 3);
        assert_eq!(feedback.unfavorable_count, 1);
        assert_eq!(feedback.percentage, 75.0);

        let ranking = favorability_ranking(&responses);
        assert_eq!(ranking[0].dimension, LikertDimension::Feedback);

        // Feedback 75 and Contribution 0; unanswered dimensions excluded
        assert_eq!(overall_favorability(&responses), 37.5);
    }

    #[test]
    fn test_participation_counts_distinct_employees() {
        let ana = Uuid::new_v4();
        let bruno = Uuid::new_v4();
        let responses = vec![
            response(ana, SurveyAnswers::default()),
            response(ana, SurveyAnswers::default()),
            response(bruno, SurveyAnswers::default()),
        ];

        let p = participation(4, &responses);
        assert_eq!(p.employees_responded, 2);
        assert_eq!(p.total_responses, 3);
        assert_eq!(p.response_rate, 50.0);
        assert_eq!(p.engagement_level, EngagementLevel::Medium);

        assert_eq!(participation(0, &[]).response_rate, 0.0);
    }
}
